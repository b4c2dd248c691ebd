//! Continuous live-frame classification.

use tracing::{debug, info};

use crate::camera::Frame;
use crate::features::FeatureExtractor;
use crate::label::Label;
use crate::ml::{Classifier, LabelDistribution};

/// Repeating prediction task, one pass per display refresh.
///
/// The loop stays armed while enabled; it disarms when disabled or when the
/// camera fails and only re-arms on an explicit enable.
#[derive(Debug, Default)]
pub struct PredictionLoop {
    enabled: bool,
    armed: bool,
    signal: Option<Label>,
    distribution: Option<LabelDistribution>,
    passes: u64,
}

impl PredictionLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            info!("Prediction {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
        self.armed = enabled;
    }

    pub fn disarm(&mut self) {
        if self.armed {
            debug!("Prediction loop disarmed");
        }
        self.armed = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Latest published control signal.
    pub fn signal(&self) -> Option<Label> {
        self.signal
    }

    pub fn distribution(&self) -> Option<LabelDistribution> {
        self.distribution
    }

    /// Completed passes that published a signal.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Run one pass. Returns the freshly published signal, or `None` when the
    /// pass was a no-op or skipped.
    pub fn run_pass(
        &mut self,
        frame: Option<&Frame>,
        extractor: Option<&dyn FeatureExtractor>,
        classifier: Option<&dyn Classifier>,
    ) -> Option<Label> {
        if !self.armed {
            return None;
        }
        let extractor = extractor.filter(|extractor| extractor.is_ready())?;
        let classifier = classifier.filter(|classifier| classifier.is_fitted())?;
        let frame = frame?;
        let features = match extractor.extract(frame) {
            Ok(features) => features,
            Err(err) => {
                debug!("Prediction tick skipped: {err}");
                return None;
            }
        };
        let distribution = match classifier.predict(&features) {
            Ok(distribution) => distribution,
            Err(err) => {
                debug!("Prediction tick skipped: {err}");
                return None;
            }
        };
        let label = distribution.argmax();
        self.distribution = Some(distribution);
        self.signal = Some(label);
        self.passes += 1;
        Some(label)
    }
}
