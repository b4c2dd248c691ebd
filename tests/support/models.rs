use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use lightsout::camera::Frame;
use lightsout::features::{ExtractionError, FeatureExtractor, FeatureVector};
use lightsout::ml::{
    Classifier, EpochMetrics, EpochReport, FitConfig, FitError, InferenceError,
    LabelDistribution, TrainingBatch,
};

/// Two features: mean red level of the left and right halves.
pub struct PanelExtractor {
    pub ready: bool,
}

impl FeatureExtractor for PanelExtractor {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn feature_len(&self) -> usize {
        2
    }

    fn extract(&self, frame: &Frame) -> Result<FeatureVector, ExtractionError> {
        if !self.ready {
            return Err(ExtractionError::NotLoaded);
        }
        let image = frame.image();
        let split = image.width() / 2;
        let (mut left, mut right) = (0f32, 0f32);
        for (x, _, pixel) in image.enumerate_pixels() {
            if x < split {
                left += f32::from(pixel[0]);
            } else {
                right += f32::from(pixel[0]);
            }
        }
        Ok(FeatureVector::new(vec![left, right]))
    }
}

/// Predicts GO when the right panel is brighter. Fitting only records the
/// call and reports one synthetic epoch per configured epoch.
///
/// While `hold_fit` is set, `fit` blocks before reporting, so a test can
/// observe the session mid-fit.
pub struct PanelClassifier {
    fitted: bool,
    pub fits: Arc<AtomicUsize>,
    pub hold_fit: Arc<AtomicBool>,
}

impl PanelClassifier {
    pub fn new() -> Self {
        Self {
            fitted: false,
            fits: Arc::new(AtomicUsize::new(0)),
            hold_fit: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Classifier for PanelClassifier {
    fn name(&self) -> &str {
        "panel"
    }

    fn untrained(&self) -> Box<dyn Classifier> {
        Box::new(PanelClassifier {
            fitted: false,
            fits: self.fits.clone(),
            hold_fit: self.hold_fit.clone(),
        })
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn predict(&self, features: &FeatureVector) -> Result<LabelDistribution, InferenceError> {
        if !self.fitted {
            return Err(InferenceError::NotTrained);
        }
        let values = features.as_slice();
        if values.len() != 2 {
            return Err(InferenceError::DimensionMismatch {
                expected: 2,
                found: values.len(),
            });
        }
        Ok(if values[1] > values[0] {
            LabelDistribution::new([0.1, 0.9])
        } else {
            LabelDistribution::new([0.9, 0.1])
        })
    }

    fn fit(
        &mut self,
        batch: &TrainingBatch,
        config: &FitConfig,
        on_epoch: &mut dyn FnMut(EpochReport),
    ) -> Result<(), FitError> {
        if batch.is_empty() {
            return Err(FitError::EmptyBatch);
        }
        while self.hold_fit.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        for epoch in 0..config.epochs {
            on_epoch(EpochReport {
                epoch,
                metrics: EpochMetrics {
                    loss: 1.0 / (epoch as f32 + 1.0),
                    accuracy: 1.0,
                },
            });
        }
        self.fits.fetch_add(1, Ordering::SeqCst);
        self.fitted = true;
        Ok(())
    }
}

/// Never fits: every `fit` reports divergence on the first epoch.
pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn name(&self) -> &str {
        "failing"
    }

    fn untrained(&self) -> Box<dyn Classifier> {
        Box::new(FailingClassifier)
    }

    fn is_fitted(&self) -> bool {
        false
    }

    fn predict(&self, _: &FeatureVector) -> Result<LabelDistribution, InferenceError> {
        Err(InferenceError::NotTrained)
    }

    fn fit(
        &mut self,
        _: &TrainingBatch,
        _: &FitConfig,
        _: &mut dyn FnMut(EpochReport),
    ) -> Result<(), FitError> {
        Err(FitError::Diverged { epoch: 0 })
    }
}
