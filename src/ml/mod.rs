//! Gesture classifier: the trainable head that maps feature vectors to a
//! HOLD/GO distribution.
//!
//! [`Classifier`] is the collaborator seam the session trains and queries.
//! [`mlp::MlpClassifier`] is the bundled implementation.

mod batch;
pub mod metrics;
pub mod mlp;

use serde::Serialize;
use thiserror::Error;

use crate::features::FeatureVector;
use crate::label::{CLASS_COUNT, Label};

pub use batch::TrainingBatch;

/// Fit schedule handed to [`Classifier::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitConfig {
    pub batch_size: usize,
    pub epochs: usize,
    /// Reshuffle example order every epoch.
    pub shuffle: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            epochs: 10,
            shuffle: true,
        }
    }
}

/// Metrics recorded at the end of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochMetrics {
    /// Mean cross-entropy over the epoch.
    pub loss: f32,
    /// Fraction of examples whose arg-max matched the target.
    pub accuracy: f32,
}

/// Progress event emitted after each epoch, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub metrics: EpochMetrics,
}

/// Probability per class, indexed by [`Label::index`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelDistribution([f32; CLASS_COUNT]);

impl LabelDistribution {
    pub fn new(probabilities: [f32; CLASS_COUNT]) -> Self {
        Self(probabilities)
    }

    pub fn probability(&self, label: Label) -> f32 {
        self.0[label.index()]
    }

    /// Most probable label; ties resolve to the lower index.
    pub fn argmax(&self) -> Label {
        let mut best = 0usize;
        let mut best_val = f32::NEG_INFINITY;
        for (idx, &p) in self.0.iter().enumerate() {
            if p > best_val {
                best_val = p;
                best = idx;
            }
        }
        Label::from_index(best).unwrap_or(Label::Hold)
    }

    pub fn as_array(&self) -> [f32; CLASS_COUNT] {
        self.0
    }
}

/// Inference failures; the prediction loop skips the tick on any of these.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Classifier has not been fitted")]
    NotTrained,
    #[error("Feature length {found} does not match model input {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Reasons a fit is rejected.
#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("Training batch is empty")]
    EmptyBatch,
    #[error("Feature length {found} does not match batch width {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Features and labels differ in length ({features} vs {labels})")]
    Unpaired { features: usize, labels: usize },
    #[error("Training diverged at epoch {epoch}")]
    Diverged { epoch: usize },
}

/// Trainable two-class classifier.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// A fresh, unfitted instance with the same architecture.
    fn untrained(&self) -> Box<dyn Classifier>;

    fn is_fitted(&self) -> bool;

    fn predict(&self, features: &FeatureVector) -> Result<LabelDistribution, InferenceError>;

    /// Fit from scratch, calling `on_epoch` after every epoch.
    fn fit(
        &mut self,
        batch: &TrainingBatch,
        config: &FitConfig,
        on_epoch: &mut dyn FnMut(EpochReport),
    ) -> Result<(), FitError>;
}
