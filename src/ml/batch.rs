use crate::features::FeatureVector;
use crate::label::{CLASS_COUNT, Label};

use super::FitError;

/// Stacked features with one-hot targets, built for a single fit and dropped
/// when that fit returns.
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    feature_len: usize,
    /// Row-major `rows x feature_len`.
    features: Vec<f32>,
    targets: Vec<[f32; CLASS_COUNT]>,
    labels: Vec<Label>,
}

impl TrainingBatch {
    /// Stack paired features and labels, one-hot encoding the labels.
    pub fn stack(features: &[FeatureVector], labels: &[Label]) -> Result<Self, FitError> {
        if features.len() != labels.len() {
            return Err(FitError::Unpaired {
                features: features.len(),
                labels: labels.len(),
            });
        }
        let Some(first) = features.first() else {
            return Err(FitError::EmptyBatch);
        };
        let feature_len = first.len();
        let mut stacked = Vec::with_capacity(feature_len * features.len());
        for vector in features {
            if vector.len() != feature_len {
                return Err(FitError::DimensionMismatch {
                    expected: feature_len,
                    found: vector.len(),
                });
            }
            stacked.extend_from_slice(vector.as_slice());
        }
        Ok(Self {
            feature_len,
            features: stacked,
            targets: labels.iter().map(|label| label.one_hot()).collect(),
            labels: labels.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn feature_len(&self) -> usize {
        self.feature_len
    }

    pub fn row(&self, idx: usize) -> &[f32] {
        let start = idx * self.feature_len;
        &self.features[start..start + self.feature_len]
    }

    pub fn target(&self, idx: usize) -> &[f32; CLASS_COUNT] {
        &self.targets[idx]
    }

    pub fn label(&self, idx: usize) -> Label {
        self.labels[idx]
    }
}
