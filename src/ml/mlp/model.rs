use crate::label::CLASS_COUNT;
use crate::ml::{InferenceError, LabelDistribution};

/// Fitted weights plus the input normalization learned from the training set.
#[derive(Debug, Clone)]
pub struct MlpModel {
    pub feature_len: usize,
    pub hidden_size: usize,
    /// `hidden_size x feature_len`, row-major.
    pub weights1: Vec<f32>,
    pub bias1: Vec<f32>,
    /// `CLASS_COUNT x hidden_size`, row-major.
    pub weights2: Vec<f32>,
    pub bias2: Vec<f32>,
    pub feature_mean: Vec<f32>,
    pub feature_std: Vec<f32>,
}

impl MlpModel {
    pub fn validate(&self) -> Result<(), String> {
        let input = self.feature_len;
        let hidden = self.hidden_size;
        if self.weights1.len() != input * hidden {
            return Err("weights1 length mismatch".to_string());
        }
        if self.bias1.len() != hidden {
            return Err("bias1 length mismatch".to_string());
        }
        if self.weights2.len() != CLASS_COUNT * hidden {
            return Err("weights2 length mismatch".to_string());
        }
        if self.bias2.len() != CLASS_COUNT {
            return Err("bias2 length mismatch".to_string());
        }
        if self.feature_mean.len() != input {
            return Err("feature_mean length mismatch".to_string());
        }
        if self.feature_std.len() != input {
            return Err("feature_std length mismatch".to_string());
        }
        Ok(())
    }

    pub fn predict_proba(&self, features: &[f32]) -> Result<LabelDistribution, InferenceError> {
        if features.len() != self.feature_len {
            return Err(InferenceError::DimensionMismatch {
                expected: self.feature_len,
                found: features.len(),
            });
        }
        let normalized = self.normalize(features);
        let mut hidden_act = vec![0.0f32; self.hidden_size];
        let mut logits = [0.0f32; CLASS_COUNT];
        self.forward(&normalized, &mut hidden_act, &mut logits);
        let mut probs = [0.0f32; CLASS_COUNT];
        softmax_inplace(&logits, &mut probs);
        Ok(LabelDistribution::new(probs))
    }

    pub(super) fn normalize(&self, features: &[f32]) -> Vec<f32> {
        features
            .iter()
            .zip(self.feature_mean.iter().zip(&self.feature_std))
            .map(|(&x, (&mean, &std))| (x - mean) / std.max(1e-6))
            .collect()
    }

    /// Writes post-ReLU activations into `hidden_act` and raw logits into `logits`.
    pub(super) fn forward(&self, normalized: &[f32], hidden_act: &mut [f32], logits: &mut [f32]) {
        let input = self.feature_len;
        for (h, act) in hidden_act.iter_mut().enumerate() {
            let row = &self.weights1[h * input..(h + 1) * input];
            let sum: f32 = row.iter().zip(normalized).map(|(w, x)| w * x).sum();
            *act = (sum + self.bias1[h]).max(0.0);
        }
        let hidden = self.hidden_size;
        for (c, logit) in logits.iter_mut().enumerate() {
            let row = &self.weights2[c * hidden..(c + 1) * hidden];
            let sum: f32 = row.iter().zip(hidden_act.iter()).map(|(w, a)| w * a).sum();
            *logit = sum + self.bias2[c];
        }
    }
}

pub(super) fn softmax_inplace(raw: &[f32], out: &mut [f32]) {
    if raw.is_empty() || out.is_empty() {
        return;
    }
    let max = raw
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, |a, b| a.max(b));
    let mut sum = 0.0f32;
    for (i, &v) in raw.iter().enumerate() {
        let e = (v - max).exp();
        out[i] = e;
        sum += e;
    }
    if sum == 0.0 || !sum.is_finite() {
        let uniform = 1.0 / (raw.len() as f32);
        for v in out.iter_mut() {
            *v = uniform;
        }
        return;
    }
    for v in out.iter_mut() {
        *v /= sum;
    }
}
