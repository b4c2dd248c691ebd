use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, seq::SliceRandom};
use tracing::debug;

use super::MlpModel;
use super::model::softmax_inplace;
use crate::label::{CLASS_COUNT, Label};
use crate::ml::metrics::{ConfusionMatrix, accuracy, recall};
use crate::ml::{EpochMetrics, EpochReport, FitConfig, FitError, TrainingBatch};

/// Architecture and optimizer settings for [`train_mlp`].
#[derive(Debug, Clone, PartialEq)]
pub struct MlpOptions {
    pub hidden_size: usize,
    pub learning_rate: f32,
    pub l2_penalty: f32,
    /// Fixed seed for weight init and shuffling; random when `None`.
    pub seed: Option<u64>,
}

impl Default for MlpOptions {
    fn default() -> Self {
        Self {
            hidden_size: 128,
            learning_rate: 0.05,
            l2_penalty: 1e-4,
            seed: None,
        }
    }
}

/// Fit a fresh model with mini-batch SGD on cross-entropy loss.
pub fn train_mlp(
    batch: &TrainingBatch,
    options: &MlpOptions,
    config: &FitConfig,
    on_epoch: &mut dyn FnMut(EpochReport),
) -> Result<MlpModel, FitError> {
    if batch.is_empty() {
        return Err(FitError::EmptyBatch);
    }
    let n = batch.len();
    let d = batch.feature_len();
    let hidden = options.hidden_size.max(1);
    let batch_size = config.batch_size.max(1);

    let (feature_mean, feature_std) = feature_mean_std(batch);
    let seed = options.seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = StdRng::seed_from_u64(seed);

    let mut model = MlpModel {
        feature_len: d,
        hidden_size: hidden,
        weights1: vec![0.0f32; hidden * d],
        bias1: vec![0.0f32; hidden],
        weights2: vec![0.0f32; CLASS_COUNT * hidden],
        bias2: vec![0.0f32; CLASS_COUNT],
        feature_mean,
        feature_std,
    };
    for w in &mut model.weights1 {
        *w = (rng.random::<f32>() - 0.5) * 0.1;
    }
    for w in &mut model.weights2 {
        *w = (rng.random::<f32>() - 0.5) * 0.1;
    }

    let normalized: Vec<Vec<f32>> = (0..n).map(|idx| model.normalize(batch.row(idx))).collect();
    let mut indices: Vec<usize> = (0..n).collect();
    let mut hidden_act = vec![0.0f32; hidden];
    let mut logits = [0.0f32; CLASS_COUNT];
    let mut probs = [0.0f32; CLASS_COUNT];
    let mut last_cm = ConfusionMatrix::new();

    for epoch in 0..config.epochs {
        if config.shuffle {
            indices.shuffle(&mut rng);
        }
        let mut cm = ConfusionMatrix::new();
        let mut loss_sum = 0.0f32;

        for chunk in indices.chunks(batch_size) {
            let mut d_w1 = vec![0.0f32; model.weights1.len()];
            let mut d_b1 = vec![0.0f32; hidden];
            let mut d_w2 = vec![0.0f32; model.weights2.len()];
            let mut d_b2 = [0.0f32; CLASS_COUNT];
            let mut d_hidden = vec![0.0f32; hidden];

            for &idx in chunk {
                let x = &normalized[idx];
                model.forward(x, &mut hidden_act, &mut logits);
                softmax_inplace(&logits, &mut probs);

                let target = batch.target(idx);
                let truth = batch.label(idx);
                let predicted = argmax_label(&probs);
                cm.add(truth, predicted);
                loss_sum -= probs[truth.index()].max(1e-7).ln();

                d_hidden.fill(0.0);
                for c in 0..CLASS_COUNT {
                    let dz2 = probs[c] - target[c];
                    d_b2[c] += dz2;
                    let base = c * hidden;
                    for h in 0..hidden {
                        d_w2[base + h] += dz2 * hidden_act[h];
                        d_hidden[h] += dz2 * model.weights2[base + h];
                    }
                }
                for h in 0..hidden {
                    if hidden_act[h] <= 0.0 {
                        continue;
                    }
                    d_b1[h] += d_hidden[h];
                    let base = h * d;
                    for i in 0..d {
                        d_w1[base + i] += d_hidden[h] * x[i];
                    }
                }
            }

            let scale = options.learning_rate / chunk.len() as f32;
            let l2 = options.l2_penalty;
            for (w, g) in model.weights1.iter_mut().zip(&d_w1) {
                *w -= scale * (g + l2 * *w);
            }
            for (b, g) in model.bias1.iter_mut().zip(&d_b1) {
                *b -= scale * g;
            }
            for (w, g) in model.weights2.iter_mut().zip(&d_w2) {
                *w -= scale * (g + l2 * *w);
            }
            for (b, g) in model.bias2.iter_mut().zip(&d_b2) {
                *b -= scale * g;
            }
        }

        let loss = loss_sum / n as f32;
        if !loss.is_finite() {
            return Err(FitError::Diverged { epoch });
        }
        on_epoch(EpochReport {
            epoch,
            metrics: EpochMetrics {
                loss,
                accuracy: accuracy(&cm),
            },
        });
        last_cm = cm;
    }

    debug!(
        "MLP fit on {n} examples: HOLD recall {:.2}, GO recall {:.2}",
        recall(&last_cm, Label::Hold),
        recall(&last_cm, Label::Go)
    );
    Ok(model)
}

fn argmax_label(probs: &[f32; CLASS_COUNT]) -> Label {
    if probs[Label::Go.index()] > probs[Label::Hold.index()] {
        Label::Go
    } else {
        Label::Hold
    }
}

fn feature_mean_std(batch: &TrainingBatch) -> (Vec<f32>, Vec<f32>) {
    let d = batch.feature_len();
    let n = batch.len().max(1) as f32;
    let mut mean = vec![0.0f32; d];
    for idx in 0..batch.len() {
        for (m, &x) in mean.iter_mut().zip(batch.row(idx)) {
            *m += x;
        }
    }
    for v in &mut mean {
        *v /= n;
    }

    let mut std = vec![0.0f32; d];
    for idx in 0..batch.len() {
        for ((s, &x), &m) in std.iter_mut().zip(batch.row(idx)).zip(&mean) {
            let diff = x - m;
            *s += diff * diff;
        }
    }
    for v in &mut std {
        *v = (*v / n).sqrt();
    }
    (mean, std)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;

    fn separable_batch() -> TrainingBatch {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            let jitter = i as f32 * 0.01;
            features.push(FeatureVector::new(vec![0.9 - jitter, 0.1 + jitter, 0.5]));
            labels.push(Label::Hold);
            features.push(FeatureVector::new(vec![0.1 + jitter, 0.9 - jitter, 0.5]));
            labels.push(Label::Go);
        }
        TrainingBatch::stack(&features, &labels).unwrap()
    }

    fn options() -> MlpOptions {
        MlpOptions {
            hidden_size: 8,
            learning_rate: 0.1,
            l2_penalty: 0.0,
            seed: Some(7),
        }
    }

    #[test]
    fn reports_every_epoch_in_order() {
        let batch = separable_batch();
        let config = FitConfig {
            batch_size: 5,
            epochs: 10,
            shuffle: true,
        };
        let mut reports = Vec::new();
        train_mlp(&batch, &options(), &config, &mut |r| reports.push(r)).unwrap();
        let epochs: Vec<usize> = reports.iter().map(|r| r.epoch).collect();
        assert_eq!(epochs, (0..10).collect::<Vec<_>>());
        for report in &reports {
            assert!(report.metrics.loss.is_finite());
            assert!((0.0..=1.0).contains(&report.metrics.accuracy));
        }
    }

    #[test]
    fn learns_separable_gestures() {
        let batch = separable_batch();
        let config = FitConfig {
            batch_size: 5,
            epochs: 60,
            shuffle: true,
        };
        let mut reports = Vec::new();
        let model = train_mlp(&batch, &options(), &config, &mut |r| reports.push(r)).unwrap();
        model.validate().unwrap();
        let first = reports.first().unwrap().metrics.loss;
        let last = reports.last().unwrap().metrics.loss;
        assert!(last < first);

        let hold = model.predict_proba(&[0.85, 0.15, 0.5]).unwrap();
        let go = model.predict_proba(&[0.15, 0.85, 0.5]).unwrap();
        assert_eq!(hold.argmax(), Label::Hold);
        assert_eq!(go.argmax(), Label::Go);
    }

    #[test]
    fn same_seed_gives_same_model() {
        let batch = separable_batch();
        let config = FitConfig::default();
        let a = train_mlp(&batch, &options(), &config, &mut |_| {}).unwrap();
        let b = train_mlp(&batch, &options(), &config, &mut |_| {}).unwrap();
        assert_eq!(a.weights1, b.weights1);
        assert_eq!(a.bias2, b.bias2);
    }
}
