//! Classification metrics reported during training.

use crate::label::{CLASS_COUNT, Label};

/// Confusion matrix over the two gesture labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    /// Row-major counts (`truth * CLASS_COUNT + predicted`).
    counts: [u32; CLASS_COUNT * CLASS_COUNT],
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, truth: Label, predicted: Label) {
        let idx = truth.index() * CLASS_COUNT + predicted.index();
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: Label, predicted: Label) -> u32 {
        self.counts[truth.index() * CLASS_COUNT + predicted.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&v| u64::from(v)).sum()
    }
}

/// Overall accuracy; `0.0` for an empty matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f32 {
    let total = cm.total();
    if total == 0 {
        return 0.0;
    }
    let correct: u64 = Label::ALL
        .iter()
        .map(|&label| u64::from(cm.get(label, label)))
        .sum();
    correct as f32 / total as f32
}

/// Fraction of `label` examples predicted as `label`.
pub fn recall(cm: &ConfusionMatrix, label: Label) -> f32 {
    let support: u32 = Label::ALL.iter().map(|&p| cm.get(label, p)).sum();
    if support == 0 {
        0.0
    } else {
        cm.get(label, label) as f32 / support as f32
    }
}
