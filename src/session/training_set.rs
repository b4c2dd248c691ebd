use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::features::FeatureVector;
use crate::label::{CLASS_COUNT, Label};

/// Examples captured per label.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TrainingCounts {
    pub hold: u64,
    pub go: u64,
}

impl TrainingCounts {
    pub fn get(&self, label: Label) -> u64 {
        match label {
            Label::Hold => self.hold,
            Label::Go => self.go,
        }
    }

    /// Both labels have at least one example.
    pub fn is_complete(&self) -> bool {
        self.hold > 0 && self.go > 0
    }
}

/// Session-owned examples, stored as parallel feature and label lists.
///
/// The lists only change together, so their lengths always match, and the
/// per-label counters only ever grow.
#[derive(Debug, Default)]
pub struct TrainingSet {
    features: Vec<FeatureVector>,
    labels: Vec<Label>,
    counts: [u64; CLASS_COUNT],
}

impl TrainingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, features: FeatureVector, label: Label) {
        self.features.push(features);
        self.labels.push(label);
        self.counts[label.index()] += 1;
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn counts(&self) -> TrainingCounts {
        TrainingCounts {
            hold: self.counts[Label::Hold.index()],
            go: self.counts[Label::Go.index()],
        }
    }

    /// Reorder both lists with one shared permutation.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        self.features = order.iter().map(|&idx| self.features[idx].clone()).collect();
        self.labels = order.iter().map(|&idx| self.labels[idx]).collect();
    }
}
