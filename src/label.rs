//! The closed two-gesture label space.

use serde::{Deserialize, Serialize};

/// Class names in output-index order.
pub const CLASS_NAMES: [&str; 2] = ["HOLD", "GO"];
/// Number of classes the classifier predicts over.
pub const CLASS_COUNT: usize = CLASS_NAMES.len();

/// Gesture label; the discriminant is the classifier output index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Hold = 0,
    Go = 1,
}

impl Label {
    pub const ALL: [Label; CLASS_COUNT] = [Label::Hold, Label::Go];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(Label::Hold),
            1 => Some(Label::Go),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        CLASS_NAMES[self.index()]
    }

    /// One-hot target row for this label.
    pub fn one_hot(self) -> [f32; CLASS_COUNT] {
        let mut row = [0.0; CLASS_COUNT];
        row[self.index()] = 1.0;
        row
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
