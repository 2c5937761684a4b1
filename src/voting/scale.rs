use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Result, TierError};

pub const DEFAULT_TIERS: [&str; 6] = ["S", "A", "B", "C", "D", "F"];

/// Ordered tier labels, most favorable first.
///
/// The first label has rank `len`, each following label one less, so the last label has rank 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct TierScale {
    labels: Vec<String>,
}

impl TierScale {
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(TierError::Validation("tier scale needs at least one tier".to_string()));
        }

        let mut seen = HashSet::new();
        for label in &labels {
            if label.trim().is_empty() {
                return Err(TierError::Validation("tier labels cannot be empty".to_string()));
            }
            if !seen.insert(label.as_str()) {
                return Err(TierError::Validation(format!("duplicate tier label: {}", label)));
            }
        }

        Ok(Self { labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Rank value of `label`, or `None` if the label is not on this scale.
    pub fn rank_of(&self, label: &str) -> Option<u32> {
        self.position(label)
            .map(|position| (self.labels.len() - position) as u32)
    }

    /// Label whose rank is closest to `value`.
    ///
    /// Exact midpoints resolve to the earlier (more favorable) label, so a mean of 5.5 on the
    /// default scale is `S`, not `A`.
    pub fn nearest_label(&self, value: f64) -> &str {
        let len = self.labels.len();
        let mut best = 0;
        let mut best_distance = f64::INFINITY;

        for position in 0..len {
            let rank = (len - position) as f64;
            let distance = (rank - value).abs();
            // Strictly closer only: ties keep the earlier label
            if distance < best_distance {
                best = position;
                best_distance = distance;
            }
        }

        &self.labels[best]
    }

    /// Label reported for items nobody has voted on: the middle of the scale.
    pub fn neutral_label(&self) -> &str {
        &self.labels[self.labels.len() / 2]
    }
}

impl Default for TierScale {
    fn default() -> Self {
        Self {
            labels: DEFAULT_TIERS.iter().map(|label| label.to_string()).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for TierScale {
    type Error = TierError;

    fn try_from(labels: Vec<String>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<TierScale> for Vec<String> {
    fn from(scale: TierScale) -> Self {
        scale.labels
    }
}
