//! Classification of stock quantity changes against a low-stock threshold.

use serde::{Deserialize, Serialize};

/// Result of comparing a previous and a new quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOutcome {
    /// Quantities are equal; nothing is recorded.
    Unchanged,
    /// `new == 0` and `previous > 0`.
    BecameOutOfStock,
    /// `0 < new <= threshold` and `previous > threshold`.
    BecameLowStock,
    /// `new > threshold` and `previous <= threshold`.
    Recovered,
    /// Any other delta.
    Changed,
}

impl ChangeOutcome {
    /// `true` for every outcome that writes a history row.
    #[must_use]
    pub fn is_change(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Classifies the move from `previous` to `new` for the given `threshold`.
#[must_use]
pub fn classify_transition(previous: i32, new: i32, threshold: i32) -> ChangeOutcome {
    if previous == new {
        return ChangeOutcome::Unchanged;
    }
    if new == 0 && previous > 0 {
        return ChangeOutcome::BecameOutOfStock;
    }
    if new > 0 && new <= threshold && previous > threshold {
        return ChangeOutcome::BecameLowStock;
    }
    if new > threshold && previous <= threshold {
        return ChangeOutcome::Recovered;
    }
    ChangeOutcome::Changed
}
