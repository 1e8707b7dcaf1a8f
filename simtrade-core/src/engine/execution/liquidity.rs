//! Participation limit — caps a fill at a fraction of the tick's volume.
//!
//! The unfilled remainder stays on the book and the order moves to
//! PARTIALLY_FILLED. Ticks without volume are not constrained.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticipationLimit {
    /// Fraction of tick volume, within (0, 1].
    pub max_participation: f64,
}

impl ParticipationLimit {
    pub fn new(max_participation: f64) -> Self {
        debug_assert!(
            max_participation > 0.0 && max_participation <= 1.0,
            "participation rate must be in (0, 1]"
        );
        Self { max_participation }
    }

    /// Returns `(fill_qty, remainder_qty)`.
    pub fn constrain(&self, desired_qty: f64, volume: Option<f64>) -> (f64, f64) {
        let Some(volume) = volume else {
            return (desired_qty, 0.0);
        };
        let max_qty = volume * self.max_participation;
        if desired_qty <= max_qty {
            (desired_qty, 0.0)
        } else {
            (max_qty, desired_qty - max_qty)
        }
    }
}
