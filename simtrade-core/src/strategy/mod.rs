//! Strategy contract — the narrow seam between signal generation and the
//! execution core.
//!
//! A strategy sees each tick and an immutable portfolio snapshot and answers
//! with zero or more order intents. It never touches the order manager or the
//! ledger directly; the session sizes, risk-checks and submits what it asks for.

pub mod intent;
pub mod ma_cross;
pub mod scheduled;

pub use intent::{OrderIntent, Sizing};
pub use ma_cross::MovingAverageCross;
pub use scheduled::{ScheduledAction, ScheduledSignals};

use crate::domain::{PortfolioSnapshot, Tick};

/// Produces order intents from market ticks.
///
/// `Send` so a session owning a boxed strategy can move to a worker thread.
pub trait Strategy: Send {
    /// Called once per tick, after the ledger has been marked to `tick.price`.
    fn produce_orders(&mut self, tick: &Tick, portfolio: &PortfolioSnapshot) -> Vec<OrderIntent>;

    /// Strategy name for logging and reports.
    fn name(&self) -> &str;
}

/// A strategy that never trades. Useful as a baseline and in tests.
#[derive(Debug, Clone, Default)]
pub struct Idle;

impl Strategy for Idle {
    fn produce_orders(&mut self, _tick: &Tick, _portfolio: &PortfolioSnapshot) -> Vec<OrderIntent> {
        Vec::new()
    }

    fn name(&self) -> &str {
        "idle"
    }
}
