//! Pre-trade risk: the gate that accepts or rejects candidate orders, the
//! drawdown/daily-loss state it reads, and the sizing calculators.

pub mod gate;
pub mod sizing;
pub mod state;

pub use gate::{PendingOrders, RiskGate, RiskViolation};
pub use state::RiskState;
