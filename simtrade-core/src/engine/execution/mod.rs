//! Execution — per-tick fill decisions and their costs.
//!
//! Stateless: the order manager owns the orders and calls into these
//! helpers once per live order per tick.

pub mod cost_model;
pub mod fill_price;
pub mod liquidity;
pub mod trigger;

pub use cost_model::CostModel;
pub use fill_price::{compute_fill, ComputedFill};
pub use liquidity::ParticipationLimit;
pub use trigger::{check_trigger, TriggerResult};
