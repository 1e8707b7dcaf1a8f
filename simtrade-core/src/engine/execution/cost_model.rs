//! Cost model — slippage and commission.
//!
//! Slippage is adverse: buyers pay more, sellers receive less. Commission is
//! a fraction of fill notional and is charged to cash, never folded into the
//! recorded fill price.

use crate::config::ExecutionConfig;
use crate::domain::OrderSide;

#[derive(Debug, Clone, PartialEq)]
pub struct CostModel {
    /// Fraction, e.g. 0.0005 = 5 bps.
    pub slippage_rate: f64,
    /// Fraction of notional, e.g. 0.001 = 10 bps.
    pub commission_rate: f64,
}

impl CostModel {
    pub fn new(slippage_rate: f64, commission_rate: f64) -> Self {
        Self {
            slippage_rate,
            commission_rate,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(config.slippage_rate, config.commission_rate)
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Move `quoted` against the trader.
    ///
    /// Returns `(slipped_price, slippage_dollar_amount)`.
    pub fn apply_slippage(&self, quoted: f64, side: OrderSide, quantity: f64) -> (f64, f64) {
        if self.slippage_rate == 0.0 {
            return (quoted, 0.0);
        }
        let slipped = match side {
            OrderSide::Buy => quoted * (1.0 + self.slippage_rate),
            OrderSide::Sell => quoted * (1.0 - self.slippage_rate),
        };
        (slipped, (slipped - quoted).abs() * quantity)
    }

    /// `commission = fill_price * quantity * commission_rate`
    pub fn compute_commission(&self, fill_price: f64, quantity: f64) -> f64 {
        fill_price * quantity * self.commission_rate
    }
}
