//! Position sizing and protective price calculators.
//!
//! ```text
//! risk_dollars  = portfolio_value * risk_per_trade_pct
//! risk_per_unit = |entry - stop|
//! quantity      = min(risk_dollars / risk_per_unit, size cap / entry)
//! ```

use crate::domain::OrderSide;

use super::gate::RiskGate;

impl RiskGate {
    /// Quantity whose stop-out loss equals the per-trade risk budget,
    /// capped by the position-size limit. A zero stop distance falls back
    /// to the cap.
    pub fn calculate_position_size(
        &self,
        portfolio_value: f64,
        entry_price: f64,
        stop_loss_price: f64,
    ) -> f64 {
        if portfolio_value <= 0.0 || entry_price <= 0.0 {
            return 0.0;
        }
        let config = self.config();
        let cap = portfolio_value * config.max_position_size_pct / entry_price;
        let risk_per_unit = (entry_price - stop_loss_price).abs();
        if risk_per_unit < 1e-12 {
            return cap;
        }
        let budget = portfolio_value * config.risk_per_trade_pct;
        (budget / risk_per_unit).min(cap)
    }

    /// Stop below a long entry, above a short entry.
    pub fn calculate_stop_loss_price(&self, entry_price: f64, entry_side: OrderSide) -> f64 {
        let pct = self.config().stop_loss_pct;
        match entry_side {
            OrderSide::Buy => entry_price * (1.0 - pct),
            OrderSide::Sell => entry_price * (1.0 + pct),
        }
    }

    /// Target above a long entry, below a short entry.
    pub fn calculate_take_profit_price(&self, entry_price: f64, entry_side: OrderSide) -> f64 {
        let pct = self.config().take_profit_pct;
        match entry_side {
            OrderSide::Buy => entry_price * (1.0 + pct),
            OrderSide::Sell => entry_price * (1.0 - pct),
        }
    }
}
