//! Immutable portfolio snapshots — one per replayed tick forms the equity curve.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only view of one open position at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionView {
    pub symbol: String,
    /// Signed; negative for shorts.
    pub quantity: f64,
    pub avg_entry_price: f64,
    pub mark_price: f64,
    pub unrealized_pnl: f64,
    /// `|quantity| * mark_price`
    pub notional: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cash: f64,
    /// Signed mark-to-market value of all positions.
    pub positions_value: f64,
    /// `cash + positions_value`
    pub total_value: f64,
    /// Cumulative realized P&L net of every commission charged so far.
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    /// Sum of absolute position notionals.
    pub gross_exposure: f64,
    pub total_commission: f64,
    pub total_slippage: f64,
    /// Sorted by symbol.
    pub positions: Vec<PositionView>,
}

impl PortfolioSnapshot {
    pub fn position(&self, symbol: &str) -> Option<&PositionView> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    /// Signed quantity held in `symbol`, zero if flat.
    pub fn position_quantity(&self, symbol: &str) -> f64 {
        self.position(symbol).map_or(0.0, |p| p.quantity)
    }

    pub fn mark_price(&self, symbol: &str) -> Option<f64> {
        self.position(symbol).map(|p| p.mark_price)
    }

    pub fn is_flat(&self) -> bool {
        self.positions.is_empty()
    }
}
