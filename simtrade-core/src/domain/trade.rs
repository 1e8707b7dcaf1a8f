//! Trade — a closed (or partially closed) round trip.

use super::ids::TradeId;
use super::position::PositionSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What closed the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    /// Closing leg of a fill that flipped the position.
    Reversal,
}

/// A closed round trip. Immutable once appended to the trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: f64,

    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,

    /// `(exit - entry) * qty * sign` less the exit commission.
    pub realized_pnl: f64,
    /// `realized_pnl` over entry cost, in percent.
    pub realized_pnl_pct: f64,
    /// Entry share plus exit share.
    pub commission: f64,
    pub slippage: f64,

    pub holding_secs: i64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.realized_pnl > 0.0
    }

    pub fn holding_hours(&self) -> f64 {
        self.holding_secs as f64 / 3600.0
    }

    pub fn cost_basis(&self) -> f64 {
        self.entry_price * self.quantity
    }
}
