use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }
}

/// Open position in one symbol. `quantity` is signed and never zero:
/// the ledger removes the entry when it returns to flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub avg_entry_price: f64,
    pub mark_price: f64,
    pub opened_at: DateTime<Utc>,
    /// Entry commission not yet attributed to a closed trade.
    pub entry_commission: f64,
    /// Entry slippage not yet attributed to a closed trade.
    pub entry_slippage: f64,
}

impl Position {
    pub fn side(&self) -> PositionSide {
        if self.quantity >= 0.0 {
            PositionSide::Long
        } else {
            PositionSide::Short
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    /// Signed mark-to-market value (negative for shorts).
    pub fn market_value(&self) -> f64 {
        self.quantity * self.mark_price
    }

    /// Absolute exposure at the mark.
    pub fn notional(&self) -> f64 {
        self.quantity.abs() * self.mark_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.quantity * (self.mark_price - self.avg_entry_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn position(quantity: f64, entry: f64, mark: f64) -> Position {
        Position {
            symbol: "QQQ".into(),
            quantity,
            avg_entry_price: entry,
            mark_price: mark,
            opened_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            entry_commission: 0.0,
            entry_slippage: 0.0,
        }
    }

    #[test]
    fn long_unrealized_follows_mark() {
        let pos = position(10.0, 100.0, 103.0);
        assert!((pos.unrealized_pnl() - 30.0).abs() < 1e-10);
        assert_eq!(pos.side(), PositionSide::Long);
    }

    #[test]
    fn short_gains_when_price_falls() {
        let pos = position(-5.0, 100.0, 90.0);
        assert!((pos.unrealized_pnl() - 50.0).abs() < 1e-10);
        assert!((pos.market_value() + 450.0).abs() < 1e-10);
        assert!((pos.notional() - 450.0).abs() < 1e-10);
    }
}
