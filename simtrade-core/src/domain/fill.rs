use crate::domain::ids::OrderId;
use crate::domain::order::{OrderPurpose, OrderSide};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution against an order. A partially filled order produces
/// several of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    /// Execution price, slippage already applied.
    pub price: f64,
    pub quantity: f64,
    pub commission: f64,
    /// Dollar slippage relative to the quoted price.
    pub slippage: f64,
    pub purpose: OrderPurpose,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }

    /// Signed position change (+qty for buys, -qty for sells).
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity
    }
}
