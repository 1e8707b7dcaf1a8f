//! Order intent — what a strategy wants, before sizing and risk checks.

use serde::{Deserialize, Serialize};

use crate::domain::{OrderError, OrderPurpose, OrderRequest, OrderSide, OrderType};
use crate::risk::RiskGate;

/// Quantities below this are treated as zero.
const QTY_EPSILON: f64 = 1e-9;

/// How the quantity of an intent is decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Sizing {
    /// Explicit side and quantity.
    Quantity { side: OrderSide, quantity: f64 },
    /// Desired signed position; the session submits the difference.
    Target { position: f64 },
    /// Quantity from the per-trade risk budget and the configured stop distance.
    RiskBudget { side: OrderSide },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub sizing: Sizing,
    pub order_type: OrderType,
    #[serde(default)]
    pub limit_price: Option<f64>,
    #[serde(default)]
    pub stop_price: Option<f64>,
}

impl OrderIntent {
    fn with_sizing(symbol: impl Into<String>, sizing: Sizing) -> Self {
        Self {
            symbol: symbol.into(),
            sizing,
            order_type: OrderType::Market,
            limit_price: None,
            stop_price: None,
        }
    }

    pub fn buy(symbol: impl Into<String>, quantity: f64) -> Self {
        Self::with_sizing(
            symbol,
            Sizing::Quantity {
                side: OrderSide::Buy,
                quantity,
            },
        )
    }

    pub fn sell(symbol: impl Into<String>, quantity: f64) -> Self {
        Self::with_sizing(
            symbol,
            Sizing::Quantity {
                side: OrderSide::Sell,
                quantity,
            },
        )
    }

    pub fn target(symbol: impl Into<String>, position: f64) -> Self {
        Self::with_sizing(symbol, Sizing::Target { position })
    }

    pub fn risk_sized(symbol: impl Into<String>, side: OrderSide) -> Self {
        Self::with_sizing(symbol, Sizing::RiskBudget { side })
    }

    /// Turn into a LIMIT order at `price`.
    pub fn limit(mut self, price: f64) -> Self {
        self.order_type = OrderType::Limit;
        self.limit_price = Some(price);
        self.stop_price = None;
        self
    }

    /// Turn into a STOP order triggering at `price`.
    pub fn stop(mut self, price: f64) -> Self {
        self.order_type = OrderType::Stop;
        self.stop_price = Some(price);
        self.limit_price = None;
        self
    }

    pub fn stop_limit(mut self, stop: f64, limit: f64) -> Self {
        self.order_type = OrderType::StopLimit;
        self.stop_price = Some(stop);
        self.limit_price = Some(limit);
        self
    }

    /// Resolve into a concrete request.
    ///
    /// `current` is the signed position held, `market_price` the latest price
    /// and `portfolio_value` the current total value. Returns `Ok(None)` when a
    /// target is already met. The returned request is not yet validated.
    pub fn resolve(
        &self,
        current: f64,
        market_price: f64,
        portfolio_value: f64,
        gate: &RiskGate,
    ) -> Result<Option<OrderRequest>, OrderError> {
        let (side, quantity) = match self.sizing {
            Sizing::Quantity { side, quantity } => (side, quantity),
            Sizing::Target { position } => {
                if !position.is_finite() {
                    return Err(OrderError::MalformedOrder(format!(
                        "target position must be finite, got {position}"
                    )));
                }
                let delta = position - current;
                if delta.abs() < QTY_EPSILON {
                    return Ok(None);
                }
                let side = if delta > 0.0 { OrderSide::Buy } else { OrderSide::Sell };
                (side, delta.abs())
            }
            Sizing::RiskBudget { side } => {
                let entry = self.entry_reference(market_price);
                let stop = gate.calculate_stop_loss_price(entry, side);
                (side, gate.calculate_position_size(portfolio_value, entry, stop))
            }
        };

        let resulting = current + side.sign() * quantity;
        let purpose = if current.abs() > QTY_EPSILON
            && resulting.abs() < current.abs()
            && current * resulting >= 0.0
        {
            OrderPurpose::Exit
        } else {
            OrderPurpose::Entry
        };

        Ok(Some(OrderRequest {
            symbol: self.symbol.clone(),
            side,
            quantity,
            order_type: self.order_type,
            limit_price: self.limit_price,
            stop_price: self.stop_price,
            purpose,
        }))
    }

    fn entry_reference(&self, market_price: f64) -> f64 {
        match self.order_type {
            OrderType::Limit | OrderType::StopLimit => self.limit_price.unwrap_or(market_price),
            OrderType::Stop => self.stop_price.unwrap_or(market_price),
            OrderType::Market => market_price,
        }
    }
}
