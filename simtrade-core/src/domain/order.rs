//! Orders: requests, validated orders, lifecycle states, and order errors.
//!
//! An `Order` is built from an `OrderRequest` exactly once. Kind-specific
//! price fields are checked at that point and never touched again; only the
//! status and fill fields change while the order is live.

use super::ids::{OcoGroupId, OrderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by order construction and the order manager.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("malformed order: {0}")]
    MalformedOrder(String),

    #[error("order {id} is {status}; cannot {action}")]
    InvalidState {
        id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },

    #[error("order {0} not found")]
    OrderNotFound(OrderId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderType {
    fn requires_limit(self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    fn requires_stop(self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::Stop => "STOP",
            OrderType::StopLimit => "STOP_LIMIT",
        };
        f.write_str(name)
    }
}

/// Order lifecycle states.
///
/// ```text
/// PENDING ─┬─▶ PARTIALLY_FILLED ─┬─▶ FILLED
///          │                     └─▶ CANCELLED
///          ├─▶ FILLED
///          ├─▶ CANCELLED
///          └─▶ REJECTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    pub fn is_live(self) -> bool {
        !self.is_terminal()
    }

    /// Whether `self → next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, PartiallyFilled)
                | (Pending, Filled)
                | (Pending, Cancelled)
                | (Pending, Rejected)
                | (PartiallyFilled, PartiallyFilled)
                | (PartiallyFilled, Filled)
                | (PartiallyFilled, Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

/// Why an order exists. Drives the exit reason recorded on closed trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderPurpose {
    #[default]
    Entry,
    Exit,
    StopLoss,
    TakeProfit,
}

impl OrderPurpose {
    /// Exits and bracket legs only ever shrink a position.
    pub fn is_reduce_only(self) -> bool {
        !matches!(self, OrderPurpose::Entry)
    }
}

/// A caller's request for an order, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
    #[serde(default)]
    pub limit_price: Option<f64>,
    #[serde(default)]
    pub stop_price: Option<f64>,
    #[serde(default)]
    pub purpose: OrderPurpose,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            stop_price: None,
            purpose: OrderPurpose::Entry,
        }
    }

    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: f64,
        limit_price: f64,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn stop(symbol: impl Into<String>, side: OrderSide, quantity: f64, stop_price: f64) -> Self {
        Self {
            order_type: OrderType::Stop,
            stop_price: Some(stop_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn stop_limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: f64,
        stop_price: f64,
        limit_price: f64,
    ) -> Self {
        Self {
            order_type: OrderType::StopLimit,
            stop_price: Some(stop_price),
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn with_purpose(mut self, purpose: OrderPurpose) -> Self {
        self.purpose = purpose;
        self
    }

    /// Check kind-specific required and forbidden fields.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.symbol.is_empty() {
            return Err(OrderError::MalformedOrder("symbol is empty".into()));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(OrderError::MalformedOrder(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        check_price_field(
            "limit price",
            self.order_type,
            self.order_type.requires_limit(),
            self.limit_price,
        )?;
        check_price_field(
            "stop price",
            self.order_type,
            self.order_type.requires_stop(),
            self.stop_price,
        )?;
        Ok(())
    }
}

fn check_price_field(
    field: &str,
    order_type: OrderType,
    required: bool,
    value: Option<f64>,
) -> Result<(), OrderError> {
    match (required, value) {
        (true, None) => Err(OrderError::MalformedOrder(format!(
            "{order_type} order requires a {field}"
        ))),
        (false, Some(_)) => Err(OrderError::MalformedOrder(format!(
            "{order_type} order must not carry a {field}"
        ))),
        (true, Some(p)) if !p.is_finite() || p <= 0.0 => Err(OrderError::MalformedOrder(
            format!("{field} must be positive, got {p}"),
        )),
        _ => Ok(()),
    }
}

/// A validated order and its fill state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub purpose: OrderPurpose,
    pub oco_group: Option<OcoGroupId>,

    pub status: OrderStatus,
    pub filled_quantity: f64,
    /// Quantity-weighted average over every fill, slippage included.
    pub avg_fill_price: Option<f64>,
    pub commission: f64,
    /// Dollar slippage: `|fill - quoted| * qty` summed over fills.
    pub slippage: f64,
    /// Set once a STOP_LIMIT's stop leg has crossed.
    pub triggered: bool,
    /// Why the order was cancelled or rejected.
    pub reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Validate `request` and build a PENDING order.
    pub fn from_request(
        id: OrderId,
        request: OrderRequest,
        created_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        request.validate()?;
        Ok(Self {
            id,
            symbol: request.symbol,
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            purpose: request.purpose,
            oco_group: None,
            status: OrderStatus::Pending,
            filled_quantity: 0.0,
            avg_fill_price: None,
            commission: 0.0,
            slippage: 0.0,
            triggered: false,
            reason: None,
            created_at,
            updated_at: created_at,
            filled_at: None,
        })
    }

    pub fn remaining_quantity(&self) -> f64 {
        (self.quantity - self.filled_quantity).max(0.0)
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Signed quantity this order adds to a position when fully filled.
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity
    }

    /// Move to `next`, refusing edges that are not in the lifecycle graph.
    pub(crate) fn transition(
        &mut self,
        next: OrderStatus,
        at: DateTime<Utc>,
        action: &'static str,
    ) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidState {
                id: self.id,
                status: self.status,
                action,
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    /// Fold one execution into the fill fields.
    pub(crate) fn record_execution(
        &mut self,
        quantity: f64,
        price: f64,
        commission: f64,
        slippage: f64,
        at: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        let prior = self.filled_quantity;
        let total = prior + quantity;
        let next = if total >= self.quantity - 1e-9 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.transition(next, at, "fill")?;

        let prior_avg = self.avg_fill_price.unwrap_or(0.0);
        self.avg_fill_price = Some((prior_avg * prior + price * quantity) / total);
        self.filled_quantity = total.min(self.quantity);
        self.commission += commission;
        self.slippage += slippage;
        if next == OrderStatus::Filled {
            self.filled_at = Some(at);
        }
        Ok(())
    }
}

/// Build an already-REJECTED order for the audit log.
///
/// Used when the risk gate refuses a request: the order never enters the
/// book, but its terminal state is still reported.
pub fn rejected_order(
    id: OrderId,
    request: OrderRequest,
    at: DateTime<Utc>,
    reason: impl Into<String>,
) -> Result<Order, OrderError> {
    let mut order = Order::from_request(id, request, at)?;
    order.transition(OrderStatus::Rejected, at, "reject")?;
    order.reason = Some(reason.into());
    Ok(order)
}
