//! Identifier newtypes and the per-session id generator.
//!
//! Ids are sequential rather than random so that replaying the same tick
//! stream twice yields byte-identical order and trade logs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order identifier, rendered as `ORD-000042`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORD-{:06}", self.0)
    }
}

/// Closed-trade identifier, rendered as `TRD-000007`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TradeId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TRD-{:06}", self.0)
    }
}

/// One-cancels-other group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OcoGroupId(pub u64);

impl fmt::Display for OcoGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OCO-{}", self.0)
    }
}

/// Monotonic id source. Every counter starts at 1.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next_order: u64,
    next_trade: u64,
    next_oco: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_order_id(&mut self) -> OrderId {
        self.next_order += 1;
        OrderId(self.next_order)
    }

    /// The id `next_order_id` will hand out, without consuming it.
    pub fn peek_order_id(&self) -> OrderId {
        OrderId(self.next_order + 1)
    }

    pub fn next_trade_id(&mut self) -> TradeId {
        self.next_trade += 1;
        TradeId(self.next_trade)
    }

    pub fn next_oco_id(&mut self) -> OcoGroupId {
        self.next_oco += 1;
        OcoGroupId(self.next_oco)
    }
}
