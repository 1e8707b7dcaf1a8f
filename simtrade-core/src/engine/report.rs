//! Run output: the rejection record and the final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Order, OrderId, PortfolioSnapshot, Trade};
use crate::engine::ledger::LedgerStatistics;
use crate::engine::order_manager::OrderStatistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    /// Refused by the risk gate; the order is in the audit log as REJECTED.
    Risk,
    /// Failed validation; it never became an order.
    Malformed,
}

/// One intent the session refused, with the reason reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub order_id: Option<OrderId>,
    pub kind: RejectionKind,
    pub reason: String,
}

/// Everything a session produced.
///
/// When `complete` is false the run stopped early on corrupt input; `abort`
/// says why and every other field covers the ticks processed before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub strategy: String,
    pub config_fingerprint: String,
    pub initial_capital: f64,
    pub ticks_processed: usize,
    pub equity_curve: Vec<PortfolioSnapshot>,
    pub trades: Vec<Trade>,
    /// Terminal state of every order, in id order.
    pub orders: Vec<Order>,
    pub rejections: Vec<Rejection>,
    pub statistics: LedgerStatistics,
    pub order_statistics: OrderStatistics,
    pub complete: bool,
    pub abort: Option<String>,
}

impl RunReport {
    pub fn final_snapshot(&self) -> Option<&PortfolioSnapshot> {
        self.equity_curve.last()
    }

    /// Total value after the last tick, or the initial capital if none ran.
    pub fn final_equity(&self) -> f64 {
        self.final_snapshot()
            .map_or(self.initial_capital, |s| s.total_value)
    }

    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|s| s.total_value).collect()
    }
}
