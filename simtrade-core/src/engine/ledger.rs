//! Portfolio ledger — applies fills to cash and positions and keeps the
//! trade log.
//!
//! Accounting conventions:
//! - Cash moves by `-signed_qty * fill_price - commission` on every fill.
//! - Ledger realized P&L is gross closing P&L minus every commission charged
//!   so far, so that
//!   `cash + Σ qty * mark == initial + realized + unrealized` always holds.
//! - A fill that crosses zero is split into a closing part (which realizes
//!   P&L and appends a `Trade`) and an opening part in the other direction.
//!   Costs are split between the two in proportion to quantity.
//! - Average entry price moves only on opening or adding fills.
//!
//! The ledger does not refuse fills for lack of cash; the risk gate's
//! exposure limit bounds leverage before orders are accepted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{
    ExitReason, Fill, IdGen, Order, OrderPurpose, PortfolioSnapshot, Position, PositionView,
    Trade,
};
use crate::engine::trade_stats::TradeStatistics;

const QTY_EPSILON: f64 = 1e-9;

/// What a single fill did to its position.
#[derive(Debug, Clone, PartialEq)]
pub struct FillEffect {
    pub position_before: f64,
    pub position_after: f64,
    /// Present when some quantity was closed.
    pub closed_trade: Option<Trade>,
}

impl FillEffect {
    /// True when the fill left the symbol flat.
    pub fn closed_position(&self) -> bool {
        self.position_before.abs() > QTY_EPSILON && self.position_after.abs() <= QTY_EPSILON
    }

    /// True when the fill increased absolute exposure (open, add, or flip).
    pub fn increased_exposure(&self) -> bool {
        self.position_after.abs() > self.position_before.abs() + QTY_EPSILON
            || self.position_before * self.position_after < 0.0
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    initial_capital: f64,
    cash: f64,
    positions: BTreeMap<String, Position>,
    /// Latest mark per symbol, kept after a position closes.
    marks: BTreeMap<String, f64>,
    trades: Vec<Trade>,
    order_log: Vec<Order>,
    gross_realized: f64,
    total_commission: f64,
    total_slippage: f64,
    ids: IdGen,
}

impl Ledger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: BTreeMap::new(),
            marks: BTreeMap::new(),
            trades: Vec::new(),
            order_log: Vec::new(),
            gross_realized: 0.0,
            total_commission: 0.0,
            total_slippage: 0.0,
            ids: IdGen::new(),
        }
    }

    // ── Mutation ───────────────────────────────────────────────────────

    /// Update the mark used for unrealized P&L. Cash and realized P&L are
    /// unaffected.
    pub fn mark(&mut self, symbol: &str, price: f64) {
        self.marks.insert(symbol.to_string(), price);
        if let Some(pos) = self.positions.get_mut(symbol) {
            pos.mark_price = price;
        }
    }

    /// Apply one execution atomically.
    pub fn apply_fill(&mut self, fill: &Fill) -> FillEffect {
        let signed = fill.signed_quantity();
        self.cash -= signed * fill.price + fill.commission;
        self.total_commission += fill.commission;
        self.total_slippage += fill.slippage;

        let before = self.position_quantity(&fill.symbol);
        let mark = self.marks.get(&fill.symbol).copied().unwrap_or(fill.price);

        let closed_trade = if before.abs() <= QTY_EPSILON || before.signum() == signed.signum() {
            self.open_or_add(fill, mark);
            None
        } else {
            self.close_then_open(fill, mark)
        };

        let after = self.position_quantity(&fill.symbol);
        FillEffect {
            position_before: before,
            position_after: after,
            closed_trade,
        }
    }

    /// Append a terminal order to the audit log.
    pub fn archive(&mut self, order: Order) {
        debug_assert!(order.status.is_terminal(), "only terminal orders are archived");
        self.order_log.push(order);
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position_quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.quantity)
    }

    pub fn last_mark(&self, symbol: &str) -> Option<f64> {
        self.marks.get(symbol).copied()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn order_log(&self) -> &[Order] {
        &self.order_log
    }

    /// Signed mark-to-market value of all positions.
    pub fn positions_value(&self) -> f64 {
        self.positions.values().map(Position::market_value).sum()
    }

    pub fn total_value(&self) -> f64 {
        self.cash + self.positions_value()
    }

    /// Gross closing P&L net of all commissions.
    pub fn realized_pnl(&self) -> f64 {
        self.gross_realized - self.total_commission
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.values().map(Position::unrealized_pnl).sum()
    }

    /// `(cash + positions) - (initial + realized + unrealized)`. Zero up to
    /// floating-point error.
    pub fn accounting_residual(&self) -> f64 {
        self.total_value() - (self.initial_capital + self.realized_pnl() + self.unrealized_pnl())
    }

    pub fn snapshot(&self, timestamp: DateTime<Utc>) -> PortfolioSnapshot {
        let positions: Vec<PositionView> = self
            .positions
            .values()
            .map(|p| PositionView {
                symbol: p.symbol.clone(),
                quantity: p.quantity,
                avg_entry_price: p.avg_entry_price,
                mark_price: p.mark_price,
                unrealized_pnl: p.unrealized_pnl(),
                notional: p.notional(),
            })
            .collect();
        let positions_value = self.positions_value();
        PortfolioSnapshot {
            timestamp,
            cash: self.cash,
            positions_value,
            total_value: self.cash + positions_value,
            realized_pnl: self.realized_pnl(),
            unrealized_pnl: self.unrealized_pnl(),
            gross_exposure: positions.iter().map(|p| p.notional).sum(),
            total_commission: self.total_commission,
            total_slippage: self.total_slippage,
            positions,
        }
    }

    /// Consume the ledger, returning the trade log and the order log.
    pub fn into_records(self) -> (Vec<Trade>, Vec<Order>) {
        (self.trades, self.order_log)
    }

    pub fn statistics(&self) -> LedgerStatistics {
        let total_value = self.total_value();
        LedgerStatistics {
            trades: TradeStatistics::from_trades(&self.trades),
            total_commission: self.total_commission,
            total_slippage: self.total_slippage,
            total_return_pct: (total_value / self.initial_capital - 1.0) * 100.0,
        }
    }

    // ── Internal ───────────────────────────────────────────────────────

    fn open_or_add(&mut self, fill: &Fill, mark: f64) {
        let signed = fill.signed_quantity();
        match self.positions.get_mut(&fill.symbol) {
            Some(pos) => {
                let held = pos.quantity.abs();
                pos.avg_entry_price =
                    (pos.avg_entry_price * held + fill.price * fill.quantity) / (held + fill.quantity);
                pos.quantity += signed;
                pos.entry_commission += fill.commission;
                pos.entry_slippage += fill.slippage;
            }
            None => {
                self.positions.insert(
                    fill.symbol.clone(),
                    Position {
                        symbol: fill.symbol.clone(),
                        quantity: signed,
                        avg_entry_price: fill.price,
                        mark_price: mark,
                        opened_at: fill.timestamp,
                        entry_commission: fill.commission,
                        entry_slippage: fill.slippage,
                    },
                );
            }
        }
    }

    fn close_then_open(&mut self, fill: &Fill, mark: f64) -> Option<Trade> {
        let mut pos = self.positions.remove(&fill.symbol)?;
        let close_qty = fill.quantity.min(pos.quantity.abs());
        let open_qty = fill.quantity - close_qty;
        let close_share = close_qty / fill.quantity;
        let close_commission = fill.commission * close_share;
        let close_slippage = fill.slippage * close_share;
        let trade_id = self.ids.next_trade_id();

        let direction = pos.side();
        let entry_share = close_qty / pos.quantity.abs();
        let entry_commission = pos.entry_commission * entry_share;
        let entry_slippage = pos.entry_slippage * entry_share;
        pos.entry_commission -= entry_commission;
        pos.entry_slippage -= entry_slippage;

        let gross = (fill.price - pos.avg_entry_price) * close_qty * direction.sign();
        let realized = gross - close_commission;
        let cost_basis = pos.avg_entry_price * close_qty;

        let exit_reason = match fill.purpose {
            OrderPurpose::StopLoss => ExitReason::StopLoss,
            OrderPurpose::TakeProfit => ExitReason::TakeProfit,
            _ if open_qty > QTY_EPSILON => ExitReason::Reversal,
            _ => ExitReason::Signal,
        };

        let trade = Trade {
            id: trade_id,
            symbol: fill.symbol.clone(),
            side: direction,
            quantity: close_qty,
            entry_price: pos.avg_entry_price,
            entry_time: pos.opened_at,
            exit_price: fill.price,
            exit_time: fill.timestamp,
            realized_pnl: realized,
            realized_pnl_pct: if cost_basis > 0.0 {
                realized / cost_basis * 100.0
            } else {
                0.0
            },
            commission: entry_commission + close_commission,
            slippage: entry_slippage + close_slippage,
            holding_secs: (fill.timestamp - pos.opened_at).num_seconds(),
            exit_reason,
        };

        pos.quantity -= direction.sign() * close_qty;
        if pos.quantity.abs() > QTY_EPSILON {
            self.positions.insert(fill.symbol.clone(), pos);
        }
        self.gross_realized += gross;

        info!(
            trade_id = %trade.id,
            symbol = %trade.symbol,
            quantity = trade.quantity,
            entry = trade.entry_price,
            exit = trade.exit_price,
            pnl = trade.realized_pnl,
            reason = ?trade.exit_reason,
            "trade closed"
        );

        if open_qty > QTY_EPSILON {
            self.positions.insert(
                fill.symbol.clone(),
                Position {
                    symbol: fill.symbol.clone(),
                    quantity: fill.side.sign() * open_qty,
                    avg_entry_price: fill.price,
                    mark_price: mark,
                    opened_at: fill.timestamp,
                    entry_commission: fill.commission - close_commission,
                    entry_slippage: fill.slippage - close_slippage,
                },
            );
        }

        self.trades.push(trade.clone());
        Some(trade)
    }
}

/// Ledger-level summary: trade statistics plus cost and return totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStatistics {
    pub trades: TradeStatistics,
    pub total_commission: f64,
    pub total_slippage: f64,
    pub total_return_pct: f64,
}
