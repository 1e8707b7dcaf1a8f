//! Risk gate — accepts or rejects a candidate order before it reaches the
//! order manager.
//!
//! Rules run in order and the first failure wins:
//! 1. position size: `|resulting qty| * ref price <= max_position_size_pct * value`
//! 2. total exposure: gross exposure including the candidate `<= max_total_exposure_pct * value`
//! 3. drawdown breaker: `drawdown < max_drawdown_pct`
//! 4. daily loss breaker: `daily_pnl > -max_daily_loss_pct * start-of-day equity`
//!
//! Every rule applies to opening orders only. An order that reduces the
//! absolute position is always accepted, so a breached limit never traps
//! the trader in a position.
//!
//! Rules 1 and 2 count live entry orders as if they had already filled
//! (see [`PendingOrders`]), so several orders in flight cannot each pass
//! on their own and breach a limit together.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RiskConfig;
use crate::domain::{Order, OrderPurpose, OrderRequest, OrderType, PortfolioSnapshot};

use super::state::RiskState;

const QTY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum RiskViolation {
    #[error("position size exceeds limit: {symbol} notional {notional:.2} > {limit:.2}")]
    PositionSizeExceeded {
        symbol: String,
        notional: f64,
        limit: f64,
    },

    #[error("total exposure exceeds limit: {exposure:.2} > {limit:.2}")]
    TotalExposureExceeded { exposure: f64, limit: f64 },

    #[error("drawdown limit breached: {drawdown:.4} >= {limit:.4}")]
    DrawdownLimit { drawdown: f64, limit: f64 },

    #[error("daily loss limit breached: {daily_pnl:.2} <= -{limit:.2}")]
    DailyLossLimit { daily_pnl: f64, limit: f64 },
}

/// Unfilled entry orders, netted per symbol.
///
/// Exit and bracket orders are left out: they can only shrink a position
/// and may never fill.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingOrders {
    by_symbol: BTreeMap<String, PendingSymbol>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PendingSymbol {
    /// Signed remaining quantity.
    quantity: f64,
    /// Signed remaining quantity valued at each order's reference price.
    notional: f64,
}

impl PendingOrders {
    /// Net the live entry orders in `orders`. `mark` prices MARKET orders,
    /// which carry no price of their own.
    pub fn collect<'a>(
        orders: impl IntoIterator<Item = &'a Order>,
        mark: impl Fn(&str) -> Option<f64>,
    ) -> Self {
        let mut pending = Self::default();
        for order in orders {
            if !order.is_live() || order.purpose != OrderPurpose::Entry {
                continue;
            }
            let price = match order.order_type {
                OrderType::Limit | OrderType::StopLimit => order.limit_price,
                OrderType::Stop => order.stop_price,
                OrderType::Market => None,
            }
            .or_else(|| mark(&order.symbol));
            let Some(price) = price else { continue };

            let signed = order.side.sign() * order.remaining_quantity();
            let entry = pending.by_symbol.entry(order.symbol.clone()).or_default();
            entry.quantity += signed;
            entry.notional += signed * price;
        }
        pending
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Signed quantity still to fill for `symbol`.
    pub fn quantity(&self, symbol: &str) -> f64 {
        self.by_symbol.get(symbol).map_or(0.0, |p| p.quantity)
    }

    /// Gross exposure of every symbol except `symbol`, with pending entry
    /// orders folded into the positions they would extend.
    fn exposure_excluding(&self, snapshot: &PortfolioSnapshot, symbol: &str) -> f64 {
        let held: f64 = snapshot
            .positions
            .iter()
            .filter(|p| p.symbol != symbol)
            .map(|p| {
                let pending = self.by_symbol.get(&p.symbol).map_or(0.0, |o| o.notional);
                (p.quantity * p.mark_price + pending).abs()
            })
            .sum();
        let unheld: f64 = self
            .by_symbol
            .iter()
            .filter(|(s, _)| s.as_str() != symbol && snapshot.position(s).is_none())
            .map(|(_, o)| o.notional.abs())
            .sum();
        held + unheld
    }
}

#[derive(Debug, Clone)]
pub struct RiskGate {
    config: RiskConfig,
}

impl RiskGate {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Price used to value the candidate: the limit for LIMIT/STOP_LIMIT,
    /// the stop for STOP, the current market price for MARKET.
    pub fn reference_price(order: &OrderRequest, market_price: f64) -> f64 {
        match order.order_type {
            OrderType::Limit | OrderType::StopLimit => order.limit_price.unwrap_or(market_price),
            OrderType::Stop => order.stop_price.unwrap_or(market_price),
            OrderType::Market => market_price,
        }
    }

    /// True when filling `order` would increase the absolute position
    /// (including a flip through zero).
    pub fn is_opening(order: &OrderRequest, current_qty: f64) -> bool {
        let resulting = current_qty + order.side.sign() * order.quantity;
        resulting.abs() > current_qty.abs() + QTY_EPSILON || current_qty * resulting < 0.0
    }

    /// Evaluate the four rules against `snapshot` and `state`.
    ///
    /// `market_price` is the latest price of the order's symbol, used when
    /// the order is a MARKET order or the symbol is not yet held.
    pub fn check(
        &self,
        order: &OrderRequest,
        snapshot: &PortfolioSnapshot,
        state: &RiskState,
        market_price: f64,
    ) -> Result<(), RiskViolation> {
        self.check_with_pending(order, snapshot, state, market_price, &PendingOrders::default())
    }

    /// [`check`](Self::check), with `pending` entry orders projected onto
    /// the position and exposure limits.
    pub fn check_with_pending(
        &self,
        order: &OrderRequest,
        snapshot: &PortfolioSnapshot,
        state: &RiskState,
        market_price: f64,
        pending: &PendingOrders,
    ) -> Result<(), RiskViolation> {
        if !self.config.enabled {
            return Ok(());
        }

        let current_qty = snapshot.position_quantity(&order.symbol);
        if !Self::is_opening(order, current_qty) {
            return Ok(());
        }

        let portfolio_value = snapshot.total_value;
        let price = Self::reference_price(order, market_price);
        let resulting_qty =
            current_qty + pending.quantity(&order.symbol) + order.side.sign() * order.quantity;

        // 1. Position size
        let notional = resulting_qty.abs() * price;
        let size_limit = self.config.max_position_size_pct * portfolio_value;
        if notional > size_limit + 1e-9 {
            return Err(RiskViolation::PositionSizeExceeded {
                symbol: order.symbol.clone(),
                notional,
                limit: size_limit,
            });
        }

        // 2. Total exposure, with this symbol re-valued at the candidate's price
        let exposure = pending.exposure_excluding(snapshot, &order.symbol) + notional;
        let exposure_limit = self.config.max_total_exposure_pct * portfolio_value;
        if exposure > exposure_limit + 1e-9 {
            return Err(RiskViolation::TotalExposureExceeded {
                exposure,
                limit: exposure_limit,
            });
        }

        // 3. Drawdown breaker
        if state.drawdown >= self.config.max_drawdown_pct {
            return Err(RiskViolation::DrawdownLimit {
                drawdown: state.drawdown,
                limit: self.config.max_drawdown_pct,
            });
        }

        // 4. Daily loss breaker
        let daily_limit = self.config.max_daily_loss_pct * state.day_start_equity;
        if state.daily_pnl <= -daily_limit {
            return Err(RiskViolation::DailyLossLimit {
                daily_pnl: state.daily_pnl,
                limit: daily_limit,
            });
        }

        Ok(())
    }
}
