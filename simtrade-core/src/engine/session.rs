//! Replay session — the per-tick state machine shared by backtests and
//! paper trading.
//!
//! For every tick, in order:
//! 1. roll the trading day if the calendar date changed
//! 2. mark the ledger and refresh risk state
//! 3. ask the strategy for intents; size, risk-check and submit them
//! 4. evaluate live orders against the tick; exits and bracket legs are
//!    reduce-only, so they never close more than the position holds
//! 5. apply fills to the ledger and rebuild protective brackets
//! 6. record a portfolio snapshot
//!
//! A backtest pulls ticks with [`Session::run`]; a live feed pushes them
//! with [`Session::on_tick`]. Both end with [`Session::finish`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::SimConfig;
use crate::domain::{rejected_order, PortfolioSnapshot, Tick, TickError};
use crate::engine::bracket::{bracket_legs, is_bracket_leg};
use crate::engine::ledger::Ledger;
use crate::engine::order_manager::OrderManager;
use crate::engine::report::{Rejection, RejectionKind, RunReport};
use crate::risk::{PendingOrders, RiskGate, RiskState};
use crate::strategy::{OrderIntent, Strategy};

/// Fatal input errors. Either one ends the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplayError {
    #[error("out-of-order tick for {symbol}: {received} is not after {previous}")]
    OutOfOrderTick {
        symbol: String,
        previous: DateTime<Utc>,
        received: DateTime<Utc>,
    },

    #[error("invalid tick: {0}")]
    InvalidTick(#[from] TickError),
}

pub struct Session {
    config: SimConfig,
    strategy: Box<dyn Strategy>,
    orders: OrderManager,
    ledger: Ledger,
    gate: RiskGate,
    risk: RiskState,
    equity_curve: Vec<PortfolioSnapshot>,
    rejections: Vec<Rejection>,
    /// Last accepted timestamp per symbol.
    last_seen: BTreeMap<String, DateTime<Utc>>,
    last_timestamp: Option<DateTime<Utc>>,
    ticks_processed: usize,
    abort: Option<ReplayError>,
}

impl Session {
    pub fn new(config: SimConfig, strategy: Box<dyn Strategy>) -> Self {
        info!(
            strategy = strategy.name(),
            initial_capital = config.initial_capital,
            fingerprint = %config.fingerprint(),
            "session created"
        );
        Self {
            orders: OrderManager::from_config(&config.execution),
            ledger: Ledger::new(config.initial_capital),
            gate: RiskGate::new(config.risk.clone()),
            risk: RiskState::new(config.initial_capital),
            strategy,
            config,
            equity_curve: Vec::new(),
            rejections: Vec::new(),
            last_seen: BTreeMap::new(),
            last_timestamp: None,
            ticks_processed: 0,
            abort: None,
        }
    }

    // ── Driving ────────────────────────────────────────────────────────

    /// Process one tick. After the first fatal error every later call
    /// returns that same error and changes nothing.
    pub fn on_tick(&mut self, tick: &Tick) -> Result<(), ReplayError> {
        if let Some(err) = &self.abort {
            return Err(err.clone());
        }
        if let Err(err) = self.check_sequence(tick) {
            warn!(error = %err, ticks = self.ticks_processed, "replay aborted");
            self.abort = Some(err.clone());
            return Err(err);
        }
        self.step(tick);
        Ok(())
    }

    /// Replay a whole stream and return the report. Stops at the first
    /// fatal input error; the report is then marked incomplete.
    pub fn run<I>(mut self, ticks: I) -> RunReport
    where
        I: IntoIterator<Item = Tick>,
    {
        for tick in ticks {
            if self.on_tick(&tick).is_err() {
                break;
            }
        }
        self.finish()
    }

    /// Cancel whatever is still live and assemble the report.
    pub fn finish(mut self) -> RunReport {
        if let Some(at) = self.last_timestamp {
            for order in self.orders.cancel_all(at, "session finished") {
                self.ledger.archive(order);
            }
        }

        let strategy = self.strategy.name().to_string();
        let statistics = self.ledger.statistics();
        let order_statistics = self.orders.statistics().clone();
        let (trades, mut orders) = self.ledger.into_records();
        orders.sort_by_key(|o| o.id);

        info!(
            strategy = %strategy,
            ticks = self.ticks_processed,
            trades = trades.len(),
            rejections = self.rejections.len(),
            complete = self.abort.is_none(),
            "session finished"
        );

        RunReport {
            strategy,
            config_fingerprint: self.config.fingerprint(),
            initial_capital: self.config.initial_capital,
            ticks_processed: self.ticks_processed,
            equity_curve: self.equity_curve,
            trades,
            orders,
            rejections: self.rejections,
            statistics,
            order_statistics,
            complete: self.abort.is_none(),
            abort: self.abort.map(|e| e.to_string()),
        }
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn order_manager(&self) -> &OrderManager {
        &self.orders
    }

    pub fn risk_state(&self) -> &RiskState {
        &self.risk
    }

    pub fn equity_curve(&self) -> &[PortfolioSnapshot] {
        &self.equity_curve
    }

    pub fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    pub fn ticks_processed(&self) -> usize {
        self.ticks_processed
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_some()
    }

    // ── Internal ───────────────────────────────────────────────────────

    fn check_sequence(&mut self, tick: &Tick) -> Result<(), ReplayError> {
        tick.validate()?;
        if let Some(previous) = self.last_seen.get(&tick.symbol) {
            if tick.timestamp <= *previous {
                return Err(ReplayError::OutOfOrderTick {
                    symbol: tick.symbol.clone(),
                    previous: *previous,
                    received: tick.timestamp,
                });
            }
        }
        self.last_seen.insert(tick.symbol.clone(), tick.timestamp);
        Ok(())
    }

    fn step(&mut self, tick: &Tick) {
        let at = tick.timestamp;

        let date = at.date_naive();
        if self.risk.roll_day(date) {
            debug!(%date, start_equity = self.risk.day_start_equity, "new trading day");
        }

        self.ledger.mark(&tick.symbol, tick.price);
        let marked = self.ledger.snapshot(at);
        self.risk.update(marked.total_value);

        let intents = self.strategy.produce_orders(tick, &marked);
        for intent in intents {
            self.submit_intent(intent, tick, &marked);
        }

        let position = self.ledger.position_quantity(&tick.symbol);
        let outcome = self.orders.process_tick_with_position(tick, position);
        for fill in &outcome.fills {
            let effect = self.ledger.apply_fill(fill);
            if effect.closed_trade.is_some() {
                self.risk.record_trade();
            }
        }
        for order in outcome.closed {
            self.ledger.archive(order);
        }
        if !outcome.fills.is_empty() {
            self.sync_brackets(&tick.symbol, at);
        }

        let snapshot = self.ledger.snapshot(at);
        self.risk.update(snapshot.total_value);
        debug_assert!(
            self.ledger.accounting_residual().abs() <= 1e-6 * self.ledger.initial_capital(),
            "accounting identity violated: residual {}",
            self.ledger.accounting_residual()
        );
        trace!(
            symbol = %tick.symbol,
            price = tick.price,
            equity = snapshot.total_value,
            drawdown = self.risk.drawdown,
            "tick processed"
        );

        self.equity_curve.push(snapshot);
        self.ticks_processed += 1;
        self.last_timestamp = Some(at);
    }

    fn submit_intent(&mut self, intent: OrderIntent, tick: &Tick, snapshot: &PortfolioSnapshot) {
        let at = tick.timestamp;
        let market_price = if intent.symbol == tick.symbol {
            Some(tick.price)
        } else {
            self.ledger.last_mark(&intent.symbol)
        };
        let Some(market_price) = market_price else {
            let reason = format!("no price seen yet for {}", intent.symbol);
            self.reject_malformed(at, &intent.symbol, reason);
            return;
        };

        let current = self.ledger.position_quantity(&intent.symbol);
        let request = match intent.resolve(current, market_price, snapshot.total_value, &self.gate) {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(err) => {
                self.reject_malformed(at, &intent.symbol, err.to_string());
                return;
            }
        };
        if let Err(err) = request.validate() {
            self.reject_malformed(at, &intent.symbol, err.to_string());
            return;
        }

        // Entry orders still in the book, including ones accepted earlier
        // this tick, count as filled for the size and exposure limits.
        let pending =
            PendingOrders::collect(self.orders.live_orders(), |symbol| self.ledger.last_mark(symbol));
        let checked = self
            .gate
            .check_with_pending(&request, snapshot, &self.risk, market_price, &pending);
        if let Err(violation) = checked {
            let id = self.orders.reserve_id();
            let reason = violation.to_string();
            warn!(order_id = %id, symbol = %request.symbol, %reason, "order rejected by risk gate");
            self.rejections.push(Rejection {
                timestamp: at,
                symbol: request.symbol.clone(),
                order_id: Some(id),
                kind: RejectionKind::Risk,
                reason: reason.clone(),
            });
            match rejected_order(id, request, at, reason) {
                Ok(order) => self.ledger.archive(order),
                Err(err) => debug!(order_id = %id, error = %err, "rejected order not archived"),
            }
            return;
        }

        let symbol = request.symbol.clone();
        if let Err(err) = self.orders.submit(request, at) {
            self.reject_malformed(at, &symbol, err.to_string());
        }
    }

    fn reject_malformed(&mut self, at: DateTime<Utc>, symbol: &str, reason: String) {
        warn!(%symbol, %reason, "malformed order intent");
        self.rejections.push(Rejection {
            timestamp: at,
            symbol: symbol.to_string(),
            order_id: None,
            kind: RejectionKind::Malformed,
            reason,
        });
    }

    fn cancel_brackets(&mut self, symbol: &str, at: DateTime<Utc>, reason: &str) {
        for order in self.orders.cancel_where(symbol, at, reason, is_bracket_leg) {
            self.ledger.archive(order);
        }
    }

    /// Make the live bracket match the position after a fill: rebuilt at
    /// the new size and average entry, or removed when flat. Exit orders
    /// left over from a closed position go with it.
    fn sync_brackets(&mut self, symbol: &str, at: DateTime<Utc>) {
        let Some(position) = self.ledger.position(symbol).cloned() else {
            let closed = self.orders.cancel_where(symbol, at, "position closed", |o| {
                o.purpose.is_reduce_only()
            });
            for order in closed {
                self.ledger.archive(order);
            }
            return;
        };
        self.cancel_brackets(symbol, at, "bracket resized");

        let legs = bracket_legs(&self.gate, &self.config.brackets, &position);
        if legs.is_empty() {
            return;
        }
        match self.orders.submit_oco(legs, at) {
            Ok((group, ids)) => info!(
                %symbol,
                group = %group,
                legs = ids.len(),
                quantity = position.quantity,
                entry = position.avg_entry_price,
                "bracket placed"
            ),
            Err(err) => warn!(%symbol, error = %err, "bracket not placed"),
        }
    }
}
