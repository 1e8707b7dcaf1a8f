//! Order manager — lifecycle state machine for live orders.
//!
//! The manager owns every live order (PENDING or PARTIALLY_FILLED). It
//! evaluates them against each tick, produces `Fill` events and enforces
//! OCO groups. Orders that become terminal are handed back to the caller
//! by value and leave the manager. Only their final status is kept, so a
//! late cancel can be answered with `InvalidState`.
//!
//! The manager never touches cash or positions; fills are applied by the
//! ledger.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ExecutionConfig;
use crate::domain::{
    Fill, IdGen, OcoGroupId, Order, OrderError, OrderId, OrderRequest, OrderStatus, Tick,
};
use crate::engine::execution::{
    check_trigger, compute_fill, CostModel, ParticipationLimit, TriggerResult,
};

/// Quantities below this are treated as zero.
const QTY_EPSILON: f64 = 1e-9;

/// Counters over the manager's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderStatistics {
    pub submitted: usize,
    pub filled: usize,
    pub cancelled: usize,
    pub fills: usize,
    pub total_commission: f64,
    pub total_slippage: f64,
}

/// Everything one `process_tick` call produced.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Executions in evaluation order (ascending order id).
    pub fills: Vec<Fill>,
    /// Orders that reached a terminal state during this tick.
    pub closed: Vec<Order>,
}

pub struct OrderManager {
    live: BTreeMap<OrderId, Order>,
    /// Final status of every order that has left the book.
    terminal: BTreeMap<OrderId, OrderStatus>,
    ids: IdGen,
    cost_model: CostModel,
    participation: Option<ParticipationLimit>,
    stats: OrderStatistics,
}

impl OrderManager {
    pub fn new(cost_model: CostModel, participation: Option<ParticipationLimit>) -> Self {
        Self {
            live: BTreeMap::new(),
            terminal: BTreeMap::new(),
            ids: IdGen::new(),
            cost_model,
            participation,
            stats: OrderStatistics::default(),
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(
            CostModel::from_config(config),
            config.max_participation.map(ParticipationLimit::new),
        )
    }

    // ── Public API ─────────────────────────────────────────────────────

    /// Validate and queue an order. Nothing fills here; a MARKET order
    /// fills on the next `process_tick` for its symbol.
    pub fn submit(&mut self, request: OrderRequest, at: DateTime<Utc>) -> Result<OrderId, OrderError> {
        let order = Order::from_request(self.ids.peek_order_id(), request, at)?;
        let id = self.ids.next_order_id();
        debug!(
            order_id = %id,
            symbol = %order.symbol,
            side = %order.side,
            order_type = %order.order_type,
            quantity = order.quantity,
            "order submitted"
        );
        self.live.insert(id, order);
        self.stats.submitted += 1;
        Ok(id)
    }

    /// Submit several orders as one OCO group. Either all are queued or,
    /// if any request is malformed, none are.
    pub fn submit_oco(
        &mut self,
        requests: Vec<OrderRequest>,
        at: DateTime<Utc>,
    ) -> Result<(OcoGroupId, Vec<OrderId>), OrderError> {
        for request in &requests {
            request.validate()?;
        }
        let group = self.ids.next_oco_id();
        let mut ids = Vec::with_capacity(requests.len());
        for request in requests {
            let id = self.submit(request, at)?;
            if let Some(order) = self.live.get_mut(&id) {
                order.oco_group = Some(group);
            }
            ids.push(id);
        }
        Ok((group, ids))
    }

    /// Reserve an id for an order that will never enter the book
    /// (e.g. one refused by the risk gate), keeping ids unique per session.
    pub fn reserve_id(&mut self) -> OrderId {
        self.ids.next_order_id()
    }

    /// Evaluate every live order for `tick.symbol` against `tick.price`.
    pub fn process_tick(&mut self, tick: &Tick) -> TickOutcome {
        self.evaluate(tick, None)
    }

    /// Like [`process_tick`](Self::process_tick), for a book whose symbol
    /// currently holds `position` (signed).
    ///
    /// Reduce-only orders (exits and bracket legs) fill at most what is
    /// left of the position after earlier fills in the same tick, and not
    /// at all once it is flat or on their own side. Entry orders are
    /// evaluated before reduce-only ones, each group in ascending id.
    pub fn process_tick_with_position(&mut self, tick: &Tick, position: f64) -> TickOutcome {
        self.evaluate(tick, Some(position))
    }

    fn evaluate(&mut self, tick: &Tick, position: Option<f64>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let mut candidates: Vec<(bool, OrderId)> = self
            .live
            .values()
            .filter(|o| o.symbol == tick.symbol)
            .map(|o| (position.is_some() && o.purpose.is_reduce_only(), o.id))
            .collect();
        candidates.sort();
        let mut running = position.unwrap_or(0.0);

        for (reduce_only, id) in candidates {
            // An OCO sibling filled earlier in this tick may have removed it.
            let Some(order) = self.live.get_mut(&id) else {
                continue;
            };

            let (quoted, limit) = match check_trigger(order, tick.price) {
                TriggerResult::NoTrigger => continue,
                TriggerResult::StopTriggeredLimitPending => {
                    if !order.triggered {
                        order.triggered = true;
                        order.updated_at = tick.timestamp;
                        debug!(order_id = %id, price = tick.price, "stop-limit armed");
                    }
                    continue;
                }
                TriggerResult::Fill { quoted, limit } => (quoted, limit),
            };

            let mut desired = order.remaining_quantity();
            if reduce_only {
                let closable = if running * order.side.sign() < 0.0 {
                    running.abs()
                } else {
                    0.0
                };
                desired = desired.min(closable);
            }
            let (quantity, _) = match self.participation {
                Some(limit) => limit.constrain(desired, tick.volume),
                None => (desired, 0.0),
            };
            if quantity <= QTY_EPSILON {
                continue;
            }

            let computed = compute_fill(quoted, limit, order.side, quantity, &self.cost_model);
            if let Err(err) = order.record_execution(
                quantity,
                computed.price,
                computed.commission,
                computed.slippage,
                tick.timestamp,
            ) {
                debug!(order_id = %id, error = %err, "skipping execution");
                continue;
            }
            order.triggered = order.triggered || order.stop_price.is_some();

            info!(
                order_id = %id,
                symbol = %order.symbol,
                side = %order.side,
                quantity,
                price = computed.price,
                commission = computed.commission,
                status = %order.status,
                "order filled"
            );

            outcome.fills.push(Fill {
                order_id: id,
                timestamp: tick.timestamp,
                symbol: order.symbol.clone(),
                side: order.side,
                price: computed.price,
                quantity,
                commission: computed.commission,
                slippage: computed.slippage,
                purpose: order.purpose,
            });
            running += order.side.sign() * quantity;
            self.stats.fills += 1;
            self.stats.total_commission += computed.commission;
            self.stats.total_slippage += computed.slippage;

            let oco_group = order.oco_group;
            if order.status == OrderStatus::Filled {
                self.stats.filled += 1;
                if let Some(done) = self.retire(id) {
                    outcome.closed.push(done);
                }
            }
            if let Some(group) = oco_group {
                outcome
                    .closed
                    .extend(self.cancel_oco_siblings(group, id, tick.timestamp));
            }
        }

        outcome
    }

    /// Cancel a live order. Filled quantity is kept; only the remainder is
    /// withdrawn. Returns the cancelled order by value.
    pub fn cancel(&mut self, id: OrderId, at: DateTime<Utc>) -> Result<Order, OrderError> {
        self.cancel_with_reason(id, at, "cancelled by caller")
    }

    pub fn cancel_with_reason(
        &mut self,
        id: OrderId,
        at: DateTime<Utc>,
        reason: &str,
    ) -> Result<Order, OrderError> {
        let Some(order) = self.live.get_mut(&id) else {
            return Err(match self.terminal.get(&id) {
                Some(status) => OrderError::InvalidState {
                    id,
                    status: *status,
                    action: "cancel",
                },
                None => OrderError::OrderNotFound(id),
            });
        };
        order.transition(OrderStatus::Cancelled, at, "cancel")?;
        order.reason = Some(reason.to_string());
        debug!(order_id = %id, reason, "order cancelled");
        self.stats.cancelled += 1;
        self.retire(id).ok_or(OrderError::OrderNotFound(id))
    }

    /// Cancel every live order for `symbol` matching `filter`.
    pub fn cancel_where(
        &mut self,
        symbol: &str,
        at: DateTime<Utc>,
        reason: &str,
        filter: impl Fn(&Order) -> bool,
    ) -> Vec<Order> {
        let ids: Vec<OrderId> = self
            .live
            .values()
            .filter(|o| o.symbol == symbol && filter(o))
            .map(|o| o.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.cancel_with_reason(id, at, reason).ok())
            .collect()
    }

    /// Cancel everything still live, across all symbols.
    pub fn cancel_all(&mut self, at: DateTime<Utc>, reason: &str) -> Vec<Order> {
        let ids: Vec<OrderId> = self.live.keys().copied().collect();
        ids.into_iter()
            .filter_map(|id| self.cancel_with_reason(id, at, reason).ok())
            .collect()
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.live.get(&id)
    }

    /// Final status of an order that has left the book.
    pub fn terminal_status(&self, id: OrderId) -> Option<OrderStatus> {
        self.terminal.get(&id).copied()
    }

    pub fn live_orders(&self) -> impl Iterator<Item = &Order> {
        self.live.values()
    }

    pub fn live_orders_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a Order> + 'a {
        self.live.values().filter(move |o| o.symbol == symbol)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn statistics(&self) -> &OrderStatistics {
        &self.stats
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    // ── Internal ───────────────────────────────────────────────────────

    fn retire(&mut self, id: OrderId) -> Option<Order> {
        let order = self.live.remove(&id)?;
        self.terminal.insert(id, order.status);
        Some(order)
    }

    fn cancel_oco_siblings(
        &mut self,
        group: OcoGroupId,
        filled_id: OrderId,
        at: DateTime<Utc>,
    ) -> Vec<Order> {
        let siblings: Vec<OrderId> = self
            .live
            .values()
            .filter(|o| o.oco_group == Some(group) && o.id != filled_id)
            .map(|o| o.id)
            .collect();
        siblings
            .into_iter()
            .filter_map(|id| self.cancel_with_reason(id, at, "OCO sibling filled").ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderPurpose, OrderSide};
    use chrono::{Duration, TimeZone};

    fn t(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap() + Duration::minutes(n)
    }

    fn tick(price: f64, n: i64) -> Tick {
        Tick::new("SPY", price, t(n))
    }

    fn manager() -> OrderManager {
        OrderManager::new(CostModel::new(0.0005, 0.001), None)
    }

    #[test]
    fn submit_does_not_fill() {
        let mut om = manager();
        let id = om.submit(OrderRequest::market("SPY", OrderSide::Buy, 10.0), t(0)).unwrap();
        let order = om.get(id).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.filled_quantity, 0.0);
    }

    #[test]
    fn malformed_order_never_enters_book() {
        let mut om = manager();
        let mut req = OrderRequest::market("SPY", OrderSide::Buy, 10.0);
        req.order_type = crate::domain::OrderType::Stop;
        assert!(matches!(om.submit(req, t(0)), Err(OrderError::MalformedOrder(_))));
        assert_eq!(om.live_count(), 0);
        assert_eq!(om.statistics().submitted, 0);
        // No id was spent on it
        let id = om.submit(OrderRequest::market("SPY", OrderSide::Buy, 1.0), t(0)).unwrap();
        assert_eq!(id, OrderId(1));
    }

    #[test]
    fn market_fills_on_tick_with_costs() {
        let mut om = manager();
        let id = om.submit(OrderRequest::market("SPY", OrderSide::Buy, 10.0), t(0)).unwrap();
        let out = om.process_tick(&tick(100.0, 0));
        assert_eq!(out.fills.len(), 1);
        assert!((out.fills[0].price - 100.05).abs() < 1e-10);
        assert!((out.fills[0].commission - 1.0005).abs() < 1e-10);
        assert_eq!(out.closed.len(), 1);
        assert_eq!(out.closed[0].id, id);
        assert_eq!(out.closed[0].status, OrderStatus::Filled);
        assert!(om.get(id).is_none());
        assert_eq!(om.terminal_status(id), Some(OrderStatus::Filled));
    }

    #[test]
    fn other_symbols_are_untouched() {
        let mut om = manager();
        om.submit(OrderRequest::market("QQQ", OrderSide::Buy, 1.0), t(0)).unwrap();
        assert!(om.process_tick(&tick(100.0, 0)).fills.is_empty());
        assert_eq!(om.live_count(), 1);
    }

    #[test]
    fn limit_waits_for_price() {
        let mut om = manager();
        om.submit(OrderRequest::limit("SPY", OrderSide::Buy, 5.0, 99.0), t(0)).unwrap();
        assert!(om.process_tick(&tick(100.0, 0)).fills.is_empty());
        let out = om.process_tick(&tick(98.0, 1));
        assert_eq!(out.fills.len(), 1);
        assert!(out.fills[0].price <= 99.0);
    }

    #[test]
    fn cancel_terminal_order_is_invalid_state() {
        let mut om = manager();
        let id = om.submit(OrderRequest::market("SPY", OrderSide::Buy, 1.0), t(0)).unwrap();
        om.process_tick(&tick(100.0, 0));
        let err = om.cancel(id, t(1)).unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidState {
                id,
                status: OrderStatus::Filled,
                action: "cancel"
            }
        );
    }

    #[test]
    fn cancel_twice_is_invalid_state() {
        let mut om = manager();
        let id = om.submit(OrderRequest::limit("SPY", OrderSide::Buy, 1.0, 50.0), t(0)).unwrap();
        let cancelled = om.cancel(id, t(1)).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(matches!(om.cancel(id, t(2)), Err(OrderError::InvalidState { .. })));
        assert!(matches!(
            om.cancel(OrderId(999), t(2)),
            Err(OrderError::OrderNotFound(_))
        ));
    }

    #[test]
    fn oco_fill_cancels_sibling() {
        let mut om = manager();
        let (_, ids) = om
            .submit_oco(
                vec![
                    OrderRequest::stop("SPY", OrderSide::Sell, 10.0, 98.0),
                    OrderRequest::limit("SPY", OrderSide::Sell, 10.0, 104.0),
                ],
                t(0),
            )
            .unwrap();
        let out = om.process_tick(&tick(97.5, 1));
        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].order_id, ids[0]);
        assert_eq!(out.closed.len(), 2);
        let sibling = out.closed.iter().find(|o| o.id == ids[1]).unwrap();
        assert_eq!(sibling.status, OrderStatus::Cancelled);
        assert_eq!(sibling.reason.as_deref(), Some("OCO sibling filled"));
        assert_eq!(om.live_count(), 0);
    }

    fn bracket(om: &mut OrderManager, qty: f64) -> Vec<OrderId> {
        om.submit_oco(
            vec![
                OrderRequest::stop("SPY", OrderSide::Sell, qty, 98.0)
                    .with_purpose(OrderPurpose::StopLoss),
                OrderRequest::limit("SPY", OrderSide::Sell, qty, 104.0)
                    .with_purpose(OrderPurpose::TakeProfit),
            ],
            t(0),
        )
        .unwrap()
        .1
    }

    #[test]
    fn exit_and_stop_on_same_tick_close_position_once() {
        let mut om = OrderManager::new(CostModel::frictionless(), None);
        let legs = bracket(&mut om, 10.0);
        let exit = om
            .submit(
                OrderRequest::market("SPY", OrderSide::Sell, 10.0).with_purpose(OrderPurpose::Exit),
                t(1),
            )
            .unwrap();

        let out = om.process_tick_with_position(&tick(97.0, 1), 10.0);
        let sold: f64 = out.fills.iter().map(|f| f.quantity).sum();
        assert_eq!(sold, 10.0);
        assert_eq!(out.fills[0].order_id, legs[0]);
        // The exit had nothing left to close and stays live.
        assert_eq!(om.get(exit).unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn entry_orders_fill_before_reduce_only_legs() {
        let mut om = OrderManager::new(CostModel::frictionless(), None);
        let legs = bracket(&mut om, 10.0);
        let reversal = om
            .submit(OrderRequest::market("SPY", OrderSide::Sell, 20.0), t(1))
            .unwrap();

        let out = om.process_tick_with_position(&tick(97.0, 1), 10.0);
        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].order_id, reversal);
        // Now short; a sell-side stop no longer reduces anything.
        assert!(om.get(legs[0]).is_some());
    }

    #[test]
    fn reduce_only_leg_is_capped_to_position() {
        let mut om = OrderManager::new(CostModel::frictionless(), None);
        let legs = bracket(&mut om, 10.0);
        let out = om.process_tick_with_position(&tick(97.0, 1), 4.0);
        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].quantity, 4.0);
        assert_eq!(om.get(legs[0]).unwrap().status, OrderStatus::PartiallyFilled);

        // Flat: nothing more fills.
        assert!(om.process_tick_with_position(&tick(96.0, 2), 0.0).fills.is_empty());
    }

    #[test]
    fn participation_limit_partially_fills() {
        let mut om = OrderManager::new(CostModel::frictionless(), Some(ParticipationLimit::new(0.1)));
        let id = om.submit(OrderRequest::market("SPY", OrderSide::Buy, 150.0), t(0)).unwrap();

        let out = om.process_tick(&tick(100.0, 0).with_volume(1_000.0));
        assert_eq!(out.fills[0].quantity, 100.0);
        assert!(out.closed.is_empty());
        assert_eq!(om.get(id).unwrap().status, OrderStatus::PartiallyFilled);

        // Cancelling keeps the filled part.
        let cancelled = om.cancel(id, t(1)).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.filled_quantity, 100.0);
    }

    #[test]
    fn partial_then_complete_fill() {
        let mut om = OrderManager::new(CostModel::frictionless(), Some(ParticipationLimit::new(0.5)));
        let id = om.submit(OrderRequest::market("SPY", OrderSide::Sell, 60.0), t(0)).unwrap();
        om.process_tick(&tick(10.0, 0).with_volume(100.0));
        let out = om.process_tick(&tick(12.0, 1).with_volume(100.0));
        assert_eq!(out.fills[0].quantity, 10.0);
        let done = &out.closed[0];
        assert_eq!(done.id, id);
        assert_eq!(done.status, OrderStatus::Filled);
        assert_eq!(done.filled_quantity, 60.0);
        // (50 * 10 + 10 * 12) / 60
        assert!((done.avg_fill_price.unwrap() - 620.0 / 60.0).abs() < 1e-10);
    }

    #[test]
    fn statistics_track_costs() {
        let mut om = manager();
        om.submit(OrderRequest::market("SPY", OrderSide::Buy, 10.0), t(0)).unwrap();
        let resting = om.submit(OrderRequest::limit("SPY", OrderSide::Buy, 1.0, 1.0), t(0)).unwrap();
        om.process_tick(&tick(100.0, 0));
        om.cancel(resting, t(1)).unwrap();
        let stats = om.statistics();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.filled, 1);
        assert_eq!(stats.cancelled, 1);
        assert!((stats.total_commission - 1.0005).abs() < 1e-10);
        assert!((stats.total_slippage - 0.5).abs() < 1e-10);
    }
}
