//! Trigger checking — does a tick fill a given order?
//!
//! Produces the quoted fill price before slippage and commission. STOP and
//! STOP_LIMIT orders trigger when the tick crosses the stop: BUY stops at
//! `price >= stop`, SELL stops at `price <= stop`.

use crate::domain::{Order, OrderSide, OrderType};

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerResult {
    NoTrigger,
    /// Fill at `quoted`, never worse than `limit` when one applies.
    Fill { quoted: f64, limit: Option<f64> },
    /// STOP_LIMIT stop leg crossed but the limit is not marketable yet.
    StopTriggeredLimitPending,
}

pub fn check_trigger(order: &Order, price: f64) -> TriggerResult {
    match order.order_type {
        OrderType::Market => TriggerResult::Fill {
            quoted: price,
            limit: None,
        },
        OrderType::Limit => match order.limit_price {
            Some(limit) => check_limit(order.side, limit, price),
            None => TriggerResult::NoTrigger,
        },
        OrderType::Stop => match order.stop_price {
            Some(stop) if stop_crossed(order.side, stop, price) => TriggerResult::Fill {
                quoted: price,
                limit: None,
            },
            _ => TriggerResult::NoTrigger,
        },
        OrderType::StopLimit => {
            let (Some(stop), Some(limit)) = (order.stop_price, order.limit_price) else {
                return TriggerResult::NoTrigger;
            };
            if !order.triggered && !stop_crossed(order.side, stop, price) {
                return TriggerResult::NoTrigger;
            }
            match check_limit(order.side, limit, price) {
                TriggerResult::NoTrigger => TriggerResult::StopTriggeredLimitPending,
                fill => fill,
            }
        }
    }
}

fn stop_crossed(side: OrderSide, stop: f64, price: f64) -> bool {
    match side {
        OrderSide::Buy => price >= stop,
        OrderSide::Sell => price <= stop,
    }
}

fn check_limit(side: OrderSide, limit: f64, price: f64) -> TriggerResult {
    let marketable = match side {
        OrderSide::Buy => price <= limit,
        OrderSide::Sell => price >= limit,
    };
    if marketable {
        TriggerResult::Fill {
            quoted: price,
            limit: Some(limit),
        }
    } else {
        TriggerResult::NoTrigger
    }
}
