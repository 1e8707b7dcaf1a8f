//! Protective bracket legs for an open position.
//!
//! A bracket is a STOP stop-loss and a LIMIT take-profit on the exit side,
//! both sized to the whole position and sharing one OCO group. Prices come
//! from the risk gate's calculators and the position's average entry.

use crate::config::BracketConfig;
use crate::domain::{Order, OrderPurpose, OrderRequest, OrderSide, Position};
use crate::risk::RiskGate;

/// True for orders the session placed as bracket legs.
pub fn is_bracket_leg(order: &Order) -> bool {
    matches!(order.purpose, OrderPurpose::StopLoss | OrderPurpose::TakeProfit)
}

/// Leg requests protecting `position`. Empty when both legs are disabled.
pub fn bracket_legs(gate: &RiskGate, config: &BracketConfig, position: &Position) -> Vec<OrderRequest> {
    let entry_side = if position.is_long() {
        OrderSide::Buy
    } else {
        OrderSide::Sell
    };
    let exit_side = entry_side.opposite();
    let quantity = position.quantity.abs();
    let entry = position.avg_entry_price;

    let mut legs = Vec::with_capacity(2);
    if config.auto_stop_loss {
        let stop = gate.calculate_stop_loss_price(entry, entry_side);
        legs.push(
            OrderRequest::stop(position.symbol.clone(), exit_side, quantity, stop)
                .with_purpose(OrderPurpose::StopLoss),
        );
    }
    if config.auto_take_profit {
        let target = gate.calculate_take_profit_price(entry, entry_side);
        legs.push(
            OrderRequest::limit(position.symbol.clone(), exit_side, quantity, target)
                .with_purpose(OrderPurpose::TakeProfit),
        );
    }
    legs
}
