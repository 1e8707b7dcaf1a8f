//! Fill price computation — cost model applied to a quoted price.

use crate::domain::OrderSide;

use super::cost_model::CostModel;

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedFill {
    /// Final execution price.
    pub price: f64,
    /// Dollar slippage relative to the quoted price.
    pub slippage: f64,
    /// Dollar commission.
    pub commission: f64,
}

/// Apply slippage, clamp to `limit` if present, then charge commission.
///
/// The clamp keeps limit fills no worse than the limit: a BUY never pays
/// above it and a SELL never receives below it.
pub fn compute_fill(
    quoted: f64,
    limit: Option<f64>,
    side: OrderSide,
    quantity: f64,
    cost_model: &CostModel,
) -> ComputedFill {
    let (slipped, _) = cost_model.apply_slippage(quoted, side, quantity);
    let price = match (limit, side) {
        (Some(limit), OrderSide::Buy) => slipped.min(limit),
        (Some(limit), OrderSide::Sell) => slipped.max(limit),
        (None, _) => slipped,
    };
    ComputedFill {
        price,
        slippage: (price - quoted).abs() * quantity,
        commission: cost_model.compute_commission(price, quantity),
    }
}
