//! Domain types for the simulation engine.

pub mod fill;
pub mod ids;
pub mod order;
pub mod position;
pub mod ratio;
pub mod snapshot;
pub mod tick;
pub mod trade;

pub use fill::Fill;
pub use ids::{IdGen, OcoGroupId, OrderId, TradeId};
pub use order::{
    rejected_order, Order, OrderError, OrderPurpose, OrderRequest, OrderSide, OrderStatus,
    OrderType,
};
pub use position::{Position, PositionSide};
pub use ratio::{Ratio, UndefinedReason};
pub use snapshot::{PortfolioSnapshot, PositionView};
pub use tick::{Tick, TickError};
pub use trade::{ExitReason, Trade};
