//! Simulation engine — order lifecycle, fills, ledger and the replay session.
//!
//! Per-tick flow inside a [`Session`]:
//!
//! 1. Mark: the ledger revalues positions at the tick price
//! 2. Decide: the strategy proposes intents, the risk gate accepts or rejects
//! 3. Execute: the order manager evaluates live orders and emits fills
//! 4. Book: fills update cash, positions and the trade log; brackets follow
//! 5. Record: one immutable portfolio snapshot is appended to the equity curve

pub mod bracket;
pub mod execution;
pub mod ledger;
pub mod order_manager;
pub mod report;
pub mod session;
pub mod trade_stats;

pub use execution::{CostModel, ParticipationLimit};
pub use ledger::{FillEffect, Ledger, LedgerStatistics};
pub use order_manager::{OrderManager, OrderStatistics, TickOutcome};
pub use report::{Rejection, RejectionKind, RunReport};
pub use session::{ReplayError, Session};
pub use trade_stats::TradeStatistics;
