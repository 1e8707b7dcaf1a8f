//! simtrade core — execution and risk simulation engine.
//!
//! This crate contains the deterministic heart of the simulator:
//! - Domain types (ticks, orders, fills, positions, trades, snapshots)
//! - Order manager state machine with slippage, commission and OCO groups
//! - Portfolio ledger with realized/unrealized accounting
//! - Pre-trade risk gate, drawdown and daily-loss breakers, sizing
//! - Replay session shared by backtests and paper trading
//! - Strategy trait and reference strategies

pub mod config;
pub mod domain;
pub mod engine;
pub mod risk;
pub mod strategy;

pub use config::{ConfigError, SimConfig};
pub use engine::{ReplayError, RunReport, Session};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything that crosses a thread boundary is
    /// Send + Sync (parallel runs move sessions and reports between workers).
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Tick>();
        require_sync::<domain::Tick>();
        require_send::<domain::Order>();
        require_sync::<domain::Order>();
        require_send::<domain::Fill>();
        require_sync::<domain::Fill>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<domain::PortfolioSnapshot>();
        require_sync::<domain::PortfolioSnapshot>();
        require_send::<domain::Ratio>();
        require_sync::<domain::Ratio>();

        // Config
        require_send::<config::SimConfig>();
        require_sync::<config::SimConfig>();

        // Engine types
        require_send::<engine::OrderManager>();
        require_sync::<engine::OrderManager>();
        require_send::<engine::Ledger>();
        require_sync::<engine::Ledger>();
        require_send::<engine::RunReport>();
        require_sync::<engine::RunReport>();
        require_send::<engine::ReplayError>();
        require_sync::<engine::ReplayError>();

        // Risk
        require_send::<risk::RiskGate>();
        require_sync::<risk::RiskGate>();
        require_send::<risk::RiskState>();
        require_sync::<risk::RiskState>();

        // A session owns a boxed strategy; it must be able to move to a worker.
        require_send::<engine::Session>();

        // Strategies
        require_send::<strategy::MovingAverageCross>();
        require_sync::<strategy::MovingAverageCross>();
        require_send::<strategy::ScheduledSignals>();
        require_sync::<strategy::ScheduledSignals>();
    }

    /// Architecture contract: strategies receive an immutable snapshot, never
    /// the ledger or the order manager. If this compiles, a strategy cannot
    /// mutate portfolio state.
    #[test]
    fn strategy_sees_snapshot_only() {
        fn _check_trait_object_builds(
            strategy: &mut dyn strategy::Strategy,
            tick: &domain::Tick,
            portfolio: &domain::PortfolioSnapshot,
        ) -> Vec<strategy::OrderIntent> {
            strategy.produce_orders(tick, portfolio)
        }
    }
}
