//! simtrade runner — backtest orchestration, paper trading, metrics, export.
//!
//! This crate builds on `simtrade-core` to provide:
//! - Tick loading from CSV files or a seeded synthetic random walk
//! - Single and parallel backtest runners
//! - A channel-fed paper-trading loop
//! - Post-run performance metrics
//! - JSON/CSV/Markdown artifact export

pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod paper;
pub mod runner;

pub use data_loader::{
    load_ticks_csv, merge_streams, synthetic_ticks, LoadError, LoadedTicks, SyntheticOptions,
};
pub use export::{generate_report, load_artifacts, save_artifacts, ExportError};
pub use metrics::PerformanceMetrics;
pub use paper::{run_paper, spawn_feed, PaperResult};
pub use runner::{
    run_backtest, run_parallel, split_by_symbol, BacktestJob, BacktestResult, RunError,
    SCHEMA_VERSION,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn performance_metrics_is_send_sync() {
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
    }

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn backtest_job_is_send() {
        assert_send::<BacktestJob>();
    }

    #[test]
    fn loaded_ticks_is_send_sync() {
        assert_send::<LoadedTicks>();
        assert_sync::<LoadedTicks>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<ExportError>();
        assert_sync::<ExportError>();
    }
}
