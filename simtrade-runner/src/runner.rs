//! Backtest runner — wires together tick data, a session, and metrics.
//!
//! Two entry points:
//! - `run_backtest()`: one session over one (possibly merged) tick stream.
//!   Used by the CLI.
//! - `run_parallel()`: independent jobs on the rayon pool, one session per
//!   job. Used for per-symbol runs that do not share capital.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use simtrade_core::config::{ConfigError, SimConfig};
use simtrade_core::domain::Tick;
use simtrade_core::engine::RunReport;
use simtrade_core::strategy::Strategy;
use simtrade_core::Session;

use crate::data_loader::{LoadError, LoadedTicks};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("no ticks to replay")]
    NoTicks,
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// BLAKE3 over config fingerprint, dataset hash and strategy name.
    pub run_id: String,
    pub strategy: String,
    pub symbols: Vec<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub config: SimConfig,
    pub config_fingerprint: String,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    /// False when the replay stopped on corrupt input.
    pub complete: bool,
    pub abort: Option<String>,
    pub metrics: PerformanceMetrics,
    pub report: RunReport,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn equity_values(&self) -> Vec<f64> {
        self.report.equity_values()
    }
}

/// Derive a run id from what determines the outcome.
pub fn run_id(config_fingerprint: &str, dataset_hash: &str, strategy: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(config_fingerprint.as_bytes());
    hasher.update(dataset_hash.as_bytes());
    hasher.update(strategy.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Replay `data` through one session and compute metrics.
///
/// A replay that aborts on corrupt input still returns `Ok`; the result is
/// marked incomplete and covers the ticks processed before the abort.
pub fn run_backtest(
    config: &SimConfig,
    strategy: Box<dyn Strategy>,
    data: &LoadedTicks,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    if data.ticks.is_empty() {
        return Err(RunError::NoTicks);
    }

    let session = Session::new(config.clone(), strategy);
    let report = session.run(data.ticks.iter().cloned());

    let metrics = PerformanceMetrics::compute(
        &report.equity_values(),
        &report.trades,
        config.initial_capital,
        &config.metrics,
    );

    let start = report.equity_curve.first().map(|s| s.timestamp);
    let end = report.equity_curve.last().map(|s| s.timestamp);

    info!(
        strategy = %report.strategy,
        complete = report.complete,
        trades = metrics.total_trades,
        total_return_pct = metrics.total_return_pct,
        sharpe = %metrics.sharpe_ratio,
        "backtest finished"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: run_id(&report.config_fingerprint, &data.dataset_hash, &report.strategy),
        strategy: report.strategy.clone(),
        symbols: data.symbols(),
        start,
        end,
        config: config.clone(),
        config_fingerprint: report.config_fingerprint.clone(),
        dataset_hash: data.dataset_hash.clone(),
        has_synthetic: data.has_synthetic,
        complete: report.complete,
        abort: report.abort.clone(),
        metrics,
        report,
    })
}

/// One independent run for [`run_parallel`].
pub struct BacktestJob {
    pub config: SimConfig,
    pub strategy: Box<dyn Strategy>,
    pub data: LoadedTicks,
}

/// Run independent jobs in parallel. Results come back in job order.
pub fn run_parallel(jobs: Vec<BacktestJob>) -> Vec<Result<BacktestResult, RunError>> {
    info!(jobs = jobs.len(), "running backtests in parallel");
    jobs.into_par_iter()
        .map(|job| run_backtest(&job.config, job.strategy, &job.data))
        .collect()
}

/// Split a mixed stream into per-symbol streams, each in input order.
pub fn split_by_symbol(ticks: &[Tick]) -> BTreeMap<String, Vec<Tick>> {
    let mut by_symbol: BTreeMap<String, Vec<Tick>> = BTreeMap::new();
    for tick in ticks {
        by_symbol
            .entry(tick.symbol.clone())
            .or_default()
            .push(tick.clone());
    }
    by_symbol
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::{synthetic_ticks, SyntheticOptions};
    use simtrade_core::domain::Ratio;
    use simtrade_core::strategy::{Idle, MovingAverageCross};

    fn walk(symbol: &str, n: usize) -> LoadedTicks {
        synthetic_ticks(&SyntheticOptions::new(symbol, n)).unwrap()
    }

    #[test]
    fn idle_strategy_keeps_capital() {
        let config = SimConfig::default();
        let result = run_backtest(&config, Box::new(Idle), &walk("SPY", 50)).unwrap();

        assert!(result.complete);
        assert_eq!(result.report.ticks_processed, 50);
        assert_eq!(result.metrics.total_trades, 0);
        assert_eq!(result.metrics.final_equity, config.initial_capital);
        assert!(!result.metrics.sharpe_ratio.is_defined());
        assert_eq!(result.symbols, vec!["SPY".to_string()]);
        assert!(result.has_synthetic);
    }

    #[test]
    fn invalid_config_is_rejected_before_replay() {
        let mut config = SimConfig::default();
        config.initial_capital = -1.0;
        let err = run_backtest(&config, Box::new(Idle), &walk("SPY", 5)).unwrap_err();
        assert!(matches!(err, RunError::Config(_)));
    }

    #[test]
    fn empty_stream_is_an_error() {
        let data = LoadedTicks {
            ticks: Vec::new(),
            dataset_hash: String::new(),
            has_synthetic: false,
        };
        let err = run_backtest(&SimConfig::default(), Box::new(Idle), &data).unwrap_err();
        assert!(matches!(err, RunError::NoTicks));
    }

    #[test]
    fn run_id_is_stable_across_identical_runs() {
        let config = SimConfig::default();
        let data = walk("SPY", 300);
        let strategy = || Box::new(MovingAverageCross::new(5, 20).unwrap()) as Box<dyn Strategy>;

        let a = run_backtest(&config, strategy(), &data).unwrap();
        let b = run_backtest(&config, strategy(), &data).unwrap();
        assert_eq!(a.run_id, b.run_id);
        assert_eq!(a.report.trades, b.report.trades);
        assert_eq!(a.equity_values(), b.equity_values());

        let mut other = config.clone();
        other.execution.commission_rate = 0.002;
        let c = run_backtest(&other, strategy(), &data).unwrap();
        assert_ne!(a.run_id, c.run_id);
    }

    #[test]
    fn parallel_matches_sequential() {
        let config = SimConfig::default();
        let symbols = ["SPY", "QQQ", "IWM"];
        let jobs: Vec<BacktestJob> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| BacktestJob {
                config: config.clone(),
                strategy: Box::new(MovingAverageCross::new(3, 10).unwrap()),
                data: synthetic_ticks(&SyntheticOptions::new(*s, 200).with_seed(i as u64)).unwrap(),
            })
            .collect();

        let sequential: Vec<Vec<f64>> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let data =
                    synthetic_ticks(&SyntheticOptions::new(*s, 200).with_seed(i as u64)).unwrap();
                let strategy = Box::new(MovingAverageCross::new(3, 10).unwrap());
                run_backtest(&config, strategy, &data).unwrap().equity_values()
            })
            .collect();

        let parallel = run_parallel(jobs);
        assert_eq!(parallel.len(), 3);
        for (i, result) in parallel.into_iter().enumerate() {
            let result = result.unwrap();
            assert_eq!(result.symbols, vec![symbols[i].to_string()]);
            assert_eq!(result.equity_values(), sequential[i]);
        }
    }

    #[test]
    fn split_keeps_per_symbol_order() {
        let spy = walk("SPY", 3).ticks;
        let qqq = walk("QQQ", 2).ticks;
        let mixed = crate::data_loader::merge_streams(vec![spy.clone(), qqq.clone()]);

        let split = split_by_symbol(&mixed);
        assert_eq!(split.len(), 2);
        assert_eq!(split["SPY"], spy);
        assert_eq!(split["QQQ"], qqq);
    }

    #[test]
    fn metrics_on_flat_run_are_undefined_not_zero() {
        let result = run_backtest(&SimConfig::default(), Box::new(Idle), &walk("SPY", 10)).unwrap();
        assert!(matches!(result.metrics.win_rate, Ratio::Undefined(_)));
        assert!(matches!(result.metrics.calmar_ratio, Ratio::Undefined(_)));
    }
}
