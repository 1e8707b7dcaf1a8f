//! Integration tests for the runner: CSV in, artifacts out.

use std::io::Write;

use chrono::{DateTime, Utc};
use simtrade_core::config::SimConfig;
use simtrade_core::strategy::{MovingAverageCross, OrderIntent, ScheduledSignals};
use simtrade_runner::{
    load_artifacts, load_ticks_csv, merge_streams, run_backtest, save_artifacts, synthetic_ticks,
    LoadedTicks, SyntheticOptions,
};

const TICKS: &str = "\
timestamp,symbol,price
2024-01-02T14:30:00Z,SPY,100.0
2024-01-02T15:30:00Z,SPY,102.0
2024-01-02T16:30:00Z,SPY,105.0
";

const CONFIG: &str = "\
initial_capital = 10000.0

[brackets]
auto_stop_loss = false
auto_take_profit = false
";

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn round_trip_schedule() -> ScheduledSignals {
    ScheduledSignals::new()
        .at(ts("2024-01-02T14:30:00Z"), OrderIntent::buy("SPY", 10.0))
        .at(ts("2024-01-02T16:30:00Z"), OrderIntent::target("SPY", 0.0))
}

#[test]
fn csv_backtest_produces_expected_round_trip() {
    let ticks = write_temp(TICKS);
    let config_file = write_temp(CONFIG);

    let config = SimConfig::load(config_file.path()).unwrap();
    let data = load_ticks_csv(ticks.path()).unwrap();
    let result = run_backtest(&config, Box::new(round_trip_schedule()), &data).unwrap();

    assert!(result.complete);
    assert!(!result.has_synthetic);
    assert_eq!(result.report.ticks_processed, 3);
    assert_eq!(result.report.trades.len(), 1);

    // Entry 100 * 1.0005, exit 105 * 0.9995, commission 0.1% each side.
    let entry = 100.05;
    let exit = 104.9475;
    let expected_cash = 10_000.0 - entry * 10.0 * 1.001 + exit * 10.0 * 0.999;
    let trade = &result.report.trades[0];
    assert!((trade.entry_price - entry).abs() < 1e-9);
    assert!((trade.exit_price - exit).abs() < 1e-9);
    assert!((result.metrics.final_equity - expected_cash).abs() < 1e-6);
    assert_eq!(result.metrics.total_trades, 1);
    assert_eq!(result.metrics.winning_trades, 1);

    assert_eq!(result.report.orders.len(), 2);
    assert!(result.report.orders.iter().all(|o| o.status.is_terminal()));
}

#[test]
fn artifacts_written_and_reloaded() {
    let ticks = write_temp(TICKS);
    let data = load_ticks_csv(ticks.path()).unwrap();
    let config = SimConfig::from_toml_str(CONFIG).unwrap();
    let result = run_backtest(&config, Box::new(round_trip_schedule()), &data).unwrap();

    let dir = tempfile::tempdir().unwrap();
    save_artifacts(&result, dir.path()).unwrap();

    let trades_csv = std::fs::read_to_string(dir.path().join("trades.csv")).unwrap();
    assert_eq!(trades_csv.lines().count(), 2);
    assert!(trades_csv.lines().nth(1).unwrap().contains("SPY"));

    let equity_csv = std::fs::read_to_string(dir.path().join("equity.csv")).unwrap();
    assert_eq!(equity_csv.lines().count(), 4);

    let orders_csv = std::fs::read_to_string(dir.path().join("orders.csv")).unwrap();
    assert_eq!(orders_csv.lines().count(), 3);
    assert!(orders_csv.contains("FILLED"));

    let loaded = load_artifacts(dir.path()).unwrap();
    assert_eq!(loaded.run_id, result.run_id);
    assert_eq!(loaded.config_fingerprint, config.fingerprint());
    assert!(loaded.complete);
}

#[test]
fn out_of_order_file_yields_incomplete_result() {
    let ticks = write_temp(
        "timestamp,symbol,price\n\
         2024-01-02T14:30:00Z,SPY,100.0\n\
         2024-01-02T16:30:00Z,SPY,101.0\n\
         2024-01-02T15:30:00Z,SPY,102.0\n\
         2024-01-02T17:30:00Z,SPY,103.0\n",
    );
    let data = load_ticks_csv(ticks.path()).unwrap();
    let result = run_backtest(&SimConfig::default(), Box::new(round_trip_schedule()), &data).unwrap();

    assert!(!result.complete);
    assert_eq!(result.report.ticks_processed, 2);
    assert_eq!(result.report.equity_curve.len(), 2);
    assert!(result.abort.as_deref().unwrap().contains("out-of-order"));
}

#[test]
fn shared_capital_multi_symbol_run() {
    let spy = synthetic_ticks(&SyntheticOptions::new("SPY", 200)).unwrap();
    let mut qqq_opts = SyntheticOptions::new("QQQ", 200).with_seed(9);
    qqq_opts.start_price = 400.0;
    let qqq = synthetic_ticks(&qqq_opts).unwrap();

    let merged = merge_streams(vec![spy.ticks, qqq.ticks]);
    let data = LoadedTicks {
        dataset_hash: simtrade_runner::data_loader::dataset_hash(&merged),
        ticks: merged,
        has_synthetic: true,
    };

    let strategy = Box::new(MovingAverageCross::new(5, 20).unwrap());
    let result = run_backtest(&SimConfig::default(), strategy, &data).unwrap();

    assert!(result.complete);
    assert_eq!(result.report.ticks_processed, 400);
    assert_eq!(result.symbols, vec!["QQQ".to_string(), "SPY".to_string()]);

    // One ledger: every snapshot satisfies the accounting identity.
    for snap in &result.report.equity_curve {
        let rhs = 10_000.0 + snap.realized_pnl + snap.unrealized_pnl;
        assert!((snap.total_value - rhs).abs() < 1e-6 * 10_000.0);
    }
}
