//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! An artifact directory holds:
//! - `result.json` — the full `BacktestResult` (metrics, fingerprint,
//!   completeness flag, report)
//! - `trades.csv` — closed round trips
//! - `equity.csv` — one row per snapshot
//! - `orders.csv` — terminal state of every order
//!
//! `result.json` carries a `schema_version`; newer versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use simtrade_core::domain::{Order, PortfolioSnapshot, Ratio, Trade};
use thiserror::Error;
use tracing::info;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported schema version {found} (max supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult, ExportError> {
    let result: BacktestResult = serde_json::from_str(json)?;
    if result.schema_version > SCHEMA_VERSION {
        return Err(ExportError::UnsupportedSchema {
            found: result.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Columns: id, symbol, side, quantity, entry_time, entry_price, exit_time,
/// exit_price, realized_pnl, realized_pnl_pct, commission, slippage,
/// holding_hours, exit_reason
pub fn export_trades_csv(trades: &[Trade]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "id",
        "symbol",
        "side",
        "quantity",
        "entry_time",
        "entry_price",
        "exit_time",
        "exit_price",
        "realized_pnl",
        "realized_pnl_pct",
        "commission",
        "slippage",
        "holding_hours",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            t.id.to_string(),
            t.symbol.clone(),
            format!("{:?}", t.side).to_uppercase(),
            format!("{}", t.quantity),
            t.entry_time.to_rfc3339(),
            format!("{:.6}", t.entry_price),
            t.exit_time.to_rfc3339(),
            format!("{:.6}", t.exit_price),
            format!("{:.6}", t.realized_pnl),
            format!("{:.4}", t.realized_pnl_pct),
            format!("{:.6}", t.commission),
            format!("{:.6}", t.slippage),
            format!("{:.4}", t.holding_hours()),
            format!("{:?}", t.exit_reason),
        ])?;
    }
    finish_csv(wtr)
}

/// Columns: timestamp, cash, positions_value, total_value, realized_pnl,
/// unrealized_pnl, gross_exposure
pub fn export_equity_csv(curve: &[PortfolioSnapshot]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "cash",
        "positions_value",
        "total_value",
        "realized_pnl",
        "unrealized_pnl",
        "gross_exposure",
    ])?;
    for s in curve {
        wtr.write_record([
            s.timestamp.to_rfc3339(),
            format!("{:.6}", s.cash),
            format!("{:.6}", s.positions_value),
            format!("{:.6}", s.total_value),
            format!("{:.6}", s.realized_pnl),
            format!("{:.6}", s.unrealized_pnl),
            format!("{:.6}", s.gross_exposure),
        ])?;
    }
    finish_csv(wtr)
}

/// Columns: id, symbol, side, order_type, quantity, limit_price, stop_price,
/// purpose, status, filled_quantity, avg_fill_price, commission, created_at,
/// updated_at, reason
pub fn export_orders_csv(orders: &[Order]) -> Result<String, ExportError> {
    let opt = |v: Option<f64>| v.map(|p| format!("{p:.6}")).unwrap_or_default();

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "id",
        "symbol",
        "side",
        "order_type",
        "quantity",
        "limit_price",
        "stop_price",
        "purpose",
        "status",
        "filled_quantity",
        "avg_fill_price",
        "commission",
        "created_at",
        "updated_at",
        "reason",
    ])?;
    for o in orders {
        wtr.write_record([
            o.id.to_string(),
            o.symbol.clone(),
            o.side.to_string(),
            o.order_type.to_string(),
            format!("{}", o.quantity),
            opt(o.limit_price),
            opt(o.stop_price),
            format!("{:?}", o.purpose),
            o.status.to_string(),
            format!("{}", o.filled_quantity),
            opt(o.avg_fill_price),
            format!("{:.6}", o.commission),
            o.created_at.to_rfc3339(),
            o.updated_at.to_rfc3339(),
            o.reason.clone().unwrap_or_default(),
        ])?;
    }
    finish_csv(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write the full artifact set into `output_dir`, creating it if needed.
///
/// Returns the path to `result.json`.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(output_dir).map_err(io_err(output_dir))?;

    let files = [
        ("result.json", export_json(result)?),
        ("trades.csv", export_trades_csv(&result.report.trades)?),
        ("equity.csv", export_equity_csv(&result.report.equity_curve)?),
        ("orders.csv", export_orders_csv(&result.report.orders)?),
    ];
    for (name, contents) in &files {
        let path = output_dir.join(name);
        std::fs::write(&path, contents).map_err(io_err(&path))?;
    }

    info!(dir = %output_dir.display(), run_id = %result.run_id, "artifacts saved");
    Ok(output_dir.join("result.json"))
}

/// Load a `BacktestResult` from an artifact directory's `result.json`.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult, ExportError> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path).map_err(io_err(&path))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Markdown summary of one run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);
    let m = &result.metrics;

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Strategy | {} |\n", result.strategy));
    md.push_str(&format!("| Symbols | {} |\n", result.symbols.join(", ")));
    if let (Some(start), Some(end)) = (result.start, result.end) {
        md.push_str(&format!("| Period | {} to {} |\n", start.to_rfc3339(), end.to_rfc3339()));
    }
    md.push_str(&format!("| Ticks | {} |\n", result.report.ticks_processed));
    md.push_str(&format!("| Initial Capital | ${:.2} |\n", m.initial_capital));
    md.push_str(&format!("| Config | {} |\n", result.config_fingerprint));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    if result.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    if !result.complete {
        md.push_str(&format!(
            "| Status | **INCOMPLETE**: {} |\n",
            result.abort.as_deref().unwrap_or("aborted")
        ));
    }
    md.push('\n');

    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Final Equity | ${:.2} |\n", m.final_equity));
    md.push_str(&format!(
        "| Total Return | ${:.2} ({:.2}%) |\n",
        m.total_return, m.total_return_pct
    ));
    md.push_str(&format!("| Annualized Return | {} |\n", pct(m.annualized_return_pct)));
    md.push_str(&format!("| Annualized Volatility | {} |\n", pct(m.annualized_volatility_pct)));
    md.push_str(&format!("| Sharpe | {} |\n", ratio(m.sharpe_ratio)));
    md.push_str(&format!("| Sortino | {} |\n", ratio(m.sortino_ratio)));
    md.push_str(&format!("| Calmar | {} |\n", ratio(m.calmar_ratio)));
    md.push_str(&format!(
        "| Max Drawdown | {:.2}% (${:.2}) |\n",
        m.max_drawdown_pct, m.max_drawdown
    ));
    md.push_str(&format!("| Recovery Factor | {} |\n", ratio(m.recovery_factor)));
    md.push('\n');

    md.push_str("## Trades\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!(
        "| Trades | {} ({} won, {} lost) |\n",
        m.total_trades, m.winning_trades, m.losing_trades
    ));
    md.push_str(&format!("| Win Rate | {} |\n", pct(m.win_rate.map(|w| w * 100.0))));
    md.push_str(&format!("| Profit Factor | {} |\n", ratio(m.profit_factor)));
    md.push_str(&format!("| Expectancy | {} |\n", ratio(m.expectancy)));
    md.push_str(&format!("| Avg Win / Loss | ${:.2} / ${:.2} |\n", m.avg_win, m.avg_loss));
    md.push_str(&format!(
        "| Max Consecutive Wins / Losses | {} / {} |\n",
        m.max_consecutive_wins, m.max_consecutive_losses
    ));
    md.push_str(&format!("| Avg Holding (h) | {} |\n", ratio(m.avg_holding_hours)));
    md.push_str(&format!(
        "| Costs | ${:.2} commission, ${:.2} slippage |\n",
        m.total_commission, m.total_slippage
    ));
    md.push_str(&format!("| Rejections | {} |\n", result.report.rejections.len()));
    md.push('\n');

    md
}

fn ratio(r: Ratio) -> String {
    match r {
        Ratio::Defined(v) => format!("{v:.3}"),
        Ratio::Undefined(reason) => format!("n/a ({reason})"),
    }
}

fn pct(r: Ratio) -> String {
    match r {
        Ratio::Defined(v) => format!("{v:.2}%"),
        Ratio::Undefined(reason) => format!("n/a ({reason})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::{synthetic_ticks, SyntheticOptions};
    use crate::runner::run_backtest;
    use simtrade_core::config::SimConfig;
    use simtrade_core::strategy::MovingAverageCross;

    fn sample_result() -> BacktestResult {
        let data = synthetic_ticks(&SyntheticOptions::new("SPY", 400)).unwrap();
        let strategy = Box::new(MovingAverageCross::new(5, 20).unwrap());
        run_backtest(&SimConfig::default(), strategy, &data).unwrap()
    }

    // ─── JSON ───────────────────────────────────────────────────────

    #[test]
    fn json_roundtrip() {
        let result = sample_result();
        let json = export_json(&result).unwrap();
        let loaded = import_json(&json).unwrap();
        assert_eq!(loaded.run_id, result.run_id);
        assert_eq!(loaded.metrics.total_trades, result.metrics.total_trades);
        assert!((loaded.metrics.total_return - result.metrics.total_return).abs() < 1e-9);
        assert_eq!(loaded.report.orders.len(), result.report.orders.len());
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut result = sample_result();
        result.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&result).unwrap();
        assert!(matches!(
            import_json(&json),
            Err(ExportError::UnsupportedSchema { .. })
        ));
    }

    #[test]
    fn json_carries_fingerprint_and_completeness() {
        let json = export_json(&sample_result()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["complete"], serde_json::Value::Bool(true));
        assert_eq!(
            value["config_fingerprint"].as_str().unwrap(),
            SimConfig::default().fingerprint()
        );
        assert!(value["metrics"]["sharpe_ratio"]["status"].is_string());
    }

    // ─── CSV ────────────────────────────────────────────────────────

    #[test]
    fn csv_headers() {
        let result = sample_result();
        let trades = export_trades_csv(&result.report.trades).unwrap();
        assert!(trades.starts_with("id,symbol,side,quantity,entry_time"));

        let equity = export_equity_csv(&result.report.equity_curve).unwrap();
        assert!(equity.starts_with("timestamp,cash,positions_value,total_value"));
        assert_eq!(equity.lines().count(), result.report.equity_curve.len() + 1);

        let orders = export_orders_csv(&result.report.orders).unwrap();
        assert!(orders.starts_with("id,symbol,side,order_type"));
        assert_eq!(orders.lines().count(), result.report.orders.len() + 1);
    }

    #[test]
    fn csv_empty_trades() {
        let csv = export_trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    // ─── Artifacts ──────────────────────────────────────────────────

    #[test]
    fn save_load_artifacts_roundtrip() {
        let result = sample_result();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        save_artifacts(&result, &out).unwrap();

        for name in ["result.json", "trades.csv", "equity.csv", "orders.csv"] {
            assert!(out.join(name).exists(), "{name} missing");
        }
        let loaded = load_artifacts(&out).unwrap();
        assert_eq!(loaded.schema_version, SCHEMA_VERSION);
        let (a, b) = (loaded.equity_values(), result.equity_values());
        assert_eq!(a.len(), b.len());
        assert!(a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-9));
    }

    #[test]
    fn load_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_artifacts(&dir.path().join("nope")),
            Err(ExportError::Io { .. })
        ));
    }

    // ─── Markdown ───────────────────────────────────────────────────

    #[test]
    fn markdown_report_has_sections() {
        let md = generate_report(&sample_result());
        assert!(md.contains("# Backtest Report"));
        assert!(md.contains("## Performance Summary"));
        assert!(md.contains("## Trades"));
        assert!(md.contains("**SYNTHETIC**"));
        assert!(!md.contains("INCOMPLETE"));
    }
}
