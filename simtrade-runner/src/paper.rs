//! Paper trading: the same session, fed from a channel instead of a file.
//!
//! The feed runs on its own thread and pushes ticks into an `mpsc` channel;
//! [`run_paper`] consumes them on the calling thread until the sender hangs
//! up, the replay aborts, or the cancel flag is raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use simtrade_core::config::SimConfig;
use simtrade_core::domain::{PortfolioSnapshot, Tick};
use simtrade_core::engine::RunReport;
use simtrade_core::strategy::Strategy;
use simtrade_core::Session;

use crate::metrics::PerformanceMetrics;
use crate::runner::RunError;

/// Outcome of a paper-trading session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperResult {
    pub metrics: PerformanceMetrics,
    pub report: RunReport,
    /// True when the cancel flag ended the session early.
    pub cancelled: bool,
}

/// Consume ticks from `rx` until the feed closes.
///
/// `on_snapshot` sees the portfolio after every processed tick.
pub fn run_paper<F>(
    config: &SimConfig,
    strategy: Box<dyn Strategy>,
    rx: Receiver<Tick>,
    cancel: &AtomicBool,
    mut on_snapshot: F,
) -> Result<PaperResult, RunError>
where
    F: FnMut(&PortfolioSnapshot),
{
    config.validate()?;
    let mut session = Session::new(config.clone(), strategy);
    let mut cancelled = false;

    info!("paper session started");
    for tick in rx.iter() {
        if cancel.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }
        if let Err(err) = session.on_tick(&tick) {
            warn!(error = %err, "paper session aborted");
            break;
        }
        if let Some(snapshot) = session.equity_curve().last() {
            on_snapshot(snapshot);
        }
    }
    if cancel.load(Ordering::Relaxed) {
        cancelled = true;
    }

    let report = session.finish();
    let metrics = PerformanceMetrics::compute(
        &report.equity_values(),
        &report.trades,
        config.initial_capital,
        &config.metrics,
    );
    info!(
        ticks = report.ticks_processed,
        trades = metrics.total_trades,
        cancelled,
        "paper session finished"
    );

    Ok(PaperResult {
        metrics,
        report,
        cancelled,
    })
}

/// Replay `ticks` into a channel from a background thread, sleeping
/// `interval` between sends. Stops early when the receiver is dropped or
/// `cancel` is raised.
pub fn spawn_feed(
    ticks: Vec<Tick>,
    interval: Duration,
    cancel: Arc<AtomicBool>,
) -> std::io::Result<(Receiver<Tick>, JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("simtrade-feed".into())
        .spawn(move || {
            for tick in ticks {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                if tx.send(tick).is_err() {
                    debug!("feed receiver dropped");
                    break;
                }
                if !interval.is_zero() {
                    thread::sleep(interval);
                }
            }
        })?;
    Ok((rx, handle))
}
