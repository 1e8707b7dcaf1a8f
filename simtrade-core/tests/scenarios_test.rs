//! Worked scenarios for the execution and risk core.
//!
//! Each test drives a full session with a fixed schedule of intents so the
//! expected cash, fills and P&L can be computed by hand.

use chrono::{DateTime, Duration, TimeZone, Utc};
use simtrade_core::config::{BracketConfig, ExecutionConfig, SimConfig};
use simtrade_core::domain::{ExitReason, OrderStatus, Tick};
use simtrade_core::engine::{RejectionKind, Session};
use simtrade_core::strategy::{OrderIntent, ScheduledSignals};

fn t(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap() + Duration::minutes(n)
}

fn ticks(prices: &[f64]) -> Vec<Tick> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| Tick::new("SPY", p, t(i as i64)))
        .collect()
}

// ── Scenario A: market buy with costs ────────────────────────────────

#[test]
fn market_buy_pays_slippage_and_commission() {
    let config = SimConfig {
        brackets: BracketConfig::disabled(),
        ..SimConfig::default()
    };
    let strategy = ScheduledSignals::new().at(t(0), OrderIntent::buy("SPY", 10.0));
    let report = Session::new(config, Box::new(strategy)).run(ticks(&[100.0]));

    let order = &report.orders[0];
    assert_eq!(order.status, OrderStatus::Filled);
    assert!((order.avg_fill_price.unwrap() - 100.05).abs() < 1e-9);
    assert!((order.commission - 1.0005).abs() < 1e-9);

    let snap = report.final_snapshot().unwrap();
    assert!((snap.cash - 8_998.4995).abs() < 1e-6);
    let pos = snap.position("SPY").unwrap();
    assert_eq!(pos.quantity, 10.0);
    assert!((pos.avg_entry_price - 100.05).abs() < 1e-9);
}

// ── Scenario B: protective stop ──────────────────────────────────────

#[test]
fn stop_loss_closes_position() {
    let config = SimConfig {
        brackets: BracketConfig {
            auto_stop_loss: true,
            auto_take_profit: false,
        },
        ..SimConfig::default()
    };
    let strategy = ScheduledSignals::new().at(t(0), OrderIntent::buy("SPY", 10.0));
    let report = Session::new(config, Box::new(strategy)).run(ticks(&[100.0, 98.0]));

    assert_eq!(report.trades.len(), 1);
    let trade = &report.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert!((trade.exit_price - 98.0 * 0.9995).abs() < 1e-9);
    assert!(
        trade.realized_pnl < -21.0 && trade.realized_pnl > -22.0,
        "pnl {}",
        trade.realized_pnl
    );
    assert!(report.final_snapshot().unwrap().is_flat());
    assert!(report.orders.iter().all(|o| o.status == OrderStatus::Filled));
}

// ── Scenario C: position-size limit ──────────────────────────────────

#[test]
fn oversized_order_never_reaches_the_book() {
    let strategy = ScheduledSignals::new().at(t(0), OrderIntent::buy("SPY", 25.0));
    let report = Session::new(SimConfig::default(), Box::new(strategy)).run(ticks(&[100.0]));

    assert_eq!(report.rejections.len(), 1);
    let rejection = &report.rejections[0];
    assert_eq!(rejection.kind, RejectionKind::Risk);
    assert!(rejection.reason.starts_with("position size exceeds limit"));

    assert_eq!(report.order_statistics.submitted, 0);
    assert_eq!(report.orders.len(), 1);
    assert_eq!(report.orders[0].status, OrderStatus::Rejected);
    assert_eq!(report.orders[0].id, rejection.order_id.unwrap());
    assert!(report.final_snapshot().unwrap().is_flat());
}

// ── Scenario D: drawdown breaker ─────────────────────────────────────

#[test]
fn drawdown_breaker_blocks_opening_allows_closing() {
    let mut config = SimConfig {
        execution: ExecutionConfig::frictionless(),
        brackets: BracketConfig::disabled(),
        ..SimConfig::default()
    };
    config.risk.max_position_size_pct = 1.0;
    config.risk.max_total_exposure_pct = 1.0;

    // 10k -> 8.4k is a 16% drawdown against a 15% limit.
    let strategy = ScheduledSignals::new()
        .at(t(0), OrderIntent::buy("SPY", 50.0))
        .at(t(1), OrderIntent::buy("SPY", 1.0))
        .at(t(1), OrderIntent::sell("SPY", 50.0));
    let report = Session::new(config, Box::new(strategy)).run(ticks(&[100.0, 68.0]));

    assert_eq!(report.rejections.len(), 1);
    assert!(report.rejections[0].reason.starts_with("drawdown limit breached"));

    assert_eq!(report.trades.len(), 1);
    assert!((report.trades[0].realized_pnl + 1_600.0).abs() < 1e-9);
    let snap = report.final_snapshot().unwrap();
    assert!(snap.is_flat());
    assert!((snap.total_value - 8_400.0).abs() < 1e-9);
}

// ── Boundary: limit equal to the tick ────────────────────────────────

#[test]
fn limit_buy_at_tick_price_fills_at_limit() {
    let config = SimConfig {
        brackets: BracketConfig::disabled(),
        ..SimConfig::default()
    };
    let strategy = ScheduledSignals::new().at(t(0), OrderIntent::buy("SPY", 10.0).limit(100.0));
    let report = Session::new(config, Box::new(strategy)).run(ticks(&[100.0]));

    let order = &report.orders[0];
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.avg_fill_price, Some(100.0));
    assert_eq!(order.slippage, 0.0);
    assert!((order.commission - 1.0).abs() < 1e-12);
}
