//! Performance metrics — pure functions that compute run statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, value
//! out. Ratios that can divide by zero return [`Ratio::Undefined`] with a
//! reason instead of a sentinel number.
//!
//! The equity curve passed to [`PerformanceMetrics::compute`] is the
//! per-snapshot total value; the initial capital is prepended so the first
//! tick's return (and any entry costs on it) is counted.

use serde::{Deserialize, Serialize};
use simtrade_core::config::MetricsConfig;
use simtrade_core::domain::{Ratio, Trade, UndefinedReason};
use simtrade_core::engine::TradeStatistics;

/// Standard deviations below this are treated as zero.
const VARIANCE_EPSILON: f64 = 1e-12;

/// Aggregate performance metrics for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub initial_capital: f64,
    pub final_equity: f64,
    /// Dollars.
    pub total_return: f64,
    pub total_return_pct: f64,
    pub annualized_return_pct: Ratio,
    pub annualized_volatility_pct: Ratio,
    pub sharpe_ratio: Ratio,
    pub sortino_ratio: Ratio,
    pub calmar_ratio: Ratio,
    /// Largest peak-to-trough decline, as a positive percentage.
    pub max_drawdown_pct: f64,
    /// Largest peak-to-trough decline in dollars.
    pub max_drawdown: f64,
    /// Total return dollars over max drawdown dollars.
    pub recovery_factor: Ratio,

    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: Ratio,
    pub profit_factor: Ratio,
    pub expectancy: Ratio,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_hours: Ratio,
    pub max_holding_hours: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub total_commission: f64,
    pub total_slippage: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from an equity curve and trade list.
    pub fn compute(
        equity_curve: &[f64],
        trades: &[Trade],
        initial_capital: f64,
        config: &MetricsConfig,
    ) -> Self {
        let mut curve = Vec::with_capacity(equity_curve.len() + 1);
        curve.push(initial_capital);
        curve.extend_from_slice(equity_curve);

        let ppy = config.periods_per_year;
        let returns = period_returns(&curve);
        let excess = excess_returns(&returns, config.risk_free_rate, ppy);
        let final_equity = *curve.last().unwrap_or(&initial_capital);
        let annualized = annualized_return(&curve, ppy);
        let (dd_pct, dd_dollars) = max_drawdown(&curve);
        let total_return = final_equity - initial_capital;
        let stats = TradeStatistics::from_trades(trades);

        Self {
            initial_capital,
            final_equity,
            total_return,
            total_return_pct: total_return_pct(&curve),
            annualized_return_pct: annualized.map(|r| r * 100.0),
            annualized_volatility_pct: annualized_volatility(&returns, ppy).map(|v| v * 100.0),
            sharpe_ratio: sharpe_ratio(&excess, ppy),
            sortino_ratio: sortino_ratio(&excess, ppy),
            calmar_ratio: calmar_ratio(annualized, dd_pct),
            max_drawdown_pct: dd_pct * 100.0,
            max_drawdown: dd_dollars,
            recovery_factor: Ratio::quotient(total_return, dd_dollars, UndefinedReason::NoDrawdown),

            total_trades: stats.total_trades,
            winning_trades: stats.winning_trades,
            losing_trades: stats.losing_trades,
            win_rate: stats.win_rate,
            profit_factor: stats.profit_factor,
            expectancy: stats.expectancy,
            avg_win: stats.avg_win,
            avg_loss: stats.avg_loss,
            largest_win: stats.largest_win,
            largest_loss: stats.largest_loss,
            avg_holding_hours: avg_holding_hours(trades),
            max_holding_hours: trades.iter().map(Trade::holding_hours).fold(0.0, f64::max),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            total_commission: stats.total_commission,
            total_slippage: stats.total_slippage,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return in percent: (final / initial - 1) * 100.
pub fn total_return_pct(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&final_eq)) if initial > 0.0 => (final_eq / initial - 1.0) * 100.0,
        _ => 0.0,
    }
}

/// Annualized return as a fraction: (final / initial)^(ppy / n_returns) - 1.
///
/// A curve that ends at or below zero annualizes to -100%.
pub fn annualized_return(equity_curve: &[f64], periods_per_year: f64) -> Ratio {
    let n_returns = equity_curve.len().saturating_sub(1);
    if n_returns == 0 {
        return Ratio::Undefined(UndefinedReason::InsufficientData);
    }
    let initial = equity_curve[0];
    let final_eq = equity_curve[n_returns];
    if initial <= 0.0 {
        return Ratio::Undefined(UndefinedReason::InsufficientData);
    }
    let growth = final_eq / initial;
    if growth <= 0.0 {
        return Ratio::Defined(-1.0);
    }
    Ratio::Defined(growth.powf(periods_per_year / n_returns as f64) - 1.0)
}

/// Sample standard deviation of returns, annualized, as a fraction.
pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> Ratio {
    if returns.len() < 2 {
        return Ratio::Undefined(UndefinedReason::InsufficientData);
    }
    Ratio::Defined(std_dev(returns) * periods_per_year.sqrt())
}

/// Annualized Sharpe ratio.
///
/// Sharpe = mean(excess returns) / std(excess returns) * sqrt(ppy).
pub fn sharpe_ratio(excess: &[f64], periods_per_year: f64) -> Ratio {
    if excess.len() < 2 {
        return Ratio::Undefined(UndefinedReason::InsufficientData);
    }
    let std = std_dev(excess);
    if std < VARIANCE_EPSILON {
        return Ratio::Undefined(UndefinedReason::ZeroVariance);
    }
    Ratio::Defined(mean_f64(excess) / std * periods_per_year.sqrt())
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Sortino = mean(excess returns) / std(negative excess returns) * sqrt(ppy).
/// Needs at least two negative returns for a sample deviation.
pub fn sortino_ratio(excess: &[f64], periods_per_year: f64) -> Ratio {
    if excess.len() < 2 {
        return Ratio::Undefined(UndefinedReason::InsufficientData);
    }
    let downside: Vec<f64> = excess.iter().copied().filter(|&r| r < 0.0).collect();
    if downside.len() < 2 {
        return Ratio::Undefined(UndefinedReason::NoDownside);
    }
    let downside_std = std_dev(&downside);
    if downside_std < VARIANCE_EPSILON {
        return Ratio::Undefined(UndefinedReason::NoDownside);
    }
    Ratio::Defined(mean_f64(excess) / downside_std * periods_per_year.sqrt())
}

/// Calmar ratio: annualized return / max drawdown, both as fractions.
pub fn calmar_ratio(annualized: Ratio, max_drawdown_fraction: f64) -> Ratio {
    let Some(annualized) = annualized.value() else {
        return annualized;
    };
    Ratio::quotient(annualized, max_drawdown_fraction, UndefinedReason::NoDrawdown)
}

/// Maximum drawdown as `(fraction, dollars)`, both non-negative.
///
/// The fraction is measured against the running peak at the trough that
/// produced it; the dollar figure is the largest absolute peak-to-trough drop.
pub fn max_drawdown(equity_curve: &[f64]) -> (f64, f64) {
    let Some(&first) = equity_curve.first() else {
        return (0.0, 0.0);
    };
    let mut peak = first;
    let mut max_fraction = 0.0_f64;
    let mut max_dollars = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        let drop = peak - eq;
        max_dollars = max_dollars.max(drop);
        if peak > 0.0 {
            max_fraction = max_fraction.max(drop / peak);
        }
    }
    (max_fraction, max_dollars)
}

/// Mean holding time of closed trades, in hours.
pub fn avg_holding_hours(trades: &[Trade]) -> Ratio {
    if trades.is_empty() {
        return Ratio::Undefined(UndefinedReason::NoTrades);
    }
    Ratio::Defined(trades.iter().map(Trade::holding_hours).sum::<f64>() / trades.len() as f64)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Per-period simple returns: equity[i] / equity[i-1] - 1.
pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn excess_returns(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> Vec<f64> {
    let per_period_rf = risk_free_rate / periods_per_year;
    returns.iter().map(|r| r - per_period_rf).collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[Trade], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;

    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}
