//! Trade-log statistics shared by the ledger and the post-run metrics.

use serde::{Deserialize, Serialize};

use crate::domain::{Ratio, Trade, UndefinedReason};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Winners over all closed trades, as a fraction.
    pub win_rate: Ratio,
    /// Gross winning P&L over absolute gross losing P&L.
    pub profit_factor: Ratio,
    /// Mean realized P&L per trade, in dollars.
    pub expectancy: Ratio,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub total_commission: f64,
    pub total_slippage: f64,
}

impl TradeStatistics {
    pub fn from_trades(trades: &[Trade]) -> Self {
        let total = trades.len();
        let winners: Vec<f64> = trades
            .iter()
            .filter(|t| t.realized_pnl > 0.0)
            .map(|t| t.realized_pnl)
            .collect();
        let losers: Vec<f64> = trades
            .iter()
            .filter(|t| t.realized_pnl < 0.0)
            .map(|t| t.realized_pnl)
            .collect();

        let gross_profit: f64 = winners.iter().sum();
        let gross_loss: f64 = losers.iter().sum::<f64>().abs();
        let net: f64 = trades.iter().map(|t| t.realized_pnl).sum();

        let (win_rate, profit_factor, expectancy) = if total == 0 {
            let none = Ratio::Undefined(UndefinedReason::NoTrades);
            (none, none, none)
        } else {
            (
                Ratio::Defined(winners.len() as f64 / total as f64),
                Ratio::quotient(gross_profit, gross_loss, UndefinedReason::NoLosingTrades),
                Ratio::Defined(net / total as f64),
            )
        };

        Self {
            total_trades: total,
            winning_trades: winners.len(),
            losing_trades: losers.len(),
            win_rate,
            profit_factor,
            expectancy,
            avg_win: mean(&winners),
            avg_loss: mean(&losers),
            largest_win: winners.iter().copied().fold(0.0, f64::max),
            largest_loss: losers.iter().copied().fold(0.0, f64::min),
            gross_profit,
            gross_loss,
            total_commission: trades.iter().map(|t| t.commission).sum(),
            total_slippage: trades.iter().map(|t| t.slippage).sum(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
