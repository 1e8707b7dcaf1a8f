use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// High-water mark, drawdown and the per-day loss accumulator.
///
/// Updated by the replay session after every snapshot; read by the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub peak_equity: f64,
    pub current_equity: f64,
    /// `(peak - current) / peak`, as a fraction.
    pub drawdown: f64,
    pub trading_day: Option<NaiveDate>,
    pub day_start_equity: f64,
    /// Realized plus unrealized P&L since the start of the trading day.
    pub daily_pnl: f64,
    pub trades_today: usize,
}

impl RiskState {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            peak_equity: initial_equity,
            current_equity: initial_equity,
            drawdown: 0.0,
            trading_day: None,
            day_start_equity: initial_equity,
            daily_pnl: 0.0,
            trades_today: 0,
        }
    }

    /// Start a new trading day when `date` differs from the current one.
    /// Start-of-day equity is the last known equity. Returns true on a roll.
    pub fn roll_day(&mut self, date: NaiveDate) -> bool {
        if self.trading_day == Some(date) {
            return false;
        }
        self.trading_day = Some(date);
        self.day_start_equity = self.current_equity;
        self.daily_pnl = 0.0;
        self.trades_today = 0;
        true
    }

    /// Fold in the latest total portfolio value.
    pub fn update(&mut self, total_value: f64) {
        self.current_equity = total_value;
        if total_value > self.peak_equity {
            self.peak_equity = total_value;
        }
        self.drawdown = if self.peak_equity > 0.0 {
            ((self.peak_equity - total_value) / self.peak_equity).max(0.0)
        } else {
            0.0
        };
        self.daily_pnl = total_value - self.day_start_equity;
    }

    pub fn record_trade(&mut self) {
        self.trades_today += 1;
    }
}
