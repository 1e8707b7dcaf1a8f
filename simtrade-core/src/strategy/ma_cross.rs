//! Moving average crossover on tick prices
//!
//! Long-only trend follower:
//! - Enter (risk-sized BUY) when the fast SMA crosses above the slow SMA
//!   while flat
//! - Exit (target zero) when the fast SMA crosses below the slow SMA while
//!   long

use std::collections::{BTreeMap, VecDeque};

use crate::domain::{OrderSide, PortfolioSnapshot, Tick};

use super::{OrderIntent, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cross {
    Bullish,
    Bearish,
}

/// Moving average crossover
///
/// # Parameters
/// - `fast_period`: short SMA window, in ticks (e.g. 10)
/// - `slow_period`: long SMA window, in ticks (e.g. 30)
///
/// Prices are tracked per symbol, so one instance can trade several symbols.
#[derive(Debug, Clone)]
pub struct MovingAverageCross {
    fast_period: usize,
    slow_period: usize,
    history: BTreeMap<String, VecDeque<f64>>,
    name: String,
}

impl MovingAverageCross {
    /// Returns `None` unless `0 < fast_period < slow_period`.
    pub fn new(fast_period: usize, slow_period: usize) -> Option<Self> {
        if fast_period == 0 || slow_period <= fast_period {
            return None;
        }
        Some(Self {
            fast_period,
            slow_period,
            history: BTreeMap::new(),
            name: format!("ma_cross_{fast_period}_{slow_period}"),
        })
    }

    pub fn fast_period(&self) -> usize {
        self.fast_period
    }

    pub fn slow_period(&self) -> usize {
        self.slow_period
    }

    /// Simple moving average of the last `period` prices, skipping the
    /// newest `skip`.
    fn sma(prices: &VecDeque<f64>, period: usize, skip: usize) -> Option<f64> {
        let end = prices.len().checked_sub(skip)?;
        let start = end.checked_sub(period)?;
        let sum: f64 = prices.range(start..end).sum();
        Some(sum / period as f64)
    }

    fn detect_cross(&self, prices: &VecDeque<f64>) -> Option<Cross> {
        let fast_now = Self::sma(prices, self.fast_period, 0)?;
        let slow_now = Self::sma(prices, self.slow_period, 0)?;
        let fast_prev = Self::sma(prices, self.fast_period, 1)?;
        let slow_prev = Self::sma(prices, self.slow_period, 1)?;

        if fast_prev <= slow_prev && fast_now > slow_now {
            Some(Cross::Bullish)
        } else if fast_prev >= slow_prev && fast_now < slow_now {
            Some(Cross::Bearish)
        } else {
            None
        }
    }
}

impl Strategy for MovingAverageCross {
    fn produce_orders(&mut self, tick: &Tick, portfolio: &PortfolioSnapshot) -> Vec<OrderIntent> {
        // One extra price to compare against the previous tick's averages
        let window = self.slow_period + 1;
        let prices = self.history.entry(tick.symbol.clone()).or_default();
        prices.push_back(tick.price);
        while prices.len() > window {
            prices.pop_front();
        }

        let Some(cross) = self.history.get(&tick.symbol).and_then(|p| self.detect_cross(p)) else {
            return Vec::new();
        };

        let held = portfolio.position_quantity(&tick.symbol);
        match cross {
            Cross::Bullish if held.abs() < 1e-9 => {
                vec![OrderIntent::risk_sized(tick.symbol.clone(), OrderSide::Buy)]
            }
            Cross::Bearish if held > 0.0 => vec![OrderIntent::target(tick.symbol.clone(), 0.0)],
            _ => Vec::new(),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
