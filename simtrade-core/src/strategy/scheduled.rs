//! Pre-materialized signals keyed by timestamp.
//!
//! Lets an external signal source (or a test) hand the session a fixed
//! schedule: entry/exit booleans per timestamp, or fully specified intents.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{OrderSide, PortfolioSnapshot, Tick};

use super::{OrderIntent, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScheduledAction {
    /// Emit this intent as-is.
    Order(OrderIntent),
    /// Risk-sized entry, only when flat in `symbol`.
    Enter { symbol: String, side: OrderSide },
    /// Close the whole position, only when one is held.
    Exit { symbol: String },
}

impl ScheduledAction {
    fn symbol(&self) -> &str {
        match self {
            ScheduledAction::Order(intent) => &intent.symbol,
            ScheduledAction::Enter { symbol, .. } | ScheduledAction::Exit { symbol } => symbol,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScheduledSignals {
    schedule: BTreeMap<DateTime<Utc>, Vec<ScheduledAction>>,
}

impl ScheduledSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entry/exit boolean pairs for one symbol (long-only).
    pub fn from_entries_exits(
        symbol: &str,
        signals: impl IntoIterator<Item = (DateTime<Utc>, bool, bool)>,
    ) -> Self {
        let mut schedule = Self::new();
        for (at, entry, exit) in signals {
            if exit {
                schedule.push(at, ScheduledAction::Exit { symbol: symbol.to_string() });
            }
            if entry {
                schedule.push(
                    at,
                    ScheduledAction::Enter {
                        symbol: symbol.to_string(),
                        side: OrderSide::Buy,
                    },
                );
            }
        }
        schedule
    }

    pub fn push(&mut self, at: DateTime<Utc>, action: ScheduledAction) {
        self.schedule.entry(at).or_default().push(action);
    }

    /// Builder form of `push` for a concrete intent.
    pub fn at(mut self, at: DateTime<Utc>, intent: OrderIntent) -> Self {
        self.push(at, ScheduledAction::Order(intent));
        self
    }

    pub fn len(&self) -> usize {
        self.schedule.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }
}

impl Strategy for ScheduledSignals {
    fn produce_orders(&mut self, tick: &Tick, portfolio: &PortfolioSnapshot) -> Vec<OrderIntent> {
        let Some(actions) = self.schedule.get(&tick.timestamp) else {
            return Vec::new();
        };
        actions
            .iter()
            .filter(|a| a.symbol() == tick.symbol)
            .filter_map(|action| match action {
                ScheduledAction::Order(intent) => Some(intent.clone()),
                ScheduledAction::Enter { symbol, side } => (portfolio.position_quantity(symbol).abs()
                    < 1e-9)
                    .then(|| OrderIntent::risk_sized(symbol.clone(), *side)),
                ScheduledAction::Exit { symbol } => (portfolio.position_quantity(symbol).abs()
                    >= 1e-9)
                    .then(|| OrderIntent::target(symbol.clone(), 0.0)),
            })
            .collect()
    }

    fn name(&self) -> &str {
        "scheduled"
    }
}
