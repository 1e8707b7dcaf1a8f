//! Tagged ratio result for statistics that can divide by zero.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a ratio has no numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UndefinedReason {
    NoTrades,
    NoLosingTrades,
    ZeroVariance,
    InsufficientData,
    NoDownside,
    NoDrawdown,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UndefinedReason::NoTrades => "no trades",
            UndefinedReason::NoLosingTrades => "no losing trades",
            UndefinedReason::ZeroVariance => "zero variance",
            UndefinedReason::InsufficientData => "insufficient data",
            UndefinedReason::NoDownside => "no downside deviation",
            UndefinedReason::NoDrawdown => "no drawdown",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ratio {
    Defined(f64),
    Undefined(UndefinedReason),
}

impl Ratio {
    /// `numerator / denominator`, or `Undefined(reason)` when the
    /// denominator is (numerically) zero.
    pub fn quotient(numerator: f64, denominator: f64, reason: UndefinedReason) -> Self {
        if denominator.abs() < 1e-15 || !denominator.is_finite() {
            Ratio::Undefined(reason)
        } else {
            Ratio::Defined(numerator / denominator)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Ratio::Defined(v) => Some(*v),
            Ratio::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Ratio::Defined(_))
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Ratio::Defined(v) => Ratio::Defined(f(v)),
            undefined => undefined,
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::Defined(v) => write!(f, "{v:.4}"),
            Ratio::Undefined(reason) => write!(f, "undefined ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_denominator_is_undefined() {
        let r = Ratio::quotient(5.0, 0.0, UndefinedReason::NoLosingTrades);
        assert_eq!(r, Ratio::Undefined(UndefinedReason::NoLosingTrades));
        assert_eq!(r.value(), None);
        assert_eq!(r.to_string(), "undefined (no losing trades)");
    }

    #[test]
    fn serializes_as_tagged_object() {
        let json = serde_json::to_string(&Ratio::Defined(1.5)).unwrap();
        assert_eq!(json, r#"{"status":"DEFINED","value":1.5}"#);
        let json = serde_json::to_string(&Ratio::Undefined(UndefinedReason::ZeroVariance)).unwrap();
        assert_eq!(json, r#"{"status":"UNDEFINED","value":"ZERO_VARIANCE"}"#);
    }
}
