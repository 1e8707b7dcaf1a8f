//! Price tick — the only market input the engine consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TickError {
    #[error("tick for {symbol} at {timestamp} has invalid price {price}")]
    InvalidPrice {
        symbol: String,
        timestamp: DateTime<Utc>,
        price: f64,
    },
    #[error("tick for {symbol} at {timestamp} has invalid volume {volume}")]
    InvalidVolume {
        symbol: String,
        timestamp: DateTime<Utc>,
        volume: f64,
    },
    #[error("tick has an empty symbol")]
    EmptySymbol,
}

/// One observed price for one symbol.
///
/// `volume` is optional; it only matters when a participation limit is
/// configured, in which case it caps how much of an order can fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Reject ticks that would poison the ledger (NaN, zero or negative prices).
    pub fn validate(&self) -> Result<(), TickError> {
        if self.symbol.is_empty() {
            return Err(TickError::EmptySymbol);
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(TickError::InvalidPrice {
                symbol: self.symbol.clone(),
                timestamp: self.timestamp,
                price: self.price,
            });
        }
        if let Some(volume) = self.volume {
            if !volume.is_finite() || volume < 0.0 {
                return Err(TickError::InvalidVolume {
                    symbol: self.symbol.clone(),
                    timestamp: self.timestamp,
                    volume,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap()
    }

    #[test]
    fn valid_tick_passes() {
        assert!(Tick::new("AAPL", 187.5, ts()).with_volume(1_000.0).validate().is_ok());
    }

    #[test]
    fn non_positive_or_nan_price_rejected() {
        assert!(Tick::new("AAPL", 0.0, ts()).validate().is_err());
        assert!(Tick::new("AAPL", -1.0, ts()).validate().is_err());
        assert!(Tick::new("AAPL", f64::NAN, ts()).validate().is_err());
    }

    #[test]
    fn negative_volume_rejected() {
        let tick = Tick::new("AAPL", 10.0, ts()).with_volume(-5.0);
        assert!(matches!(tick.validate(), Err(TickError::InvalidVolume { .. })));
    }

    #[test]
    fn missing_volume_deserializes_as_none() {
        let json = r#"{"symbol":"MSFT","price":410.0,"timestamp":"2024-03-01T14:30:00Z"}"#;
        let tick: Tick = serde_json::from_str(json).unwrap();
        assert_eq!(tick.volume, None);
        assert_eq!(tick.timestamp, ts());
    }
}
