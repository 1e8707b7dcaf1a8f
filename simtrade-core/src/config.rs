//! Simulation configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration:
//!
//! ```toml
//! initial_capital = 10000.0
//!
//! [execution]
//! commission_rate = 0.001
//! slippage_rate = 0.0005
//!
//! [risk]
//! max_position_size_pct = 0.20
//! max_drawdown_pct = 0.15
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration for one simulation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub initial_capital: f64,
    pub execution: ExecutionConfig,
    pub risk: RiskConfig,
    pub brackets: BracketConfig,
    pub metrics: MetricsConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            execution: ExecutionConfig::default(),
            risk: RiskConfig::default(),
            brackets: BracketConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Slippage, commission, and optional volume participation cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Fraction of fill notional charged as commission.
    pub commission_rate: f64,
    /// Fraction by which fills are moved against the trader.
    pub slippage_rate: f64,
    /// Max fraction of a tick's volume one order may take. `None` = unlimited.
    pub max_participation: Option<f64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            commission_rate: 0.001,
            slippage_rate: 0.0005,
            max_participation: None,
        }
    }
}

impl ExecutionConfig {
    pub fn frictionless() -> Self {
        Self {
            commission_rate: 0.0,
            slippage_rate: 0.0,
            max_participation: None,
        }
    }
}

/// Pre-trade limits and sizing parameters. All values are fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// When false the gate accepts every order.
    pub enabled: bool,
    pub max_position_size_pct: f64,
    pub max_total_exposure_pct: f64,
    pub max_drawdown_pct: f64,
    pub max_daily_loss_pct: f64,
    /// Dollar risk budget per trade as a fraction of portfolio value.
    pub risk_per_trade_pct: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_position_size_pct: 0.20,
            max_total_exposure_pct: 0.95,
            max_drawdown_pct: 0.15,
            max_daily_loss_pct: 0.05,
            risk_per_trade_pct: 0.02,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
        }
    }
}

/// Automatic stop-loss / take-profit placement on position open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BracketConfig {
    pub auto_stop_loss: bool,
    pub auto_take_profit: bool,
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self {
            auto_stop_loss: true,
            auto_take_profit: true,
        }
    }
}

impl BracketConfig {
    pub fn disabled() -> Self {
        Self {
            auto_stop_loss: false,
            auto_take_profit: false,
        }
    }

    pub fn any(&self) -> bool {
        self.auto_stop_loss || self.auto_take_profit
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Snapshots per year, used to annualise per-period statistics.
    pub periods_per_year: f64,
    /// Annual risk-free rate subtracted in Sharpe/Sortino.
    pub risk_free_rate: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
        }
    }
}

impl SimConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }

        let unit_fields = [
            ("execution.commission_rate", self.execution.commission_rate),
            ("execution.slippage_rate", self.execution.slippage_rate),
            ("risk.max_position_size_pct", self.risk.max_position_size_pct),
            ("risk.max_drawdown_pct", self.risk.max_drawdown_pct),
            ("risk.max_daily_loss_pct", self.risk.max_daily_loss_pct),
            ("risk.risk_per_trade_pct", self.risk.risk_per_trade_pct),
            ("risk.stop_loss_pct", self.risk.stop_loss_pct),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        // Leverage above 1x is allowed, but not unbounded or negative.
        if !(0.0..=10.0).contains(&self.risk.max_total_exposure_pct) {
            return Err(ConfigError::Invalid(format!(
                "risk.max_total_exposure_pct must be within [0, 10], got {}",
                self.risk.max_total_exposure_pct
            )));
        }
        if !self.risk.take_profit_pct.is_finite() || self.risk.take_profit_pct < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "risk.take_profit_pct must be non-negative, got {}",
                self.risk.take_profit_pct
            )));
        }
        if let Some(p) = self.execution.max_participation {
            if !(p > 0.0 && p <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "execution.max_participation must be within (0, 1], got {p}"
                )));
            }
        }
        if !self.metrics.periods_per_year.is_finite() || self.metrics.periods_per_year <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "metrics.periods_per_year must be positive, got {}",
                self.metrics.periods_per_year
            )));
        }
        Ok(())
    }

    /// BLAKE3 hash of the canonical JSON form. Identical configs share a fingerprint.
    pub fn fingerprint(&self) -> String {
        // Serializing plain numeric/bool structs to JSON cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = SimConfig::from_toml_str("").unwrap();
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.initial_capital, 10_000.0);
        assert_eq!(config.execution.commission_rate, 0.001);
        assert_eq!(config.execution.slippage_rate, 0.0005);
        assert_eq!(config.risk.max_position_size_pct, 0.20);
        assert_eq!(config.risk.max_total_exposure_pct, 0.95);
        assert_eq!(config.risk.max_drawdown_pct, 0.15);
        assert_eq!(config.risk.max_daily_loss_pct, 0.05);
        assert_eq!(config.risk.risk_per_trade_pct, 0.02);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = SimConfig::from_toml_str(
            r#"
initial_capital = 50000.0

[risk]
max_drawdown_pct = 0.10
"#,
        )
        .unwrap();
        assert_eq!(config.initial_capital, 50_000.0);
        assert_eq!(config.risk.max_drawdown_pct, 0.10);
        assert_eq!(config.risk.max_position_size_pct, 0.20);
        assert!(config.risk.enabled);
    }

    #[test]
    fn out_of_range_fraction_rejected() {
        let err = SimConfig::from_toml_str("[execution]\ncommission_rate = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("commission_rate"));
    }

    #[test]
    fn non_positive_capital_rejected() {
        assert!(SimConfig::from_toml_str("initial_capital = 0.0\n").is_err());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = SimConfig::from_toml_str("initial_capital = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let mut config = SimConfig::default();
        config.execution.max_participation = Some(0.1);
        let text = config.to_toml_string().unwrap();
        assert_eq!(SimConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = SimConfig::default();
        let mut b = SimConfig::default();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.risk.max_drawdown_pct = 0.2;
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
