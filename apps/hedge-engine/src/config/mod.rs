//! Configuration module for the hedge engine.
//!
//! Provides configuration loading, validation, and environment variable
//! interpolation for every engine component.
//!
//! # Usage
//!
//! ```rust,ignore
//! use hedge_engine::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/config.yaml"))?;
//!
//! println!("delta band: ±{}", config.hedging.delta_threshold);
//! ```

mod backtest;
mod cell;
mod execution;
mod hedging;
mod live;
mod observability;
mod pricing;
mod risk;

use std::sync::LazyLock;

use regex::{Captures, Regex};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use backtest::{BacktestConfig, RollPolicy, SweepConfig};
pub use cell::ConfigCell;
pub use execution::{
    ExecutionConfig, FeeSchedule, FeeTier, OptionFeeConfig, PartialFillConfig, SlippageModel,
};
pub use hedging::{
    BetaConfig, HedgeInstrumentKind, HedgeMode, HedgingConfig, RegimeConfig, SizingTarget,
};
pub use live::LiveConfig;
pub use observability::{LogFormat, LoggingConfig, ObservabilityConfig};
pub use pricing::PricingConfig;
pub use risk::{GammaMode, RiskConfig, StressScenario, default_stress_scenarios};

use crate::error::ErrorKind;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Every configuration failure is bad input.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pricing model configuration.
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Risk aggregation configuration.
    #[serde(default)]
    pub risk: RiskConfig,
    /// Hedging decision configuration.
    #[serde(default)]
    pub hedging: HedgingConfig,
    /// Execution simulator configuration.
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Backtest configuration.
    #[serde(default)]
    pub backtest: BacktestConfig,
    /// Live pipeline configuration.
    #[serde(default)]
    pub live: LiveConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<EngineConfig, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<EngineConfig, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: EngineConfig = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// `${VAR}` or `${VAR:-fallback}`.
#[allow(clippy::expect_used)]
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("static pattern")
});

/// Substitute environment references. Unset or empty variables take the
/// fallback, or the empty string when there is none.
fn interpolate_env_vars(input: &str) -> String {
    ENV_REFERENCE
        .replace_all(input, |caps: &Captures<'_>| {
            std::env::var(&caps[1])
                .ok()
                .filter(|value| !value.is_empty())
                .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

/// Validate configuration values.
pub(crate) fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    let pricing = &config.pricing;
    if !(0.0..=1.0).contains(&pricing.risk_free_rate) {
        return Err(invalid("risk_free_rate must be between 0.0 and 1.0"));
    }
    if !pricing.default_volatility.is_finite() || pricing.default_volatility <= 0.0 {
        return Err(invalid("default_volatility must be positive"));
    }
    if let Some(beta) = pricing.perp_beta {
        if beta <= Decimal::ZERO {
            return Err(invalid("perp_beta must be positive"));
        }
    }

    let risk = &config.risk;
    if !(risk.var_confidence > 0.5 && risk.var_confidence < 1.0) {
        return Err(invalid("var_confidence must be in (0.5, 1.0)"));
    }
    if !risk.var_horizon_days.is_finite() || risk.var_horizon_days <= 0.0 {
        return Err(invalid("var_horizon_days must be positive"));
    }
    if risk
        .stress_scenarios
        .iter()
        .any(|s| s.spot_shock <= Decimal::NEGATIVE_ONE || s.vol_shock <= -1.0)
    {
        return Err(invalid("stress shocks must stay above -100%"));
    }

    let hedging = &config.hedging;
    if hedging.delta_threshold <= Decimal::ZERO {
        return Err(invalid("delta_threshold must be positive"));
    }
    if hedging.hedge_ratio < Decimal::ZERO || hedging.hedge_ratio > Decimal::ONE {
        return Err(invalid("hedge_ratio must be between 0 and 1"));
    }
    if hedging.lot_size <= Decimal::ZERO {
        return Err(invalid("lot_size must be positive"));
    }
    if hedging.max_order_size < hedging.lot_size {
        return Err(invalid("max_order_size must be at least one lot"));
    }
    if hedging.breach_confirmations == 0 {
        return Err(invalid("breach_confirmations must be at least 1"));
    }
    if hedging.regime.fast_window == 0 || hedging.regime.fast_window >= hedging.regime.slow_window
    {
        return Err(invalid("regime.fast_window must be positive and below slow_window"));
    }
    if hedging.close_in_bullish_regime && !hedging.timing_signal_enabled {
        return Err(invalid("close_in_bullish_regime requires timing_signal_enabled"));
    }

    let execution = &config.execution;
    if execution.max_fillable_fraction <= Decimal::ZERO {
        return Err(invalid("max_fillable_fraction must be positive"));
    }
    let partial = &execution.partial_fills;
    if !(0.0..=1.0).contains(&partial.probability) {
        return Err(invalid("partial_fills.probability must be between 0.0 and 1.0"));
    }
    if partial.min_fill_fraction <= Decimal::ZERO
        || partial.min_fill_fraction > partial.max_fill_fraction
        || partial.max_fill_fraction > Decimal::ONE
    {
        return Err(invalid(
            "partial_fills fractions must satisfy 0 < min <= max <= 1",
        ));
    }

    let backtest = &config.backtest;
    if backtest.spot_quantity < Decimal::ZERO {
        return Err(invalid("spot_quantity must not be negative"));
    }
    if backtest.periods_per_year == 0 {
        return Err(invalid("periods_per_year must be positive"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert!((config.pricing.risk_free_rate - 0.05).abs() < f64::EPSILON);
        assert!((config.risk.var_confidence - 0.95).abs() < f64::EPSILON);
        assert_eq!(config.risk.gamma_mode, GammaMode::Additive);
        assert_eq!(config.risk.stress_scenarios.len(), 6);
        assert_eq!(config.hedging.delta_threshold, dec!(0.1));
        assert_eq!(config.hedging.sizing_target, SizingTarget::BandEdge);
        assert_eq!(config.hedging.mode, HedgeMode::Automatic);
        assert_eq!(config.execution.fees, FeeSchedule::Fixed { bps: dec!(6) });
        assert_eq!(config.backtest.periods_per_year, 8760);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_empty_config_uses_defaults() {
        let config = match load_config_from_string("{}") {
            Ok(c) => c,
            Err(e) => panic!("should load empty config: {e}"),
        };
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_sections() {
        let yaml = r"
hedging:
  delta_threshold: 0.25
  mode: manual
  sizing_target: band_center
risk:
  gamma_mode: multiplicative
  var_confidence: 0.99
execution:
  slippage:
    model: square_root_impact
    base_bps: 2
    coefficient: 10
  fees:
    model: tiered
    tiers:
      - min_notional: 0
        bps: 6
      - min_notional: 1000000
        bps: 4
backtest:
  strategies:
    - template: protective_put
      strike: 45000
      expiry: 2026-03-27T08:00:00Z
      quantity: 1
";

        let config = match load_config_from_string(yaml) {
            Ok(c) => c,
            Err(e) => panic!("should load config: {e}"),
        };
        assert_eq!(config.hedging.delta_threshold, dec!(0.25));
        assert_eq!(config.hedging.mode, HedgeMode::Manual);
        assert_eq!(config.hedging.sizing_target, SizingTarget::BandCenter);
        assert_eq!(config.hedging.hysteresis_ticks, 3);
        assert_eq!(config.risk.gamma_mode, GammaMode::Multiplicative);
        assert!(matches!(
            config.execution.slippage,
            SlippageModel::SquareRootImpact { .. }
        ));
        let FeeSchedule::Tiered { tiers } = &config.execution.fees else {
            panic!("expected tiered fees");
        };
        assert_eq!(tiers.len(), 2);
        assert_eq!(config.backtest.strategies.len(), 1);
    }

    #[test]
    fn test_env_var_with_default_when_missing() {
        let input = "level: ${HEDGE_CONFIG_TEST_NONEXISTENT_VAR:-debug}";
        let result = interpolate_env_vars(input);
        assert_eq!(result, "level: debug");
    }

    #[test]
    fn test_env_var_with_default_uses_existing() {
        let input = "path: ${PATH:-default}";
        let result = interpolate_env_vars(input);

        assert_ne!(result, "path: default");
        assert!(result.starts_with("path: "));
    }

    #[test]
    fn test_env_var_without_default_becomes_empty() {
        let input = "metrics_addr: ${HEDGE_CONFIG_TEST_UNLIKELY_TO_EXIST}";
        let result = interpolate_env_vars(input);
        assert_eq!(result, "metrics_addr: ");
    }

    #[test]
    fn test_validation_invalid_risk_free_rate() {
        let yaml = r"
pricing:
  risk_free_rate: 1.5
";

        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for invalid risk_free_rate");
        };
        assert!(err.to_string().contains("risk_free_rate"));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_validation_hedge_ratio_range() {
        let yaml = r"
hedging:
  hedge_ratio: 1.5
";

        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for hedge_ratio");
        };
        assert!(err.to_string().contains("hedge_ratio"));
    }

    #[test]
    fn test_bullish_close_requires_timing_signal() {
        let yaml = r"
hedging:
  close_in_bullish_regime: true
";

        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for close_in_bullish_regime");
        };
        assert!(err.to_string().contains("close_in_bullish_regime"));

        let enabled = r"
hedging:
  timing_signal_enabled: true
  close_in_bullish_regime: true
";
        let config = match load_config_from_string(enabled) {
            Ok(c) => c,
            Err(e) => panic!("should load: {e}"),
        };
        assert!(config.hedging.close_in_bullish_regime);
    }

    #[test]
    fn test_validation_invalid_log_format() {
        let yaml = r"
observability:
  logging:
    format: xml
";

        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for log format");
        };
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_missing_file() {
        let Err(err) = load_config(Some("/nonexistent/hedge.yaml")) else {
            panic!("expected read error");
        };
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
