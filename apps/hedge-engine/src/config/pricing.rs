//! Pricing model configuration for options and risk calculations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Pricing model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Risk-free rate (annualized).
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Continuous carry applied to the underlying.
    #[serde(default)]
    pub carry: f64,
    /// Volatility used when neither the tick nor a forecaster supplies one.
    #[serde(default = "default_volatility")]
    pub default_volatility: f64,
    /// Fixed perpetual beta; when absent the beta estimator decides.
    #[serde(default)]
    pub perp_beta: Option<Decimal>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: default_risk_free_rate(),
            carry: 0.0,
            default_volatility: default_volatility(),
            perp_beta: None,
        }
    }
}

pub(crate) const fn default_risk_free_rate() -> f64 {
    0.05
}

const fn default_volatility() -> f64 {
    0.6
}

pub(crate) const fn default_true() -> bool {
    true
}
