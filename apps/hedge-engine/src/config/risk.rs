//! Risk aggregation configuration: VaR parameters and stress scenarios.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the gamma term combines with delta VaR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GammaMode {
    /// `VaR = VaR_delta - ½·Γ·(z·S·σ_h)²`, floored at zero.
    #[default]
    Additive,
    /// Delta-gamma-normal: `z·sqrt((Δ·S·σ_h)² + ½·(Γ·S²·σ_h²)²)`.
    Multiplicative,
    /// Delta VaR only.
    None,
}

/// One stress scenario. Shocks are fractions (-0.1 = down 10%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    /// Scenario label.
    pub name: String,
    /// Relative spot move.
    #[serde(default)]
    pub spot_shock: Decimal,
    /// Relative volatility move.
    #[serde(default)]
    pub vol_shock: f64,
}

impl StressScenario {
    /// Scenario from a label and shocks.
    #[must_use]
    pub fn new(name: &str, spot_shock: Decimal, vol_shock: f64) -> Self {
        Self {
            name: name.to_string(),
            spot_shock,
            vol_shock,
        }
    }
}

/// Risk aggregation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// VaR confidence level.
    #[serde(default = "default_confidence")]
    pub var_confidence: f64,
    /// VaR horizon in days.
    #[serde(default = "default_horizon_days")]
    pub var_horizon_days: f64,
    /// Gamma combination rule.
    #[serde(default)]
    pub gamma_mode: GammaMode,
    /// Maximum age of a market observation.
    #[serde(default = "default_max_data_age")]
    pub max_data_age_secs: u64,
    /// Stress scenarios.
    #[serde(default = "default_stress_scenarios")]
    pub stress_scenarios: Vec<StressScenario>,
}

impl RiskConfig {
    /// Maximum data age as a duration.
    #[must_use]
    pub const fn max_data_age(&self) -> Duration {
        Duration::from_secs(self.max_data_age_secs)
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            var_confidence: default_confidence(),
            var_horizon_days: default_horizon_days(),
            gamma_mode: GammaMode::default(),
            max_data_age_secs: default_max_data_age(),
            stress_scenarios: default_stress_scenarios(),
        }
    }
}

const fn default_confidence() -> f64 {
    0.95
}

const fn default_horizon_days() -> f64 {
    1.0
}

const fn default_max_data_age() -> u64 {
    60
}

/// Spot ±10% and ±20%, volatility ±50%.
#[must_use]
pub fn default_stress_scenarios() -> Vec<StressScenario> {
    vec![
        StressScenario::new("spot_down_20", Decimal::new(-20, 2), 0.0),
        StressScenario::new("spot_down_10", Decimal::new(-10, 2), 0.0),
        StressScenario::new("spot_up_10", Decimal::new(10, 2), 0.0),
        StressScenario::new("spot_up_20", Decimal::new(20, 2), 0.0),
        StressScenario::new("vol_down_50", Decimal::ZERO, -0.5),
        StressScenario::new("vol_up_50", Decimal::ZERO, 0.5),
    ]
}
