//! Backtest configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::pricing::default_true;
use crate::strategy::StrategyTemplate;

/// How expiring strategies are rolled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollPolicy {
    /// Roll strategies entering the roll window instead of letting them expire.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Days added to every leg expiry.
    #[serde(default = "default_roll_forward_days")]
    pub roll_forward_days: i64,
    /// Strike grid used when re-centering strikes on the current spot.
    #[serde(default = "default_strike_step")]
    pub strike_step: Decimal,
}

impl Default for RollPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            roll_forward_days: default_roll_forward_days(),
            strike_step: default_strike_step(),
        }
    }
}

/// Parameter grid for the parallel sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Delta thresholds to try.
    #[serde(default = "default_sweep_thresholds")]
    pub delta_thresholds: Vec<Decimal>,
    /// Hedge ratios to try.
    #[serde(default = "default_sweep_ratios")]
    pub hedge_ratios: Vec<Decimal>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            delta_thresholds: default_sweep_thresholds(),
            hedge_ratios: default_sweep_ratios(),
        }
    }
}

/// Backtest configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Underlying symbol.
    #[serde(default = "default_underlying")]
    pub underlying: String,
    /// Starting cash.
    #[serde(default = "default_initial_cash")]
    pub initial_cash: Decimal,
    /// Spot quantity bought at the first tick.
    #[serde(default = "default_spot_quantity")]
    pub spot_quantity: Decimal,
    /// Option strategies opened at the first tick.
    #[serde(default)]
    pub strategies: Vec<StrategyTemplate>,
    /// Roll handling.
    #[serde(default)]
    pub roll: RollPolicy,
    /// Realized-volatility window; constant volatility when absent.
    #[serde(default)]
    pub realized_vol_window: Option<usize>,
    /// Where to write the JSON-lines event log.
    #[serde(default)]
    pub event_log_path: Option<String>,
    /// Return periods per year for the Sharpe ratio (hourly ticks by default).
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: u32,
    /// Sweep grid.
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            underlying: default_underlying(),
            initial_cash: default_initial_cash(),
            spot_quantity: default_spot_quantity(),
            strategies: Vec::new(),
            roll: RollPolicy::default(),
            realized_vol_window: None,
            event_log_path: None,
            periods_per_year: default_periods_per_year(),
            sweep: SweepConfig::default(),
        }
    }
}

fn default_underlying() -> String {
    "BTC".to_string()
}

const fn default_initial_cash() -> Decimal {
    Decimal::from_parts(100_000, 0, 0, false, 0)
}

const fn default_spot_quantity() -> Decimal {
    Decimal::ONE
}

const fn default_roll_forward_days() -> i64 {
    30
}

const fn default_strike_step() -> Decimal {
    Decimal::from_parts(1000, 0, 0, false, 0)
}

const fn default_periods_per_year() -> u32 {
    24 * 365
}

fn default_sweep_thresholds() -> Vec<Decimal> {
    vec![Decimal::new(5, 2), Decimal::new(1, 1), Decimal::new(2, 1)]
}

fn default_sweep_ratios() -> Vec<Decimal> {
    vec![Decimal::new(5, 1), Decimal::new(8, 1), Decimal::ONE]
}
