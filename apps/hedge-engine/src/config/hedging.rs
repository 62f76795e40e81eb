//! Hedging decision engine configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Whether dispatch needs an operator confirmation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HedgeMode {
    /// Dispatch as soon as the gates pass.
    #[default]
    Automatic,
    /// Wait for an operator confirmation.
    Manual,
}

/// Where a rebalance aims inside the tolerance band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingTarget {
    /// Nearest band edge: the smallest trade that restores tolerance.
    #[default]
    BandEdge,
    /// Band center.
    BandCenter,
}

/// Linear instrument used to hedge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HedgeInstrumentKind {
    /// Perpetual future.
    #[default]
    Perpetual,
    /// Spot.
    Spot,
}

/// Moving-average regime filter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// Fast window in ticks.
    #[serde(default = "default_fast_window")]
    pub fast_window: usize,
    /// Slow window in ticks.
    #[serde(default = "default_slow_window")]
    pub slow_window: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            fast_window: default_fast_window(),
            slow_window: default_slow_window(),
        }
    }
}

/// Rolling spot/perp beta estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetaConfig {
    /// Return window.
    #[serde(default = "default_beta_window")]
    pub window: usize,
    /// Returns required before the estimate replaces 1.0.
    #[serde(default = "default_beta_min_points")]
    pub min_points: usize,
}

impl Default for BetaConfig {
    fn default() -> Self {
        Self {
            window: default_beta_window(),
            min_points: default_beta_min_points(),
        }
    }
}

/// Hedging decision engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HedgingConfig {
    /// Half-width of the tolerance band around the target delta.
    #[serde(default = "default_delta_threshold")]
    pub delta_threshold: Decimal,
    /// Fixed offset added to the target delta.
    #[serde(default)]
    pub target_delta_offset: Decimal,
    /// Fraction of the spot delta to neutralize.
    #[serde(default = "default_hedge_ratio")]
    pub hedge_ratio: Decimal,
    /// Minimum time between arming and dispatch.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
    /// Consecutive breached evaluations required before dispatch.
    #[serde(default = "default_breach_confirmations")]
    pub breach_confirmations: u32,
    /// Consecutive in-tolerance evaluations before `Hedged` relaxes to `Idle`.
    #[serde(default = "default_hysteresis_ticks")]
    pub hysteresis_ticks: u32,
    /// Rebalance aim.
    #[serde(default)]
    pub sizing_target: SizingTarget,
    /// Hedge instrument lot size.
    #[serde(default = "default_lot_size")]
    pub lot_size: Decimal,
    /// Largest single hedge order.
    #[serde(default = "default_max_order_size")]
    pub max_order_size: Decimal,
    /// Automatic or manual dispatch.
    #[serde(default)]
    pub mode: HedgeMode,
    /// How long a manual request waits for confirmation.
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    /// Consult the timing signal before dispatch.
    #[serde(default)]
    pub timing_signal_enabled: bool,
    /// Longest a timing veto may delay dispatch after arming.
    #[serde(default = "default_max_signal_delay")]
    pub max_signal_delay_secs: u64,
    /// Close the open hedge, and keep it closed, while the timing signal
    /// reads bullish. Needs `timing_signal_enabled`.
    #[serde(default)]
    pub close_in_bullish_regime: bool,
    /// Strategies this close to expiry are rolled.
    #[serde(default = "default_roll_window_days")]
    pub roll_window_days: i64,
    /// Hedge instrument.
    #[serde(default)]
    pub hedge_instrument: HedgeInstrumentKind,
    /// Regime filter.
    #[serde(default)]
    pub regime: RegimeConfig,
    /// Beta estimation.
    #[serde(default)]
    pub beta: BetaConfig,
}

impl HedgingConfig {
    /// Cooldown as a duration.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Confirmation timeout as a duration.
    #[must_use]
    pub const fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Signal delay ceiling as a duration.
    #[must_use]
    pub const fn max_signal_delay(&self) -> Duration {
        Duration::from_secs(self.max_signal_delay_secs)
    }
}

impl Default for HedgingConfig {
    fn default() -> Self {
        Self {
            delta_threshold: default_delta_threshold(),
            target_delta_offset: Decimal::ZERO,
            hedge_ratio: default_hedge_ratio(),
            cooldown_secs: default_cooldown(),
            breach_confirmations: default_breach_confirmations(),
            hysteresis_ticks: default_hysteresis_ticks(),
            sizing_target: SizingTarget::default(),
            lot_size: default_lot_size(),
            max_order_size: default_max_order_size(),
            mode: HedgeMode::default(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            timing_signal_enabled: false,
            max_signal_delay_secs: default_max_signal_delay(),
            close_in_bullish_regime: false,
            roll_window_days: default_roll_window_days(),
            hedge_instrument: HedgeInstrumentKind::default(),
            regime: RegimeConfig::default(),
            beta: BetaConfig::default(),
        }
    }
}

const fn default_delta_threshold() -> Decimal {
    dec!(0.1)
}

const fn default_hedge_ratio() -> Decimal {
    Decimal::ONE
}

const fn default_cooldown() -> u64 {
    300
}

const fn default_breach_confirmations() -> u32 {
    2
}

const fn default_hysteresis_ticks() -> u32 {
    3
}

const fn default_lot_size() -> Decimal {
    dec!(0.001)
}

const fn default_max_order_size() -> Decimal {
    dec!(10)
}

const fn default_confirmation_timeout() -> u64 {
    600
}

const fn default_max_signal_delay() -> u64 {
    3600
}

const fn default_roll_window_days() -> i64 {
    3
}

const fn default_fast_window() -> usize {
    50
}

const fn default_slow_window() -> usize {
    200
}

const fn default_beta_window() -> usize {
    90
}

const fn default_beta_min_points() -> usize {
    30
}
