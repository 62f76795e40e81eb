//! Execution simulator configuration: slippage, fees and partial fills.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Slippage model. Buys pay up, sells receive less.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum SlippageModel {
    /// Constant basis points.
    FixedBps {
        /// Slippage in bps.
        bps: Decimal,
    },
    /// `base_bps + impact_bps × size / liquidity`.
    LinearImpact {
        /// Constant component in bps.
        base_bps: Decimal,
        /// Bps charged per unit of size/liquidity.
        impact_bps: Decimal,
    },
    /// `base_bps + coefficient × sqrt(size / liquidity)` in bps.
    SquareRootImpact {
        /// Constant component in bps.
        base_bps: Decimal,
        /// Square-root impact coefficient in bps.
        coefficient: Decimal,
    },
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self::LinearImpact {
            base_bps: Decimal::new(5, 0),
            impact_bps: Decimal::new(50, 0),
        }
    }
}

/// One tier of a notional-based fee schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    /// Smallest notional this tier applies to.
    pub min_notional: Decimal,
    /// Fee in bps of notional.
    pub bps: Decimal,
}

/// Fee schedule for linear instruments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum FeeSchedule {
    /// Flat bps of notional.
    Fixed {
        /// Fee in bps.
        bps: Decimal,
    },
    /// Highest tier whose `min_notional` the trade reaches.
    Tiered {
        /// Tiers in any order.
        tiers: Vec<FeeTier>,
    },
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::Fixed {
            bps: Decimal::new(6, 0),
        }
    }
}

/// Option fees: a rate on underlying notional capped at a share of premium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionFeeConfig {
    /// Bps of underlying notional.
    pub underlying_rate_bps: Decimal,
    /// Cap as a fraction of premium paid or received.
    pub premium_cap: Decimal,
}

impl Default for OptionFeeConfig {
    fn default() -> Self {
        Self {
            underlying_rate_bps: Decimal::new(3, 0),
            premium_cap: Decimal::new(125, 3), // 12.5%
        }
    }
}

/// Partial fill configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialFillConfig {
    /// Whether partial fills are enabled.
    pub enabled: bool,
    /// Probability of a partial fill.
    pub probability: f64,
    /// Minimum filled fraction.
    pub min_fill_fraction: Decimal,
    /// Maximum filled fraction.
    pub max_fill_fraction: Decimal,
}

impl Default for PartialFillConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            probability: 0.1,
            min_fill_fraction: Decimal::new(3, 1),
            max_fill_fraction: Decimal::new(9, 1),
        }
    }
}

/// Execution simulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Slippage model.
    pub slippage: SlippageModel,
    /// Linear instrument fees.
    pub fees: FeeSchedule,
    /// Option fees.
    pub option_fees: OptionFeeConfig,
    /// Partial fills.
    pub partial_fills: PartialFillConfig,
    /// Largest order as a fraction of tick liquidity.
    pub max_fillable_fraction: Decimal,
    /// Liquidity assumed when a tick carries none.
    pub default_liquidity: Decimal,
    /// RNG seed for partial fills.
    pub seed: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            slippage: SlippageModel::default(),
            fees: FeeSchedule::default(),
            option_fees: OptionFeeConfig::default(),
            partial_fills: PartialFillConfig::default(),
            max_fillable_fraction: Decimal::new(1, 1), // 10%
            default_liquidity: Decimal::new(100, 0),
            seed: 42,
        }
    }
}
