//! Greeks and their aggregation.
//!
//! Units are fixed crate-wide:
//! - delta: underlying units per unit of instrument
//! - gamma: change in delta per 1.0 move in spot
//! - vega: price change per 1 volatility point (0.01)
//! - theta: price change per calendar day
//! - rho: price change per 1 rate point (0.01)

use std::iter::Sum;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sensitivities of an instrument, a leg, or a whole portfolio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeks {
    /// Sensitivity to the underlying price.
    pub delta: Decimal,
    /// Sensitivity of delta to the underlying price.
    pub gamma: Decimal,
    /// Sensitivity to volatility (per vol point).
    pub vega: Decimal,
    /// Time decay (per day).
    pub theta: Decimal,
    /// Sensitivity to rates (per rate point).
    pub rho: Decimal,
}

impl Greeks {
    /// Create Greeks from explicit values.
    #[must_use]
    pub const fn new(
        delta: Decimal,
        gamma: Decimal,
        vega: Decimal,
        theta: Decimal,
        rho: Decimal,
    ) -> Self {
        Self {
            delta,
            gamma,
            vega,
            theta,
            rho,
        }
    }

    /// Greeks of a linear instrument: only delta is non-zero.
    #[must_use]
    pub const fn linear(delta: Decimal) -> Self {
        Self {
            delta,
            gamma: Decimal::ZERO,
            vega: Decimal::ZERO,
            theta: Decimal::ZERO,
            rho: Decimal::ZERO,
        }
    }

    /// Create zero Greeks.
    #[must_use]
    pub const fn zero() -> Self {
        Self::linear(Decimal::ZERO)
    }

    /// Scale by a signed quantity (positive long, negative short).
    #[must_use]
    pub fn scale(&self, quantity: Decimal) -> Self {
        Self {
            delta: self.delta * quantity,
            gamma: self.gamma * quantity,
            vega: self.vega * quantity,
            theta: self.theta * quantity,
            rho: self.rho * quantity,
        }
    }

    /// Component-wise sum.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self {
            delta: self.delta + other.delta,
            gamma: self.gamma + other.gamma,
            vega: self.vega + other.vega,
            theta: self.theta + other.theta,
            rho: self.rho + other.rho,
        }
    }

    /// Component-wise difference.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.scale(Decimal::NEGATIVE_ONE))
    }
}

impl Sum for Greeks {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, g| acc.add(&g))
    }
}

impl<'a> Sum<&'a Self> for Greeks {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, g| acc.add(g))
    }
}

/// Sum `per_unit × quantity` over every exposure.
#[must_use]
pub fn aggregate<'a>(exposures: impl IntoIterator<Item = (&'a Greeks, Decimal)>) -> Greeks {
    exposures
        .into_iter()
        .fold(Greeks::zero(), |acc, (per_unit, qty)| {
            acc.add(&per_unit.scale(qty))
        })
}
