//! Market data inputs.
//!
//! A [`MarketTick`] is one row of the historical or live feed. The engine
//! turns it into a [`MarketSnapshot`], the full set of inputs the pricing and
//! risk layers need for one evaluation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::{InstrumentId, PricingError};

/// One observation of the underlying market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTick {
    /// Event time; strictly increasing across a feed.
    pub timestamp: DateTime<Utc>,
    /// Spot price of the underlying.
    pub price: Decimal,
    /// Perpetual future mark price, when quoted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perp_price: Option<Decimal>,
    /// Implied volatility of the underlying (annualized, 0.6 = 60%).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implied_vol: Option<f64>,
    /// Available liquidity in underlying units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<Decimal>,
    /// When the price was actually observed, if it lags `timestamp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl MarketTick {
    /// Tick with only a timestamp and spot price.
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            timestamp,
            price,
            perp_price: None,
            implied_vol: None,
            liquidity: None,
            observed_at: None,
        }
    }

    /// Observation time, defaulting to the event time.
    #[must_use]
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at.unwrap_or(self.timestamp)
    }

    /// Reject ticks that cannot be priced: non-positive prices, a
    /// non-positive or non-finite implied volatility, negative liquidity.
    pub fn validate(&self) -> Result<(), PricingError> {
        if self.price <= Decimal::ZERO {
            return Err(PricingError::invalid(format!("spot price must be positive, got {}", self.price)));
        }
        if let Some(perp) = self.perp_price.filter(|p| *p <= Decimal::ZERO) {
            return Err(PricingError::invalid(format!("perp price must be positive, got {perp}")));
        }
        if let Some(vol) = self.implied_vol.filter(|v| !v.is_finite() || *v <= 0.0) {
            return Err(PricingError::invalid(format!("implied vol must be positive, got {vol}")));
        }
        if let Some(liquidity) = self.liquidity.filter(|l| l.is_sign_negative()) {
            return Err(PricingError::invalid(format!("liquidity must not be negative, got {liquidity}")));
        }
        Ok(())
    }
}

/// Inputs for pricing every instrument at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Underlying symbol, e.g. `BTC`.
    pub underlying: String,
    /// Spot price.
    pub spot: Decimal,
    /// Perpetual mark price; equals spot when not quoted.
    pub perp: Decimal,
    /// Underlying volatility (annualized).
    pub volatility: f64,
    /// Per-instrument volatility overrides.
    #[serde(default)]
    pub vol_overrides: BTreeMap<InstrumentId, f64>,
    /// Risk-free rate (annualized, continuous).
    pub risk_free_rate: f64,
    /// Carry / dividend yield (annualized, continuous).
    pub carry: f64,
    /// Book depth in underlying units.
    pub liquidity: Decimal,
    /// Evaluation time.
    pub timestamp: DateTime<Utc>,
    /// Observation time of the prices.
    pub observed_at: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Snapshot built from a tick.
    #[must_use]
    pub fn from_tick(
        tick: &MarketTick,
        underlying: &str,
        volatility: f64,
        risk_free_rate: f64,
        carry: f64,
        default_liquidity: Decimal,
    ) -> Self {
        Self {
            underlying: underlying.to_string(),
            spot: tick.price,
            perp: tick.perp_price.unwrap_or(tick.price),
            volatility,
            vol_overrides: BTreeMap::new(),
            risk_free_rate,
            carry,
            liquidity: tick.liquidity.unwrap_or(default_liquidity),
            timestamp: tick.timestamp,
            observed_at: tick.observed_at(),
        }
    }

    /// Volatility for `id`, falling back to the underlying's.
    #[must_use]
    pub fn volatility_for(&self, id: &InstrumentId) -> f64 {
        self.vol_overrides
            .get(id)
            .copied()
            .unwrap_or(self.volatility)
    }

    /// Copy with spot (and perp) scaled by `1 + spot_shock` and every
    /// volatility scaled by `1 + vol_shock`. Shocks are fractions.
    #[must_use]
    pub fn shocked(&self, spot_shock: Decimal, vol_shock: f64) -> Self {
        let spot_factor = Decimal::ONE + spot_shock;
        let vol_factor = 1.0 + vol_shock;
        Self {
            spot: self.spot * spot_factor,
            perp: self.perp * spot_factor,
            volatility: self.volatility * vol_factor,
            vol_overrides: self
                .vol_overrides
                .iter()
                .map(|(id, vol)| (id.clone(), vol * vol_factor))
                .collect(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    fn snapshot() -> MarketSnapshot {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut tick = MarketTick::new(ts, dec!(50000));
        tick.perp_price = Some(dec!(50010));
        MarketSnapshot::from_tick(&tick, "BTC", 0.6, 0.05, 0.0, dec!(100))
    }

    #[test]
    fn test_from_tick_defaults_observed_at() {
        let snap = snapshot();
        assert_eq!(snap.observed_at, snap.timestamp);
        assert_eq!(snap.perp, dec!(50010));
        assert_eq!(snap.liquidity, dec!(100));
    }

    #[test]
    fn test_volatility_override_fallback() {
        let mut snap = snapshot();
        let id = InstrumentId::new("BTC-20261231-55000-C");
        assert!((snap.volatility_for(&id) - 0.6).abs() < f64::EPSILON);
        snap.vol_overrides.insert(id.clone(), 0.8);
        assert!((snap.volatility_for(&id) - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shocked_scales_spot_and_vol() {
        let snap = snapshot().shocked(dec!(-0.10), 0.5);
        assert_eq!(snap.spot, dec!(45000.00));
        assert!((snap.volatility - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_unpriceable_ticks() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(MarketTick::new(ts, dec!(50000)).validate().is_ok());
        assert!(MarketTick::new(ts, Decimal::ZERO).validate().is_err());
        assert!(MarketTick::new(ts, dec!(-100)).validate().is_err());

        let mut perp = MarketTick::new(ts, dec!(50000));
        perp.perp_price = Some(Decimal::ZERO);
        assert!(matches!(perp.validate(), Err(PricingError::InvalidInput { .. })));

        let mut vol = MarketTick::new(ts, dec!(50000));
        vol.implied_vol = Some(f64::NAN);
        assert!(vol.validate().is_err());

        let mut liquidity = MarketTick::new(ts, dec!(50000));
        liquidity.liquidity = Some(dec!(-1));
        assert!(liquidity.validate().is_err());
    }
}
