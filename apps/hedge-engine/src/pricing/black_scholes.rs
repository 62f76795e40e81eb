//! Black-Scholes pricing with continuous carry.
//!
//! Prices European options and returns the five first-order Greeks in the
//! crate's units (vega per vol point, theta per calendar day, rho per rate
//! point). Pure functions; volatility is an input, never estimated here.

// Black-Scholes uses standard mathematical notation (s, k, t, r, q, sigma)
// Financial formulas use standard notation where mul_add() obscures meaning
#![allow(clippy::many_single_char_names)]
#![allow(clippy::suboptimal_flops)]

use std::f64::consts::{PI, SQRT_2};

use chrono::{DateTime, Utc};

use super::PricingError;
use super::instrument::OptionRight;

/// Seconds in a 365-day year.
const SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;

/// Calendar days per year, for theta.
const DAYS_PER_YEAR: f64 = 365.0;

/// Inputs to the pricer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionInputs {
    /// Spot price.
    pub spot: f64,
    /// Strike price.
    pub strike: f64,
    /// Time to expiry in years.
    pub time_years: f64,
    /// Risk-free rate (continuous).
    pub rate: f64,
    /// Carry / dividend yield (continuous).
    pub carry: f64,
    /// Volatility (annualized).
    pub volatility: f64,
    /// Call or put.
    pub right: OptionRight,
}

/// Price and per-unit Greeks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionQuote {
    /// Fair value.
    pub price: f64,
    /// dV/dS.
    pub delta: f64,
    /// d²V/dS².
    pub gamma: f64,
    /// dV per 1 vol point.
    pub vega: f64,
    /// dV per calendar day.
    pub theta: f64,
    /// dV per 1 rate point.
    pub rho: f64,
}

/// Standard normal CDF.
fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + libm::erf(x / SQRT_2))
}

/// Standard normal PDF.
fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Year fraction from `now` until `expiry`; negative once expired.
#[must_use]
pub fn years_until(now: DateTime<Utc>, expiry: DateTime<Utc>) -> f64 {
    (expiry - now).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_YEAR
}

fn validate(inputs: &OptionInputs) -> Result<(), PricingError> {
    let fields = [
        ("spot", inputs.spot),
        ("strike", inputs.strike),
        ("time_years", inputs.time_years),
        ("rate", inputs.rate),
        ("carry", inputs.carry),
        ("volatility", inputs.volatility),
    ];
    if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
        return Err(PricingError::invalid(format!("{name} must be finite, got {value}")));
    }
    if inputs.volatility <= 0.0 {
        return Err(PricingError::invalid(format!(
            "volatility must be positive, got {}",
            inputs.volatility
        )));
    }
    if inputs.time_years < 0.0 {
        return Err(PricingError::invalid(format!(
            "time to expiry must be non-negative, got {}",
            inputs.time_years
        )));
    }
    if inputs.spot <= 0.0 || inputs.strike <= 0.0 {
        return Err(PricingError::invalid(format!(
            "spot and strike must be positive, got spot={} strike={}",
            inputs.spot, inputs.strike
        )));
    }
    Ok(())
}

/// Price an option and compute its Greeks.
///
/// At expiry the price is intrinsic value, delta is the exercise indicator
/// and the remaining Greeks are zero.
pub fn price_option(inputs: &OptionInputs) -> Result<OptionQuote, PricingError> {
    validate(inputs)?;

    let OptionInputs {
        spot: s,
        strike: k,
        time_years: t,
        rate: r,
        carry: q,
        volatility: sigma,
        right,
    } = *inputs;

    if t == 0.0 {
        let (price, delta) = match right {
            OptionRight::Call => ((s - k).max(0.0), if s > k { 1.0 } else { 0.0 }),
            OptionRight::Put => ((k - s).max(0.0), if s < k { -1.0 } else { 0.0 }),
        };
        return Ok(OptionQuote {
            price,
            delta,
            gamma: 0.0,
            vega: 0.0,
            theta: 0.0,
            rho: 0.0,
        });
    }

    let sqrt_t = t.sqrt();
    let d1 = ((s / k).ln() + (r - q + 0.5 * sigma * sigma) * t) / (sigma * sqrt_t);
    let d2 = d1 - sigma * sqrt_t;
    let carry_df = (-q * t).exp();
    let rate_df = (-r * t).exp();
    let pdf_d1 = norm_pdf(d1);

    let gamma = carry_df * pdf_d1 / (s * sigma * sqrt_t);
    let vega = s * carry_df * pdf_d1 * sqrt_t;
    let decay = -s * carry_df * pdf_d1 * sigma / (2.0 * sqrt_t);

    let (price, delta, theta, rho) = match right {
        OptionRight::Call => {
            let nd1 = norm_cdf(d1);
            let nd2 = norm_cdf(d2);
            (
                s * carry_df * nd1 - k * rate_df * nd2,
                carry_df * nd1,
                decay - r * k * rate_df * nd2 + q * s * carry_df * nd1,
                k * t * rate_df * nd2,
            )
        }
        OptionRight::Put => {
            let n_neg_d1 = norm_cdf(-d1);
            let n_neg_d2 = norm_cdf(-d2);
            (
                k * rate_df * n_neg_d2 - s * carry_df * n_neg_d1,
                carry_df * (norm_cdf(d1) - 1.0),
                decay + r * k * rate_df * n_neg_d2 - q * s * carry_df * n_neg_d1,
                -k * t * rate_df * n_neg_d2,
            )
        }
    };

    Ok(OptionQuote {
        price,
        delta,
        gamma,
        vega: vega / 100.0,
        theta: theta / DAYS_PER_YEAR,
        rho: rho / 100.0,
    })
}
