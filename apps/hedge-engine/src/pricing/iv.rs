//! Implied Volatility Solver
//!
//! Recovers volatility from an observed option premium:
//! - Newton-Raphson: fast convergence near the money, seeded by a
//!   Brenner-Subrahmanyam guess
//! - Bisection: guaranteed convergence when vega collapses (deep ITM/OTM)
//!
//! Used by the strategy builder when a leg is quoted by premium.

#![allow(clippy::many_single_char_names)]

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::PricingError;
use super::black_scholes::{OptionInputs, price_option};

/// Configuration for the IV solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvSolverConfig {
    /// Maximum iterations for either method.
    pub max_iterations: u32,
    /// Convergence tolerance (absolute price error).
    pub tolerance: f64,
    /// Minimum volatility bound (e.g., 0.01 = 1%).
    pub min_vol: f64,
    /// Maximum volatility bound (e.g., 5.0 = 500%).
    pub max_vol: f64,
    /// Use bisection directly when |ln(S/K)| exceeds this.
    pub hybrid_threshold: f64,
}

impl Default for IvSolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
            min_vol: 0.001,
            max_vol: 5.0,
            hybrid_threshold: 0.20,
        }
    }
}

/// Implied volatility solver.
#[derive(Debug, Clone, Default)]
pub struct IvSolver {
    config: IvSolverConfig,
}

impl IvSolver {
    /// Create a solver with the given configuration.
    #[must_use]
    pub const fn new(config: IvSolverConfig) -> Self {
        Self { config }
    }

    /// Solve for the volatility that reproduces `premium`.
    ///
    /// The `volatility` field of `inputs` is ignored.
    pub fn solve(&self, premium: f64, inputs: &OptionInputs) -> Result<f64, PricingError> {
        if !(premium.is_finite() && premium > 0.0) {
            return Err(PricingError::invalid(format!(
                "premium must be positive, got {premium}"
            )));
        }
        if inputs.time_years <= 0.0 {
            return Err(PricingError::invalid(format!(
                "time to expiry must be positive, got {}",
                inputs.time_years
            )));
        }

        let floor = self.price_at(inputs, self.config.min_vol)?;
        let cap = self.price_at(inputs, self.config.max_vol)?;
        if premium < floor - self.config.tolerance || premium > cap + self.config.tolerance {
            return Err(PricingError::NoSolution {
                reason: format!(
                    "premium {premium:.4} outside attainable range [{floor:.4}, {cap:.4}]"
                ),
            });
        }

        let moneyness = (inputs.spot / inputs.strike).ln().abs();
        if moneyness > self.config.hybrid_threshold {
            return self.bisection(premium, inputs);
        }
        self.newton_raphson(premium, inputs)
            .or_else(|_| self.bisection(premium, inputs))
    }

    fn price_at(&self, inputs: &OptionInputs, volatility: f64) -> Result<f64, PricingError> {
        price_option(&OptionInputs {
            volatility,
            ..*inputs
        })
        .map(|q| q.price)
    }

    fn newton_raphson(&self, premium: f64, inputs: &OptionInputs) -> Result<f64, PricingError> {
        // Brenner-Subrahmanyam ATM approximation
        let guess = (2.0 * PI / inputs.time_years).sqrt() * premium / inputs.spot;
        let mut sigma = guess.clamp(self.config.min_vol, self.config.max_vol);
        let mut last_error = f64::INFINITY;

        for i in 0..self.config.max_iterations {
            let quote = price_option(&OptionInputs {
                volatility: sigma,
                ..*inputs
            })?;
            let error = quote.price - premium;
            if error.abs() < self.config.tolerance {
                return Ok(sigma);
            }
            // quote.vega is per vol point
            let vega = quote.vega * 100.0;
            if vega.abs() < 1e-12 {
                return Err(PricingError::ConvergenceFailed {
                    iterations: i,
                    last_error: error.abs(),
                });
            }
            sigma = (sigma - error / vega).clamp(self.config.min_vol, self.config.max_vol);
            last_error = error.abs();
        }

        Err(PricingError::ConvergenceFailed {
            iterations: self.config.max_iterations,
            last_error,
        })
    }

    fn bisection(&self, premium: f64, inputs: &OptionInputs) -> Result<f64, PricingError> {
        let mut low = self.config.min_vol;
        let mut high = self.config.max_vol;

        for _ in 0..self.config.max_iterations {
            let mid = low.midpoint(high);
            let error = self.price_at(inputs, mid)? - premium;
            if error.abs() < self.config.tolerance || (high - low) < 1e-10 {
                return Ok(mid);
            }
            if error > 0.0 {
                high = mid;
            } else {
                low = mid;
            }
        }

        let mid = low.midpoint(high);
        Err(PricingError::ConvergenceFailed {
            iterations: self.config.max_iterations,
            last_error: (self.price_at(inputs, mid)? - premium).abs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::OptionRight;

    fn inputs(strike: f64, right: OptionRight) -> OptionInputs {
        OptionInputs {
            spot: 50_000.0,
            strike,
            time_years: 30.0 / 365.0,
            rate: 0.05,
            carry: 0.0,
            volatility: 0.0,
            right,
        }
    }

    fn premium_at(inputs: &OptionInputs, volatility: f64) -> f64 {
        price_option(&OptionInputs {
            volatility,
            ..*inputs
        })
        .unwrap()
        .price
    }

    #[test]
    fn test_recovers_atm_vol() {
        let inp = inputs(50_000.0, OptionRight::Call);
        let premium = premium_at(&inp, 0.65);
        let iv = IvSolver::default().solve(premium, &inp).unwrap();
        assert!((iv - 0.65).abs() < 1e-4);
    }

    #[test]
    fn test_recovers_far_otm_put_via_bisection() {
        let inp = inputs(35_000.0, OptionRight::Put);
        let premium = premium_at(&inp, 0.9);
        let iv = IvSolver::default().solve(premium, &inp).unwrap();
        assert!((iv - 0.9).abs() < 1e-3);
    }

    #[test]
    fn test_premium_below_floor_has_no_solution() {
        let inp = inputs(40_000.0, OptionRight::Call);
        let Err(err) = IvSolver::default().solve(1.0, &inp) else {
            panic!("premium below intrinsic should fail");
        };
        assert!(matches!(err, PricingError::NoSolution { .. }));
    }

    #[test]
    fn test_rejects_non_positive_premium() {
        let inp = inputs(50_000.0, OptionRight::Call);
        assert!(IvSolver::default().solve(0.0, &inp).is_err());
    }
}
