//! Rolling spot/perpetual beta.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::config::BetaConfig;

/// Estimates the perpetual's sensitivity to spot from paired returns.
///
/// Reports 1 until `min_points` paired returns have been seen.
#[derive(Debug, Clone)]
pub struct BetaEstimator {
    config: BetaConfig,
    last: Option<(f64, f64)>,
    returns: VecDeque<(f64, f64)>,
}

impl BetaEstimator {
    /// Empty estimator.
    #[must_use]
    pub fn new(config: BetaConfig) -> Self {
        Self {
            returns: VecDeque::with_capacity(config.window),
            config,
            last: None,
        }
    }

    /// Record a paired spot/perp observation.
    pub fn observe(&mut self, spot: Decimal, perp: Decimal) {
        let (Some(spot), Some(perp)) = (spot.to_f64(), perp.to_f64()) else {
            return;
        };
        if spot <= 0.0 || perp <= 0.0 {
            return;
        }
        if let Some((prev_spot, prev_perp)) = self.last {
            if self.returns.len() == self.config.window {
                self.returns.pop_front();
            }
            self.returns
                .push_back((spot / prev_spot - 1.0, perp / prev_perp - 1.0));
        }
        self.last = Some((spot, perp));
    }

    /// Current beta, rounded to six places.
    #[must_use]
    pub fn beta(&self) -> Decimal {
        if self.returns.len() < self.config.min_points.max(2) {
            return Decimal::ONE;
        }
        #[allow(clippy::cast_precision_loss)] // window sizes are small
        let n = self.returns.len() as f64;
        let mean_s = self.returns.iter().map(|(s, _)| s).sum::<f64>() / n;
        let mean_p = self.returns.iter().map(|(_, p)| p).sum::<f64>() / n;
        let (cov, var) = self
            .returns
            .iter()
            .fold((0.0, 0.0), |(cov, var), (s, p)| {
                (cov + (s - mean_s) * (p - mean_p), var + (s - mean_s).powi(2))
            });
        if var <= f64::EPSILON {
            return Decimal::ONE;
        }
        Decimal::from_f64_retain(cov / var).map_or(Decimal::ONE, |b| b.round_dp(6))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn config(min_points: usize) -> BetaConfig {
        BetaConfig {
            window: 10,
            min_points,
        }
    }

    #[test]
    fn test_defaults_to_one() {
        let mut estimator = BetaEstimator::new(config(30));
        estimator.observe(dec!(100), dec!(100));
        estimator.observe(dec!(101), dec!(102));
        assert_eq!(estimator.beta(), Decimal::ONE);
    }

    #[test]
    fn test_perp_moving_double() {
        let mut estimator = BetaEstimator::new(config(3));
        let spots = [dec!(100), dec!(101), dec!(99), dec!(102), dec!(100)];
        let mut perp = dec!(100);
        let mut prev_spot = spots[0];
        estimator.observe(spots[0], perp);
        for spot in &spots[1..] {
            perp *= Decimal::ONE + Decimal::TWO * (*spot / prev_spot - Decimal::ONE);
            prev_spot = *spot;
            estimator.observe(*spot, perp);
        }
        assert!((estimator.beta() - dec!(2)).abs() < dec!(0.0001));
    }
}
