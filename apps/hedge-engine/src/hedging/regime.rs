//! Moving-average regime filter.
//!
//! Hedging is favorable in a bearish regime (fast average below slow);
//! in a bullish regime the filter vetoes new hedges, and with
//! `close_in_bullish_regime` the engine also closes the open hedge.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::signals::{HedgeTimingSignal, TimingSignal};
use crate::config::RegimeConfig;

/// Fast/slow simple moving-average crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingAverageRegime {
    fast: usize,
    slow: usize,
}

impl MovingAverageRegime {
    /// Filter with the given windows.
    #[must_use]
    pub const fn new(fast: usize, slow: usize) -> Self {
        Self { fast, slow }
    }

    /// Filter from configuration.
    #[must_use]
    pub const fn from_config(config: &RegimeConfig) -> Self {
        Self::new(config.fast_window, config.slow_window)
    }

    /// Longest window; the history this filter needs.
    #[must_use]
    pub const fn lookback(&self) -> usize {
        self.slow
    }
}

fn mean_of_last(prices: &[Decimal], n: usize) -> Option<Decimal> {
    if n == 0 || prices.len() < n {
        return None;
    }
    let sum: Decimal = prices[prices.len() - n..].iter().sum();
    Some(sum / Decimal::from(n))
}

impl HedgeTimingSignal for MovingAverageRegime {
    fn evaluate(&self, prices: &[Decimal]) -> Option<TimingSignal> {
        let fast = mean_of_last(prices, self.fast)?;
        let slow = mean_of_last(prices, self.slow)?;
        if slow.is_zero() {
            return None;
        }
        let score = ((slow - fast) / slow).to_f64().unwrap_or(0.0);
        Some(TimingSignal {
            favorable: fast < slow,
            score,
        })
    }
}
