//! External signal contracts and price history.
//!
//! The engine consumes volatility forecasts and hedge-timing signals as
//! opaque values. Forecasters and signals are replaceable; a missing value
//! falls back to configuration (volatility) or disables the veto (timing).

use std::collections::VecDeque;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Bounded window of recent prices, oldest first.
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    prices: VecDeque<Decimal>,
    capacity: usize,
}

impl PriceHistory {
    /// History keeping at most `capacity` prices.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            prices: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a price, evicting the oldest when full.
    pub fn push(&mut self, price: Decimal) {
        if self.capacity == 0 {
            return;
        }
        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
    }

    /// Prices as a contiguous slice.
    pub fn as_slice(&mut self) -> &[Decimal] {
        self.prices.make_contiguous()
    }

    /// Number of stored prices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Whether no price was stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.prices.clear();
    }
}

/// Recent prices to annualized volatility.
pub trait VolatilityForecaster: Send + Sync {
    /// Forecast from prices, oldest first. `None` when history is too short.
    fn forecast(&self, prices: &[Decimal]) -> Option<f64>;
}

/// Fixed volatility.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantVolatility(pub f64);

impl VolatilityForecaster for ConstantVolatility {
    fn forecast(&self, _prices: &[Decimal]) -> Option<f64> {
        Some(self.0)
    }
}

/// Annualized standard deviation of log returns over a rolling window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealizedVolatility {
    window: usize,
    periods_per_year: f64,
}

impl RealizedVolatility {
    /// Window of `window` returns sampled `periods_per_year` times a year.
    #[must_use]
    pub const fn new(window: usize, periods_per_year: f64) -> Self {
        Self {
            window,
            periods_per_year,
        }
    }
}

impl VolatilityForecaster for RealizedVolatility {
    fn forecast(&self, prices: &[Decimal]) -> Option<f64> {
        if self.window < 2 || prices.len() <= self.window {
            return None;
        }
        let recent = &prices[prices.len() - self.window - 1..];
        let returns: Vec<f64> = recent
            .windows(2)
            .filter_map(|pair| {
                let prev = pair[0].to_f64()?;
                let next = pair[1].to_f64()?;
                (prev > 0.0 && next > 0.0).then(|| (next / prev).ln())
            })
            .collect();
        if returns.len() < 2 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)] // window sizes are small
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let vol = (variance * self.periods_per_year).sqrt();
        (vol.is_finite() && vol > 0.0).then_some(vol)
    }
}

/// Output of a hedge-timing model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingSignal {
    /// Hedging now is favorable; `false` vetoes dispatch.
    pub favorable: bool,
    /// Model confidence or strength, model-defined scale.
    pub score: f64,
}

/// Momentum features to a timing signal.
pub trait HedgeTimingSignal: Send + Sync {
    /// Signal from prices, oldest first. `None` disables the veto.
    fn evaluate(&self, prices: &[Decimal]) -> Option<TimingSignal>;
}
