//! Instrument pricing.
//!
//! This module provides:
//! - Instrument identity (spot, perpetual, option)
//! - Black-Scholes price and Greeks
//! - Implied volatility computation (Newton-Raphson with bisection fallback)
//! - Valuation of any instrument against a [`MarketSnapshot`](crate::market::MarketSnapshot)
//!
//! # Example
//!
//! ```ignore
//! use hedge_engine::pricing::{OptionInputs, OptionRight, price_option};
//!
//! let quote = price_option(&OptionInputs {
//!     spot: 50_000.0,
//!     strike: 55_000.0,
//!     time_years: 30.0 / 365.0,
//!     rate: 0.05,
//!     carry: 0.0,
//!     volatility: 0.6,
//!     right: OptionRight::Call,
//! })?;
//! ```

mod black_scholes;
mod instrument;
mod iv;
mod valuation;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

pub use black_scholes::{OptionInputs, OptionQuote, price_option, years_until};
pub use instrument::{
    Instrument, InstrumentId, InstrumentKind, LineageId, OptionContract, OptionRight, StrategyId,
};
pub use iv::{IvSolver, IvSolverConfig};
pub use valuation::{InstrumentQuote, linear_greeks, value_instrument};

use crate::error::ErrorKind;

/// Decimal places kept for per-unit Greeks.
const GREEK_DP: u32 = 12;

/// Errors from pricing.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// Invalid input parameters.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message.
        message: String,
    },

    /// IV solver did not converge.
    #[error("IV solver failed to converge after {iterations} iterations (last error: {last_error:.6})")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: u32,
        /// Last price error.
        last_error: f64,
    },

    /// No volatility reproduces the premium.
    #[error("No valid IV solution: {reason}")]
    NoSolution {
        /// Reason no solution exists.
        reason: String,
    },
}

impl PricingError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

/// Convert a model output to `Decimal`, rounded to a fixed precision.
pub(crate) fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64_retain(value).map_or(Decimal::ZERO, |d| d.round_dp(GREEK_DP))
}

/// Convert a `Decimal` to `f64` for the numerical model.
pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
