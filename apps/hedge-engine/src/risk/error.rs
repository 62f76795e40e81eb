//! Risk aggregation errors.

use thiserror::Error;

use crate::error::ErrorKind;
use crate::pricing::{InstrumentId, PricingError};

/// Errors from a risk pass.
#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    /// Market observation too old to trust.
    #[error("Market data is {age_ms}ms old, limit {max_age_ms}ms")]
    StaleMarketData {
        /// Observation age.
        age_ms: i64,
        /// Configured limit.
        max_age_ms: i64,
    },

    /// One leg could not be priced.
    #[error("Failed to price {instrument_id}: {source}")]
    Pricing {
        /// Leg instrument.
        instrument_id: InstrumentId,
        /// Pricing failure.
        source: PricingError,
    },

    /// VaR or stress parameters are unusable.
    #[error("Invalid risk input: {message}")]
    InvalidInput {
        /// Error message.
        message: String,
    },
}

impl RiskError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::StaleMarketData { .. } => ErrorKind::StaleMarketData,
            Self::Pricing { .. } | Self::InvalidInput { .. } => ErrorKind::InvalidInput,
        }
    }
}
