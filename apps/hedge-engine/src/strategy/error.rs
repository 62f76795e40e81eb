//! Strategy error types.

use thiserror::Error;

use super::types::StrategyKind;
use crate::error::ErrorKind;
use crate::pricing::PricingError;

/// Errors from strategy construction and rolls.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Template failed validation.
    #[error("Invalid {kind} strategy: {message}")]
    InvalidStrategy {
        /// Structure being built.
        kind: StrategyKind,
        /// Error message.
        message: String,
    },

    /// A leg could not be priced.
    #[error("Failed to price leg: {0}")]
    Pricing(#[from] PricingError),
}

impl StrategyError {
    pub(crate) fn invalid(kind: StrategyKind, message: impl Into<String>) -> Self {
        Self::InvalidStrategy {
            kind,
            message: message.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidStrategy { .. } => ErrorKind::InvalidStrategy,
            Self::Pricing(_) => ErrorKind::InvalidInput,
        }
    }
}
