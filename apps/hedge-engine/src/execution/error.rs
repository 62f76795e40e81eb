//! Execution errors.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors from the simulator or a live backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Order larger than the tick can absorb.
    #[error("Insufficient liquidity: requested {requested}, at most {max_fillable} fillable")]
    InsufficientLiquidity {
        /// Absolute requested quantity.
        requested: Decimal,
        /// Largest absolute quantity that would fill.
        max_fillable: Decimal,
    },

    /// Order values are unusable.
    #[error("Invalid order: {message}")]
    InvalidOrder {
        /// Error message.
        message: String,
    },

    /// Backend did not answer in time.
    #[error("Execution timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured bound.
        timeout_ms: u64,
    },

    /// Backend refused the order.
    #[error("Order rejected: {reason}")]
    Rejected {
        /// Backend reason.
        reason: String,
    },
}

impl ExecutionError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOrder {
            message: message.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientLiquidity { .. } => ErrorKind::InsufficientLiquidity,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidOrder { .. } | Self::Rejected { .. } => ErrorKind::InvalidInput,
        }
    }
}
