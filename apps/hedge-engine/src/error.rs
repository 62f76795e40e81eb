//! Crate-level error handling.
//!
//! Every module owns a `thiserror` enum describing its own failures. This
//! module folds them into [`HedgeError`] and classifies each into an
//! [`ErrorKind`], which is what the backtest report and the metrics counters
//! aggregate on.
//!
//! | Kind | Raised by |
//! |------|-----------|
//! | `INVALID_INPUT` | pricing inputs, non-increasing ticks, bad orders |
//! | `STALE_MARKET_DATA` | risk snapshot on an aged observation |
//! | `INVALID_STRATEGY` | strategy template validation |
//! | `INSUFFICIENT_LIQUIDITY` | execution simulator |
//! | `TIMEOUT` | live pipeline external calls |
//!
//! No error is fatal to the decision loop: each resolves to "no hedge action
//! this cycle" plus a logged reason.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backtest::FeedError;
use crate::config::ConfigError;
use crate::execution::ExecutionError;
use crate::portfolio::PortfolioError;
use crate::pricing::PricingError;
use crate::risk::RiskError;
use crate::strategy::StrategyError;

/// Classification of failures for counting and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed numeric input or out-of-order data.
    InvalidInput,
    /// Market observation older than the configured maximum age.
    StaleMarketData,
    /// Strategy template failed validation.
    InvalidStrategy,
    /// Order larger than the simulated book can absorb.
    InsufficientLiquidity,
    /// External call exceeded its deadline.
    Timeout,
}

impl ErrorKind {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::StaleMarketData => "STALE_MARKET_DATA",
            Self::InvalidStrategy => "INVALID_STRATEGY",
            Self::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
            Self::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error for the hedge engine.
#[derive(Debug, Error)]
pub enum HedgeError {
    /// Pricing failure.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Risk aggregation failure.
    #[error(transparent)]
    Risk(#[from] RiskError),

    /// Strategy construction failure.
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Execution failure.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Portfolio bookkeeping failure.
    #[error(transparent)]
    Portfolio(#[from] PortfolioError),

    /// Tick feed failure.
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// External call timed out.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
        /// Deadline in milliseconds.
        timeout_ms: u64,
    },
}

impl HedgeError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Pricing(e) => e.kind(),
            Self::Risk(e) => e.kind(),
            Self::Strategy(e) => e.kind(),
            Self::Execution(e) => e.kind(),
            Self::Portfolio(e) => e.kind(),
            Self::Feed(e) => e.kind(),
            Self::Config(_) => ErrorKind::InvalidInput,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}
