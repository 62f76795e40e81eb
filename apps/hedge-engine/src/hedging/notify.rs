//! Operator-facing notifications.

use serde::{Deserialize, Serialize};

use super::decision::HedgeDecision;
use crate::error::ErrorKind;

/// Event for the operator interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    /// Manual mode: a hedge is ready and needs confirmation.
    ActionPending {
        /// Id to confirm.
        request_id: u64,
        /// Decision awaiting confirmation.
        decision: HedgeDecision,
    },
    /// A pending request lapsed without confirmation.
    PendingExpired {
        /// Lapsed request.
        request_id: u64,
    },
    /// A hedge order was dispatched.
    HedgeDispatched {
        /// Dispatched decision.
        decision: HedgeDecision,
    },
    /// A dispatched hedge failed.
    HedgeFailed {
        /// Failure class.
        kind: ErrorKind,
        /// Failure detail.
        message: String,
    },
}
