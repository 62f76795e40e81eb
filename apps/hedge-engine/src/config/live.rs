//! Live pipeline configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Live pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Bound on every forecaster, signal and execution call.
    #[serde(default = "default_decision_timeout")]
    pub decision_timeout_ms: u64,
    /// Command channel capacity.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
    /// Notification channel capacity.
    #[serde(default = "default_notification_buffer")]
    pub notification_buffer: usize,
}

impl LiveConfig {
    /// Decision timeout as a duration.
    #[must_use]
    pub const fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            decision_timeout_ms: default_decision_timeout(),
            command_buffer: default_command_buffer(),
            notification_buffer: default_notification_buffer(),
        }
    }
}

const fn default_decision_timeout() -> u64 {
    2_000
}

const fn default_command_buffer() -> usize {
    256
}

const fn default_notification_buffer() -> usize {
    64
}
