//! Monotonic time for hedging timers.
//!
//! Cooldowns, confirmation timeouts and signal ceilings are measured in
//! [`MonoTime`], never in wall-clock time. Backtests derive it from tick
//! timestamps through [`SimClock`]; the live pipeline reads it from
//! [`SystemClock`], which is backed by [`std::time::Instant`].
//!
//! Market data freshness is the one check made against wall time, read
//! through [`Clock::wall_time`] so tests and replays can pin it.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Point on a monotonic timeline, measured from the clock's origin.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MonoTime(Duration);

impl MonoTime {
    /// The clock origin.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Build from milliseconds since origin.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Build from seconds since origin.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Offset since origin.
    #[must_use]
    pub const fn since_origin(&self) -> Duration {
        self.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    #[must_use]
    pub const fn saturating_since(&self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    /// Advance by `delta`.
    #[must_use]
    pub fn plus(&self, delta: Duration) -> Self {
        Self(self.0.saturating_add(delta))
    }
}

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    /// Current monotonic time.
    fn now(&self) -> MonoTime;

    /// Current wall time, used to age market observations.
    fn wall_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClockError {
    /// Tick timestamp did not advance past the previous one.
    #[error("timestamp {next} does not advance past {previous}")]
    NonIncreasing {
        /// Last accepted timestamp.
        previous: DateTime<Utc>,
        /// Rejected timestamp.
        next: DateTime<Utc>,
    },
}

/// Simulated clock driven by tick timestamps.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    origin: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
    current: MonoTime,
}

impl SimClock {
    /// Create a clock with no origin; the first tick becomes the origin.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            origin: None,
            last: None,
            current: MonoTime::ZERO,
        }
    }

    /// Advance to `timestamp`. Rejects timestamps that do not strictly increase.
    pub fn advance_to(&mut self, timestamp: DateTime<Utc>) -> Result<MonoTime, ClockError> {
        if let Some(previous) = self.last {
            if timestamp <= previous {
                return Err(ClockError::NonIncreasing {
                    previous,
                    next: timestamp,
                });
            }
        }

        let origin = *self.origin.get_or_insert(timestamp);
        let offset = (timestamp - origin).to_std().unwrap_or(Duration::ZERO);
        self.current = MonoTime(offset);
        self.last = Some(timestamp);
        Ok(self.current)
    }

    /// Last accepted wall timestamp.
    #[must_use]
    pub const fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last
    }

    /// Forget all state so the same ticks can be replayed.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Clock for SimClock {
    fn now(&self) -> MonoTime {
        self.current
    }

    fn wall_time(&self) -> DateTime<Utc> {
        self.last.unwrap_or_default()
    }
}

/// Live clock backed by [`Instant`].
///
/// Wall time is the system time unless the clock is anchored, in which case
/// it runs forward from the anchor at the monotonic rate.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
    anchor: Option<DateTime<Utc>>,
}

impl SystemClock {
    /// Start a clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            anchor: None,
        }
    }

    /// Start a clock whose wall time reads `start` now.
    ///
    /// Used when replaying recorded ticks through the live pipeline.
    #[must_use]
    pub fn anchored_at(start: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            anchor: Some(start),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> MonoTime {
        MonoTime(self.origin.elapsed())
    }

    fn wall_time(&self) -> DateTime<Utc> {
        match self.anchor {
            Some(start) => {
                let elapsed = chrono::Duration::from_std(self.origin.elapsed())
                    .unwrap_or(chrono::Duration::zero());
                start + elapsed
            }
            None => Utc::now(),
        }
    }
}
