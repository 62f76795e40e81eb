//! Hedge states and the per-key timer arena.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::decision::HedgeDecision;
use crate::clock::MonoTime;
use crate::pricing::StrategyId;

/// Decision engine state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HedgeState {
    /// No breach, no recent hedge.
    #[default]
    Idle,
    /// Breach detected, waiting on cooldown, confirmation or signal.
    Armed,
    /// Order dispatched, waiting for its fill.
    Hedging,
    /// Within tolerance after a hedge.
    Hedged,
}

impl fmt::Display for HedgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Armed => "armed",
            Self::Hedging => "hedging",
            Self::Hedged => "hedged",
        };
        f.write_str(name)
    }
}

/// What a timer record tracks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum HedgeKey {
    /// Delta hedge of one underlying.
    Underlying(String),
    /// Lifecycle of one strategy (rolls).
    Strategy(StrategyId),
}

/// Manual-mode request waiting for an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Identifier the operator confirms.
    pub request_id: u64,
    /// Decision that will dispatch on confirmation.
    pub decision: HedgeDecision,
    /// When the request lapses.
    pub expires_at: MonoTime,
    /// Operator confirmed it.
    pub confirmed: bool,
}

/// Transient state for one key. Holds ids only, never positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerRecord {
    /// Current state.
    pub state: HedgeState,
    /// Calm state to return to if a breach clears before dispatch.
    pub calm_state: HedgeState,
    /// When the current breach armed the engine.
    pub armed_at: Option<MonoTime>,
    /// Consecutive breached evaluations.
    pub breach_count: u32,
    /// Consecutive in-tolerance evaluations while hedged.
    pub calm_count: u32,
    /// Deviation from target when the last order was dispatched.
    pub dispatched_deviation: Option<Decimal>,
    /// Open manual request.
    pub pending: Option<PendingRequest>,
    /// When a roll was requested, for strategy keys.
    pub roll_requested_at: Option<MonoTime>,
}

impl TimerRecord {
    /// Move to `Armed` at `now`, remembering the calm state.
    pub(crate) fn arm(&mut self, now: MonoTime) {
        if self.state != HedgeState::Armed {
            self.calm_state = match self.state {
                HedgeState::Hedged => HedgeState::Hedged,
                _ => HedgeState::Idle,
            };
        }
        self.state = HedgeState::Armed;
        self.armed_at = Some(now);
        self.calm_count = 0;
    }

    /// Time since arming; zero when not armed.
    #[must_use]
    pub fn armed_for(&self, now: MonoTime) -> std::time::Duration {
        self.armed_at
            .map_or(std::time::Duration::ZERO, |at| now.saturating_since(at))
    }
}

/// Arena of timer records keyed by [`HedgeKey`].
#[derive(Debug, Clone, Default)]
pub struct TimerTable {
    records: BTreeMap<HedgeKey, TimerRecord>,
}

impl TimerTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &HedgeKey) -> Option<&TimerRecord> {
        self.records.get(key)
    }

    /// Record for `key`, created idle on first use.
    pub fn entry(&mut self, key: HedgeKey) -> &mut TimerRecord {
        self.records.entry(key).or_default()
    }

    /// Drop the record for `key`. Returns whether one existed.
    pub fn reset(&mut self, key: &HedgeKey) -> bool {
        self.records.remove(key).is_some()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_defaults_to_idle() {
        let mut table = TimerTable::new();
        let key = HedgeKey::Underlying("BTC".to_string());
        assert_eq!(table.entry(key.clone()).state, HedgeState::Idle);
        assert_eq!(table.len(), 1);
        assert!(table.reset(&key));
        assert!(table.get(&key).is_none());
        assert!(!table.reset(&key));
    }

    #[test]
    fn test_arm_remembers_calm_state() {
        let mut record = TimerRecord {
            state: HedgeState::Hedged,
            calm_count: 2,
            ..TimerRecord::default()
        };
        record.arm(MonoTime::from_secs(10));
        assert_eq!(record.state, HedgeState::Armed);
        assert_eq!(record.calm_state, HedgeState::Hedged);
        assert_eq!(record.calm_count, 0);
        // re-arming keeps the original calm state
        record.arm(MonoTime::from_secs(20));
        assert_eq!(record.calm_state, HedgeState::Hedged);
        assert_eq!(record.armed_for(MonoTime::from_secs(25)).as_secs(), 5);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(HedgeState::Hedging.to_string(), "hedging");
    }
}
