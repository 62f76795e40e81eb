//! Append-only backtest event log.
//!
//! Every tick, risk pass, decision, fill, roll, settlement and error is
//! appended as one [`BacktestEvent`]. Serialized as JSON lines, the log is
//! byte-identical across runs with the same inputs and seed.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::source::FeedError;
use crate::error::ErrorKind;
use crate::execution::Fill;
use crate::hedging::HedgeDecision;
use crate::pricing::{InstrumentId, StrategyId};
use crate::risk::RiskSnapshot;
use crate::strategy::RollEvent;

/// Risk summary logged once per evaluated tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRecord {
    /// Evaluation time.
    pub timestamp: DateTime<Utc>,
    /// Net delta.
    pub net_delta: Decimal,
    /// Net gamma.
    pub gamma: Decimal,
    /// Net vega.
    pub vega: Decimal,
    /// Net theta.
    pub theta: Decimal,
    /// Value at risk.
    pub var: Decimal,
    /// Worst stress scenario P&L.
    pub worst_stress_pnl: Decimal,
}

impl From<&RiskSnapshot> for RiskRecord {
    fn from(snapshot: &RiskSnapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp(),
            net_delta: snapshot.net_delta(),
            gamma: snapshot.gamma(),
            vega: snapshot.vega(),
            theta: snapshot.theta(),
            var: snapshot.var().total,
            worst_stress_pnl: snapshot.worst_stress_pnl(),
        }
    }
}

/// One entry in the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum BacktestEvent {
    /// Accepted tick.
    Tick {
        /// Tick time.
        timestamp: DateTime<Utc>,
        /// Spot price.
        price: Decimal,
        /// Perpetual price, when quoted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        perp_price: Option<Decimal>,
    },
    /// Risk pass.
    Risk(RiskRecord),
    /// Engine decision.
    Decision(HedgeDecision),
    /// Executed trade.
    Fill(Fill),
    /// Strategy roll.
    Roll(RollEvent),
    /// Option leg settled at expiry.
    Settlement {
        /// Settlement time.
        timestamp: DateTime<Utc>,
        /// Owning strategy.
        strategy_id: StrategyId,
        /// Settled contract.
        instrument_id: InstrumentId,
        /// Quantity closed.
        quantity: Decimal,
        /// Intrinsic value per unit.
        price: Decimal,
    },
    /// Non-fatal error.
    Error {
        /// When it happened.
        timestamp: DateTime<Utc>,
        /// Classification.
        kind: ErrorKind,
        /// Rendered error.
        message: String,
    },
}

/// Append-only list of [`BacktestEvent`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<BacktestEvent>,
}

impl EventLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&mut self, event: BacktestEvent) {
        self.events.push(event);
    }

    /// Events in append order.
    #[must_use]
    pub fn events(&self) -> &[BacktestEvent] {
        &self.events
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// One JSON object per line.
    pub fn to_jsonl(&self) -> Result<String, FeedError> {
        let mut out = String::new();
        for event in &self.events {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Write the log to `path` as JSON lines.
    pub fn write_jsonl(&self, path: impl AsRef<Path>) -> Result<(), FeedError> {
        let path = path.as_ref();
        let io = |source| FeedError::Io {
            path: path.display().to_string(),
            source,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(io)?);
        for event in &self.events {
            serde_json::to_writer(&mut writer, event)?;
            writer.write_all(b"\n").map_err(io)?;
        }
        writer.flush().map_err(io)
    }
}
