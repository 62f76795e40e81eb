//! Deterministic backtesting of the hedging loop.
//!
//! This module provides:
//!
//! - **Tick sources**: in-memory and JSON-lines feeds behind [`TickSource`]
//! - **Engine**: replays ticks through pricing, risk, hedging and execution
//! - **Event log**: append-only record of every tick, decision and fill
//! - **Report**: equity curve, drawdown, delta neutrality, error counts,
//!   buy-and-hold benchmark and P&L attribution
//! - **Sweep**: parallel grid over delta threshold and hedge ratio
//!
//! # Example
//!
//! ```ignore
//! use hedge_engine::backtest::{BacktestEngine, JsonLinesTickSource};
//! use hedge_engine::config::load_config;
//!
//! let config = load_config(Some("config.yaml"))?;
//! let engine = BacktestEngine::new(config)?;
//! let mut source = JsonLinesTickSource::open("ticks.jsonl")?;
//!
//! let outcome = engine.run(&mut source)?;
//! println!("{}", outcome.report);
//! outcome.events.write_jsonl("events.jsonl")?;
//! ```

mod engine;
mod event_log;
mod metrics;
mod report;
mod source;
mod sweep;

pub use engine::{BacktestEngine, BacktestOutcome, action_count};
pub use event_log::{BacktestEvent, EventLog, RiskRecord};
pub use metrics::{max_drawdown, mean, period_returns, sharpe_ratio, total_return};
pub use report::{BacktestReport, BenchmarkSummary, DeltaPoint, EquityPoint, NeutralityStats};
pub use source::{FeedError, InMemoryTickSource, JsonLinesTickSource, TickSource};
pub use sweep::{SweepResult, run_sweep, sweep_grid};
