// Allow unwrap/expect/panic in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! Hedge Engine
//!
//! Delta hedging risk engine for a cryptocurrency spot position, plus the
//! event-driven backtester that exercises it.
//!
//! # Architecture
//!
//! ```text
//! MarketTick ──► pricing ──► risk ──► hedging ──► execution ──► portfolio
//!                  │           │         │            │             │
//!                  │           │         │            │             └─ apply_fill (sole mutator)
//!                  │           │         │            └─ slippage, fees, partial fills
//!                  │           │         └─ Idle / Armed / Hedging / Hedged
//!                  │           └─ net Greeks, VaR, stress P&L
//!                  └─ Black-Scholes price + Greeks
//! ```
//!
//! The [`backtest`] module replays this loop offline and deterministically;
//! the [`live`] module runs it behind a single serialized writer task.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Deterministic backtest engine, tick sources, event log and report.
pub mod backtest;

/// Monotonic clock abstraction for hedging timers.
pub mod clock;

/// Configuration loading with environment interpolation.
pub mod config;

/// Crate-level error aggregation and error kinds.
pub mod error;

/// Execution simulator: slippage, fees, partial fills.
pub mod execution;

/// Option sensitivities and their aggregation.
pub mod greeks;

/// Hedging decision engine and its state machine.
pub mod hedging;

/// Live pipeline: single writer task, watch readers, notifications.
pub mod live;

/// Market ticks and the derived market snapshot.
pub mod market;

/// Metrics counters and the optional Prometheus exporter.
pub mod observability;

/// Positions, strategies and the portfolio ledger.
pub mod portfolio;

/// Black-Scholes pricing, implied volatility, instrument identity.
pub mod pricing;

/// Portfolio risk aggregation: Greeks, VaR, stress testing.
pub mod risk;

/// Multi-leg option strategy templates, builder and rolls.
pub mod strategy;

/// Tracing subscriber setup.
pub mod telemetry;

pub use error::{ErrorKind, HedgeError};
pub use greeks::Greeks;
