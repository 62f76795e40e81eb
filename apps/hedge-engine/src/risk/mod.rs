//! Portfolio risk aggregation.
//!
//! This module provides:
//! - [`RiskAggregator`]: re-prices every leg and builds one [`RiskSnapshot`]
//!   per evaluation
//! - Parametric VaR with a configurable gamma term ([`parametric_var`])
//! - Full-revaluation stress scenarios ([`run_stress`])
//!
//! # Example
//!
//! ```rust,ignore
//! use hedge_engine::risk::RiskAggregator;
//!
//! let aggregator = RiskAggregator::new(config.risk.clone());
//! let snapshot = aggregator.snapshot(&portfolio, &market, tick.timestamp)?;
//! println!("net delta {} VaR {}", snapshot.net_delta(), snapshot.var().total);
//! ```

mod aggregator;
mod error;
mod snapshot;
mod stress;
mod var;

pub use aggregator::RiskAggregator;
pub use error::RiskError;
pub use snapshot::{LegRisk, RiskSnapshot};
pub use stress::{StressResult, run_stress};
pub use var::{VarBreakdown, parametric_var, z_score};
