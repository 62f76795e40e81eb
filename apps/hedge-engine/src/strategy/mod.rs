//! Multi-leg option strategies.
//!
//! This module provides:
//! - [`StrategyTemplate`]: tagged enum of supported structures, each with its
//!   own validation rule
//! - [`StrategyBuilder`]: validates, prices legs, assigns ids
//! - Rolls: close the old legs and open a replacement in the same lineage
//!
//! # Example
//!
//! ```ignore
//! use hedge_engine::strategy::{StrategyBuilder, StrategyTemplate};
//!
//! let template = StrategyTemplate::Collar {
//!     put_strike: dec!(45000),
//!     call_strike: dec!(55000),
//!     expiry,
//!     quantity: dec!(1),
//! };
//! let built = StrategyBuilder::new().build(&template, &market)?;
//! portfolio.add_strategy(built.strategy)?;
//! ```

mod builder;
mod error;
mod roll;
mod template;
mod types;

pub use builder::{BuiltStrategy, StrategyBuilder};
pub use error::StrategyError;
pub use roll::{RollEvent, RollPlan};
pub use template::{LegSpec, StrategyTemplate};
pub use types::{OptionLeg, Strategy, StrategyKind};
