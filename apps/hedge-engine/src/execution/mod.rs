//! Order execution.
//!
//! The backtest fills through the synchronous [`FillModel`]; the live
//! pipeline through the async [`ExecutionBackend`]. Both return the same
//! [`Fill`], so the decision engine cannot tell them apart.

mod backend;
mod error;
mod fees;
mod order;
mod simulator;
mod slippage;

pub use backend::{ExecutionBackend, FillModel, SimulatedBackend};
pub use error::ExecutionError;
pub use fees::{fee_for, linear_fee, option_fee};
pub use order::{ExecutionQuote, Fill, Order, Side};
pub use simulator::ExecutionSimulator;
pub use slippage::{apply_slippage, slippage_bps};
