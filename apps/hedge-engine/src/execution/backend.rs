//! Fill-producing contracts shared by the backtest and live paths.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::error::ExecutionError;
use super::order::{ExecutionQuote, Fill, Order};
use super::simulator::ExecutionSimulator;

/// Synchronous fill source used by the backtest loop.
pub trait FillModel {
    /// Execute `order` against `quote`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionError`] when the order cannot be filled.
    fn execute(&mut self, order: &Order, quote: &ExecutionQuote) -> Result<Fill, ExecutionError>;
}

impl FillModel for ExecutionSimulator {
    fn execute(&mut self, order: &Order, quote: &ExecutionQuote) -> Result<Fill, ExecutionError> {
        Self::execute(self, order, quote)
    }
}

/// Asynchronous fill source used by the live pipeline.
///
/// Implementations talk to an exchange; the pipeline bounds every call with
/// its decision timeout.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Execute `order` against `quote`.
    async fn execute(&self, order: &Order, quote: &ExecutionQuote)
    -> Result<Fill, ExecutionError>;
}

/// [`ExecutionSimulator`] behind the async contract, for paper trading.
#[derive(Debug)]
pub struct SimulatedBackend {
    simulator: Mutex<ExecutionSimulator>,
}

impl SimulatedBackend {
    /// Wrap a simulator.
    #[must_use]
    pub fn new(simulator: ExecutionSimulator) -> Self {
        Self {
            simulator: Mutex::new(simulator),
        }
    }
}

#[async_trait]
impl ExecutionBackend for SimulatedBackend {
    async fn execute(
        &self,
        order: &Order,
        quote: &ExecutionQuote,
    ) -> Result<Fill, ExecutionError> {
        self.simulator.lock().await.execute(order, quote)
    }
}
