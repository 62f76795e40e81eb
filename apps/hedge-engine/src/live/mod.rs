//! Live hedging pipeline.
//!
//! A single writer task owns the decision engine and the portfolio. Every
//! mutation arrives as a [`PipelineCommand`] on an mpsc channel, so ticks,
//! operator confirmations and manual rebalance requests are applied one at a
//! time in arrival order.
//!
//! Readers never touch the writer's state:
//!
//! - `watch` channels publish the latest `Arc<RiskSnapshot>` and
//!   [`PortfolioView`](crate::portfolio::PortfolioView)
//! - a `broadcast` channel fans out [`Notification`](crate::hedging::Notification)s
//!
//! Forecaster, timing signal and execution backend calls are bounded by
//! `live.decision_timeout_ms`. A forecaster or signal timeout degrades the
//! engine to `Armed` with no action; an execution timeout is treated as a
//! failed hedge.
//!
//! # Example
//!
//! ```ignore
//! let pipeline = HedgePipeline::new(config_cell, portfolio, backend);
//! let handle = pipeline.spawn(CancellationToken::new());
//! let mut notifications = handle.subscribe();
//!
//! handle.send_tick(tick).await?;
//! handle.confirm(request_id).await?;
//! let portfolio = handle.shutdown().await?;
//! ```

mod pipeline;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use pipeline::HedgePipeline;

use crate::hedging::Notification;
use crate::market::MarketTick;
use crate::portfolio::{Portfolio, PortfolioView};
use crate::risk::RiskSnapshot;

/// Operator action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorInput {
    /// Confirm a pending manual hedge; it dispatches at the next tick.
    Confirm {
        /// Id from the `ActionPending` notification.
        request_id: u64,
    },
    /// Rebalance against the latest snapshot now.
    RequestHedge,
}

/// Message to the writer task.
#[derive(Debug, Clone)]
pub enum PipelineCommand {
    /// New market observation.
    Tick(MarketTick),
    /// Operator action.
    Operator(OperatorInput),
}

/// Live pipeline errors.
#[derive(Debug, Error)]
pub enum LiveError {
    /// The writer task has stopped.
    #[error("hedge pipeline is not running")]
    Closed,

    /// The writer task panicked or was aborted.
    #[error("hedge pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Client side of a running [`HedgePipeline`].
#[derive(Debug)]
pub struct PipelineHandle {
    commands: mpsc::Sender<PipelineCommand>,
    snapshots: watch::Receiver<Option<Arc<RiskSnapshot>>>,
    portfolio: watch::Receiver<PortfolioView>,
    notifications: broadcast::Sender<Notification>,
    shutdown: CancellationToken,
    task: JoinHandle<Portfolio>,
}

impl PipelineHandle {
    /// Queue a tick.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::Closed`] once the writer has stopped.
    pub async fn send_tick(&self, tick: MarketTick) -> Result<(), LiveError> {
        self.send(PipelineCommand::Tick(tick)).await
    }

    /// Confirm a pending manual hedge.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::Closed`] once the writer has stopped.
    pub async fn confirm(&self, request_id: u64) -> Result<(), LiveError> {
        self.send(PipelineCommand::Operator(OperatorInput::Confirm { request_id }))
            .await
    }

    /// Ask for an immediate rebalance.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::Closed`] once the writer has stopped.
    pub async fn request_hedge(&self) -> Result<(), LiveError> {
        self.send(PipelineCommand::Operator(OperatorInput::RequestHedge))
            .await
    }

    /// Queue any command.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::Closed`] once the writer has stopped.
    pub async fn send(&self, command: PipelineCommand) -> Result<(), LiveError> {
        self.commands.send(command).await.map_err(|_| LiveError::Closed)
    }

    /// New receiver for operator notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Receiver for risk snapshots; `None` until the first evaluated tick.
    #[must_use]
    pub fn snapshots(&self) -> watch::Receiver<Option<Arc<RiskSnapshot>>> {
        self.snapshots.clone()
    }

    /// Latest risk snapshot.
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<Arc<RiskSnapshot>> {
        self.snapshots.borrow().clone()
    }

    /// Receiver for portfolio summaries.
    #[must_use]
    pub fn portfolio(&self) -> watch::Receiver<PortfolioView> {
        self.portfolio.clone()
    }

    /// Stop the writer after the command in flight and return the final
    /// portfolio.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::Join`] if the writer task panicked.
    pub async fn shutdown(self) -> Result<Portfolio, LiveError> {
        self.shutdown.cancel();
        Ok(self.task.await?)
    }
}
