//! Serialized writer task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{OperatorInput, PipelineCommand, PipelineHandle};
use crate::backtest::FeedError;
use crate::clock::{Clock, MonoTime, SimClock, SystemClock};
use crate::config::{ConfigCell, EngineConfig, HedgeInstrumentKind};
use crate::error::{ErrorKind, HedgeError};
use crate::execution::{ExecutionBackend, ExecutionQuote, Order};
use crate::hedging::{
    BetaEstimator, ConstantVolatility, EvaluationInput, HedgeEngine, HedgeTimingSignal,
    MovingAverageRegime, Notification, PriceHistory, RealizedVolatility, ReasonCode,
    TimingSignal, VolatilityForecaster,
};
use crate::market::{MarketSnapshot, MarketTick};
use crate::observability;
use crate::portfolio::{Portfolio, PortfolioView};
use crate::pricing::Instrument;
use crate::risk::{RiskAggregator, RiskSnapshot};

/// How often unconfirmed manual requests are checked for expiry.
const PENDING_SWEEP: Duration = Duration::from_millis(100);

/// Owner of the engine and portfolio in live mode.
///
/// Build with [`HedgePipeline::new`], then [`HedgePipeline::spawn`] it; all
/// further interaction goes through the returned [`PipelineHandle`].
pub struct HedgePipeline {
    config: Arc<ConfigCell>,
    applied: Arc<EngineConfig>,
    backend: Arc<dyn ExecutionBackend>,
    forecaster: Arc<dyn VolatilityForecaster>,
    timing: Option<Arc<dyn HedgeTimingSignal>>,
    clock: Arc<dyn Clock>,
    feed_clock: SimClock,
    aggregator: RiskAggregator,
    engine: HedgeEngine,
    beta: BetaEstimator,
    history: PriceHistory,
    portfolio: Portfolio,
    last_market: Option<MarketSnapshot>,
    snapshot_tx: watch::Sender<Option<Arc<RiskSnapshot>>>,
    view_tx: watch::Sender<PortfolioView>,
    notify_tx: broadcast::Sender<Notification>,
}

impl std::fmt::Debug for HedgePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HedgePipeline")
            .field("underlying", &self.portfolio.underlying())
            .field("state", &self.engine.state())
            .finish_non_exhaustive()
    }
}

impl HedgePipeline {
    /// Pipeline hedging `portfolio` through `backend`.
    ///
    /// Forecaster and timing signal are chosen from the current
    /// configuration the same way the backtest chooses them.
    #[must_use]
    pub fn new(
        config: Arc<ConfigCell>,
        portfolio: Portfolio,
        backend: Arc<dyn ExecutionBackend>,
    ) -> Self {
        let applied = config.snapshot();
        let forecaster: Arc<dyn VolatilityForecaster> = match applied.backtest.realized_vol_window {
            Some(window) => Arc::new(RealizedVolatility::new(
                window,
                f64::from(applied.backtest.periods_per_year),
            )),
            None => Arc::new(ConstantVolatility(applied.pricing.default_volatility)),
        };
        let timing: Option<Arc<dyn HedgeTimingSignal>> = if applied.hedging.timing_signal_enabled
        {
            Some(Arc::new(MovingAverageRegime::from_config(&applied.hedging.regime)))
        } else {
            None
        };
        let history_len = applied
            .hedging
            .regime
            .slow_window
            .max(applied.backtest.realized_vol_window.unwrap_or(0))
            + 1;
        let (snapshot_tx, _) = watch::channel(None);
        let (view_tx, _) = watch::channel(portfolio.view());
        let (notify_tx, _) = broadcast::channel(applied.live.notification_buffer.max(1));

        Self {
            aggregator: RiskAggregator::new(applied.risk.clone()),
            engine: HedgeEngine::new(portfolio.underlying()),
            beta: BetaEstimator::new(applied.hedging.beta.clone()),
            history: PriceHistory::new(history_len),
            config,
            applied,
            backend,
            forecaster,
            timing,
            clock: Arc::new(SystemClock::new()),
            feed_clock: SimClock::new(),
            portfolio,
            last_market: None,
            snapshot_tx,
            view_tx,
            notify_tx,
        }
    }

    /// Replace the volatility forecaster.
    #[must_use]
    pub fn with_forecaster(mut self, forecaster: Arc<dyn VolatilityForecaster>) -> Self {
        self.forecaster = forecaster;
        self
    }

    /// Replace the timing signal.
    #[must_use]
    pub fn with_timing_signal(mut self, timing: Arc<dyn HedgeTimingSignal>) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Replace the timer clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start the writer task.
    ///
    /// Cancelling `shutdown` stops intake; commands already queued are still
    /// applied before the task returns the final portfolio.
    #[must_use]
    pub fn spawn(self, shutdown: CancellationToken) -> PipelineHandle {
        let (commands, rx) = mpsc::channel(self.applied.live.command_buffer.max(1));
        let snapshots = self.snapshot_tx.subscribe();
        let portfolio = self.view_tx.subscribe();
        let notifications = self.notify_tx.clone();
        let task = tokio::spawn(self.run(rx, shutdown.clone()));

        PipelineHandle {
            commands,
            snapshots,
            portfolio,
            notifications,
            shutdown,
            task,
        }
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<PipelineCommand>,
        shutdown: CancellationToken,
    ) -> Portfolio {
        let mut sweep = tokio::time::interval(PENDING_SWEEP);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(underlying = %self.portfolio.underlying(), "Hedge pipeline started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                command = rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = sweep.tick() => self.expire_pending(),
            }
        }

        rx.close();
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        info!(state = %self.engine.state(), "Hedge pipeline stopped");
        self.portfolio
    }

    async fn handle(&mut self, command: PipelineCommand) {
        match command {
            PipelineCommand::Tick(tick) => self.on_tick(&tick).await,
            PipelineCommand::Operator(OperatorInput::Confirm { request_id }) => {
                if !self.engine.confirm(request_id) {
                    warn!(request_id, "Confirmation for unknown or closed request");
                }
            }
            PipelineCommand::Operator(OperatorInput::RequestHedge) => self.on_request().await,
        }
        self.publish_notifications();
    }

    async fn on_tick(&mut self, tick: &MarketTick) {
        let started = Instant::now();
        if let Err(e) = tick.validate() {
            report_error(e.kind(), &e.to_string());
            return;
        }
        if let Err(e) = self.feed_clock.advance_to(tick.timestamp) {
            let err = FeedError::from(e);
            report_error(err.kind(), &err.to_string());
            return;
        }
        self.refresh_config();
        if let Err(e) = self.aggregator.check_freshness(tick.observed_at(), self.clock.wall_time()) {
            report_error(e.kind(), &e.to_string());
            return;
        }
        let config = Arc::clone(&self.applied);
        let now = self.clock.now();
        let limit = config.live.decision_timeout();

        self.history.push(tick.price);
        let volatility = match tick.implied_vol {
            Some(vol) => vol,
            None => {
                let forecaster = Arc::clone(&self.forecaster);
                let prices = self.history.as_slice().to_vec();
                match bounded("volatility forecast", limit, move || forecaster.forecast(&prices)).await {
                    Ok(vol) => vol.unwrap_or(config.pricing.default_volatility),
                    Err(e) => {
                        self.degrade(now, tick.timestamp, &e);
                        return;
                    }
                }
            }
        };
        let market = MarketSnapshot::from_tick(
            tick,
            self.portfolio.underlying(),
            volatility,
            config.pricing.risk_free_rate,
            config.pricing.carry,
            config.execution.default_liquidity,
        );

        if let Some(perp) = tick.perp_price {
            self.beta.observe(tick.price, perp);
        }
        let beta = config.pricing.perp_beta.unwrap_or_else(|| self.beta.beta());
        self.aggregator.set_perp_beta(beta);

        let Some(snapshot) = self.publish_snapshot(&market) else {
            return;
        };
        let timing = match self.timing_signal(limit).await {
            Ok(timing) => timing,
            Err(e) => {
                self.degrade(now, tick.timestamp, &e);
                return;
            }
        };

        let (hedge_instrument, hedge_delta) = hedge_leg(&config, self.portfolio.underlying(), beta);
        let input = EvaluationInput {
            snapshot: &snapshot,
            now,
            hedge_instrument: &hedge_instrument,
            hedge_position: self.portfolio.quantity_of(&hedge_instrument),
            hedge_delta,
            timing,
        };
        let decision = self.engine.evaluate(&config.hedging, &input);
        observability::record_decision(&decision);
        if let Some(order) = decision.order() {
            self.execute(&config, &order, &market, now, hedge_delta).await;
        }

        self.last_market = Some(market);
        self.view_tx.send_replace(self.portfolio.view());
        observability::record_cycle_latency(started.elapsed().as_secs_f64());
    }

    /// Operator rebalance against the last market, re-snapshotting so fills
    /// since the last tick are accounted for.
    async fn on_request(&mut self) {
        let Some(market) = self.last_market.clone() else {
            warn!("Hedge requested before the first evaluated tick");
            return;
        };
        self.refresh_config();
        let config = Arc::clone(&self.applied);
        let now = self.clock.now();
        let Some(snapshot) = self.publish_snapshot(&market) else {
            return;
        };

        let beta = self.aggregator.perp_beta();
        let (hedge_instrument, hedge_delta) = hedge_leg(&config, self.portfolio.underlying(), beta);
        let input = EvaluationInput {
            snapshot: &snapshot,
            now,
            hedge_instrument: &hedge_instrument,
            hedge_position: self.portfolio.quantity_of(&hedge_instrument),
            hedge_delta,
            timing: None,
        };
        let decision = self.engine.request_decision(&config.hedging, &input);
        observability::record_decision(&decision);
        if let Some(order) = decision.order() {
            self.execute(&config, &order, &market, now, hedge_delta).await;
        }
        self.view_tx.send_replace(self.portfolio.view());
    }

    fn refresh_config(&mut self) {
        let current = self.config.snapshot();
        if Arc::ptr_eq(&current, &self.applied) {
            return;
        }
        if current.risk != self.applied.risk {
            self.aggregator.set_config(current.risk.clone());
        }
        debug!("Configuration update applied");
        self.applied = current;
    }

    fn publish_snapshot(&mut self, market: &MarketSnapshot) -> Option<Arc<RiskSnapshot>> {
        match self.aggregator.snapshot(&self.portfolio, market, self.clock.wall_time()) {
            Ok(snapshot) => {
                observability::record_risk(&snapshot);
                let snapshot = Arc::new(snapshot);
                self.snapshot_tx.send_replace(Some(Arc::clone(&snapshot)));
                Some(snapshot)
            }
            Err(e) => {
                report_error(e.kind(), &e.to_string());
                None
            }
        }
    }

    async fn timing_signal(&mut self, limit: Duration) -> Result<Option<TimingSignal>, HedgeError> {
        let Some(signal) = self.timing.as_ref().map(Arc::clone) else {
            return Ok(None);
        };
        let prices = self.history.as_slice().to_vec();
        bounded("timing signal", limit, move || signal.evaluate(&prices)).await
    }

    async fn execute(
        &mut self,
        config: &EngineConfig,
        order: &Order,
        market: &MarketSnapshot,
        now: MonoTime,
        hedge_delta: Decimal,
    ) {
        let quote = match ExecutionQuote::for_instrument(&order.instrument, market, self.aggregator.perp_beta()) {
            Ok(quote) => quote,
            Err(e) => {
                self.fail_hedge(config, now, e.kind(), &e.to_string());
                return;
            }
        };
        let limit = config.live.decision_timeout();
        let backend = Arc::clone(&self.backend);

        match tokio::time::timeout(limit, backend.execute(order, &quote)).await {
            Ok(Ok(fill)) => {
                if let Err(e) = self.portfolio.apply_fill(&fill) {
                    self.fail_hedge(config, now, e.kind(), &e.to_string());
                    return;
                }
                observability::record_fill(&fill);
                self.engine.on_fill(&config.hedging, now, &fill, hedge_delta);
            }
            Ok(Err(e)) => self.fail_hedge(config, now, e.kind(), &e.to_string()),
            Err(_) => {
                let err = HedgeError::Timeout {
                    operation: "execution".to_string(),
                    timeout_ms: config.live.decision_timeout_ms,
                };
                self.fail_hedge(config, now, err.kind(), &err.to_string());
            }
        }
    }

    fn fail_hedge(&mut self, config: &EngineConfig, now: MonoTime, kind: ErrorKind, message: &str) {
        observability::record_error(kind);
        self.engine.on_fill_failed(&config.hedging, now, kind, message);
    }

    fn degrade(&mut self, now: MonoTime, timestamp: DateTime<Utc>, err: &HedgeError) {
        report_error(err.kind(), &err.to_string());
        let decision = self.engine.degrade(now, timestamp, ReasonCode::Timeout);
        observability::record_decision(&decision);
    }

    fn expire_pending(&mut self) {
        if self.engine.expire_pending(self.clock.now()).is_some() {
            self.publish_notifications();
        }
    }

    fn publish_notifications(&mut self) {
        for notification in self.engine.drain_notifications() {
            debug!(?notification, "Publishing notification");
            // no subscribers is not an error
            let _ = self.notify_tx.send(notification);
        }
    }
}

fn hedge_leg(config: &EngineConfig, underlying: &str, beta: Decimal) -> (Instrument, Decimal) {
    match config.hedging.hedge_instrument {
        HedgeInstrumentKind::Perpetual => (Instrument::perpetual(underlying), beta),
        HedgeInstrumentKind::Spot => (Instrument::spot(underlying), Decimal::ONE),
    }
}

fn report_error(kind: ErrorKind, message: &str) {
    warn!(kind = %kind, error = message, "Live cycle step failed");
    observability::record_error(kind);
}

/// Run a synchronous model call on the blocking pool, bounded by `limit`.
async fn bounded<T, F>(operation: &str, limit: Duration, call: F) -> Result<Option<T>, HedgeError>
where
    T: Send + 'static,
    F: FnOnce() -> Option<T> + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(call)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!(operation, error = %e, "Model call failed");
            Ok(None)
        }
        Err(_) => Err(HedgeError::Timeout {
            operation: operation.to_string(),
            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
