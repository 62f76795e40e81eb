//! Deterministic backtest loop.
//!
//! Each accepted tick runs one full cycle:
//!
//! 1. Advance the simulated clock (non-increasing ticks are rejected)
//! 2. Reject stale observations before anything is mutated
//! 3. Feed the beta estimator and price history
//! 4. Settle expired strategies, roll those inside the roll window
//! 5. Risk snapshot, hedge decision, fill, portfolio update
//! 6. Mark equity for the hedged portfolio and the buy-and-hold benchmark
//!
//! Every step appends to the [`EventLog`]. Nothing reads the wall clock and
//! the only randomness is the seeded execution simulator, so two runs over
//! the same ticks produce identical logs.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::event_log::{BacktestEvent, EventLog, RiskRecord};
use super::report::{BacktestReport, ReportBuilder};
use super::source::{FeedError, TickSource};
use crate::clock::{MonoTime, SimClock};
use crate::config::{ConfigError, EngineConfig, HedgeInstrumentKind, validate_config};
use crate::error::{ErrorKind, HedgeError};
use crate::execution::{
    ExecutionError, ExecutionQuote, ExecutionSimulator, Fill, FillModel, Order,
};
use crate::hedging::{
    BetaEstimator, ConstantVolatility, DecisionLog, DecisionTarget, EvaluationInput,
    HedgeAction, HedgeEngine, HedgeTimingSignal, MovingAverageRegime, PriceHistory,
    RealizedVolatility, VolatilityForecaster,
};
use crate::market::{MarketSnapshot, MarketTick};
use crate::observability;
use crate::portfolio::{PnlAttribution, Portfolio};
use crate::pricing::{Instrument, StrategyId, value_instrument};
use crate::risk::RiskAggregator;
use crate::strategy::{Strategy, StrategyBuilder, StrategyTemplate};

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct BacktestOutcome {
    /// Summary statistics.
    pub report: BacktestReport,
    /// Append-only event log.
    pub events: EventLog,
    /// Every engine decision.
    pub decisions: DecisionLog,
    /// Final portfolio; `None` when no tick was accepted.
    pub portfolio: Option<Portfolio>,
}

/// Replays ticks through the hedging cycle.
pub struct BacktestEngine {
    config: EngineConfig,
    forecaster: Box<dyn VolatilityForecaster>,
    timing: Option<Box<dyn HedgeTimingSignal>>,
}

impl std::fmt::Debug for BacktestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacktestEngine")
            .field("config", &self.config)
            .field("timing", &self.timing.is_some())
            .finish_non_exhaustive()
    }
}

impl BacktestEngine {
    /// Engine for a validated configuration.
    ///
    /// Volatility comes from a realized-volatility window when configured,
    /// otherwise the default volatility. The moving-average regime filter
    /// is attached when timing signals are enabled.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        validate_config(&config)?;
        let forecaster: Box<dyn VolatilityForecaster> = match config.backtest.realized_vol_window {
            Some(window) => Box::new(RealizedVolatility::new(
                window,
                f64::from(config.backtest.periods_per_year),
            )),
            None => Box::new(ConstantVolatility(config.pricing.default_volatility)),
        };
        let timing: Option<Box<dyn HedgeTimingSignal>> = if config.hedging.timing_signal_enabled {
            Some(Box::new(MovingAverageRegime::from_config(&config.hedging.regime)))
        } else {
            None
        };
        Ok(Self {
            config,
            forecaster,
            timing,
        })
    }

    /// Replace the volatility forecaster.
    #[must_use]
    pub fn with_forecaster(mut self, forecaster: Box<dyn VolatilityForecaster>) -> Self {
        self.forecaster = forecaster;
        self
    }

    /// Replace the timing signal.
    #[must_use]
    pub fn with_timing_signal(mut self, timing: Box<dyn HedgeTimingSignal>) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run over every tick of `source`, from its start.
    ///
    /// Per-tick failures are logged and counted; only unrecoverable feed
    /// errors abort the run.
    pub fn run(&self, source: &mut dyn TickSource) -> Result<BacktestOutcome, HedgeError> {
        source.reset()?;
        let mut run = Run::new(self);
        info!(
            underlying = %self.config.backtest.underlying,
            initial_cash = %self.config.backtest.initial_cash,
            spot_quantity = %self.config.backtest.spot_quantity,
            "Backtest started"
        );

        while let Some(next) = source.next_tick() {
            match next {
                Ok(tick) => run.on_tick(&tick),
                Err(e) if e.is_recoverable() => {
                    let at = run.clock.last_timestamp().unwrap_or(DateTime::UNIX_EPOCH);
                    run.record_error(at, e.kind(), e.to_string());
                }
                Err(e) => return Err(e.into()),
            }
        }

        let outcome = run.finish();
        info!(
            ticks = outcome.report.ticks_processed,
            final_equity = %outcome.report.final_equity,
            total_return = %outcome.report.total_return,
            benchmark_return = %outcome.report.benchmark.total_return,
            fills = outcome.report.fills,
            errors = outcome.report.error_total(),
            "Backtest finished"
        );
        Ok(outcome)
    }
}

/// Mutable state of one run.
struct Run<'a> {
    config: &'a EngineConfig,
    forecaster: &'a dyn VolatilityForecaster,
    timing: Option<&'a dyn HedgeTimingSignal>,
    clock: SimClock,
    aggregator: RiskAggregator,
    engine: HedgeEngine,
    fills: Box<dyn FillModel>,
    builder: StrategyBuilder,
    beta: BetaEstimator,
    history: PriceHistory,
    hedge_instrument: Instrument,
    portfolio: Portfolio,
    opened: bool,
    benchmark_cash: Decimal,
    last_market: Option<MarketSnapshot>,
    events: EventLog,
    report: ReportBuilder,
}

impl<'a> Run<'a> {
    fn new(backtest: &'a BacktestEngine) -> Self {
        let config = &backtest.config;
        let underlying = config.backtest.underlying.as_str();
        let hedge_instrument = match config.hedging.hedge_instrument {
            HedgeInstrumentKind::Perpetual => Instrument::perpetual(underlying),
            HedgeInstrumentKind::Spot => Instrument::spot(underlying),
        };
        let history_len = [
            config.hedging.regime.slow_window,
            config.backtest.realized_vol_window.unwrap_or(0),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1;

        Self {
            config,
            forecaster: &*backtest.forecaster,
            timing: backtest.timing.as_deref(),
            clock: SimClock::new(),
            aggregator: RiskAggregator::new(config.risk.clone()),
            engine: HedgeEngine::new(underlying),
            fills: Box::new(ExecutionSimulator::new(config.execution.clone())),
            builder: StrategyBuilder::new(),
            beta: BetaEstimator::new(config.hedging.beta.clone()),
            history: PriceHistory::new(history_len),
            hedge_instrument,
            portfolio: Portfolio::new(underlying, config.backtest.initial_cash),
            opened: false,
            benchmark_cash: Decimal::ZERO,
            last_market: None,
            events: EventLog::new(),
            report: ReportBuilder::default(),
        }
    }

    fn on_tick(&mut self, tick: &MarketTick) {
        if let Err(e) = tick.validate() {
            self.record_error(tick.timestamp, e.kind(), e.to_string());
            return;
        }
        let now = match self.clock.advance_to(tick.timestamp) {
            Ok(now) => now,
            Err(e) => {
                let err = FeedError::from(e);
                self.record_error(tick.timestamp, err.kind(), err.to_string());
                return;
            }
        };
        self.report.tick();

        if let Err(e) = self.aggregator.check_freshness(tick.observed_at(), tick.timestamp) {
            self.record_error(tick.timestamp, e.kind(), e.to_string());
            return;
        }
        let market = self.market(tick);
        self.events.push(BacktestEvent::Tick {
            timestamp: tick.timestamp,
            price: tick.price,
            perp_price: tick.perp_price,
        });

        if let Some(perp) = tick.perp_price {
            self.beta.observe(tick.price, perp);
        }
        let beta = self.config.pricing.perp_beta.unwrap_or_else(|| self.beta.beta());
        self.aggregator.set_perp_beta(beta);

        if !self.opened {
            self.open(&market);
        }
        self.settle_expired(&market);
        self.roll_strategies(&market, now);
        self.hedge(&market, now, beta);
        self.last_market = Some(market);
    }

    fn market(&mut self, tick: &MarketTick) -> MarketSnapshot {
        self.history.push(tick.price);
        let volatility = tick
            .implied_vol
            .or_else(|| self.forecaster.forecast(self.history.as_slice()))
            .unwrap_or(self.config.pricing.default_volatility);
        MarketSnapshot::from_tick(
            tick,
            &self.config.backtest.underlying,
            volatility,
            self.config.pricing.risk_free_rate,
            self.config.pricing.carry,
            self.config.execution.default_liquidity,
        )
    }

    /// Buy the spot holding at the first price and open configured strategies.
    fn open(&mut self, market: &MarketSnapshot) {
        let config = self.config;
        let backtest = &config.backtest;
        self.benchmark_cash = backtest.initial_cash - backtest.spot_quantity * market.spot;
        self.portfolio = Portfolio::with_spot(
            &backtest.underlying,
            self.benchmark_cash,
            backtest.spot_quantity,
            market.spot,
        );
        self.opened = true;
        info!(
            spot = %market.spot,
            quantity = %backtest.spot_quantity,
            strategies = backtest.strategies.len(),
            "Portfolio opened"
        );

        for template in &backtest.strategies {
            self.open_strategy(template, market);
        }
    }

    fn open_strategy(&mut self, template: &StrategyTemplate, market: &MarketSnapshot) {
        let built = match self.builder.build(template, market) {
            Ok(built) => built,
            Err(e) => {
                self.record_error(market.timestamp, e.kind(), e.to_string());
                return;
            }
        };
        if let Err(e) = self.portfolio.add_strategy(built.strategy) {
            self.record_error(market.timestamp, e.kind(), e.to_string());
            return;
        }
        for order in &built.orders {
            if let Err(e) = self.execute(order, market) {
                self.record_error(market.timestamp, e.kind(), e.to_string());
            }
        }
    }

    /// Close strategies whose nearest expiry has passed: expired legs at
    /// intrinsic value, any later legs at their model mark.
    fn settle_expired(&mut self, market: &MarketSnapshot) {
        let expired: Vec<StrategyId> = self
            .portfolio
            .strategies()
            .filter(|s| s.nearest_expiry().is_some_and(|e| e <= market.timestamp))
            .map(|s| s.id.clone())
            .collect();

        for id in expired {
            let closing = match self.portfolio.begin_close_strategy(&id) {
                Ok(closing) => closing,
                Err(e) => {
                    self.record_error(market.timestamp, e.kind(), e.to_string());
                    continue;
                }
            };
            for (instrument, quantity) in closing {
                let Some(contract) = instrument.as_option() else {
                    continue;
                };
                let price = if contract.expiry <= market.timestamp {
                    contract.intrinsic(market.spot)
                } else {
                    value_instrument(&instrument, market, self.aggregator.perp_beta())
                        .map_or_else(|_| contract.intrinsic(market.spot), |q| q.mark)
                };
                let fill = Fill {
                    instrument: instrument.clone(),
                    quantity,
                    price,
                    fee: Decimal::ZERO,
                    timestamp: market.timestamp,
                    strategy_id: Some(id.clone()),
                    requested_quantity: quantity,
                };
                if let Err(e) = self.portfolio.apply_fill(&fill) {
                    self.record_error(market.timestamp, e.kind(), e.to_string());
                    continue;
                }
                self.events.push(BacktestEvent::Settlement {
                    timestamp: market.timestamp,
                    strategy_id: id.clone(),
                    instrument_id: instrument.id(),
                    quantity,
                    price,
                });
                self.report.settlement();
            }
            info!(strategy_id = %id, spot = %market.spot, "Strategy settled at expiry");
            self.engine.on_strategy_closed(&id);
        }
    }

    fn roll_strategies(&mut self, market: &MarketSnapshot, now: MonoTime) {
        let config = self.config;
        if !config.backtest.roll.enabled {
            return;
        }
        let decisions = self.engine.check_rolls(
            &config.hedging,
            self.portfolio.strategies(),
            market.timestamp,
            now,
        );

        for decision in decisions {
            self.report.action(decision.action);
            observability::record_decision(&decision);
            self.events.push(BacktestEvent::Decision(decision.clone()));
            let DecisionTarget::Strategy { strategy_id } = decision.target else {
                continue;
            };
            let Some(current) = self.portfolio.strategy(&strategy_id).cloned() else {
                continue;
            };
            self.roll(&current, market);
        }
    }

    /// Close `current` and open the same structure further out, strikes
    /// rescaled by the spot move since entry.
    fn roll(&mut self, current: &Strategy, market: &MarketSnapshot) {
        let config = self.config;
        let policy = &config.backtest.roll;
        let scale = if current.entry_spot.is_zero() {
            Decimal::ONE
        } else {
            market.spot / current.entry_spot
        };
        let template =
            current
                .template
                .rolled(Duration::days(policy.roll_forward_days), scale, policy.strike_step);

        let plan = match self.builder.roll(current, &template, market) {
            Ok(plan) => plan,
            Err(e) => {
                self.record_error(market.timestamp, e.kind(), e.to_string());
                return;
            }
        };

        if let Err(e) = self.portfolio.begin_close_strategy(&current.id) {
            self.record_error(market.timestamp, e.kind(), e.to_string());
            return;
        }
        for order in &plan.close_orders {
            if let Err(e) = self.execute(order, market) {
                self.record_error(market.timestamp, e.kind(), e.to_string());
            }
        }
        if self.portfolio.strategy(&current.id).is_none() {
            self.engine.on_strategy_closed(&current.id);
        }

        if let Err(e) = self.portfolio.add_strategy(plan.replacement.strategy.clone()) {
            self.record_error(market.timestamp, e.kind(), e.to_string());
            return;
        }
        for order in &plan.replacement.orders {
            if let Err(e) = self.execute(order, market) {
                self.record_error(market.timestamp, e.kind(), e.to_string());
            }
        }

        self.events.push(BacktestEvent::Roll(plan.event(market.timestamp)));
        self.report.roll();
    }

    fn hedge(&mut self, market: &MarketSnapshot, now: MonoTime, beta: Decimal) {
        let snapshot = match self
            .aggregator
            .snapshot(&self.portfolio, market, market.timestamp)
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record_error(market.timestamp, e.kind(), e.to_string());
                return;
            }
        };
        observability::record_risk(&snapshot);
        self.events.push(BacktestEvent::Risk(RiskRecord::from(&snapshot)));

        let hedge_delta = match self.config.hedging.hedge_instrument {
            HedgeInstrumentKind::Perpetual => beta,
            HedgeInstrumentKind::Spot => Decimal::ONE,
        };
        let timing = self
            .timing
            .and_then(|signal| signal.evaluate(self.history.as_slice()));
        let input = EvaluationInput {
            snapshot: &snapshot,
            now,
            hedge_instrument: &self.hedge_instrument,
            hedge_position: self.portfolio.quantity_of(&self.hedge_instrument),
            hedge_delta,
            timing,
        };
        let decision = self.engine.evaluate(&self.config.hedging, &input);
        self.report.action(decision.action);
        observability::record_decision(&decision);
        self.events.push(BacktestEvent::Decision(decision.clone()));

        let mut net_after = snapshot.net_delta();
        if let Some(order) = decision.order() {
            match self.execute(&order, market) {
                Ok(fill) => {
                    self.engine
                        .on_fill(&self.config.hedging, now, &fill, hedge_delta);
                    net_after += fill.quantity * hedge_delta;
                }
                Err(e) => {
                    let message = e.to_string();
                    self.record_error(market.timestamp, e.kind(), message.clone());
                    self.engine
                        .on_fill_failed(&self.config.hedging, now, e.kind(), &message);
                }
            }
        }
        for notification in self.engine.drain_notifications() {
            debug!(?notification, "Engine notification");
        }

        self.report.delta(
            market.timestamp,
            net_after,
            decision.target_delta,
            self.config.hedging.delta_threshold,
        );
        let equity = self.equity(market, beta);
        let benchmark = self.benchmark_cash + self.config.backtest.spot_quantity * market.spot;
        self.report.equity(market.timestamp, equity, benchmark);
    }

    /// Execute `order`, retrying once at the largest fillable lot-rounded
    /// size when liquidity is short.
    fn execute(&mut self, order: &Order, market: &MarketSnapshot) -> Result<Fill, HedgeError> {
        let quote = ExecutionQuote::for_instrument(&order.instrument, market, self.aggregator.perp_beta())?;
        let fill = match self.fills.execute(order, &quote) {
            Ok(fill) => fill,
            Err(ExecutionError::InsufficientLiquidity {
                requested,
                max_fillable,
            }) => {
                let lot = self.config.hedging.lot_size;
                let retry = (max_fillable / lot).floor() * lot;
                warn!(%requested, %max_fillable, %retry, "Order exceeds liquidity, retrying smaller");
                self.record_error(
                    market.timestamp,
                    ErrorKind::InsufficientLiquidity,
                    format!("requested {requested}, fillable {max_fillable}"),
                );
                if retry.is_zero() {
                    return Err(ExecutionError::InsufficientLiquidity {
                        requested,
                        max_fillable,
                    }
                    .into());
                }
                let retry = if order.quantity.is_sign_negative() { -retry } else { retry };
                let smaller = order.with_quantity(retry);
                self.fills.execute(&smaller, &quote)?
            }
            Err(e) => return Err(e.into()),
        };

        self.portfolio.apply_fill(&fill)?;
        observability::record_fill(&fill);
        self.events.push(BacktestEvent::Fill(fill.clone()));
        self.report.fill();
        Ok(fill)
    }

    fn equity(&self, market: &MarketSnapshot, beta: Decimal) -> Decimal {
        self.portfolio.equity(|instrument| {
            value_instrument(instrument, market, beta).map_or(Decimal::ZERO, |q| q.mark)
        })
    }

    fn record_error(&mut self, timestamp: DateTime<Utc>, kind: ErrorKind, message: String) {
        warn!(kind = %kind, error = %message, "Backtest step failed");
        observability::record_error(kind);
        self.report.error(kind);
        self.events.push(BacktestEvent::Error {
            timestamp,
            kind,
            message,
        });
    }

    fn finish(self) -> BacktestOutcome {
        let initial_equity = self.config.backtest.initial_cash;
        let attribution = match &self.last_market {
            Some(market) => {
                let beta = self.aggregator.perp_beta();
                self.portfolio.attribution(|instrument| {
                    value_instrument(instrument, market, beta).map_or(Decimal::ZERO, |q| q.mark)
                })
            }
            None => PnlAttribution::default(),
        };
        let report = self.report.finish(
            initial_equity,
            attribution,
            self.config.backtest.periods_per_year,
        );
        BacktestOutcome {
            report,
            events: self.events,
            decisions: self.engine.log().clone(),
            portfolio: self.opened.then_some(self.portfolio),
        }
    }
}

/// Count of decisions with `action` in `outcome`.
#[must_use]
pub fn action_count(outcome: &BacktestOutcome, action: HedgeAction) -> usize {
    outcome
        .report
        .action_counts
        .get(&action)
        .copied()
        .unwrap_or(0)
}
