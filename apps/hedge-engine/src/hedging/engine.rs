//! Hedging decision state machine.
//!
//! ```text
//!            breach                 gates pass             fill in band
//!   Idle ───────────▶ Armed ───────────────────▶ Hedging ─────────────▶ Hedged
//!    ▲                 │ ▲                         │                     │  │
//!    │  breach clears  │ │   fill out of band      │                     │  │
//!    └─────────────────┘ └─────────────────────────┘◀──── new breach ────┘  │
//!    ▲                                                                      │
//!    └──────────────── hysteresis_ticks evaluations in band ────────────────┘
//! ```
//!
//! Gates between `Armed` and `Hedging`: `breach_confirmations` consecutive
//! breached evaluations, the cooldown since arming, the timing signal (its
//! veto lapses after `max_signal_delay`) and, in manual mode, an operator
//! confirmation.
//!
//! With `close_in_bullish_regime`, an unfavorable timing signal bypasses the
//! gates: any open hedge is closed in one order and the engine otherwise
//! rests in `Idle` until the regime turns.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::decision::{DecisionLog, DecisionTarget, HedgeAction, HedgeDecision, ReasonCode};
use super::notify::Notification;
use super::signals::TimingSignal;
use super::sizing::hedge_quantity;
use super::state::{HedgeKey, HedgeState, PendingRequest, TimerRecord, TimerTable};
use crate::clock::MonoTime;
use crate::config::{HedgeMode, HedgingConfig};
use crate::error::ErrorKind;
use crate::execution::Fill;
use crate::pricing::{Instrument, StrategyId};
use crate::risk::RiskSnapshot;
use crate::strategy::Strategy;

/// Inputs for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    /// Fresh risk snapshot.
    pub snapshot: &'a RiskSnapshot,
    /// Monotonic evaluation time.
    pub now: MonoTime,
    /// Instrument hedges trade.
    pub hedge_instrument: &'a Instrument,
    /// Current signed position in the hedge instrument.
    pub hedge_position: Decimal,
    /// Delta of one unit of the hedge instrument.
    pub hedge_delta: Decimal,
    /// Timing signal, if a model is attached.
    pub timing: Option<TimingSignal>,
}

/// Target delta: the unhedged share of the spot delta plus the offset.
#[must_use]
pub fn target_delta(config: &HedgingConfig, snapshot: &RiskSnapshot) -> Decimal {
    snapshot.spot_delta() * (Decimal::ONE - config.hedge_ratio) + config.target_delta_offset
}

#[derive(Debug, Clone, Copy)]
struct Evaluation {
    timestamp: DateTime<Utc>,
    net: Decimal,
    target: Decimal,
    deviation: Decimal,
}

impl Evaluation {
    fn new(config: &HedgingConfig, snapshot: &RiskSnapshot) -> Self {
        let net = snapshot.net_delta();
        let target = target_delta(config, snapshot);
        Self {
            timestamp: snapshot.timestamp(),
            net,
            target,
            deviation: net - target,
        }
    }

    const fn no_op(&self, reason: ReasonCode, state: HedgeState) -> HedgeDecision {
        HedgeDecision::no_op(self.timestamp, reason, self.net, self.target, state)
    }

    fn trade(&self, input: &EvaluationInput<'_>, quantity: Decimal, reason: ReasonCode) -> HedgeDecision {
        HedgeDecision {
            timestamp: self.timestamp,
            action: classify(input.hedge_position, quantity),
            target: DecisionTarget::Instrument {
                instrument: input.hedge_instrument.clone(),
            },
            quantity,
            reason,
            net_delta: self.net,
            target_delta: self.target,
            state: HedgeState::Hedging,
        }
    }
}

fn classify(position: Decimal, quantity: Decimal) -> HedgeAction {
    let after = position + quantity;
    if after.is_zero() && !position.is_zero() {
        HedgeAction::CloseHedge
    } else if after.abs() > position.abs() {
        HedgeAction::IncreaseHedge
    } else {
        HedgeAction::DecreaseHedge
    }
}

/// Delta hedging state machine for one underlying.
///
/// Holds only transient timers keyed by id; positions stay in the
/// portfolio. Every decision is appended to the [`DecisionLog`].
#[derive(Debug, Clone)]
pub struct HedgeEngine {
    underlying: String,
    timers: TimerTable,
    log: DecisionLog,
    outbox: Vec<Notification>,
    last_request_id: u64,
}

impl HedgeEngine {
    /// Idle engine for `underlying`.
    #[must_use]
    pub fn new(underlying: &str) -> Self {
        Self {
            underlying: underlying.to_string(),
            timers: TimerTable::new(),
            log: DecisionLog::new(),
            outbox: Vec::new(),
            last_request_id: 0,
        }
    }

    fn key(&self) -> HedgeKey {
        HedgeKey::Underlying(self.underlying.clone())
    }

    /// Current delta-hedge state.
    #[must_use]
    pub fn state(&self) -> HedgeState {
        self.timers
            .get(&self.key())
            .map_or(HedgeState::Idle, |r| r.state)
    }

    /// Timer record of the delta hedge.
    #[must_use]
    pub fn record(&self) -> Option<&TimerRecord> {
        self.timers.get(&self.key())
    }

    /// Timer arena.
    #[must_use]
    pub const fn timers(&self) -> &TimerTable {
        &self.timers
    }

    /// Decision log.
    #[must_use]
    pub const fn log(&self) -> &DecisionLog {
        &self.log
    }

    /// Open manual request, if any.
    #[must_use]
    pub fn pending_request(&self) -> Option<&PendingRequest> {
        self.record().and_then(|r| r.pending.as_ref())
    }

    /// Take queued notifications.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    /// Evaluate one snapshot and decide.
    pub fn evaluate(&mut self, config: &HedgingConfig, input: &EvaluationInput<'_>) -> HedgeDecision {
        let eval = Evaluation::new(config, input.snapshot);
        let breached = eval.deviation.abs() > config.delta_threshold;
        let key = self.key();
        let rec = self.timers.entry(key);
        let from = rec.state;
        let bullish = config.timing_signal_enabled
            && config.close_in_bullish_regime
            && input.timing.is_some_and(|signal| !signal.favorable);

        let decision = match rec.state {
            HedgeState::Hedging => eval.no_op(ReasonCode::AwaitingFill, HedgeState::Hedging),
            _ if bullish => regime_off_step(rec, &mut self.outbox, config, input, &eval),
            HedgeState::Idle | HedgeState::Hedged if !breached => {
                if rec.state == HedgeState::Hedged {
                    rec.calm_count += 1;
                    if rec.calm_count >= config.hysteresis_ticks {
                        rec.state = HedgeState::Idle;
                        rec.calm_count = 0;
                    }
                }
                eval.no_op(ReasonCode::WithinTolerance, rec.state)
            }
            HedgeState::Armed if !breached => {
                rec.state = rec.calm_state;
                rec.armed_at = None;
                rec.breach_count = 0;
                if let Some(pending) = rec.pending.take() {
                    self.outbox.push(Notification::PendingExpired {
                        request_id: pending.request_id,
                    });
                }
                eval.no_op(ReasonCode::WithinTolerance, rec.state)
            }
            _ => {
                if rec.state == HedgeState::Armed {
                    rec.breach_count = rec.breach_count.saturating_add(1);
                } else {
                    rec.arm(input.now);
                    rec.breach_count = 1;
                }
                armed_step(
                    rec,
                    &mut self.outbox,
                    &mut self.last_request_id,
                    config,
                    input,
                    &eval,
                )
            }
        };

        if from != decision.state {
            debug!(from = %from, to = %decision.state, deviation = %eval.deviation, "Hedge state transition");
        }
        self.log.record(decision.clone());
        decision
    }

    /// Operator request to rebalance now, bypassing cooldown, confirmations
    /// and the timing signal. A deviation already in the band yields `NoOp`.
    pub fn request_decision(
        &mut self,
        config: &HedgingConfig,
        input: &EvaluationInput<'_>,
    ) -> HedgeDecision {
        let eval = Evaluation::new(config, input.snapshot);
        let key = self.key();
        let rec = self.timers.entry(key);

        let decision = if rec.state == HedgeState::Hedging {
            eval.no_op(ReasonCode::AwaitingFill, HedgeState::Hedging)
        } else if eval.deviation.abs() <= config.delta_threshold {
            eval.no_op(ReasonCode::WithinTolerance, rec.state)
        } else {
            let quantity = hedge_quantity(eval.deviation, input.hedge_delta, config);
            if quantity.is_zero() {
                eval.no_op(ReasonCode::BelowLotSize, rec.state)
            } else {
                if rec.state != HedgeState::Armed {
                    rec.arm(input.now);
                }
                let decision = eval.trade(input, quantity, ReasonCode::OperatorRequest);
                dispatch(rec, &mut self.outbox, &decision, eval.deviation);
                decision
            }
        };
        self.log.record(decision.clone());
        decision
    }

    /// Confirm a pending manual request. Returns whether it was open.
    pub fn confirm(&mut self, request_id: u64) -> bool {
        let key = self.key();
        let Some(pending) = self.timers.entry(key).pending.as_mut() else {
            return false;
        };
        if pending.request_id != request_id {
            return false;
        }
        pending.confirmed = true;
        info!(request_id, "Hedge request confirmed");
        true
    }

    /// Cancel a pending request whose timeout has passed. Returns its id.
    pub fn expire_pending(&mut self, now: MonoTime) -> Option<u64> {
        let key = self.key();
        let rec = self.timers.entry(key);
        let expired = rec
            .pending
            .as_ref()
            .filter(|p| !p.confirmed && now >= p.expires_at)
            .map(|p| p.request_id)?;
        rec.pending = None;
        self.outbox.push(Notification::PendingExpired {
            request_id: expired,
        });
        info!(request_id = expired, "Hedge request expired");
        Some(expired)
    }

    /// Record the fill of the dispatched hedge.
    ///
    /// The resulting deviation is the dispatched deviation moved by
    /// `fill.quantity × hedge_delta`; inside the band the engine is
    /// `Hedged`, otherwise it re-arms.
    pub fn on_fill(
        &mut self,
        config: &HedgingConfig,
        now: MonoTime,
        fill: &Fill,
        hedge_delta: Decimal,
    ) -> HedgeState {
        let key = self.key();
        let rec = self.timers.entry(key);
        if rec.state != HedgeState::Hedging {
            warn!(state = %rec.state, "Fill received while not hedging");
            return rec.state;
        }
        let before = rec.dispatched_deviation.take().unwrap_or(Decimal::ZERO);
        let after = before + fill.quantity * hedge_delta;
        rec.calm_state = HedgeState::Hedged;
        if after.abs() <= config.delta_threshold {
            rec.state = HedgeState::Hedged;
            rec.armed_at = None;
            rec.breach_count = 0;
            rec.calm_count = 0;
        } else {
            rec.state = HedgeState::Armed;
            rec.armed_at = Some(now);
            rec.breach_count = config.breach_confirmations;
        }
        info!(
            quantity = %fill.quantity,
            price = %fill.price,
            deviation_before = %before,
            deviation_after = %after,
            state = %rec.state,
            "Hedge fill applied"
        );
        rec.state
    }

    /// Record a failed hedge; the engine re-arms.
    pub fn on_fill_failed(&mut self, config: &HedgingConfig, now: MonoTime, kind: ErrorKind, message: &str) {
        let key = self.key();
        let rec = self.timers.entry(key);
        if rec.state == HedgeState::Hedging {
            rec.state = HedgeState::Armed;
            rec.armed_at = Some(now);
            rec.breach_count = config.breach_confirmations;
            rec.dispatched_deviation = None;
        }
        warn!(kind = %kind, error = message, "Hedge failed");
        self.outbox.push(Notification::HedgeFailed {
            kind,
            message: message.to_string(),
        });
    }

    /// Fall back to `Armed` with no action when inputs cannot be trusted.
    pub fn degrade(
        &mut self,
        now: MonoTime,
        timestamp: DateTime<Utc>,
        reason: ReasonCode,
    ) -> HedgeDecision {
        let (net, target) = self
            .log
            .last()
            .map_or((Decimal::ZERO, Decimal::ZERO), |d| (d.net_delta, d.target_delta));
        let key = self.key();
        let rec = self.timers.entry(key);
        if rec.state != HedgeState::Armed {
            rec.arm(now);
            rec.breach_count = 0;
            rec.dispatched_deviation = None;
        }
        warn!(reason = ?reason, "Hedge engine degraded");
        let decision = HedgeDecision::no_op(timestamp, reason, net, target, HedgeState::Armed);
        self.log.record(decision.clone());
        decision
    }

    /// `RollStrategy` decisions for strategies inside the roll window.
    ///
    /// Each strategy is requested once; the request clears when the
    /// strategy closes (see [`HedgeEngine::on_strategy_closed`]).
    pub fn check_rolls<'a>(
        &mut self,
        config: &HedgingConfig,
        strategies: impl IntoIterator<Item = &'a Strategy>,
        timestamp: DateTime<Utc>,
        now: MonoTime,
    ) -> Vec<HedgeDecision> {
        let window = chrono::Duration::days(config.roll_window_days);
        let state = self.state();
        let (net, target) = self
            .log
            .last()
            .map_or((Decimal::ZERO, Decimal::ZERO), |d| (d.net_delta, d.target_delta));

        let mut decisions = Vec::new();
        for strategy in strategies {
            let Some(expiry) = strategy.nearest_expiry() else {
                continue;
            };
            if expiry - timestamp > window || !strategy.has_open_quantity() {
                continue;
            }
            let rec = self.timers.entry(HedgeKey::Strategy(strategy.id.clone()));
            if rec.roll_requested_at.is_some() {
                continue;
            }
            rec.roll_requested_at = Some(now);

            info!(strategy_id = %strategy.id, expiry = %expiry, "Roll requested");
            let decision = HedgeDecision {
                timestamp,
                action: HedgeAction::RollStrategy,
                target: DecisionTarget::Strategy {
                    strategy_id: strategy.id.clone(),
                },
                quantity: Decimal::ZERO,
                reason: ReasonCode::NearExpiry,
                net_delta: net,
                target_delta: target,
                state,
            };
            self.log.record(decision.clone());
            decisions.push(decision);
        }
        decisions
    }

    /// Drop the timers of a closed strategy.
    pub fn on_strategy_closed(&mut self, strategy_id: &StrategyId) {
        if self.timers.reset(&HedgeKey::Strategy(strategy_id.clone())) {
            debug!(strategy_id = %strategy_id, "Strategy timers reset");
        }
    }
}

fn armed_step(
    rec: &mut TimerRecord,
    outbox: &mut Vec<Notification>,
    last_request_id: &mut u64,
    config: &HedgingConfig,
    input: &EvaluationInput<'_>,
    eval: &Evaluation,
) -> HedgeDecision {
    let now = input.now;
    if rec.breach_count < config.breach_confirmations {
        return eval.no_op(ReasonCode::BreachUnconfirmed, HedgeState::Armed);
    }
    let armed_for = rec.armed_for(now);
    if armed_for < config.cooldown() {
        return eval.no_op(ReasonCode::Cooldown, HedgeState::Armed);
    }

    let mut reason = ReasonCode::DeltaBreach;
    if config.timing_signal_enabled {
        if let Some(signal) = input.timing {
            if !signal.favorable {
                if armed_for < config.max_signal_delay() {
                    debug!(score = signal.score, "Timing signal veto");
                    return eval.no_op(ReasonCode::TimingVeto, HedgeState::Armed);
                }
                warn!(score = signal.score, "Timing veto overridden after max delay");
                reason = ReasonCode::SignalDelayExceeded;
            }
        }
    }

    let quantity = hedge_quantity(eval.deviation, input.hedge_delta, config);
    if quantity.is_zero() {
        return eval.no_op(ReasonCode::BelowLotSize, HedgeState::Armed);
    }
    let decision = eval.trade(input, quantity, reason);

    if config.mode == HedgeMode::Manual {
        match rec.pending.as_ref() {
            Some(pending) if pending.confirmed => rec.pending = None,
            Some(pending) if now >= pending.expires_at => {
                let request_id = pending.request_id;
                rec.pending = None;
                outbox.push(Notification::PendingExpired { request_id });
                info!(request_id, "Hedge request expired");
                return eval.no_op(ReasonCode::PendingExpired, HedgeState::Armed);
            }
            Some(_) => return eval.no_op(ReasonCode::AwaitingConfirmation, HedgeState::Armed),
            None => {
                *last_request_id += 1;
                let request_id = *last_request_id;
                rec.pending = Some(PendingRequest {
                    request_id,
                    decision: decision.clone(),
                    expires_at: now.plus(config.confirmation_timeout()),
                    confirmed: false,
                });
                outbox.push(Notification::ActionPending {
                    request_id,
                    decision,
                });
                info!(request_id, %quantity, "Hedge awaiting confirmation");
                return eval.no_op(ReasonCode::AwaitingConfirmation, HedgeState::Armed);
            }
        }
    }

    dispatch(rec, outbox, &decision, eval.deviation);
    decision
}

/// Bullish regime: flatten the hedge instrument or stay flat.
fn regime_off_step(
    rec: &mut TimerRecord,
    outbox: &mut Vec<Notification>,
    config: &HedgingConfig,
    input: &EvaluationInput<'_>,
    eval: &Evaluation,
) -> HedgeDecision {
    if let Some(pending) = rec.pending.take() {
        outbox.push(Notification::PendingExpired {
            request_id: pending.request_id,
        });
    }
    rec.breach_count = 0;
    rec.calm_count = 0;

    let position = input.hedge_position;
    if position.is_zero() {
        rec.state = HedgeState::Idle;
        rec.calm_state = HedgeState::Idle;
        rec.armed_at = None;
        return eval.no_op(ReasonCode::RegimeHedgeOff, HedgeState::Idle);
    }

    let size = position.abs().min(config.max_order_size);
    let quantity = if position.is_sign_negative() { size } else { -size };
    if rec.state != HedgeState::Armed {
        rec.arm(input.now);
    }
    let decision = eval.trade(input, quantity, ReasonCode::RegimeHedgeOff);
    info!(position = %position, "Closing hedge in bullish regime");
    dispatch(rec, outbox, &decision, eval.deviation);
    decision
}

fn dispatch(
    rec: &mut TimerRecord,
    outbox: &mut Vec<Notification>,
    decision: &HedgeDecision,
    deviation: Decimal,
) {
    rec.state = HedgeState::Hedging;
    rec.breach_count = 0;
    rec.pending = None;
    rec.dispatched_deviation = Some(deviation);
    info!(
        action = %decision.action,
        quantity = %decision.quantity,
        net_delta = %decision.net_delta,
        target_delta = %decision.target_delta,
        reason = ?decision.reason,
        "Hedge dispatched"
    );
    outbox.push(Notification::HedgeDispatched {
        decision: decision.clone(),
    });
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::greeks::Greeks;
    use crate::pricing::{InstrumentId, InstrumentKind};
    use crate::risk::{LegRisk, VarBreakdown};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    /// Spot of 1 BTC plus a perp hedge giving `net` delta.
    fn snapshot(secs: i64, net: Decimal) -> RiskSnapshot {
        let leg = |id: &str, kind, quantity| LegRisk {
            instrument_id: InstrumentId::new(id),
            kind,
            strategy_id: None,
            quantity,
            mark: dec!(50000),
            per_unit: Greeks::linear(Decimal::ONE),
        };
        let legs = vec![
            leg("BTC-SPOT", InstrumentKind::Spot, dec!(1)),
            leg("BTC-PERP", InstrumentKind::Perpetual, net - dec!(1)),
        ];
        let var = VarBreakdown {
            delta_var: Decimal::ZERO,
            gamma_adjustment: Decimal::ZERO,
            total: Decimal::ZERO,
        };
        RiskSnapshot::new(ts(secs), dec!(50000), Greeks::linear(net), legs, var, Vec::new())
    }

    struct Harness {
        engine: HedgeEngine,
        config: HedgingConfig,
        perp: Instrument,
        position: Decimal,
    }

    impl Harness {
        fn new(config: HedgingConfig) -> Self {
            Self {
                engine: HedgeEngine::new("BTC"),
                config,
                perp: Instrument::perpetual("BTC"),
                position: Decimal::ZERO,
            }
        }

        fn eval_with(&mut self, secs: i64, net: Decimal, timing: Option<TimingSignal>) -> HedgeDecision {
            let snap = snapshot(secs, net);
            let input = EvaluationInput {
                snapshot: &snap,
                now: MonoTime::from_secs(u64::try_from(secs).unwrap()),
                hedge_instrument: &self.perp,
                hedge_position: self.position,
                hedge_delta: Decimal::ONE,
                timing,
            };
            self.engine.evaluate(&self.config, &input)
        }

        fn eval(&mut self, secs: i64, net: Decimal) -> HedgeDecision {
            self.eval_with(secs, net, None)
        }

        fn fill(&mut self, secs: i64, quantity: Decimal) -> HedgeState {
            self.position += quantity;
            let fill = Fill {
                instrument: self.perp.clone(),
                quantity,
                price: dec!(50000),
                fee: Decimal::ZERO,
                timestamp: ts(secs),
                strategy_id: None,
                requested_quantity: quantity,
            };
            self.engine.on_fill(
                &self.config,
                MonoTime::from_secs(u64::try_from(secs).unwrap()),
                &fill,
                Decimal::ONE,
            )
        }
    }

    fn config() -> HedgingConfig {
        HedgingConfig {
            cooldown_secs: 60,
            ..HedgingConfig::default()
        }
    }

    #[test]
    fn test_breach_arms_then_sells_to_band_edge() {
        let mut h = Harness::new(config());

        let first = h.eval(0, dec!(0.8));
        assert_eq!(first.action, HedgeAction::NoOp);
        assert_eq!(h.engine.state(), HedgeState::Armed);

        let cooling = h.eval(30, dec!(0.8));
        assert_eq!(cooling.reason, ReasonCode::Cooldown);

        let decision = h.eval(60, dec!(0.8));
        assert_eq!(decision.action, HedgeAction::IncreaseHedge);
        assert_eq!(decision.quantity, dec!(-0.7));
        assert_eq!(h.engine.state(), HedgeState::Hedging);

        assert_eq!(h.fill(60, dec!(-0.7)), HedgeState::Hedged);
        let notes = h.engine.drain_notifications();
        assert!(matches!(notes[0], Notification::HedgeDispatched { .. }));
    }

    #[test]
    fn test_noisy_breach_from_hedged_never_hedges() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            ..HedgingConfig::default()
        });
        h.eval(0, dec!(0.8));
        h.eval(1, dec!(0.8));
        h.fill(1, dec!(-0.7));
        assert_eq!(h.engine.state(), HedgeState::Hedged);

        // one noisy reading, then back inside
        h.eval(2, dec!(0.25));
        assert_eq!(h.engine.state(), HedgeState::Armed);
        h.eval(3, dec!(0.05));
        assert_eq!(h.engine.state(), HedgeState::Hedged);
        assert!(
            h.engine.log().entries()[2..]
                .iter()
                .all(|d| d.state != HedgeState::Hedging)
        );
    }

    #[test]
    fn test_hysteresis_relaxes_to_idle() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            breach_confirmations: 1,
            ..HedgingConfig::default()
        });
        h.eval(0, dec!(0.8));
        h.fill(0, dec!(-0.7));
        h.eval(1, dec!(0.1));
        h.eval(2, dec!(0.1));
        assert_eq!(h.engine.state(), HedgeState::Hedged);
        h.eval(3, dec!(0.1));
        assert_eq!(h.engine.state(), HedgeState::Idle);
    }

    #[test]
    fn test_request_within_tolerance_is_no_op() {
        let mut h = Harness::new(config());
        let snap = snapshot(0, dec!(0.05));
        let input = EvaluationInput {
            snapshot: &snap,
            now: MonoTime::ZERO,
            hedge_instrument: &h.perp,
            hedge_position: Decimal::ZERO,
            hedge_delta: Decimal::ONE,
            timing: None,
        };
        let decision = h.engine.request_decision(&h.config, &input);
        assert_eq!(decision.action, HedgeAction::NoOp);
        assert_eq!(decision.reason, ReasonCode::WithinTolerance);
        assert_eq!(h.engine.state(), HedgeState::Idle);
    }

    #[test]
    fn test_partial_fill_rearms() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            breach_confirmations: 1,
            ..HedgingConfig::default()
        });
        let decision = h.eval(0, dec!(0.8));
        assert_eq!(decision.quantity, dec!(-0.7));
        assert_eq!(h.fill(0, dec!(-0.3)), HedgeState::Armed);
        // next evaluation sizes the remainder
        let next = h.eval(1, dec!(0.5));
        assert_eq!(next.quantity, dec!(-0.4));
    }

    #[test]
    fn test_failed_fill_rearms_and_notifies() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            breach_confirmations: 1,
            ..HedgingConfig::default()
        });
        h.eval(0, dec!(0.8));
        h.engine.drain_notifications();
        h.engine
            .on_fill_failed(&h.config, MonoTime::ZERO, ErrorKind::InsufficientLiquidity, "thin book");
        assert_eq!(h.engine.state(), HedgeState::Armed);
        let notes = h.engine.drain_notifications();
        assert!(matches!(
            notes[0],
            Notification::HedgeFailed {
                kind: ErrorKind::InsufficientLiquidity,
                ..
            }
        ));
    }

    #[test]
    fn test_close_hedge_when_flattening() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            breach_confirmations: 1,
            sizing_target: crate::config::SizingTarget::BandCenter,
            ..HedgingConfig::default()
        });
        h.position = dec!(-0.5);
        let decision = h.eval(0, dec!(-0.5));
        assert_eq!(decision.quantity, dec!(0.5));
        assert_eq!(decision.action, HedgeAction::CloseHedge);
    }

    #[test]
    fn test_timing_veto_until_ceiling() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            breach_confirmations: 1,
            timing_signal_enabled: true,
            max_signal_delay_secs: 120,
            ..HedgingConfig::default()
        });
        let veto = Some(TimingSignal {
            favorable: false,
            score: -0.2,
        });
        assert_eq!(h.eval_with(0, dec!(0.8), veto).reason, ReasonCode::TimingVeto);
        assert_eq!(h.eval_with(60, dec!(0.8), veto).reason, ReasonCode::TimingVeto);
        let forced = h.eval_with(120, dec!(0.8), veto);
        assert_eq!(forced.reason, ReasonCode::SignalDelayExceeded);
        assert_eq!(forced.action, HedgeAction::IncreaseHedge);
    }

    #[test]
    fn test_absent_signal_does_not_veto() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            breach_confirmations: 1,
            timing_signal_enabled: true,
            ..HedgingConfig::default()
        });
        assert_eq!(h.eval(0, dec!(0.8)).reason, ReasonCode::DeltaBreach);
    }

    #[test]
    fn test_manual_mode_waits_for_confirmation() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            breach_confirmations: 1,
            mode: HedgeMode::Manual,
            ..HedgingConfig::default()
        });
        let waiting = h.eval(0, dec!(0.8));
        assert_eq!(waiting.reason, ReasonCode::AwaitingConfirmation);
        assert_eq!(h.engine.state(), HedgeState::Armed);
        let Some(Notification::ActionPending { request_id, .. }) =
            h.engine.drain_notifications().into_iter().next()
        else {
            panic!("expected ActionPending");
        };

        assert!(!h.engine.confirm(request_id + 1));
        assert!(h.engine.confirm(request_id));
        let dispatched = h.eval(10, dec!(0.8));
        assert_eq!(dispatched.action, HedgeAction::IncreaseHedge);
        assert!(h.engine.pending_request().is_none());
    }

    #[test]
    fn test_manual_request_expires_cleanly() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            breach_confirmations: 1,
            mode: HedgeMode::Manual,
            confirmation_timeout_secs: 60,
            ..HedgingConfig::default()
        });
        h.eval(0, dec!(0.8));
        assert!(h.engine.expire_pending(MonoTime::from_secs(30)).is_none());
        assert_eq!(h.engine.expire_pending(MonoTime::from_secs(60)), Some(1));
        assert_eq!(h.engine.state(), HedgeState::Armed);
        assert!(h.engine.pending_request().is_none());
        let notes = h.engine.drain_notifications();
        assert!(matches!(
            notes.last(),
            Some(Notification::PendingExpired { request_id: 1 })
        ));
    }

    #[test]
    fn test_partial_hedge_ratio_targets_residual_delta() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            breach_confirmations: 1,
            hedge_ratio: dec!(0.6),
            ..HedgingConfig::default()
        });
        // spot delta 1, ratio 0.6: target 0.4, unhedged net 1.0
        let decision = h.eval(0, dec!(1.0));
        assert_eq!(decision.target_delta, dec!(0.4));
        assert_eq!(decision.quantity, dec!(-0.5));
    }

    #[test]
    fn test_degrade_holds_armed() {
        let mut h = Harness::new(config());
        let decision = h.engine.degrade(MonoTime::ZERO, ts(0), ReasonCode::Timeout);
        assert_eq!(decision.action, HedgeAction::NoOp);
        assert_eq!(h.engine.state(), HedgeState::Armed);
        // calm data releases it
        h.eval(1, dec!(0));
        assert_eq!(h.engine.state(), HedgeState::Idle);
    }

    #[test]
    fn test_operator_request_clears_pending_confirmation() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            breach_confirmations: 1,
            mode: HedgeMode::Manual,
            confirmation_timeout_secs: 60,
            ..HedgingConfig::default()
        });
        h.eval(0, dec!(0.8));
        assert!(h.engine.pending_request().is_some());

        let snap = snapshot(5, dec!(0.8));
        let input = EvaluationInput {
            snapshot: &snap,
            now: MonoTime::from_secs(5),
            hedge_instrument: &h.perp,
            hedge_position: Decimal::ZERO,
            hedge_delta: Decimal::ONE,
            timing: None,
        };
        let decision = h.engine.request_decision(&h.config, &input);
        assert_eq!(decision.reason, ReasonCode::OperatorRequest);
        assert!(h.engine.pending_request().is_none());
        assert!(h.engine.expire_pending(MonoTime::from_secs(600)).is_none());
        assert!(
            !h.engine
                .drain_notifications()
                .iter()
                .any(|n| matches!(n, Notification::PendingExpired { .. }))
        );
    }

    #[test]
    fn test_bullish_regime_closes_hedge_and_stays_flat() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            breach_confirmations: 1,
            timing_signal_enabled: true,
            close_in_bullish_regime: true,
            ..HedgingConfig::default()
        });
        let bearish = Some(TimingSignal {
            favorable: true,
            score: 0.2,
        });
        let bullish = Some(TimingSignal {
            favorable: false,
            score: -0.2,
        });
        let opened = h.eval_with(0, dec!(0.8), bearish);
        assert_eq!(opened.action, HedgeAction::IncreaseHedge);
        h.fill(0, dec!(-0.7));
        assert_eq!(h.engine.state(), HedgeState::Hedged);

        // net 0.1 is inside the band; the regime still closes the hedge
        let closed = h.eval_with(10, dec!(0.1), bullish);
        assert_eq!(closed.action, HedgeAction::CloseHedge);
        assert_eq!(closed.reason, ReasonCode::RegimeHedgeOff);
        assert_eq!(closed.quantity, dec!(0.7));
        h.fill(10, dec!(0.7));

        let flat = h.eval_with(20, dec!(1.0), bullish);
        assert_eq!(flat.action, HedgeAction::NoOp);
        assert_eq!(flat.reason, ReasonCode::RegimeHedgeOff);
        assert_eq!(h.engine.state(), HedgeState::Idle);

        let rehedge = h.eval_with(30, dec!(1.0), bearish);
        assert_eq!(rehedge.action, HedgeAction::IncreaseHedge);
    }

    #[test]
    fn test_bullish_regime_without_close_flag_only_vetoes() {
        let mut h = Harness::new(HedgingConfig {
            cooldown_secs: 0,
            breach_confirmations: 1,
            timing_signal_enabled: true,
            ..HedgingConfig::default()
        });
        h.position = dec!(-0.7);
        let veto = Some(TimingSignal {
            favorable: false,
            score: -0.2,
        });
        let decision = h.eval_with(0, dec!(0.1), veto);
        assert_eq!(decision.reason, ReasonCode::WithinTolerance);
        assert_eq!(decision.action, HedgeAction::NoOp);
    }
}
