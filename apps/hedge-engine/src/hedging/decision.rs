//! Hedge decisions and the append-only decision log.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::state::HedgeState;
use crate::execution::Order;
use crate::pricing::{Instrument, StrategyId};

/// What a decision asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HedgeAction {
    /// Nothing this cycle.
    NoOp,
    /// Grow the hedge position.
    IncreaseHedge,
    /// Shrink the hedge position.
    DecreaseHedge,
    /// Flatten the hedge position.
    CloseHedge,
    /// Roll a strategy forward.
    RollStrategy,
}

impl fmt::Display for HedgeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoOp => "no_op",
            Self::IncreaseHedge => "increase_hedge",
            Self::DecreaseHedge => "decrease_hedge",
            Self::CloseHedge => "close_hedge",
            Self::RollStrategy => "roll_strategy",
        };
        f.write_str(name)
    }
}

/// Why a decision was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Deviation inside the band.
    WithinTolerance,
    /// Breach not yet seen on enough consecutive evaluations.
    BreachUnconfirmed,
    /// Cooldown since arming not elapsed.
    Cooldown,
    /// Timing signal vetoed dispatch.
    TimingVeto,
    /// Waiting for an operator.
    AwaitingConfirmation,
    /// Manual request lapsed.
    PendingExpired,
    /// Previous order not yet filled.
    AwaitingFill,
    /// Rebalance smaller than one lot.
    BelowLotSize,
    /// Breach confirmed and dispatched.
    DeltaBreach,
    /// Dispatched after the timing veto ceiling passed.
    SignalDelayExceeded,
    /// Dispatched on operator request.
    OperatorRequest,
    /// Bullish regime: hedge closed or kept flat.
    RegimeHedgeOff,
    /// Strategy inside its roll window.
    NearExpiry,
    /// External input did not arrive in time.
    Timeout,
    /// Inputs could not be trusted.
    DegradedInput,
}

/// Instrument or strategy a decision acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionTarget {
    /// No target.
    None,
    /// Hedge instrument.
    Instrument {
        /// Instrument to trade.
        instrument: Instrument,
    },
    /// Strategy to roll.
    Strategy {
        /// Strategy id.
        strategy_id: StrategyId,
    },
}

/// One decision of the engine. Recorded in the [`DecisionLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HedgeDecision {
    /// Evaluation time.
    pub timestamp: DateTime<Utc>,
    /// Requested action.
    pub action: HedgeAction,
    /// What the action applies to.
    pub target: DecisionTarget,
    /// Signed quantity to trade; zero for no-ops and rolls.
    pub quantity: Decimal,
    /// Reason.
    pub reason: ReasonCode,
    /// Net delta at evaluation.
    pub net_delta: Decimal,
    /// Target delta at evaluation.
    pub target_delta: Decimal,
    /// Engine state after the decision.
    pub state: HedgeState,
}

impl HedgeDecision {
    /// No-op with a reason.
    #[must_use]
    pub const fn no_op(
        timestamp: DateTime<Utc>,
        reason: ReasonCode,
        net_delta: Decimal,
        target_delta: Decimal,
        state: HedgeState,
    ) -> Self {
        Self {
            timestamp,
            action: HedgeAction::NoOp,
            target: DecisionTarget::None,
            quantity: Decimal::ZERO,
            reason,
            net_delta,
            target_delta,
            state,
        }
    }

    /// Whether the decision trades or rolls.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        self.action != HedgeAction::NoOp
    }

    /// Hedge order for a trading decision.
    #[must_use]
    pub fn order(&self) -> Option<Order> {
        match &self.target {
            DecisionTarget::Instrument { instrument } if !self.quantity.is_zero() => {
                Some(Order::new(instrument.clone(), self.quantity))
            }
            _ => None,
        }
    }
}

/// Append-only record of every decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecisionLog {
    entries: Vec<HedgeDecision>,
}

impl DecisionLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decision.
    pub fn record(&mut self, decision: HedgeDecision) {
        self.entries.push(decision);
    }

    /// Every decision in order.
    #[must_use]
    pub fn entries(&self) -> &[HedgeDecision] {
        &self.entries
    }

    /// Most recent decision.
    #[must_use]
    pub fn last(&self) -> Option<&HedgeDecision> {
        self.entries.last()
    }

    /// Number of decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decision counts per action.
    #[must_use]
    pub fn count_by_action(&self) -> BTreeMap<HedgeAction, usize> {
        self.entries.iter().fold(BTreeMap::new(), |mut acc, d| {
            *acc.entry(d.action).or_insert(0) += 1;
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn sell(quantity: Decimal) -> HedgeDecision {
        HedgeDecision {
            timestamp: DateTime::UNIX_EPOCH,
            action: HedgeAction::IncreaseHedge,
            target: DecisionTarget::Instrument {
                instrument: Instrument::perpetual("BTC"),
            },
            quantity,
            reason: ReasonCode::DeltaBreach,
            net_delta: dec!(0.8),
            target_delta: Decimal::ZERO,
            state: HedgeState::Hedging,
        }
    }

    #[test]
    fn test_order_from_decision() {
        let Some(order) = sell(dec!(-0.7)).order() else {
            panic!("trading decision must carry an order");
        };
        assert_eq!(order.quantity, dec!(-0.7));
        let no_op = HedgeDecision::no_op(
            DateTime::UNIX_EPOCH,
            ReasonCode::WithinTolerance,
            dec!(0.05),
            Decimal::ZERO,
            HedgeState::Idle,
        );
        assert!(no_op.order().is_none());
        assert!(!no_op.is_actionable());
    }

    #[test]
    fn test_log_counts() {
        let mut log = DecisionLog::new();
        log.record(sell(dec!(-0.7)));
        log.record(sell(dec!(-0.1)));
        log.record(HedgeDecision::no_op(
            DateTime::UNIX_EPOCH,
            ReasonCode::Cooldown,
            dec!(0.8),
            Decimal::ZERO,
            HedgeState::Armed,
        ));
        let counts = log.count_by_action();
        assert_eq!(counts.get(&HedgeAction::IncreaseHedge), Some(&2));
        assert_eq!(counts.get(&HedgeAction::NoOp), Some(&1));
        assert_eq!(log.last().map(|d| d.reason), Some(ReasonCode::Cooldown));
    }

    #[test]
    fn test_reason_serializes_screaming() {
        let json = serde_json::to_string(&ReasonCode::BelowLotSize).unwrap();
        assert_eq!(json, "\"BELOW_LOT_SIZE\"");
    }
}
