//! Hedge decision engine.
//!
//! [`HedgeEngine`] turns a [`crate::risk::RiskSnapshot`] into a
//! [`HedgeDecision`] through the state machine documented in `engine`.
//! Supporting pieces:
//!
//! - [`hedge_quantity`]: lot-rounded sizing toward the band edge or center
//! - [`BetaEstimator`]: rolling perp/spot beta for hedge-instrument delta
//! - [`MovingAverageRegime`]: optional timing veto
//! - [`RealizedVolatility`]: pluggable volatility forecast
//! - [`Notification`]: operator-facing events drained after each call

mod beta;
mod decision;
mod engine;
mod notify;
mod regime;
mod signals;
mod sizing;
mod state;

pub use beta::BetaEstimator;
pub use decision::{DecisionLog, DecisionTarget, HedgeAction, HedgeDecision, ReasonCode};
pub use engine::{EvaluationInput, HedgeEngine, target_delta};
pub use notify::Notification;
pub use regime::MovingAverageRegime;
pub use signals::{
    ConstantVolatility, HedgeTimingSignal, PriceHistory, RealizedVolatility, TimingSignal,
    VolatilityForecaster,
};
pub use sizing::hedge_quantity;
pub use state::{HedgeKey, HedgeState, PendingRequest, TimerRecord, TimerTable};
