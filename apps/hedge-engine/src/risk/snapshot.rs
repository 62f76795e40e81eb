//! Immutable per-tick risk record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::stress::StressResult;
use super::var::VarBreakdown;
use crate::greeks::Greeks;
use crate::pricing::{InstrumentId, InstrumentKind, StrategyId};

/// Risk of one holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegRisk {
    /// Instrument held.
    pub instrument_id: InstrumentId,
    /// Instrument kind.
    pub kind: InstrumentKind,
    /// Owning strategy, for option legs.
    pub strategy_id: Option<StrategyId>,
    /// Signed quantity.
    pub quantity: Decimal,
    /// Mark price per unit.
    pub mark: Decimal,
    /// Greeks per unit.
    pub per_unit: Greeks,
}

/// Portfolio risk at one evaluation tick. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    timestamp: DateTime<Utc>,
    spot: Decimal,
    greeks: Greeks,
    spot_delta: Decimal,
    legs: Vec<LegRisk>,
    var: VarBreakdown,
    stress: Vec<StressResult>,
    worst_stress_pnl: Decimal,
}

impl RiskSnapshot {
    pub(crate) fn new(
        timestamp: DateTime<Utc>,
        spot: Decimal,
        greeks: Greeks,
        legs: Vec<LegRisk>,
        var: VarBreakdown,
        stress: Vec<StressResult>,
    ) -> Self {
        let spot_delta = legs
            .iter()
            .filter(|leg| leg.kind == InstrumentKind::Spot)
            .map(|leg| leg.per_unit.delta * leg.quantity)
            .sum();
        let worst_stress_pnl = stress
            .iter()
            .map(|s| s.pnl)
            .min()
            .unwrap_or(Decimal::ZERO);
        Self {
            timestamp,
            spot,
            greeks,
            spot_delta,
            legs,
            var,
            stress,
            worst_stress_pnl,
        }
    }

    /// Evaluation time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Spot price used.
    #[must_use]
    pub const fn spot(&self) -> Decimal {
        self.spot
    }

    /// Net portfolio Greeks.
    #[must_use]
    pub const fn greeks(&self) -> &Greeks {
        &self.greeks
    }

    /// Net delta.
    #[must_use]
    pub const fn net_delta(&self) -> Decimal {
        self.greeks.delta
    }

    /// Net gamma.
    #[must_use]
    pub const fn gamma(&self) -> Decimal {
        self.greeks.gamma
    }

    /// Net vega.
    #[must_use]
    pub const fn vega(&self) -> Decimal {
        self.greeks.vega
    }

    /// Net theta.
    #[must_use]
    pub const fn theta(&self) -> Decimal {
        self.greeks.theta
    }

    /// Net rho.
    #[must_use]
    pub const fn rho(&self) -> Decimal {
        self.greeks.rho
    }

    /// Delta of the spot holding alone.
    #[must_use]
    pub const fn spot_delta(&self) -> Decimal {
        self.spot_delta
    }

    /// Per-holding breakdown.
    #[must_use]
    pub fn legs(&self) -> &[LegRisk] {
        &self.legs
    }

    /// VaR components.
    #[must_use]
    pub const fn var(&self) -> &VarBreakdown {
        &self.var
    }

    /// Stress P&L per scenario.
    #[must_use]
    pub fn stress(&self) -> &[StressResult] {
        &self.stress
    }

    /// Lowest scenario P&L; zero without scenarios.
    #[must_use]
    pub const fn worst_stress_pnl(&self) -> Decimal {
        self.worst_stress_pnl
    }
}
