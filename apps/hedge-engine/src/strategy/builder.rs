//! Strategy construction.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::info;

use super::error::StrategyError;
use super::template::StrategyTemplate;
use super::types::{OptionLeg, Strategy};
use crate::execution::Order;
use crate::greeks::Greeks;
use crate::market::MarketSnapshot;
use crate::pricing::{
    Instrument, InstrumentId, IvSolver, LineageId, OptionContract, OptionInputs, StrategyId,
    to_f64, value_instrument, years_until,
};

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltStrategy {
    /// Strategy with unfilled legs at their targets.
    pub strategy: Strategy,
    /// Greeks the strategy will carry once fully filled.
    pub greeks: Greeks,
    /// Orders that open every leg.
    pub orders: Vec<Order>,
}

/// Validates templates, prices legs and assigns deterministic ids.
#[derive(Debug, Clone, Default)]
pub struct StrategyBuilder {
    issued: u64,
    iv_solver: IvSolver,
}

impl StrategyBuilder {
    /// Builder whose first strategy is `strat-000001`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and price `template` against `market`.
    ///
    /// Fails with `InvalidStrategy` without consuming an id.
    pub fn build(
        &mut self,
        template: &StrategyTemplate,
        market: &MarketSnapshot,
    ) -> Result<BuiltStrategy, StrategyError> {
        self.build_in_lineage(template, market, None)
    }

    pub(super) fn build_in_lineage(
        &mut self,
        template: &StrategyTemplate,
        market: &MarketSnapshot,
        lineage: Option<LineageId>,
    ) -> Result<BuiltStrategy, StrategyError> {
        template.validate(market.spot, market.timestamp)?;

        let mut greeks = Greeks::zero();
        let mut legs = Vec::new();
        for spec in template.legs() {
            let contract = OptionContract {
                underlying: market.underlying.clone(),
                strike: spec.strike,
                expiry: spec.expiry,
                right: spec.right,
            };
            let quote = value_instrument(&Instrument::Option(contract.clone()), market, Decimal::ONE)?;
            greeks = greeks.add(&quote.greeks.scale(spec.quantity));
            legs.push(OptionLeg::new(contract, spec.quantity, quote.mark));
        }

        self.issued += 1;
        let id = StrategyId::new(format!("strat-{:06}", self.issued));
        let lineage_id =
            lineage.unwrap_or_else(|| LineageId::new(format!("lineage-{:06}", self.issued)));

        let orders = legs
            .iter()
            .map(|leg| Order::for_strategy(leg.instrument(), leg.target_quantity, id.clone()))
            .collect();

        let strategy = Strategy {
            id,
            lineage_id,
            template: template.clone(),
            underlying: market.underlying.clone(),
            legs,
            entry_spot: market.spot,
            created_at: market.timestamp,
        };

        info!(
            strategy_id = %strategy.id,
            lineage_id = %strategy.lineage_id,
            kind = %strategy.kind(),
            net_premium = %strategy.net_premium(),
            delta = %greeks.delta,
            "Strategy built"
        );

        Ok(BuiltStrategy {
            strategy,
            greeks,
            orders,
        })
    }

    /// Copy of `market` whose per-instrument volatilities reproduce the
    /// quoted option premiums.
    pub fn calibrate(
        &self,
        market: &MarketSnapshot,
        quotes: &BTreeMap<InstrumentId, (OptionContract, Decimal)>,
    ) -> Result<MarketSnapshot, StrategyError> {
        let mut calibrated = market.clone();
        for (id, (contract, premium)) in quotes {
            let inputs = OptionInputs {
                spot: to_f64(market.spot),
                strike: to_f64(contract.strike),
                time_years: years_until(market.timestamp, contract.expiry),
                rate: market.risk_free_rate,
                carry: market.carry,
                volatility: market.volatility,
                right: contract.right,
            };
            let vol = self.iv_solver.solve(to_f64(*premium), &inputs)?;
            calibrated.vol_overrides.insert(id.clone(), vol);
        }
        Ok(calibrated)
    }
}
