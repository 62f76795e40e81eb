//! Strategy rolls.
//!
//! A roll closes every open leg of a strategy and opens a replacement in the
//! same lineage. Both halves are planned together and logged as one event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::builder::{BuiltStrategy, StrategyBuilder};
use super::error::StrategyError;
use super::template::StrategyTemplate;
use super::types::{Strategy, StrategyKind};
use crate::execution::Order;
use crate::market::MarketSnapshot;
use crate::pricing::{LineageId, StrategyId};

/// Close-then-open plan for one roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollPlan {
    /// Strategy being replaced.
    pub from: StrategyId,
    /// Orders that flatten the old legs.
    pub close_orders: Vec<Order>,
    /// Replacement strategy and its opening orders.
    pub replacement: BuiltStrategy,
}

impl RollPlan {
    /// Summary for the event log.
    #[must_use]
    pub fn event(&self, timestamp: DateTime<Utc>) -> RollEvent {
        RollEvent {
            timestamp,
            from: self.from.clone(),
            to: self.replacement.strategy.id.clone(),
            lineage_id: self.replacement.strategy.lineage_id.clone(),
            kind: self.replacement.strategy.kind(),
            closed_legs: self.close_orders.len(),
            opened_legs: self.replacement.orders.len(),
        }
    }
}

/// One logged roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollEvent {
    /// When the roll was planned.
    pub timestamp: DateTime<Utc>,
    /// Old strategy.
    pub from: StrategyId,
    /// New strategy.
    pub to: StrategyId,
    /// Shared lineage.
    pub lineage_id: LineageId,
    /// Structure.
    pub kind: StrategyKind,
    /// Number of legs closed.
    pub closed_legs: usize,
    /// Number of legs opened.
    pub opened_legs: usize,
}

impl StrategyBuilder {
    /// Plan a roll of `current` into `template`.
    ///
    /// The replacement is validated before anything is planned; a failure
    /// leaves `current` untouched.
    pub fn roll(
        &mut self,
        current: &Strategy,
        template: &StrategyTemplate,
        market: &MarketSnapshot,
    ) -> Result<RollPlan, StrategyError> {
        let replacement =
            self.build_in_lineage(template, market, Some(current.lineage_id.clone()))?;

        let close_orders = current
            .legs
            .iter()
            .filter(|leg| !leg.filled_quantity.is_zero())
            .map(|leg| Order::for_strategy(leg.instrument(), -leg.filled_quantity, current.id.clone()))
            .collect();

        info!(
            from = %current.id,
            to = %replacement.strategy.id,
            lineage_id = %current.lineage_id,
            "Roll planned"
        );

        Ok(RollPlan {
            from: current.id.clone(),
            close_orders,
            replacement,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::market::MarketTick;

    fn market() -> MarketSnapshot {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        MarketSnapshot::from_tick(&MarketTick::new(ts, dec!(50000)), "BTC", 0.6, 0.05, 0.0, dec!(100))
    }

    fn put(days: i64) -> StrategyTemplate {
        StrategyTemplate::ProtectivePut {
            strike: dec!(45000),
            expiry: market().timestamp + Duration::days(days),
            quantity: dec!(2),
        }
    }

    #[test]
    fn test_roll_preserves_lineage() {
        let mut builder = StrategyBuilder::new();
        let mut original = builder.build(&put(7), &market()).unwrap().strategy;
        original.legs[0].filled_quantity = dec!(2);

        let plan = builder.roll(&original, &put(37), &market()).unwrap();
        assert_eq!(plan.from, original.id);
        assert_eq!(plan.replacement.strategy.lineage_id, original.lineage_id);
        assert_ne!(plan.replacement.strategy.id, original.id);
        assert_eq!(plan.close_orders.len(), 1);
        assert_eq!(plan.close_orders[0].quantity, dec!(-2));
        assert_eq!(plan.close_orders[0].strategy_id.as_ref(), Some(&original.id));

        let event = plan.event(market().timestamp);
        assert_eq!(event.closed_legs, 1);
        assert_eq!(event.opened_legs, 1);
    }

    #[test]
    fn test_invalid_roll_target_rejected() {
        let mut builder = StrategyBuilder::new();
        let original = builder.build(&put(7), &market()).unwrap().strategy;
        let bad = StrategyTemplate::ProtectivePut {
            strike: Decimal::ZERO,
            expiry: market().timestamp + Duration::days(37),
            quantity: dec!(2),
        };
        assert!(builder.roll(&original, &bad, &market()).is_err());
    }
}
