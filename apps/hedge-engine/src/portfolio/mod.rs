//! Portfolio ledger.
//!
//! The [`Portfolio`] exclusively owns linear positions (spot, perpetuals) and
//! option strategies. Quantities change only through [`Portfolio::apply_fill`];
//! Greeks are never stored here, the risk layer derives them on every pass.
//!
//! Cash accounting:
//! - spot and option fills exchange full notional
//! - perpetual fills are margined: only realized P&L moves cash
//! - fees always come out of cash

mod position;

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use position::Position;

use crate::error::ErrorKind;
use crate::execution::Fill;
use crate::pricing::{Instrument, InstrumentId, InstrumentKind, StrategyId};
use crate::strategy::Strategy;

/// Portfolio bookkeeping errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortfolioError {
    /// Fill values are not usable.
    #[error("Invalid fill: {message}")]
    InvalidFill {
        /// Error message.
        message: String,
    },

    /// Fill references a strategy the portfolio does not hold.
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(StrategyId),

    /// Fill references a leg the strategy does not have.
    #[error("Strategy {strategy_id} has no leg on {instrument_id}")]
    UnknownLeg {
        /// Strategy referenced by the fill.
        strategy_id: StrategyId,
        /// Instrument of the fill.
        instrument_id: InstrumentId,
    },

    /// Strategy id already present.
    #[error("Strategy {0} already exists")]
    DuplicateStrategy(StrategyId),
}

impl PortfolioError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFill { .. } => ErrorKind::InvalidInput,
            Self::UnknownStrategy(_) | Self::UnknownLeg { .. } | Self::DuplicateStrategy(_) => {
                ErrorKind::InvalidStrategy
            }
        }
    }
}

/// Realized P&L by source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealizedPnl {
    /// Spot trading.
    pub spot: Decimal,
    /// Perpetual hedges.
    pub hedge: Decimal,
    /// Option legs.
    pub options: Decimal,
}

/// Total (realized + unrealized) P&L by source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnlAttribution {
    /// Spot holding.
    pub spot: Decimal,
    /// Perpetual hedges.
    pub hedge: Decimal,
    /// Option strategies.
    pub options: Decimal,
    /// Fees paid (positive number, reduces equity).
    pub fees: Decimal,
}

/// Signed holding of one instrument, for risk aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exposure {
    /// Held instrument.
    pub instrument: Instrument,
    /// Signed quantity.
    pub quantity: Decimal,
    /// Owning strategy for option legs.
    pub strategy_id: Option<StrategyId>,
}

/// Read-only summary published to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioView {
    /// Cash balance.
    pub cash: Decimal,
    /// Quantity per linear instrument.
    pub positions: BTreeMap<InstrumentId, Decimal>,
    /// Open strategy ids.
    pub strategies: Vec<StrategyId>,
    /// Fees paid.
    pub fees_paid: Decimal,
    /// Realized P&L.
    pub realized: RealizedPnl,
}

/// Cash, positions and strategies for one underlying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    underlying: String,
    cash: Decimal,
    positions: BTreeMap<InstrumentId, Position>,
    strategies: BTreeMap<StrategyId, Strategy>,
    fees_paid: Decimal,
    realized: RealizedPnl,
}

impl Portfolio {
    /// Empty portfolio holding `cash`.
    #[must_use]
    pub fn new(underlying: &str, cash: Decimal) -> Self {
        Self {
            underlying: underlying.to_string(),
            cash,
            positions: BTreeMap::new(),
            strategies: BTreeMap::new(),
            fees_paid: Decimal::ZERO,
            realized: RealizedPnl::default(),
        }
    }

    /// Portfolio that already holds `quantity` of spot bought at `entry_price`.
    #[must_use]
    pub fn with_spot(underlying: &str, cash: Decimal, quantity: Decimal, entry_price: Decimal) -> Self {
        let mut portfolio = Self::new(underlying, cash);
        if !quantity.is_zero() {
            let instrument = Instrument::spot(underlying);
            let position = Position {
                instrument: instrument.clone(),
                quantity,
                avg_entry_price: entry_price,
                realized_pnl: Decimal::ZERO,
            };
            portfolio.positions.insert(instrument.id(), position);
        }
        portfolio
    }

    /// Underlying symbol.
    #[must_use]
    pub fn underlying(&self) -> &str {
        &self.underlying
    }

    /// Cash balance.
    #[must_use]
    pub const fn cash(&self) -> Decimal {
        self.cash
    }

    /// Fees paid so far.
    #[must_use]
    pub const fn fees_paid(&self) -> Decimal {
        self.fees_paid
    }

    /// Realized P&L by source.
    #[must_use]
    pub const fn realized(&self) -> RealizedPnl {
        self.realized
    }

    /// Open linear positions.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Position in `id`, if open.
    #[must_use]
    pub fn position(&self, id: &InstrumentId) -> Option<&Position> {
        self.positions.get(id)
    }

    /// Signed quantity held in `instrument` (linear instruments only).
    #[must_use]
    pub fn quantity_of(&self, instrument: &Instrument) -> Decimal {
        self.positions
            .get(&instrument.id())
            .map_or(Decimal::ZERO, |p| p.quantity)
    }

    /// Open strategies.
    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.values()
    }

    /// Strategy by id.
    #[must_use]
    pub fn strategy(&self, id: &StrategyId) -> Option<&Strategy> {
        self.strategies.get(id)
    }

    /// Register a freshly built strategy. Its legs start unfilled.
    pub fn add_strategy(&mut self, strategy: Strategy) -> Result<(), PortfolioError> {
        if self.strategies.contains_key(&strategy.id) {
            return Err(PortfolioError::DuplicateStrategy(strategy.id));
        }
        self.strategies.insert(strategy.id.clone(), strategy);
        Ok(())
    }

    /// Zero a strategy's targets and return the orders that flatten it.
    ///
    /// A strategy with nothing filled is removed immediately.
    pub fn begin_close_strategy(
        &mut self,
        id: &StrategyId,
    ) -> Result<Vec<(Instrument, Decimal)>, PortfolioError> {
        let strategy = self
            .strategies
            .get_mut(id)
            .ok_or_else(|| PortfolioError::UnknownStrategy(id.clone()))?;
        let orders = strategy.begin_close();
        if strategy.is_closed() {
            self.strategies.remove(id);
        }
        Ok(orders)
    }

    /// Every non-zero holding: linear positions then filled option legs.
    #[must_use]
    pub fn exposures(&self) -> Vec<Exposure> {
        let linear = self.positions.values().map(|p| Exposure {
            instrument: p.instrument.clone(),
            quantity: p.quantity,
            strategy_id: None,
        });
        let legs = self.strategies.values().flat_map(|s| {
            s.legs
                .iter()
                .filter(|leg| !leg.filled_quantity.is_zero())
                .map(|leg| Exposure {
                    instrument: leg.instrument(),
                    quantity: leg.filled_quantity,
                    strategy_id: Some(s.id.clone()),
                })
        });
        linear.chain(legs).collect()
    }

    /// Apply an executed trade. The only way quantities change.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<(), PortfolioError> {
        self.validate_fill(fill)?;

        self.cash -= fill.fee;
        self.fees_paid += fill.fee;

        match fill.instrument.kind() {
            InstrumentKind::Spot | InstrumentKind::Perpetual => self.apply_linear(fill),
            InstrumentKind::Option => self.apply_option(fill)?,
        }

        debug!(
            instrument = %fill.instrument.id(),
            quantity = %fill.quantity,
            price = %fill.price,
            fee = %fill.fee,
            "Fill applied"
        );
        Ok(())
    }

    fn validate_fill(&self, fill: &Fill) -> Result<(), PortfolioError> {
        let invalid = |message: String| Err(PortfolioError::InvalidFill { message });
        if fill.quantity.is_zero() {
            return invalid("quantity must be non-zero".to_string());
        }
        if fill.price.is_sign_negative() || fill.fee.is_sign_negative() {
            return invalid(format!(
                "price and fee must be non-negative, got price={} fee={}",
                fill.price, fill.fee
            ));
        }
        if fill.instrument.underlying() != self.underlying {
            return invalid(format!(
                "fill on {} does not match portfolio underlying {}",
                fill.instrument.underlying(),
                self.underlying
            ));
        }
        if fill.instrument.kind() == InstrumentKind::Option {
            let Some(strategy_id) = &fill.strategy_id else {
                return invalid("option fills must reference a strategy".to_string());
            };
            let Some(strategy) = self.strategies.get(strategy_id) else {
                return Err(PortfolioError::UnknownStrategy(strategy_id.clone()));
            };
            let id = fill.instrument.id();
            if !strategy.legs.iter().any(|leg| leg.instrument_id() == id) {
                return Err(PortfolioError::UnknownLeg {
                    strategy_id: strategy_id.clone(),
                    instrument_id: id,
                });
            }
        }
        Ok(())
    }

    fn apply_linear(&mut self, fill: &Fill) {
        let kind = fill.instrument.kind();
        let id = fill.instrument.id();
        let position = self
            .positions
            .entry(id.clone())
            .or_insert_with(|| Position::new(fill.instrument.clone()));
        let realized = position.apply(fill.quantity, fill.price);
        let flat = position.is_flat();

        if kind == InstrumentKind::Spot {
            self.cash -= fill.quantity * fill.price;
            self.realized.spot += realized;
        } else {
            self.cash += realized;
            self.realized.hedge += realized;
        }

        if flat {
            self.positions.remove(&id);
        }
    }

    fn apply_option(&mut self, fill: &Fill) -> Result<(), PortfolioError> {
        let Some(strategy_id) = fill.strategy_id.as_ref() else {
            return Err(PortfolioError::InvalidFill {
                message: "option fills must reference a strategy".to_string(),
            });
        };
        let strategy = self
            .strategies
            .get_mut(strategy_id)
            .ok_or_else(|| PortfolioError::UnknownStrategy(strategy_id.clone()))?;
        let id = fill.instrument.id();
        let leg = strategy
            .leg_mut(&id)
            .ok_or_else(|| PortfolioError::UnknownLeg {
                strategy_id: strategy_id.clone(),
                instrument_id: id,
            })?;

        let (qty, avg, realized) =
            position::apply_trade(leg.filled_quantity, leg.avg_price, fill.quantity, fill.price);
        leg.filled_quantity = qty;
        leg.avg_price = avg;
        leg.realized_pnl += realized;

        self.cash -= fill.quantity * fill.price;
        self.realized.options += realized;

        if strategy.is_closed() {
            debug!(strategy_id = %strategy_id, "Strategy closed");
            self.strategies.remove(strategy_id);
        }
        Ok(())
    }

    /// Mark-to-market equity. `mark` prices any held instrument.
    pub fn equity(&self, mark: impl Fn(&Instrument) -> Decimal) -> Decimal {
        let linear: Decimal = self
            .positions
            .values()
            .map(|p| match p.instrument.kind() {
                InstrumentKind::Perpetual => p.unrealized_pnl(mark(&p.instrument)),
                _ => p.quantity * mark(&p.instrument),
            })
            .sum();
        let options: Decimal = self
            .strategies
            .values()
            .flat_map(|s| s.legs.iter())
            .map(|leg| leg.filled_quantity * mark(&leg.instrument()))
            .sum();
        self.cash + linear + options
    }

    /// Realized plus unrealized P&L by source.
    pub fn attribution(&self, mark: impl Fn(&Instrument) -> Decimal) -> PnlAttribution {
        let mut out = PnlAttribution {
            spot: self.realized.spot,
            hedge: self.realized.hedge,
            options: self.realized.options,
            fees: self.fees_paid,
        };
        for p in self.positions.values() {
            let unrealized = p.unrealized_pnl(mark(&p.instrument));
            match p.instrument.kind() {
                InstrumentKind::Spot => out.spot += unrealized,
                _ => out.hedge += unrealized,
            }
        }
        for leg in self.strategies.values().flat_map(|s| s.legs.iter()) {
            out.options += (mark(&leg.instrument()) - leg.avg_price) * leg.filled_quantity;
        }
        out
    }

    /// Summary for observers.
    #[must_use]
    pub fn view(&self) -> PortfolioView {
        PortfolioView {
            cash: self.cash,
            positions: self
                .positions
                .iter()
                .map(|(id, p)| (id.clone(), p.quantity))
                .collect(),
            strategies: self.strategies.keys().cloned().collect(),
            fees_paid: self.fees_paid,
            realized: self.realized,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::pricing::{LineageId, OptionContract, OptionRight};
    use crate::strategy::{OptionLeg, StrategyTemplate};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn fill(instrument: Instrument, quantity: Decimal, price: Decimal, fee: Decimal) -> Fill {
        Fill {
            instrument,
            quantity,
            price,
            fee,
            timestamp: ts(),
            strategy_id: None,
            requested_quantity: quantity,
        }
    }

    fn put_strategy() -> Strategy {
        Strategy {
            id: StrategyId::new("strat-000001"),
            lineage_id: LineageId::new("lineage-000001"),
            template: StrategyTemplate::ProtectivePut {
                strike: dec!(45000),
                expiry: Utc.with_ymd_and_hms(2026, 3, 27, 8, 0, 0).unwrap(),
                quantity: dec!(1),
            },
            underlying: "BTC".to_string(),
            legs: vec![OptionLeg::new(
                OptionContract {
                    underlying: "BTC".to_string(),
                    strike: dec!(45000),
                    expiry: Utc.with_ymd_and_hms(2026, 3, 27, 8, 0, 0).unwrap(),
                    right: OptionRight::Put,
                },
                dec!(1),
                dec!(900),
            )],
            entry_spot: dec!(50000),
            created_at: ts(),
        }
    }

    #[test]
    fn test_with_spot_seeds_position() {
        let p = Portfolio::with_spot("BTC", dec!(0), dec!(1), dec!(50000));
        assert_eq!(p.quantity_of(&Instrument::spot("BTC")), dec!(1));
        assert_eq!(p.equity(|_| dec!(50000)), dec!(50000));
    }

    #[test]
    fn test_perp_fill_is_margined() {
        let mut p = Portfolio::with_spot("BTC", dec!(1000), dec!(1), dec!(50000));
        p.apply_fill(&fill(Instrument::perpetual("BTC"), dec!(-0.7), dec!(50000), dec!(21)))
            .unwrap();
        assert_eq!(p.cash(), dec!(979));
        assert_eq!(p.quantity_of(&Instrument::perpetual("BTC")), dec!(-0.7));

        p.apply_fill(&fill(Instrument::perpetual("BTC"), dec!(0.7), dec!(49000), dec!(0)))
            .unwrap();
        assert_eq!(p.realized().hedge, dec!(700.0));
        assert_eq!(p.cash(), dec!(1679.0));
        assert!(p.position(&Instrument::perpetual("BTC").id()).is_none());
    }

    #[test]
    fn test_zero_quantity_fill_rejected() {
        let mut p = Portfolio::new("BTC", dec!(0));
        let Err(err) = p.apply_fill(&fill(Instrument::spot("BTC"), dec!(0), dec!(1), dec!(0))) else {
            panic!("expected invalid fill");
        };
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_option_fill_requires_known_strategy() {
        let mut p = Portfolio::new("BTC", dec!(0));
        let leg = put_strategy().legs[0].instrument();
        let mut f = fill(leg, dec!(1), dec!(900), dec!(0));
        f.strategy_id = Some(StrategyId::new("missing"));
        assert!(matches!(p.apply_fill(&f), Err(PortfolioError::UnknownStrategy(_))));
    }

    #[test]
    fn test_strategy_removed_when_all_legs_closed() {
        let mut p = Portfolio::new("BTC", dec!(10000));
        let strategy = put_strategy();
        let id = strategy.id.clone();
        let leg = strategy.legs[0].instrument();
        p.add_strategy(strategy).unwrap();

        let mut open = fill(leg.clone(), dec!(1), dec!(900), dec!(0));
        open.strategy_id = Some(id.clone());
        p.apply_fill(&open).unwrap();
        assert_eq!(p.exposures().len(), 1);
        assert_eq!(p.cash(), dec!(9100));

        let orders = p.begin_close_strategy(&id).unwrap();
        assert_eq!(orders, vec![(leg.clone(), dec!(-1))]);
        assert!(p.strategy(&id).is_some());

        let mut close = fill(leg, dec!(-1), dec!(1000), dec!(0));
        close.strategy_id = Some(id.clone());
        p.apply_fill(&close).unwrap();
        assert!(p.strategy(&id).is_none());
        assert_eq!(p.realized().options, dec!(100));
    }

    #[test]
    fn test_attribution_reconciles_with_equity() {
        let mut p = Portfolio::with_spot("BTC", dec!(5000), dec!(1), dec!(50000));
        let start = p.equity(|_| dec!(50000));
        p.apply_fill(&fill(Instrument::perpetual("BTC"), dec!(-0.5), dec!(50000), dec!(15)))
            .unwrap();
        let mark = |_: &Instrument| dec!(48000);
        let a = p.attribution(mark);
        assert_eq!(a.spot, dec!(-2000));
        assert_eq!(a.hedge, dec!(1000.0));
        assert_eq!(p.equity(mark) - start, a.spot + a.hedge + a.options - a.fees);
    }
}
