//! Risk aggregation integration tests.
//!
//! Exercises portfolio → risk snapshot across spot, perpetual and option
//! holdings.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use hedge_engine::config::RiskConfig;
use hedge_engine::execution::Fill;
use hedge_engine::market::{MarketSnapshot, MarketTick};
use hedge_engine::portfolio::Portfolio;
use hedge_engine::pricing::Instrument;
use hedge_engine::risk::RiskAggregator;
use hedge_engine::strategy::{StrategyBuilder, StrategyTemplate};
use hedge_engine::{ErrorKind, Greeks, HedgeError};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

fn market(spot: Decimal) -> MarketSnapshot {
    MarketSnapshot::from_tick(&MarketTick::new(start(), spot), "BTC", 0.6, 0.05, 0.0, dec!(100))
}

fn fill(instrument: Instrument, quantity: Decimal, price: Decimal) -> Fill {
    Fill {
        instrument,
        quantity,
        price,
        fee: Decimal::ZERO,
        timestamp: start(),
        strategy_id: None,
        requested_quantity: quantity,
    }
}

/// Build `template`, add it and fill every leg at its model mark.
fn open_strategy(
    portfolio: &mut Portfolio,
    builder: &mut StrategyBuilder,
    template: &StrategyTemplate,
    market: &MarketSnapshot,
) -> Greeks {
    let built = builder.build(template, market).unwrap();
    let marks: Vec<Decimal> = built.strategy.legs.iter().map(|leg| leg.premium).collect();
    portfolio.add_strategy(built.strategy.clone()).unwrap();
    for (order, price) in built.orders.iter().zip(marks) {
        let mut leg_fill = fill(order.instrument.clone(), order.quantity, price);
        leg_fill.strategy_id = order.strategy_id.clone();
        portfolio.apply_fill(&leg_fill).unwrap();
    }
    built.greeks
}

fn collar(put: Decimal, call: Decimal) -> StrategyTemplate {
    StrategyTemplate::Collar {
        put_strike: put,
        call_strike: call,
        expiry: start() + Duration::days(30),
        quantity: dec!(1),
    }
}

proptest! {
    #[test]
    fn prop_net_delta_is_sum_of_leg_deltas(
        spot_qty in 1i64..5_000,
        perp_qty in -5_000i64..5_000,
        put_qty in 1i64..4_000,
        strike_offset in 1i64..20,
        spot_price in 30_000i64..70_000,
    ) {
        let spot = Decimal::from(spot_price);
        let market = market(spot);
        let mut portfolio = Portfolio::with_spot("BTC", dec!(100000), Decimal::new(spot_qty, 3), spot);
        if perp_qty != 0 {
            portfolio
                .apply_fill(&fill(Instrument::perpetual("BTC"), Decimal::new(perp_qty, 3), spot))
                .unwrap();
        }
        let put = StrategyTemplate::ProtectivePut {
            strike: spot - Decimal::from(strike_offset * 500),
            expiry: start() + Duration::days(30),
            quantity: Decimal::new(put_qty, 3),
        };
        let mut builder = StrategyBuilder::new();
        open_strategy(&mut portfolio, &mut builder, &put, &market);

        let snapshot = RiskAggregator::new(RiskConfig::default())
            .with_perp_beta(dec!(0.98))
            .snapshot(&portfolio, &market, start())
            .unwrap();
        let expected: Decimal = snapshot
            .legs()
            .iter()
            .map(|leg| leg.quantity * leg.per_unit.delta)
            .sum();
        prop_assert_eq!(snapshot.net_delta(), expected);
        prop_assert_eq!(snapshot.legs().len(), if perp_qty == 0 { 2 } else { 3 });
    }
}

#[test]
fn test_build_then_close_restores_greeks() {
    let market = market(dec!(50000));
    let aggregator = RiskAggregator::new(RiskConfig::default());
    let mut portfolio = Portfolio::with_spot("BTC", dec!(50000), dec!(1), dec!(50000));
    let before = *aggregator.snapshot(&portfolio, &market, start()).unwrap().greeks();

    let mut builder = StrategyBuilder::new();
    let template = collar(dec!(45000), dec!(55000));
    let expected = open_strategy(&mut portfolio, &mut builder, &template, &market);
    let open = *aggregator.snapshot(&portfolio, &market, start()).unwrap().greeks();
    let combined = before.add(&expected);
    assert!((open.delta - combined.delta).abs() < dec!(0.000001));
    assert!((open.vega - combined.vega).abs() < dec!(0.000001));
    assert!(open.delta < before.delta);

    let id = portfolio.strategies().next().unwrap().id.clone();
    for (instrument, quantity) in portfolio.begin_close_strategy(&id).unwrap() {
        let mut close = fill(instrument, quantity, dec!(1000));
        close.strategy_id = Some(id.clone());
        portfolio.apply_fill(&close).unwrap();
    }
    let after = *aggregator.snapshot(&portfolio, &market, start()).unwrap().greeks();

    assert_eq!(after, before);
    assert_eq!(portfolio.strategies().count(), 0);
}

#[test]
fn test_stale_market_rejected() {
    let aggregator = RiskAggregator::new(RiskConfig::default());
    let portfolio = Portfolio::with_spot("BTC", dec!(50000), dec!(1), dec!(50000));
    let mut stale = market(dec!(50000));
    stale.observed_at = start() - Duration::seconds(61);

    let Err(err) = aggregator.snapshot(&portfolio, &stale, start()) else {
        panic!("stale market must be rejected");
    };
    assert_eq!(HedgeError::from(err).kind(), ErrorKind::StaleMarketData);
}
