//! End-to-end hedging scenarios.
//!
//! Portfolio → risk snapshot → decision → fill, and full backtests over
//! JSON-lines tick files.

#![allow(clippy::unwrap_used)]

use std::io::Write;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::NamedTempFile;
use test_case::test_case;

use hedge_engine::ErrorKind;
use hedge_engine::backtest::{BacktestEngine, JsonLinesTickSource};
use hedge_engine::clock::MonoTime;
use hedge_engine::config::{EngineConfig, HedgingConfig, RiskConfig};
use hedge_engine::execution::Fill;
use hedge_engine::hedging::{EvaluationInput, HedgeAction, HedgeEngine, HedgeState, ReasonCode};
use hedge_engine::market::{MarketSnapshot, MarketTick};
use hedge_engine::portfolio::Portfolio;
use hedge_engine::pricing::Instrument;
use hedge_engine::risk::RiskAggregator;
use hedge_engine::strategy::{StrategyBuilder, StrategyTemplate};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

fn market(at: DateTime<Utc>) -> MarketSnapshot {
    MarketSnapshot::from_tick(&MarketTick::new(at, dec!(50000)), "BTC", 0.6, 0.05, 0.0, dec!(100))
}

fn tick_file(ticks: &[MarketTick]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for tick in ticks {
        writeln!(file, "{}", serde_json::to_string(tick).unwrap()).unwrap();
    }
    file.flush().unwrap();
    file
}

fn hourly(prices: &[Decimal]) -> Vec<MarketTick> {
    prices
        .iter()
        .zip(0..)
        .map(|(price, hour)| MarketTick::new(start() + Duration::hours(hour), *price))
        .collect()
}

#[test]
fn test_spot_delta_point_eight_is_hedged_to_band_edge() {
    let config = HedgingConfig {
        breach_confirmations: 2,
        cooldown_secs: 0,
        ..HedgingConfig::default()
    };
    let aggregator = RiskAggregator::new(RiskConfig::default());
    let mut portfolio = Portfolio::with_spot("BTC", dec!(10000), dec!(0.8), dec!(50000));
    let perp = Instrument::perpetual("BTC");
    let mut engine = HedgeEngine::new("BTC");

    let decide = |engine: &mut HedgeEngine, portfolio: &Portfolio, secs: i64| {
        let at = start() + Duration::seconds(secs);
        let snapshot = aggregator.snapshot(portfolio, &market(at), at).unwrap();
        let input = EvaluationInput {
            snapshot: &snapshot,
            now: MonoTime::from_secs(secs.unsigned_abs()),
            hedge_instrument: &perp,
            hedge_position: portfolio.quantity_of(&perp),
            hedge_delta: Decimal::ONE,
            timing: None,
        };
        engine.evaluate(&config, &input)
    };

    let first = decide(&mut engine, &portfolio, 0);
    assert_eq!(first.net_delta, dec!(0.8));
    assert_eq!(first.action, HedgeAction::NoOp);
    assert_eq!(first.reason, ReasonCode::BreachUnconfirmed);
    assert_eq!(engine.state(), HedgeState::Armed);

    let second = decide(&mut engine, &portfolio, 1);
    assert_eq!(second.action, HedgeAction::IncreaseHedge);
    assert_eq!(second.quantity, dec!(-0.7));
    assert_eq!(engine.state(), HedgeState::Hedging);

    let fill = Fill {
        instrument: perp.clone(),
        quantity: second.quantity,
        price: dec!(50000),
        fee: dec!(21),
        timestamp: start() + Duration::seconds(1),
        strategy_id: None,
        requested_quantity: second.quantity,
    };
    portfolio.apply_fill(&fill).unwrap();
    let state = engine.on_fill(&config, MonoTime::from_secs(1), &fill, Decimal::ONE);
    assert_eq!(state, HedgeState::Hedged);

    let third = decide(&mut engine, &portfolio, 2);
    assert_eq!(third.net_delta, dec!(0.1));
    assert_eq!(third.action, HedgeAction::NoOp);
    assert_eq!(third.reason, ReasonCode::WithinTolerance);
}

#[test_case(dec!(45000), dec!(55000), None ; "strikes bracket spot")]
#[test_case(dec!(55000), dec!(60000), Some(ErrorKind::InvalidStrategy) ; "put strike above spot")]
#[test_case(dec!(40000), dec!(45000), Some(ErrorKind::InvalidStrategy) ; "call strike below spot")]
#[test_case(dec!(50000), dec!(55000), Some(ErrorKind::InvalidStrategy) ; "put strike at spot")]
fn test_collar_construction(put: Decimal, call: Decimal, expected: Option<ErrorKind>) {
    let template = StrategyTemplate::Collar {
        put_strike: put,
        call_strike: call,
        expiry: start() + Duration::days(30),
        quantity: dec!(1),
    };
    let result = StrategyBuilder::new().build(&template, &market(start()));
    assert_eq!(result.err().map(|e| e.kind()), expected);
}

#[test]
fn test_file_backtests_write_identical_logs() {
    let prices: Vec<Decimal> = (0..72)
        .map(|i| dec!(50000) + Decimal::from((i * 13) % 17) * dec!(120) - dec!(1000))
        .collect();
    let ticks = tick_file(&hourly(&prices));

    let mut config = EngineConfig::default();
    config.hedging.cooldown_secs = 0;
    config.execution.partial_fills.enabled = true;
    config.execution.partial_fills.probability = 0.4;
    config.backtest.strategies = vec![StrategyTemplate::Collar {
        put_strike: dec!(45000),
        call_strike: dec!(55000),
        expiry: start() + Duration::days(30),
        quantity: dec!(1),
    }];
    let engine = BacktestEngine::new(config).unwrap();

    let mut logs = Vec::new();
    for _ in 0..2 {
        let mut source = JsonLinesTickSource::open(ticks.path()).unwrap();
        let outcome = engine.run(&mut source).unwrap();
        let out = NamedTempFile::new().unwrap();
        outcome.events.write_jsonl(out.path()).unwrap();
        logs.push(std::fs::read(out.path()).unwrap());
    }
    assert!(!logs[0].is_empty());
    assert_eq!(logs[0], logs[1]);
}

#[test]
fn test_stale_tick_in_file_is_counted() {
    let mut ticks = hourly(&[dec!(50000), dec!(50100), dec!(50200)]);
    ticks[1].observed_at = Some(ticks[1].timestamp - Duration::minutes(5));
    let file = tick_file(&ticks);

    let engine = BacktestEngine::new(EngineConfig::default()).unwrap();
    let outcome = engine
        .run(&mut JsonLinesTickSource::open(file.path()).unwrap())
        .unwrap();

    assert_eq!(outcome.report.ticks_processed, 3);
    assert_eq!(outcome.report.ticks_evaluated, 2);
    assert_eq!(outcome.report.error_counts[&ErrorKind::StaleMarketData], 1);
}

#[test]
fn test_malformed_line_is_skipped() {
    let mut file = tick_file(&hourly(&[dec!(50000)]));
    writeln!(file, "{{\"timestamp\": \"not a time\"}}").unwrap();
    let later = MarketTick::new(start() + Duration::hours(1), dec!(50100));
    writeln!(file, "{}", serde_json::to_string(&later).unwrap()).unwrap();
    file.flush().unwrap();

    let engine = BacktestEngine::new(EngineConfig::default()).unwrap();
    let outcome = engine
        .run(&mut JsonLinesTickSource::open(file.path()).unwrap())
        .unwrap();

    assert_eq!(outcome.report.ticks_processed, 2);
    assert_eq!(outcome.report.error_counts[&ErrorKind::InvalidInput], 1);
}
