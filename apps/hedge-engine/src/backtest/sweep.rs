//! Parallel parameter sweep.
//!
//! Runs one independent backtest per `(delta_threshold, hedge_ratio)` cell of
//! the configured grid on the rayon pool. Each run owns its engine and tick
//! source, so cells share nothing but the input ticks and results come back
//! in grid order regardless of scheduling.

use std::time::Instant;

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{Level, info, span};

use super::engine::{BacktestEngine, action_count};
use super::source::InMemoryTickSource;
use crate::config::EngineConfig;
use crate::error::HedgeError;
use crate::hedging::HedgeAction;
use crate::market::MarketTick;

/// Outcome of one grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResult {
    /// Delta band half-width used.
    pub delta_threshold: Decimal,
    /// Hedge ratio used.
    pub hedge_ratio: Decimal,
    /// Total return of the hedged portfolio.
    pub total_return: Decimal,
    /// Maximum drawdown of the hedged portfolio.
    pub max_drawdown: Decimal,
    /// Annualized Sharpe ratio.
    pub sharpe_ratio: Option<Decimal>,
    /// Hedge trades dispatched.
    pub hedge_trades: usize,
    /// Mean |net − target| delta.
    pub mean_abs_deviation: Decimal,
}

/// Grid cells in row-major order: thresholds outer, ratios inner.
#[must_use]
pub fn sweep_grid(config: &EngineConfig) -> Vec<(Decimal, Decimal)> {
    let grid = &config.backtest.sweep;
    grid.delta_thresholds
        .iter()
        .flat_map(|t| grid.hedge_ratios.iter().map(move |r| (*t, *r)))
        .collect()
}

/// Run every grid cell over `ticks`.
///
/// # Errors
///
/// Fails on the first cell whose configuration does not validate or whose
/// tick feed cannot be replayed.
pub fn run_sweep(
    config: &EngineConfig,
    ticks: &[MarketTick],
) -> Result<Vec<SweepResult>, HedgeError> {
    let cells = sweep_grid(config);
    let _span = span!(Level::INFO, "sweep", cells = cells.len(), ticks = ticks.len()).entered();
    let started = Instant::now();

    let results = cells
        .par_iter()
        .map(|(threshold, ratio)| run_cell(config, ticks, *threshold, *ratio))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        cells = results.len(),
        elapsed_ms = started.elapsed().as_millis(),
        "Sweep finished"
    );
    Ok(results)
}

fn run_cell(
    base: &EngineConfig,
    ticks: &[MarketTick],
    delta_threshold: Decimal,
    hedge_ratio: Decimal,
) -> Result<SweepResult, HedgeError> {
    let mut config = base.clone();
    config.hedging.delta_threshold = delta_threshold;
    config.hedging.hedge_ratio = hedge_ratio;
    config.backtest.event_log_path = None;

    let engine = BacktestEngine::new(config)?;
    let outcome = engine.run(&mut InMemoryTickSource::new(ticks.to_vec()))?;
    let hedge_trades = [
        HedgeAction::IncreaseHedge,
        HedgeAction::DecreaseHedge,
        HedgeAction::CloseHedge,
    ]
    .into_iter()
    .map(|action| action_count(&outcome, action))
    .sum();

    Ok(SweepResult {
        delta_threshold,
        hedge_ratio,
        total_return: outcome.report.total_return,
        max_drawdown: outcome.report.max_drawdown,
        sharpe_ratio: outcome.report.sharpe_ratio,
        hedge_trades,
        mean_abs_deviation: outcome.report.neutrality.mean_abs_deviation,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;

    fn ticks() -> Vec<MarketTick> {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        (0..24)
            .map(|i| {
                let price = dec!(50000) + Decimal::from((i * 7) % 5) * dec!(200);
                MarketTick::new(start + Duration::hours(i), price)
            })
            .collect()
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.hedging.cooldown_secs = 0;
        config.hedging.breach_confirmations = 1;
        config.backtest.sweep.delta_thresholds = vec![dec!(0.05), dec!(0.2)];
        config.backtest.sweep.hedge_ratios = vec![dec!(0.5), dec!(1)];
        config
    }

    #[test]
    fn test_grid_is_row_major() {
        assert_eq!(
            sweep_grid(&config()),
            vec![
                (dec!(0.05), dec!(0.5)),
                (dec!(0.05), dec!(1)),
                (dec!(0.2), dec!(0.5)),
                (dec!(0.2), dec!(1)),
            ]
        );
    }

    #[test]
    fn test_sweep_matches_sequential_runs() {
        let config = config();
        let results = run_sweep(&config, &ticks()).unwrap();
        assert_eq!(results.len(), 4);

        for result in &results {
            let mut single = config.clone();
            single.hedging.delta_threshold = result.delta_threshold;
            single.hedging.hedge_ratio = result.hedge_ratio;
            let outcome = BacktestEngine::new(single)
                .unwrap()
                .run(&mut InMemoryTickSource::new(ticks()))
                .unwrap();
            assert_eq!(result.total_return, outcome.report.total_return);
        }
    }

    #[test]
    fn test_full_hedge_ratio_trades() {
        let results = run_sweep(&config(), &ticks()).unwrap();
        let full = results
            .iter()
            .find(|r| r.delta_threshold == dec!(0.05) && r.hedge_ratio == dec!(1))
            .unwrap();
        assert!(full.hedge_trades >= 1);
    }

    #[test]
    fn test_invalid_cell_fails_sweep() {
        let mut config = config();
        config.backtest.sweep.delta_thresholds = vec![dec!(-0.1)];
        assert!(run_sweep(&config, &ticks()).is_err());
    }
}
