//! Backtest report.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::metrics::{max_drawdown, mean, period_returns, sharpe_ratio, total_return};
use crate::error::ErrorKind;
use crate::hedging::HedgeAction;
use crate::portfolio::PnlAttribution;

/// Equity of the hedged portfolio and the unhedged benchmark at one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityPoint {
    /// Tick time.
    pub timestamp: DateTime<Utc>,
    /// Hedged portfolio equity.
    pub equity: Decimal,
    /// Buy-and-hold equity.
    pub benchmark: Decimal,
}

/// Net and target delta after the tick's trades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaPoint {
    /// Tick time.
    pub timestamp: DateTime<Utc>,
    /// Net delta after hedging.
    pub net_delta: Decimal,
    /// Target delta.
    pub target_delta: Decimal,
}

/// How closely the portfolio tracked its target delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeutralityStats {
    /// Mean |net − target|.
    pub mean_abs_deviation: Decimal,
    /// Largest |net − target|.
    pub max_abs_deviation: Decimal,
    /// Share of evaluated ticks inside the band.
    pub within_tolerance_ratio: Decimal,
}

/// Buy-and-hold comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    /// Final equity.
    pub final_equity: Decimal,
    /// Total return.
    pub total_return: Decimal,
    /// Maximum drawdown.
    pub max_drawdown: Decimal,
    /// Annualized Sharpe ratio.
    pub sharpe_ratio: Option<Decimal>,
}

/// Result of one backtest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Ticks accepted.
    pub ticks_processed: usize,
    /// Ticks that produced a risk snapshot.
    pub ticks_evaluated: usize,
    /// Starting equity.
    pub initial_equity: Decimal,
    /// Ending equity.
    pub final_equity: Decimal,
    /// Total return of the hedged portfolio.
    pub total_return: Decimal,
    /// Maximum drawdown of the hedged portfolio.
    pub max_drawdown: Decimal,
    /// Annualized Sharpe ratio of the hedged portfolio.
    pub sharpe_ratio: Option<Decimal>,
    /// Unhedged buy-and-hold comparison.
    pub benchmark: BenchmarkSummary,
    /// P&L by source at the final tick.
    pub attribution: PnlAttribution,
    /// Decisions by action.
    pub action_counts: BTreeMap<HedgeAction, usize>,
    /// Errors by kind.
    pub error_counts: BTreeMap<ErrorKind, usize>,
    /// Delta tracking statistics.
    pub neutrality: NeutralityStats,
    /// Fills executed.
    pub fills: usize,
    /// Strategy rolls.
    pub rolls: usize,
    /// Option legs settled at expiry.
    pub settlements: usize,
    /// Equity per evaluated tick.
    pub equity_curve: Vec<EquityPoint>,
    /// Delta per evaluated tick.
    pub delta_series: Vec<DeltaPoint>,
}

impl BacktestReport {
    /// Hedged minus unhedged total return.
    #[must_use]
    pub fn excess_return(&self) -> Decimal {
        self.total_return - self.benchmark.total_return
    }

    /// Total errors of every kind.
    #[must_use]
    pub fn error_total(&self) -> usize {
        self.error_counts.values().sum()
    }
}

impl fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ratio = |r: Option<Decimal>| r.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
        let pct = |v: Decimal| format!("{:.2}%", v * Decimal::ONE_HUNDRED);

        writeln!(f, "Backtest report")?;
        writeln!(f, "  ticks               {} ({} evaluated)", self.ticks_processed, self.ticks_evaluated)?;
        writeln!(f, "  equity              {:.2} -> {:.2}", self.initial_equity, self.final_equity)?;
        writeln!(f, "                      hedged      unhedged")?;
        writeln!(
            f,
            "  total return        {:<11} {}",
            pct(self.total_return),
            pct(self.benchmark.total_return)
        )?;
        writeln!(
            f,
            "  max drawdown        {:<11} {}",
            pct(self.max_drawdown),
            pct(self.benchmark.max_drawdown)
        )?;
        writeln!(
            f,
            "  sharpe              {:<11} {}",
            ratio(self.sharpe_ratio),
            ratio(self.benchmark.sharpe_ratio)
        )?;
        writeln!(f, "  attribution")?;
        writeln!(f, "    spot              {:.2}", self.attribution.spot)?;
        writeln!(f, "    hedge             {:.2}", self.attribution.hedge)?;
        writeln!(f, "    options           {:.2}", self.attribution.options)?;
        writeln!(f, "    fees              {:.2}", -self.attribution.fees)?;
        writeln!(f, "  neutrality")?;
        writeln!(f, "    mean |dev|        {:.4}", self.neutrality.mean_abs_deviation)?;
        writeln!(f, "    max |dev|         {:.4}", self.neutrality.max_abs_deviation)?;
        writeln!(f, "    within band       {}", pct(self.neutrality.within_tolerance_ratio))?;
        writeln!(f, "  fills {}  rolls {}  settlements {}", self.fills, self.rolls, self.settlements)?;
        writeln!(f, "  actions")?;
        for (action, count) in &self.action_counts {
            writeln!(f, "    {:<17} {count}", action.to_string())?;
        }
        if !self.error_counts.is_empty() {
            writeln!(f, "  errors")?;
            for (kind, count) in &self.error_counts {
                writeln!(f, "    {:<23} {count}", kind.as_str())?;
            }
        }
        Ok(())
    }
}

/// Accumulates per-tick observations into a [`BacktestReport`].
#[derive(Debug, Clone, Default)]
pub(crate) struct ReportBuilder {
    ticks_processed: usize,
    equity_curve: Vec<EquityPoint>,
    delta_series: Vec<DeltaPoint>,
    within_band: usize,
    action_counts: BTreeMap<HedgeAction, usize>,
    error_counts: BTreeMap<ErrorKind, usize>,
    fills: usize,
    rolls: usize,
    settlements: usize,
}

impl ReportBuilder {
    pub(crate) fn tick(&mut self) {
        self.ticks_processed += 1;
    }

    pub(crate) fn equity(&mut self, timestamp: DateTime<Utc>, equity: Decimal, benchmark: Decimal) {
        self.equity_curve.push(EquityPoint {
            timestamp,
            equity,
            benchmark,
        });
    }

    pub(crate) fn delta(
        &mut self,
        timestamp: DateTime<Utc>,
        net_delta: Decimal,
        target_delta: Decimal,
        threshold: Decimal,
    ) {
        if (net_delta - target_delta).abs() <= threshold {
            self.within_band += 1;
        }
        self.delta_series.push(DeltaPoint {
            timestamp,
            net_delta,
            target_delta,
        });
    }

    pub(crate) fn action(&mut self, action: HedgeAction) {
        *self.action_counts.entry(action).or_default() += 1;
    }

    pub(crate) fn error(&mut self, kind: ErrorKind) {
        *self.error_counts.entry(kind).or_default() += 1;
    }

    pub(crate) const fn fill(&mut self) {
        self.fills += 1;
    }

    pub(crate) const fn roll(&mut self) {
        self.rolls += 1;
    }

    pub(crate) const fn settlement(&mut self) {
        self.settlements += 1;
    }

    pub(crate) fn finish(
        self,
        initial_equity: Decimal,
        attribution: PnlAttribution,
        periods_per_year: u32,
    ) -> BacktestReport {
        let hedged: Vec<Decimal> = self.equity_curve.iter().map(|p| p.equity).collect();
        let unhedged: Vec<Decimal> = self.equity_curve.iter().map(|p| p.benchmark).collect();
        let final_equity = hedged.last().copied().unwrap_or(initial_equity);
        let benchmark_final = unhedged.last().copied().unwrap_or(initial_equity);

        let deviations: Vec<Decimal> = self
            .delta_series
            .iter()
            .map(|p| (p.net_delta - p.target_delta).abs())
            .collect();
        let neutrality = if deviations.is_empty() {
            NeutralityStats::default()
        } else {
            NeutralityStats {
                mean_abs_deviation: mean(&deviations).unwrap_or_default().round_dp(6),
                max_abs_deviation: deviations.iter().copied().max().unwrap_or_default(),
                within_tolerance_ratio: (Decimal::from(self.within_band)
                    / Decimal::from(deviations.len()))
                .round_dp(6),
            }
        };

        BacktestReport {
            ticks_processed: self.ticks_processed,
            ticks_evaluated: self.equity_curve.len(),
            initial_equity,
            final_equity,
            total_return: total_return(initial_equity, final_equity),
            max_drawdown: max_drawdown(&hedged),
            sharpe_ratio: sharpe_ratio(&period_returns(&hedged), periods_per_year),
            benchmark: BenchmarkSummary {
                final_equity: benchmark_final,
                total_return: total_return(initial_equity, benchmark_final),
                max_drawdown: max_drawdown(&unhedged),
                sharpe_ratio: sharpe_ratio(&period_returns(&unhedged), periods_per_year),
            },
            attribution,
            action_counts: self.action_counts,
            error_counts: self.error_counts,
            neutrality,
            fills: self.fills,
            rolls: self.rolls,
            settlements: self.settlements,
            equity_curve: self.equity_curve,
            delta_series: self.delta_series,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    use super::*;

    fn ts(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    #[test]
    fn test_builder_summarizes_run() {
        let mut builder = ReportBuilder::default();
        for (i, (equity, bench, net)) in [
            (dec!(100000), dec!(100000), dec!(0.05)),
            (dec!(99000), dec!(95000), dec!(0.3)),
            (dec!(100500), dec!(102000), dec!(0.0)),
        ]
        .into_iter()
        .enumerate()
        {
            builder.tick();
            builder.equity(ts(i as i64), equity, bench);
            builder.delta(ts(i as i64), net, Decimal::ZERO, dec!(0.1));
        }
        builder.action(HedgeAction::NoOp);
        builder.action(HedgeAction::NoOp);
        builder.action(HedgeAction::IncreaseHedge);
        builder.error(ErrorKind::StaleMarketData);

        let report = builder.finish(dec!(100000), PnlAttribution::default(), 8760);
        assert_eq!(report.ticks_processed, 3);
        assert_eq!(report.total_return, dec!(0.005));
        assert_eq!(report.max_drawdown, dec!(0.01));
        assert_eq!(report.benchmark.total_return, dec!(0.02));
        assert_eq!(report.benchmark.max_drawdown, dec!(0.05));
        assert_eq!(report.excess_return(), dec!(-0.015));
        assert_eq!(report.neutrality.max_abs_deviation, dec!(0.3));
        assert_eq!(report.neutrality.within_tolerance_ratio, dec!(0.666667));
        assert_eq!(report.action_counts[&HedgeAction::NoOp], 2);
        assert_eq!(report.error_total(), 1);

        let text = report.to_string();
        assert!(text.contains("increase_hedge"));
        assert!(text.contains("STALE_MARKET_DATA"));
    }

    #[test]
    fn test_empty_run_reports_initial_equity() {
        let report = ReportBuilder::default().finish(dec!(100000), PnlAttribution::default(), 8760);
        assert_eq!(report.final_equity, dec!(100000));
        assert_eq!(report.total_return, Decimal::ZERO);
        assert!(report.sharpe_ratio.is_none());
    }

    #[test]
    fn test_report_serializes_enum_keys() {
        let mut builder = ReportBuilder::default();
        builder.action(HedgeAction::RollStrategy);
        let report = builder.finish(dec!(1), PnlAttribution::default(), 1);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""roll_strategy":1"#));
    }
}
