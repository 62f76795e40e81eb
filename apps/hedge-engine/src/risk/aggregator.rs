//! Portfolio risk aggregation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::error::RiskError;
use super::snapshot::{LegRisk, RiskSnapshot};
use super::stress::run_stress;
use super::var::parametric_var;
use crate::config::RiskConfig;
use crate::greeks::aggregate;
use crate::market::MarketSnapshot;
use crate::portfolio::Portfolio;
use crate::pricing::value_instrument;

/// Builds a [`RiskSnapshot`] from the portfolio and current market.
///
/// Nothing is cached between passes: every snapshot re-prices every leg.
#[derive(Debug, Clone)]
pub struct RiskAggregator {
    config: RiskConfig,
    perp_beta: Decimal,
}

impl RiskAggregator {
    /// Aggregator with perpetual beta 1.
    #[must_use]
    pub const fn new(config: RiskConfig) -> Self {
        Self {
            config,
            perp_beta: Decimal::ONE,
        }
    }

    /// Set the perpetual beta used for hedge deltas.
    #[must_use]
    pub const fn with_perp_beta(mut self, beta: Decimal) -> Self {
        self.perp_beta = beta;
        self
    }

    /// Replace the perpetual beta.
    pub const fn set_perp_beta(&mut self, beta: Decimal) {
        self.perp_beta = beta;
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: RiskConfig) {
        self.config = config;
    }

    /// Perpetual beta in use.
    #[must_use]
    pub const fn perp_beta(&self) -> Decimal {
        self.perp_beta
    }

    /// Risk of `portfolio` under `market`, evaluated at `now`.
    ///
    /// # Errors
    ///
    /// - `StaleMarketData` when the market observation is older than the
    ///   configured maximum age
    /// - `Pricing` when a leg cannot be priced
    pub fn snapshot(
        &self,
        portfolio: &Portfolio,
        market: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Result<RiskSnapshot, RiskError> {
        self.check_freshness(market.observed_at, now)?;

        let exposures = portfolio.exposures();
        let mut legs = Vec::with_capacity(exposures.len());
        for exposure in &exposures {
            let quote = value_instrument(&exposure.instrument, market, self.perp_beta).map_err(
                |source| RiskError::Pricing {
                    instrument_id: exposure.instrument.id(),
                    source,
                },
            )?;
            legs.push(LegRisk {
                instrument_id: exposure.instrument.id(),
                kind: exposure.instrument.kind(),
                strategy_id: exposure.strategy_id.clone(),
                quantity: exposure.quantity,
                mark: quote.mark,
                per_unit: quote.greeks,
            });
        }

        let stress = run_stress(
            &exposures,
            market,
            &self.config.stress_scenarios,
            self.perp_beta,
        )?;
        let greeks = aggregate(legs.iter().map(|leg| (&leg.per_unit, leg.quantity)));
        let var = parametric_var(&greeks, market.spot, market.volatility, &self.config)?;

        let snapshot = RiskSnapshot::new(market.timestamp, market.spot, greeks, legs, var, stress);
        debug!(
            net_delta = %snapshot.net_delta(),
            gamma = %snapshot.gamma(),
            var = %snapshot.var().total,
            worst_stress = %snapshot.worst_stress_pnl(),
            "Risk snapshot"
        );
        Ok(snapshot)
    }

    /// Reject a market observation older than the configured maximum age.
    pub fn check_freshness(&self, observed_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), RiskError> {
        let age_ms = (now - observed_at).num_milliseconds();
        let max_age_ms = i64::try_from(self.config.max_data_age().as_millis()).unwrap_or(i64::MAX);
        if age_ms > max_age_ms {
            warn!(age_ms, max_age_ms, "Stale market data");
            return Err(RiskError::StaleMarketData { age_ms, max_age_ms });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::ErrorKind;
    use crate::execution::Fill;
    use crate::market::MarketTick;
    use crate::pricing::Instrument;

    fn market() -> MarketSnapshot {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        MarketSnapshot::from_tick(&MarketTick::new(ts, dec!(50000)), "BTC", 0.6, 0.05, 0.0, dec!(100))
    }

    fn hedged_portfolio() -> Portfolio {
        let m = market();
        let mut portfolio = Portfolio::with_spot("BTC", dec!(100000), dec!(1), dec!(50000));
        let fill = Fill {
            instrument: Instrument::perpetual("BTC"),
            quantity: dec!(-0.2),
            price: dec!(50000),
            fee: Decimal::ZERO,
            timestamp: m.timestamp,
            strategy_id: None,
            requested_quantity: dec!(-0.2),
        };
        portfolio.apply_fill(&fill).unwrap();
        portfolio
    }

    #[test]
    fn test_net_delta_sums_legs() {
        let snapshot = RiskAggregator::new(RiskConfig::default())
            .snapshot(&hedged_portfolio(), &market(), market().timestamp)
            .unwrap();
        assert_eq!(snapshot.net_delta(), dec!(0.8));
        assert_eq!(snapshot.spot_delta(), dec!(1));
        assert_eq!(snapshot.legs().len(), 2);
        assert!(snapshot.var().total > Decimal::ZERO);
    }

    #[test]
    fn test_perp_beta_scales_hedge_delta() {
        let snapshot = RiskAggregator::new(RiskConfig::default())
            .with_perp_beta(dec!(1.5))
            .snapshot(&hedged_portfolio(), &market(), market().timestamp)
            .unwrap();
        assert_eq!(snapshot.net_delta(), dec!(0.7));
    }

    #[test]
    fn test_stale_market_rejected() {
        let m = market();
        let now = m.timestamp + Duration::seconds(61);
        let Err(err) = RiskAggregator::new(RiskConfig::default()).snapshot(&hedged_portfolio(), &m, now)
        else {
            panic!("61s old data must be stale");
        };
        assert_eq!(err.kind(), ErrorKind::StaleMarketData);
    }

    #[test]
    fn test_data_at_max_age_accepted() {
        let m = market();
        let now = m.timestamp + Duration::seconds(60);
        assert!(
            RiskAggregator::new(RiskConfig::default())
                .snapshot(&hedged_portfolio(), &m, now)
                .is_ok()
        );
    }

    #[test]
    fn test_worst_stress_is_minimum() {
        let snapshot = RiskAggregator::new(RiskConfig::default())
            .snapshot(&hedged_portfolio(), &market(), market().timestamp)
            .unwrap();
        let min = snapshot.stress().iter().map(|s| s.pnl).min().unwrap();
        assert_eq!(snapshot.worst_stress_pnl(), min);
        // 0.8 net long: -20% spot loses 8,000
        assert_eq!(min, dec!(-8000));
    }
}
