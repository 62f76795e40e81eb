//! Scenario stress testing by full revaluation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::RiskError;
use crate::config::StressScenario;
use crate::market::MarketSnapshot;
use crate::portfolio::Exposure;
use crate::pricing::value_instrument;

/// Portfolio P&L under one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressResult {
    /// Scenario label.
    pub scenario: String,
    /// Relative spot move applied.
    pub spot_shock: Decimal,
    /// Change in marked value versus the base market.
    pub pnl: Decimal,
}

/// Marked value of `exposures` under `market`.
pub(crate) fn mark_value(
    exposures: &[Exposure],
    market: &MarketSnapshot,
    perp_beta: Decimal,
) -> Result<Decimal, RiskError> {
    exposures.iter().try_fold(Decimal::ZERO, |acc, exposure| {
        let quote = value_instrument(&exposure.instrument, market, perp_beta).map_err(|source| {
            RiskError::Pricing {
                instrument_id: exposure.instrument.id(),
                source,
            }
        })?;
        Ok(acc + quote.mark * exposure.quantity)
    })
}

/// Re-price every exposure under each scenario.
///
/// # Errors
///
/// Returns `RiskError::Pricing` if any leg fails to price under a shocked
/// market.
pub fn run_stress(
    exposures: &[Exposure],
    market: &MarketSnapshot,
    scenarios: &[StressScenario],
    perp_beta: Decimal,
) -> Result<Vec<StressResult>, RiskError> {
    let base = mark_value(exposures, market, perp_beta)?;
    scenarios
        .iter()
        .map(|scenario| {
            let shocked = market.shocked(scenario.spot_shock, scenario.vol_shock);
            let value = mark_value(exposures, &shocked, perp_beta)?;
            Ok(StressResult {
                scenario: scenario.name.clone(),
                spot_shock: scenario.spot_shock,
                pnl: value - base,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::config::default_stress_scenarios;
    use crate::market::MarketTick;
    use crate::pricing::{Instrument, OptionContract, OptionRight};

    fn market() -> MarketSnapshot {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        MarketSnapshot::from_tick(&MarketTick::new(ts, dec!(50000)), "BTC", 0.6, 0.05, 0.0, dec!(100))
    }

    fn exposure(instrument: Instrument, quantity: Decimal) -> Exposure {
        Exposure {
            instrument,
            quantity,
            strategy_id: None,
        }
    }

    #[test]
    fn test_spot_only_stress_is_linear() {
        let exposures = vec![exposure(Instrument::spot("BTC"), dec!(1))];
        let results =
            run_stress(&exposures, &market(), &default_stress_scenarios(), Decimal::ONE).unwrap();
        assert_eq!(results.len(), 6);
        assert_eq!(results[0].scenario, "spot_down_20");
        assert_eq!(results[0].pnl, dec!(-10000));
        assert_eq!(results[3].pnl, dec!(10000));
        // vol shocks do not move a linear book
        assert_eq!(results[5].pnl, Decimal::ZERO);
    }

    #[test]
    fn test_hedged_book_is_flat_under_spot_shocks() {
        let exposures = vec![
            exposure(Instrument::spot("BTC"), dec!(1)),
            exposure(Instrument::perpetual("BTC"), dec!(-1)),
        ];
        let results =
            run_stress(&exposures, &market(), &default_stress_scenarios(), Decimal::ONE).unwrap();
        assert!(results.iter().all(|r| r.pnl.is_zero()));
    }

    #[test]
    fn test_protective_put_caps_downside() {
        let m = market();
        let put = Instrument::Option(OptionContract {
            underlying: "BTC".to_string(),
            strike: dec!(45000),
            expiry: m.timestamp + Duration::days(30),
            right: OptionRight::Put,
        });
        let naked = vec![exposure(Instrument::spot("BTC"), dec!(1))];
        let protected = vec![
            exposure(Instrument::spot("BTC"), dec!(1)),
            exposure(put, dec!(1)),
        ];
        let scenarios = default_stress_scenarios();
        let naked = run_stress(&naked, &m, &scenarios, Decimal::ONE).unwrap();
        let protected = run_stress(&protected, &m, &scenarios, Decimal::ONE).unwrap();
        assert!(protected[0].pnl > naked[0].pnl);
        assert!(protected[5].pnl > Decimal::ZERO);
    }
}
