//! Per-instrument valuation against a market snapshot.

use rust_decimal::Decimal;

use super::black_scholes::{OptionInputs, price_option, years_until};
use super::instrument::{Instrument, InstrumentKind};
use super::{PricingError, to_decimal, to_f64};
use crate::greeks::Greeks;
use crate::market::MarketSnapshot;

/// Mark price and per-unit Greeks of one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentQuote {
    /// Mark price per unit.
    pub mark: Decimal,
    /// Greeks per unit.
    pub greeks: Greeks,
}

/// Per-unit Greeks of a linear instrument: delta 1 for spot, `beta` for
/// perpetuals, everything else zero.
pub fn linear_greeks(kind: InstrumentKind, beta: Decimal) -> Result<Greeks, PricingError> {
    match kind {
        InstrumentKind::Spot => Ok(Greeks::linear(Decimal::ONE)),
        InstrumentKind::Perpetual => Ok(Greeks::linear(beta)),
        InstrumentKind::Option => Err(PricingError::invalid(
            "options have no linear Greeks; price them instead",
        )),
    }
}

/// Value `instrument` under `market`.
///
/// Spot carries delta 1 per unit; perpetuals carry `perp_beta` per unit.
pub fn value_instrument(
    instrument: &Instrument,
    market: &MarketSnapshot,
    perp_beta: Decimal,
) -> Result<InstrumentQuote, PricingError> {
    if market.spot <= Decimal::ZERO || market.perp <= Decimal::ZERO {
        return Err(PricingError::invalid(format!(
            "market prices must be positive (spot {}, perp {})",
            market.spot, market.perp
        )));
    }
    match instrument {
        Instrument::Spot { .. } => Ok(InstrumentQuote {
            mark: market.spot,
            greeks: linear_greeks(InstrumentKind::Spot, perp_beta)?,
        }),
        Instrument::Perpetual { .. } => Ok(InstrumentQuote {
            mark: market.perp,
            greeks: linear_greeks(InstrumentKind::Perpetual, perp_beta)?,
        }),
        Instrument::Option(contract) => {
            let inputs = OptionInputs {
                spot: to_f64(market.spot),
                strike: to_f64(contract.strike),
                time_years: years_until(market.timestamp, contract.expiry),
                rate: market.risk_free_rate,
                carry: market.carry,
                volatility: market.volatility_for(&instrument.id()),
                right: contract.right,
            };
            let quote = price_option(&inputs)?;
            Ok(InstrumentQuote {
                mark: to_decimal(quote.price).round_dp(8),
                greeks: Greeks::new(
                    to_decimal(quote.delta),
                    to_decimal(quote.gamma),
                    to_decimal(quote.vega),
                    to_decimal(quote.theta),
                    to_decimal(quote.rho),
                ),
            })
        }
    }
}
