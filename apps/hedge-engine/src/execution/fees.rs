//! Fee schedules.

use rust_decimal::Decimal;

use super::slippage::BPS_DIVISOR;
use crate::config::{ExecutionConfig, FeeSchedule, OptionFeeConfig};
use crate::pricing::InstrumentKind;

/// Fee on a linear trade of `notional`.
///
/// Tiered schedules use the highest tier the notional reaches, or the
/// lowest tier when none is reached.
#[must_use]
pub fn linear_fee(schedule: &FeeSchedule, notional: Decimal) -> Decimal {
    let notional = notional.abs();
    let bps = match schedule {
        FeeSchedule::Fixed { bps } => *bps,
        FeeSchedule::Tiered { tiers } => tiers
            .iter()
            .filter(|tier| tier.min_notional <= notional)
            .max_by_key(|tier| tier.min_notional)
            .or_else(|| tiers.iter().min_by_key(|tier| tier.min_notional))
            .map_or(Decimal::ZERO, |tier| tier.bps),
    };
    notional * bps / BPS_DIVISOR
}

/// Fee on an option trade: a rate on underlying notional, capped at a
/// fraction of the premium exchanged.
#[must_use]
pub fn option_fee(
    config: &OptionFeeConfig,
    quantity: Decimal,
    underlying_price: Decimal,
    premium: Decimal,
) -> Decimal {
    let quantity = quantity.abs();
    let by_underlying = quantity * underlying_price * config.underlying_rate_bps / BPS_DIVISOR;
    let cap = quantity * premium.abs() * config.premium_cap;
    by_underlying.min(cap)
}

/// Fee for any instrument kind.
#[must_use]
pub fn fee_for(
    config: &ExecutionConfig,
    kind: InstrumentKind,
    quantity: Decimal,
    price: Decimal,
    underlying_price: Decimal,
) -> Decimal {
    let fee = match kind {
        InstrumentKind::Spot | InstrumentKind::Perpetual => {
            linear_fee(&config.fees, quantity * price)
        }
        InstrumentKind::Option => {
            option_fee(&config.option_fees, quantity, underlying_price, price)
        }
    };
    fee.round_dp(8)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::config::FeeTier;

    #[test]
    fn test_fixed_fee() {
        let schedule = FeeSchedule::Fixed { bps: dec!(6) };
        // 0.7 × 50,000 = 35,000 notional × 6 bps = 21
        assert_eq!(linear_fee(&schedule, dec!(-35000)), dec!(21));
    }

    #[test]
    fn test_tiered_fee_picks_highest_reached_tier() {
        let schedule = FeeSchedule::Tiered {
            tiers: vec![
                FeeTier {
                    min_notional: dec!(1000000),
                    bps: dec!(4),
                },
                FeeTier {
                    min_notional: dec!(0),
                    bps: dec!(6),
                },
            ],
        };
        assert_eq!(linear_fee(&schedule, dec!(10000)), dec!(6));
        assert_eq!(linear_fee(&schedule, dec!(2000000)), dec!(800));
    }

    #[test]
    fn test_option_fee_capped_by_premium() {
        let config = OptionFeeConfig::default();
        // 1 × 50,000 × 3 bps = 15; cap 12.5% × 40 = 5
        assert_eq!(option_fee(&config, dec!(1), dec!(50000), dec!(40)), dec!(5.000));
        // 1 × 50,000 × 3 bps = 15; cap 12.5% × 2,000 = 250
        assert_eq!(option_fee(&config, dec!(-1), dec!(50000), dec!(2000)), dec!(15));
    }
}
