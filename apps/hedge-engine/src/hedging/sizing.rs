//! Hedge order sizing.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::{HedgingConfig, SizingTarget};

/// Signed hedge quantity that moves `deviation` (net minus target delta)
/// back into the band.
///
/// `BandEdge` trades just enough to reach the nearest band edge and rounds
/// away from zero to the lot size; `BandCenter` aims at the target and rounds
/// to the nearest lot. Both are capped at `max_order_size`, so a large
/// rebalance is split across successive decisions. Returns zero when no
/// whole lot is needed.
#[must_use]
pub fn hedge_quantity(deviation: Decimal, hedge_delta: Decimal, config: &HedgingConfig) -> Decimal {
    if deviation.abs() <= config.delta_threshold || hedge_delta.is_zero() {
        return Decimal::ZERO;
    }

    let (correction, rounding) = match config.sizing_target {
        SizingTarget::BandEdge => (
            deviation.abs() - config.delta_threshold,
            RoundingStrategy::AwayFromZero,
        ),
        SizingTarget::BandCenter => (deviation.abs(), RoundingStrategy::MidpointAwayFromZero),
    };

    let units = correction / hedge_delta.abs();
    let lots = (units / config.lot_size).round_dp_with_strategy(0, rounding);
    let max_lots = (config.max_order_size / config.lot_size).floor();
    let size = lots.min(max_lots) * config.lot_size;

    // Reduce the deviation: trade against its sign, adjusted for the hedge
    // instrument's delta sign.
    if deviation.is_sign_positive() == hedge_delta.is_sign_positive() {
        -size
    } else {
        size
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use test_case::test_case;

    use super::*;

    fn config(target: SizingTarget) -> HedgingConfig {
        HedgingConfig {
            sizing_target: target,
            ..HedgingConfig::default()
        }
    }

    #[test_case(dec!(0.8), dec!(-0.7) ; "long_breach_sells_to_edge")]
    #[test_case(dec!(-0.5), dec!(0.4) ; "short_breach_buys_to_edge")]
    #[test_case(dec!(0.1), dec!(0) ; "at_edge_is_inside")]
    #[test_case(dec!(0.1004), dec!(-0.001) ; "rounds_up_to_one_lot")]
    fn test_band_edge(deviation: Decimal, expected: Decimal) {
        assert_eq!(
            hedge_quantity(deviation, Decimal::ONE, &config(SizingTarget::BandEdge)),
            expected
        );
    }

    #[test]
    fn test_band_center_neutralizes() {
        let qty = hedge_quantity(dec!(0.8), Decimal::ONE, &config(SizingTarget::BandCenter));
        assert_eq!(qty, dec!(-0.8));
    }

    #[test]
    fn test_capped_at_max_order_size() {
        let qty = hedge_quantity(dec!(25), Decimal::ONE, &config(SizingTarget::BandEdge));
        assert_eq!(qty, dec!(-10));
    }

    #[test]
    fn test_beta_scales_units() {
        // perp moves 2 delta per unit: half the units
        let qty = hedge_quantity(dec!(0.9), dec!(2), &config(SizingTarget::BandEdge));
        assert_eq!(qty, dec!(-0.4));
    }
}
