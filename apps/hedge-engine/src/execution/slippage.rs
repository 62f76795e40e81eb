//! Slippage models.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::order::Side;
use crate::config::SlippageModel;

/// Basis points divisor (1 bp = 0.0001).
pub(crate) const BPS_DIVISOR: Decimal = Decimal::from_parts(10000, 0, 0, false, 0);

/// Slippage in bps for an absolute `size` against `liquidity`.
///
/// Zero or negative liquidity charges only the constant component.
#[must_use]
pub fn slippage_bps(model: &SlippageModel, size: Decimal, liquidity: Decimal) -> Decimal {
    let participation = if liquidity > Decimal::ZERO {
        size.abs() / liquidity
    } else {
        Decimal::ZERO
    };

    match model {
        SlippageModel::FixedBps { bps } => *bps,
        SlippageModel::LinearImpact {
            base_bps,
            impact_bps,
        } => *base_bps + *impact_bps * participation,
        SlippageModel::SquareRootImpact {
            base_bps,
            coefficient,
        } => {
            // Decimal has no sqrt; the impact term only needs f64 precision
            let root = participation.to_f64().unwrap_or(0.0).sqrt();
            let root = Decimal::try_from(root).unwrap_or(Decimal::ZERO);
            *base_bps + *coefficient * root
        }
    }
}

/// Move `price` against the trader by `bps`.
///
/// For buys: pay more. For sells: receive less.
#[must_use]
pub fn apply_slippage(price: Decimal, side: Side, bps: Decimal) -> Decimal {
    let multiplier = bps / BPS_DIVISOR;
    match side {
        Side::Buy => price * (Decimal::ONE + multiplier),
        Side::Sell => price * (Decimal::ONE - multiplier),
    }
}
