//! Linear position bookkeeping.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::{Instrument, InstrumentId};

/// Holding of a spot or perpetual instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Instrument held.
    pub instrument: Instrument,
    /// Signed quantity (positive = long, negative = short).
    pub quantity: Decimal,
    /// Average entry price of the open quantity.
    pub avg_entry_price: Decimal,
    /// Realized P&L from reductions.
    pub realized_pnl: Decimal,
}

impl Position {
    /// Flat position in `instrument`.
    #[must_use]
    pub const fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            quantity: Decimal::ZERO,
            avg_entry_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }

    /// Identifier of the held instrument.
    #[must_use]
    pub fn instrument_id(&self) -> InstrumentId {
        self.instrument.id()
    }

    /// Check if position is flat.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Unrealized P&L against `mark`.
    #[must_use]
    pub fn unrealized_pnl(&self, mark: Decimal) -> Decimal {
        (mark - self.avg_entry_price) * self.quantity
    }

    /// Apply a signed trade and return the P&L it realizes.
    pub fn apply(&mut self, quantity: Decimal, price: Decimal) -> Decimal {
        let (next_qty, next_avg, realized) =
            apply_trade(self.quantity, self.avg_entry_price, quantity, price);
        self.quantity = next_qty;
        self.avg_entry_price = next_avg;
        self.realized_pnl += realized;
        realized
    }
}

/// Average-cost accounting for one trade.
///
/// Returns `(quantity, avg_price, realized_pnl)` after applying `trade_qty`
/// at `price` to a holding of `qty` at `avg`. Crossing through zero realizes
/// the closed part and opens the remainder at `price`.
pub(crate) fn apply_trade(
    qty: Decimal,
    avg: Decimal,
    trade_qty: Decimal,
    price: Decimal,
) -> (Decimal, Decimal, Decimal) {
    let next_qty = qty + trade_qty;

    if qty.is_zero() || qty.is_sign_positive() == trade_qty.is_sign_positive() {
        let next_avg = if next_qty.is_zero() {
            Decimal::ZERO
        } else {
            (avg * qty + price * trade_qty) / next_qty
        };
        return (next_qty, next_avg, Decimal::ZERO);
    }

    let closed = trade_qty.abs().min(qty.abs());
    let direction = if qty.is_sign_positive() {
        Decimal::ONE
    } else {
        Decimal::NEGATIVE_ONE
    };
    let realized = (price - avg) * closed * direction;

    let next_avg = if next_qty.is_zero() {
        Decimal::ZERO
    } else if next_qty.is_sign_positive() == qty.is_sign_positive() {
        avg
    } else {
        price
    };

    (next_qty, next_avg, realized)
}
