//! Orders, quotes and fills.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::MarketSnapshot;
use crate::pricing::{Instrument, PricingError, StrategyId, value_instrument};

/// Direction of an order, derived from the sign of its quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Positive quantity.
    Buy,
    /// Negative quantity.
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
        }
    }
}

/// Request to trade a signed quantity of one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Instrument to trade.
    pub instrument: Instrument,
    /// Signed quantity (positive buys, negative sells).
    pub quantity: Decimal,
    /// Strategy the order belongs to, for option legs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_id: Option<StrategyId>,
}

impl Order {
    /// Order outside any strategy.
    #[must_use]
    pub const fn new(instrument: Instrument, quantity: Decimal) -> Self {
        Self {
            instrument,
            quantity,
            strategy_id: None,
        }
    }

    /// Order for a strategy leg.
    #[must_use]
    pub const fn for_strategy(instrument: Instrument, quantity: Decimal, strategy_id: StrategyId) -> Self {
        Self {
            instrument,
            quantity,
            strategy_id: Some(strategy_id),
        }
    }

    /// Buy or sell.
    #[must_use]
    pub fn side(&self) -> Side {
        if self.quantity.is_sign_negative() {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    /// Copy with a different quantity, keeping the sign convention.
    #[must_use]
    pub fn with_quantity(&self, quantity: Decimal) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }
}

/// Prices and depth the simulator fills against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionQuote {
    /// Mark price of the instrument.
    pub mark: Decimal,
    /// Underlying spot price, for option fee caps.
    pub underlying_price: Decimal,
    /// Depth in instrument units.
    pub liquidity: Decimal,
    /// Quote time.
    pub timestamp: DateTime<Utc>,
}

impl ExecutionQuote {
    /// Quote for `instrument` from a market snapshot.
    ///
    /// # Errors
    ///
    /// Fails when the instrument cannot be priced.
    pub fn for_instrument(
        instrument: &Instrument,
        market: &MarketSnapshot,
        perp_beta: Decimal,
    ) -> Result<Self, PricingError> {
        let quote = value_instrument(instrument, market, perp_beta)?;
        Ok(Self {
            mark: quote.mark,
            underlying_price: market.spot,
            liquidity: market.liquidity,
            timestamp: market.timestamp,
        })
    }
}

/// Executed trade. The only value that mutates portfolio quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Traded instrument.
    pub instrument: Instrument,
    /// Signed executed quantity.
    pub quantity: Decimal,
    /// Execution price per unit, after slippage.
    pub price: Decimal,
    /// Fee charged.
    pub fee: Decimal,
    /// Execution time.
    pub timestamp: DateTime<Utc>,
    /// Strategy the fill belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_id: Option<StrategyId>,
    /// Quantity originally requested.
    pub requested_quantity: Decimal,
}

impl Fill {
    /// Whether less than the requested quantity executed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.quantity.abs() < self.requested_quantity.abs()
    }

    /// Absolute traded notional.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        (self.quantity * self.price).abs()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_side_from_sign() {
        let sell = Order::new(Instrument::perpetual("BTC"), dec!(-0.7));
        assert_eq!(sell.side(), Side::Sell);
        assert_eq!(sell.with_quantity(dec!(0.2)).side(), Side::Buy);
    }

    #[test]
    fn test_partial_fill_detection() {
        let fill = Fill {
            instrument: Instrument::perpetual("BTC"),
            quantity: dec!(-0.3),
            price: dec!(50000),
            fee: dec!(9),
            timestamp: chrono::DateTime::UNIX_EPOCH,
            strategy_id: None,
            requested_quantity: dec!(-0.7),
        };
        assert!(fill.is_partial());
        assert_eq!(fill.notional(), dec!(15000.0));
    }
}
