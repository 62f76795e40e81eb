//! Strategy and leg state.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::template::StrategyTemplate;
use crate::pricing::{Instrument, InstrumentId, LineageId, OptionContract, StrategyId};

/// Structure a strategy was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Long put against the spot holding.
    ProtectivePut,
    /// Short call against the spot holding.
    CoveredCall,
    /// Long put plus short call.
    Collar,
    /// Call and put at one strike.
    Straddle,
    /// OTM call and OTM put.
    Strangle,
    /// Long lower call, short upper call.
    BullCallSpread,
    /// Long upper put, short lower put.
    BearPutSpread,
    /// Short strangle protected by long wings.
    IronCondor,
    /// Same strike, two expiries.
    CalendarSpread,
    /// Arbitrary legs.
    Custom,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProtectivePut => "protective_put",
            Self::CoveredCall => "covered_call",
            Self::Collar => "collar",
            Self::Straddle => "straddle",
            Self::Strangle => "strangle",
            Self::BullCallSpread => "bull_call_spread",
            Self::BearPutSpread => "bear_put_spread",
            Self::IronCondor => "iron_condor",
            Self::CalendarSpread => "calendar_spread",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// One option leg of a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionLeg {
    /// Contract terms.
    pub contract: OptionContract,
    /// Signed quantity the strategy wants to hold.
    pub target_quantity: Decimal,
    /// Signed quantity actually filled.
    pub filled_quantity: Decimal,
    /// Average fill price of the open quantity.
    pub avg_price: Decimal,
    /// Model premium per unit at construction.
    pub premium: Decimal,
    /// Realized P&L from reductions.
    pub realized_pnl: Decimal,
}

impl OptionLeg {
    /// New unfilled leg.
    #[must_use]
    pub const fn new(contract: OptionContract, target_quantity: Decimal, premium: Decimal) -> Self {
        Self {
            contract,
            target_quantity,
            filled_quantity: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            premium,
            realized_pnl: Decimal::ZERO,
        }
    }

    /// Tradable instrument of this leg.
    #[must_use]
    pub fn instrument(&self) -> Instrument {
        Instrument::Option(self.contract.clone())
    }

    /// Identifier of the leg's instrument.
    #[must_use]
    pub fn instrument_id(&self) -> InstrumentId {
        self.instrument().id()
    }

    /// Quantity still to trade to reach the target.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        self.target_quantity - self.filled_quantity
    }
}

/// A group of option legs managed as one structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Instance identifier.
    pub id: StrategyId,
    /// Identifier preserved across rolls.
    pub lineage_id: LineageId,
    /// Template the legs came from.
    pub template: StrategyTemplate,
    /// Shared underlying.
    pub underlying: String,
    /// Legs.
    pub legs: Vec<OptionLeg>,
    /// Spot price at construction.
    pub entry_spot: Decimal,
    /// Construction time.
    pub created_at: DateTime<Utc>,
}

impl Strategy {
    /// Structure kind.
    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        self.template.kind()
    }

    /// Earliest leg expiry.
    #[must_use]
    pub fn nearest_expiry(&self) -> Option<DateTime<Utc>> {
        self.legs.iter().map(|leg| leg.contract.expiry).min()
    }

    /// All legs flat and nothing left to fill.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.legs
            .iter()
            .all(|leg| leg.filled_quantity.is_zero() && leg.target_quantity.is_zero())
    }

    /// Whether any leg still holds a position.
    #[must_use]
    pub fn has_open_quantity(&self) -> bool {
        self.legs.iter().any(|leg| !leg.filled_quantity.is_zero())
    }

    /// Leg trading `instrument_id`.
    pub fn leg_mut(&mut self, instrument_id: &InstrumentId) -> Option<&mut OptionLeg> {
        self.legs
            .iter_mut()
            .find(|leg| &leg.instrument_id() == instrument_id)
    }

    /// Net model premium: positive when the structure costs money.
    #[must_use]
    pub fn net_premium(&self) -> Decimal {
        self.legs
            .iter()
            .map(|leg| leg.premium * leg.target_quantity)
            .sum()
    }

    /// Set every target to zero and return the orders that flatten the legs.
    pub fn begin_close(&mut self) -> Vec<(Instrument, Decimal)> {
        self.legs
            .iter_mut()
            .filter_map(|leg| {
                leg.target_quantity = Decimal::ZERO;
                if leg.filled_quantity.is_zero() {
                    None
                } else {
                    Some((leg.instrument(), -leg.filled_quantity))
                }
            })
            .collect()
    }
}
