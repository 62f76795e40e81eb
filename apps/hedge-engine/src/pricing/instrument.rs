//! Instrument identity.
//!
//! Identifiers are strongly typed so instrument, strategy and lineage ids
//! cannot be mixed up.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(InstrumentId, "Identifier of a tradable instrument.");
define_id!(StrategyId, "Identifier of one strategy instance.");
define_id!(
    LineageId,
    "Identifier shared by a strategy and every strategy rolled from it."
);

/// Instrument category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Spot holding of the underlying.
    Spot,
    /// Perpetual future on the underlying.
    Perpetual,
    /// European option on the underlying.
    Option,
}

impl InstrumentKind {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Perpetual => "perpetual",
            Self::Option => "option",
        }
    }
}

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionRight {
    /// Right to buy.
    Call,
    /// Right to sell.
    Put,
}

impl OptionRight {
    const fn code(self) -> char {
        match self {
            Self::Call => 'C',
            Self::Put => 'P',
        }
    }
}

/// Terms of a European option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Underlying symbol.
    pub underlying: String,
    /// Strike price.
    pub strike: Decimal,
    /// Expiry instant.
    pub expiry: DateTime<Utc>,
    /// Call or put.
    pub right: OptionRight,
}

impl OptionContract {
    /// Intrinsic value at `spot`.
    #[must_use]
    pub fn intrinsic(&self, spot: Decimal) -> Decimal {
        match self.right {
            OptionRight::Call => (spot - self.strike).max(Decimal::ZERO),
            OptionRight::Put => (self.strike - spot).max(Decimal::ZERO),
        }
    }
}

/// A tradable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instrument {
    /// Spot holding.
    Spot {
        /// Underlying symbol.
        underlying: String,
    },
    /// Perpetual future.
    Perpetual {
        /// Underlying symbol.
        underlying: String,
    },
    /// Option contract.
    Option(OptionContract),
}

impl Instrument {
    /// Spot instrument on `underlying`.
    #[must_use]
    pub fn spot(underlying: &str) -> Self {
        Self::Spot {
            underlying: underlying.to_string(),
        }
    }

    /// Perpetual instrument on `underlying`.
    #[must_use]
    pub fn perpetual(underlying: &str) -> Self {
        Self::Perpetual {
            underlying: underlying.to_string(),
        }
    }

    /// Instrument category.
    #[must_use]
    pub const fn kind(&self) -> InstrumentKind {
        match self {
            Self::Spot { .. } => InstrumentKind::Spot,
            Self::Perpetual { .. } => InstrumentKind::Perpetual,
            Self::Option(_) => InstrumentKind::Option,
        }
    }

    /// Underlying symbol.
    #[must_use]
    pub fn underlying(&self) -> &str {
        match self {
            Self::Spot { underlying } | Self::Perpetual { underlying } => underlying,
            Self::Option(contract) => &contract.underlying,
        }
    }

    /// Option terms, if this is an option.
    #[must_use]
    pub const fn as_option(&self) -> Option<&OptionContract> {
        match self {
            Self::Option(contract) => Some(contract),
            _ => None,
        }
    }

    /// Canonical identifier, e.g. `BTC-SPOT`, `BTC-PERP`, `BTC-20261231-55000-C`.
    #[must_use]
    pub fn id(&self) -> InstrumentId {
        match self {
            Self::Spot { underlying } => InstrumentId::new(format!("{underlying}-SPOT")),
            Self::Perpetual { underlying } => InstrumentId::new(format!("{underlying}-PERP")),
            Self::Option(c) => InstrumentId::new(format!(
                "{}-{}-{}-{}",
                c.underlying,
                c.expiry.format("%Y%m%d"),
                c.strike.normalize(),
                c.right.code()
            )),
        }
    }
}
