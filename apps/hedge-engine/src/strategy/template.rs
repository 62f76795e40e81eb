//! Strategy templates.
//!
//! A template describes a structure in terms of strikes, expiries and size.
//! Each variant has its own validation rule; the shared rules (positive
//! strikes, future expiries, common expiry unless multi-expiry) apply to the
//! legs it expands into.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::error::StrategyError;
use super::types::StrategyKind;
use crate::pricing::OptionRight;

/// One leg as described by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegSpec {
    /// Call or put.
    pub right: OptionRight,
    /// Strike price.
    pub strike: Decimal,
    /// Expiry.
    pub expiry: DateTime<Utc>,
    /// Signed quantity (positive long, negative short).
    pub quantity: Decimal,
}

/// Supported structures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum StrategyTemplate {
    /// Long put.
    ProtectivePut {
        /// Put strike.
        strike: Decimal,
        /// Expiry.
        expiry: DateTime<Utc>,
        /// Contracts.
        quantity: Decimal,
    },
    /// Short call.
    CoveredCall {
        /// Call strike.
        strike: Decimal,
        /// Expiry.
        expiry: DateTime<Utc>,
        /// Contracts.
        quantity: Decimal,
    },
    /// Long put below spot, short call above spot.
    Collar {
        /// Put strike, below spot.
        put_strike: Decimal,
        /// Call strike, above spot.
        call_strike: Decimal,
        /// Expiry.
        expiry: DateTime<Utc>,
        /// Contracts.
        quantity: Decimal,
    },
    /// Call and put at one strike. Negative quantity sells the straddle.
    Straddle {
        /// Common strike.
        strike: Decimal,
        /// Expiry.
        expiry: DateTime<Utc>,
        /// Signed contracts.
        quantity: Decimal,
    },
    /// Put below call. Negative quantity sells the strangle.
    Strangle {
        /// Put strike.
        put_strike: Decimal,
        /// Call strike.
        call_strike: Decimal,
        /// Expiry.
        expiry: DateTime<Utc>,
        /// Signed contracts.
        quantity: Decimal,
    },
    /// Long lower call, short upper call.
    BullCallSpread {
        /// Long call strike.
        lower_strike: Decimal,
        /// Short call strike.
        upper_strike: Decimal,
        /// Expiry.
        expiry: DateTime<Utc>,
        /// Contracts.
        quantity: Decimal,
    },
    /// Long upper put, short lower put.
    BearPutSpread {
        /// Short put strike.
        lower_strike: Decimal,
        /// Long put strike.
        upper_strike: Decimal,
        /// Expiry.
        expiry: DateTime<Utc>,
        /// Contracts.
        quantity: Decimal,
    },
    /// Short put spread plus short call spread.
    IronCondor {
        /// Long put wing.
        long_put_strike: Decimal,
        /// Short put.
        short_put_strike: Decimal,
        /// Short call.
        short_call_strike: Decimal,
        /// Long call wing.
        long_call_strike: Decimal,
        /// Expiry.
        expiry: DateTime<Utc>,
        /// Contracts.
        quantity: Decimal,
    },
    /// Short near expiry, long far expiry, same strike.
    CalendarSpread {
        /// Common strike.
        strike: Decimal,
        /// Call or put.
        right: OptionRight,
        /// Short leg expiry.
        near_expiry: DateTime<Utc>,
        /// Long leg expiry.
        far_expiry: DateTime<Utc>,
        /// Contracts.
        quantity: Decimal,
    },
    /// Arbitrary legs.
    Custom {
        /// Legs.
        legs: Vec<LegSpec>,
        /// Allow legs with different expiries.
        #[serde(default)]
        multi_expiry: bool,
    },
}

impl StrategyTemplate {
    /// Structure kind.
    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Self::ProtectivePut { .. } => StrategyKind::ProtectivePut,
            Self::CoveredCall { .. } => StrategyKind::CoveredCall,
            Self::Collar { .. } => StrategyKind::Collar,
            Self::Straddle { .. } => StrategyKind::Straddle,
            Self::Strangle { .. } => StrategyKind::Strangle,
            Self::BullCallSpread { .. } => StrategyKind::BullCallSpread,
            Self::BearPutSpread { .. } => StrategyKind::BearPutSpread,
            Self::IronCondor { .. } => StrategyKind::IronCondor,
            Self::CalendarSpread { .. } => StrategyKind::CalendarSpread,
            Self::Custom { .. } => StrategyKind::Custom,
        }
    }

    /// Whether legs may carry different expiries.
    #[must_use]
    pub const fn is_multi_expiry(&self) -> bool {
        match self {
            Self::CalendarSpread { .. } => true,
            Self::Custom { multi_expiry, .. } => *multi_expiry,
            _ => false,
        }
    }

    /// Expand into legs.
    #[must_use]
    pub fn legs(&self) -> Vec<LegSpec> {
        let leg = |right, strike: &Decimal, expiry: &DateTime<Utc>, quantity| LegSpec {
            right,
            strike: *strike,
            expiry: *expiry,
            quantity,
        };
        match self {
            Self::ProtectivePut {
                strike,
                expiry,
                quantity,
            } => vec![leg(OptionRight::Put, strike, expiry, *quantity)],
            Self::CoveredCall {
                strike,
                expiry,
                quantity,
            } => vec![leg(OptionRight::Call, strike, expiry, -*quantity)],
            Self::Collar {
                put_strike,
                call_strike,
                expiry,
                quantity,
            } => vec![
                leg(OptionRight::Put, put_strike, expiry, *quantity),
                leg(OptionRight::Call, call_strike, expiry, -*quantity),
            ],
            Self::Straddle {
                strike,
                expiry,
                quantity,
            } => vec![
                leg(OptionRight::Call, strike, expiry, *quantity),
                leg(OptionRight::Put, strike, expiry, *quantity),
            ],
            Self::Strangle {
                put_strike,
                call_strike,
                expiry,
                quantity,
            } => vec![
                leg(OptionRight::Put, put_strike, expiry, *quantity),
                leg(OptionRight::Call, call_strike, expiry, *quantity),
            ],
            Self::BullCallSpread {
                lower_strike,
                upper_strike,
                expiry,
                quantity,
            } => vec![
                leg(OptionRight::Call, lower_strike, expiry, *quantity),
                leg(OptionRight::Call, upper_strike, expiry, -*quantity),
            ],
            Self::BearPutSpread {
                lower_strike,
                upper_strike,
                expiry,
                quantity,
            } => vec![
                leg(OptionRight::Put, upper_strike, expiry, *quantity),
                leg(OptionRight::Put, lower_strike, expiry, -*quantity),
            ],
            Self::IronCondor {
                long_put_strike,
                short_put_strike,
                short_call_strike,
                long_call_strike,
                expiry,
                quantity,
            } => vec![
                leg(OptionRight::Put, long_put_strike, expiry, *quantity),
                leg(OptionRight::Put, short_put_strike, expiry, -*quantity),
                leg(OptionRight::Call, short_call_strike, expiry, -*quantity),
                leg(OptionRight::Call, long_call_strike, expiry, *quantity),
            ],
            Self::CalendarSpread {
                strike,
                right,
                near_expiry,
                far_expiry,
                quantity,
            } => vec![
                leg(*right, strike, near_expiry, -*quantity),
                leg(*right, strike, far_expiry, *quantity),
            ],
            Self::Custom { legs, .. } => legs.clone(),
        }
    }

    /// Validate against the current spot and time. No side effects.
    pub fn validate(&self, spot: Decimal, now: DateTime<Utc>) -> Result<(), StrategyError> {
        let kind = self.kind();
        let fail = |message: String| Err(StrategyError::invalid(kind, message));

        match self {
            Self::Collar {
                put_strike,
                call_strike,
                ..
            } => {
                if !(*put_strike < spot && spot < *call_strike) {
                    return fail(format!(
                        "collar requires put strike < spot < call strike, got {put_strike} / {spot} / {call_strike}"
                    ));
                }
            }
            Self::Strangle {
                put_strike,
                call_strike,
                ..
            } => {
                if put_strike >= call_strike {
                    return fail(format!(
                        "strangle put strike {put_strike} must be below call strike {call_strike}"
                    ));
                }
            }
            Self::BullCallSpread {
                lower_strike,
                upper_strike,
                ..
            }
            | Self::BearPutSpread {
                lower_strike,
                upper_strike,
                ..
            } => {
                if lower_strike >= upper_strike {
                    return fail(format!(
                        "lower strike {lower_strike} must be below upper strike {upper_strike}"
                    ));
                }
            }
            Self::IronCondor {
                long_put_strike,
                short_put_strike,
                short_call_strike,
                long_call_strike,
                ..
            } => {
                let ordered = long_put_strike < short_put_strike
                    && short_put_strike < short_call_strike
                    && short_call_strike < long_call_strike;
                if !ordered {
                    return fail(format!(
                        "iron condor strikes must be strictly increasing, got {long_put_strike} / {short_put_strike} / {short_call_strike} / {long_call_strike}"
                    ));
                }
            }
            Self::CalendarSpread {
                near_expiry,
                far_expiry,
                ..
            } => {
                if near_expiry >= far_expiry {
                    return fail(format!(
                        "calendar near expiry {near_expiry} must precede far expiry {far_expiry}"
                    ));
                }
            }
            Self::Custom { legs, .. } => {
                if legs.is_empty() {
                    return fail("custom strategy needs at least one leg".to_string());
                }
            }
            _ => {}
        }

        self.validate_quantity()?;
        self.validate_legs(now)
    }

    fn validate_quantity(&self) -> Result<(), StrategyError> {
        let quantity = match self {
            Self::ProtectivePut { quantity, .. }
            | Self::CoveredCall { quantity, .. }
            | Self::Collar { quantity, .. }
            | Self::BullCallSpread { quantity, .. }
            | Self::BearPutSpread { quantity, .. }
            | Self::IronCondor { quantity, .. }
            | Self::CalendarSpread { quantity, .. } => *quantity,
            Self::Straddle { quantity, .. } | Self::Strangle { quantity, .. } => quantity.abs(),
            Self::Custom { .. } => return Ok(()),
        };
        if quantity <= Decimal::ZERO {
            return Err(StrategyError::invalid(
                self.kind(),
                format!("quantity must be positive, got {quantity}"),
            ));
        }
        Ok(())
    }

    fn validate_legs(&self, now: DateTime<Utc>) -> Result<(), StrategyError> {
        let kind = self.kind();
        let legs = self.legs();
        let mut seen = BTreeSet::new();

        for leg in &legs {
            if leg.strike <= Decimal::ZERO {
                return Err(StrategyError::invalid(
                    kind,
                    format!("strike must be positive, got {}", leg.strike),
                ));
            }
            if leg.expiry <= now {
                return Err(StrategyError::invalid(
                    kind,
                    format!("expiry {} is not in the future", leg.expiry),
                ));
            }
            if leg.quantity.is_zero() {
                return Err(StrategyError::invalid(kind, "leg quantity must be non-zero"));
            }
            if !seen.insert((leg.right, leg.strike.normalize(), leg.expiry)) {
                return Err(StrategyError::invalid(
                    kind,
                    format!("duplicate leg {:?} {} {}", leg.right, leg.strike, leg.expiry),
                ));
            }
        }

        if !self.is_multi_expiry() {
            let expiries: BTreeSet<_> = legs.iter().map(|leg| leg.expiry).collect();
            if expiries.len() > 1 {
                return Err(StrategyError::invalid(
                    kind,
                    "legs must share one expiry unless the strategy is multi-expiry",
                ));
            }
        }
        Ok(())
    }

    /// Same structure moved forward in time with strikes rescaled.
    ///
    /// Every expiry moves by `shift`; every strike is multiplied by
    /// `strike_scale` and rounded to a multiple of `strike_step`.
    #[must_use]
    pub fn rolled(&self, shift: Duration, strike_scale: Decimal, strike_step: Decimal) -> Self {
        let strike = |k: &Decimal| -> Decimal {
            let scaled = *k * strike_scale;
            if strike_step <= Decimal::ZERO {
                return scaled;
            }
            (scaled / strike_step).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                * strike_step
        };
        let at = |e: &DateTime<Utc>| *e + shift;

        match self {
            Self::ProtectivePut {
                strike: k,
                expiry,
                quantity,
            } => Self::ProtectivePut {
                strike: strike(k),
                expiry: at(expiry),
                quantity: *quantity,
            },
            Self::CoveredCall {
                strike: k,
                expiry,
                quantity,
            } => Self::CoveredCall {
                strike: strike(k),
                expiry: at(expiry),
                quantity: *quantity,
            },
            Self::Collar {
                put_strike,
                call_strike,
                expiry,
                quantity,
            } => Self::Collar {
                put_strike: strike(put_strike),
                call_strike: strike(call_strike),
                expiry: at(expiry),
                quantity: *quantity,
            },
            Self::Straddle {
                strike: k,
                expiry,
                quantity,
            } => Self::Straddle {
                strike: strike(k),
                expiry: at(expiry),
                quantity: *quantity,
            },
            Self::Strangle {
                put_strike,
                call_strike,
                expiry,
                quantity,
            } => Self::Strangle {
                put_strike: strike(put_strike),
                call_strike: strike(call_strike),
                expiry: at(expiry),
                quantity: *quantity,
            },
            Self::BullCallSpread {
                lower_strike,
                upper_strike,
                expiry,
                quantity,
            } => Self::BullCallSpread {
                lower_strike: strike(lower_strike),
                upper_strike: strike(upper_strike),
                expiry: at(expiry),
                quantity: *quantity,
            },
            Self::BearPutSpread {
                lower_strike,
                upper_strike,
                expiry,
                quantity,
            } => Self::BearPutSpread {
                lower_strike: strike(lower_strike),
                upper_strike: strike(upper_strike),
                expiry: at(expiry),
                quantity: *quantity,
            },
            Self::IronCondor {
                long_put_strike,
                short_put_strike,
                short_call_strike,
                long_call_strike,
                expiry,
                quantity,
            } => Self::IronCondor {
                long_put_strike: strike(long_put_strike),
                short_put_strike: strike(short_put_strike),
                short_call_strike: strike(short_call_strike),
                long_call_strike: strike(long_call_strike),
                expiry: at(expiry),
                quantity: *quantity,
            },
            Self::CalendarSpread {
                strike: k,
                right,
                near_expiry,
                far_expiry,
                quantity,
            } => Self::CalendarSpread {
                strike: strike(k),
                right: *right,
                near_expiry: at(near_expiry),
                far_expiry: at(far_expiry),
                quantity: *quantity,
            },
            Self::Custom { legs, multi_expiry } => Self::Custom {
                legs: legs
                    .iter()
                    .map(|leg| LegSpec {
                        strike: strike(&leg.strike),
                        expiry: at(&leg.expiry),
                        ..leg.clone()
                    })
                    .collect(),
                multi_expiry: *multi_expiry,
            },
        }
    }
}
