//! Simulated execution for backtests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::error::ExecutionError;
use super::fees::fee_for;
use super::order::{ExecutionQuote, Fill, Order};
use super::slippage::{apply_slippage, slippage_bps};
use crate::config::ExecutionConfig;

/// Decimal places kept for simulated quantities and prices.
const QTY_DP: u32 = 8;

/// Fills orders against a quote with slippage, fees and optional partial
/// fills drawn from a seeded RNG.
#[derive(Debug, Clone)]
pub struct ExecutionSimulator {
    config: ExecutionConfig,
    rng: StdRng,
}

impl ExecutionSimulator {
    /// Simulator seeded from `config.seed`.
    #[must_use]
    pub fn new(config: ExecutionConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Largest absolute quantity fillable against `liquidity`.
    #[must_use]
    pub fn max_fillable(&self, liquidity: Decimal) -> Decimal {
        (self.config.max_fillable_fraction * liquidity.max(Decimal::ZERO))
            .round_dp_with_strategy(QTY_DP, rust_decimal::RoundingStrategy::ToZero)
    }

    /// Execute `order` against `quote`.
    ///
    /// # Errors
    ///
    /// - `InvalidOrder` for a zero quantity or negative mark
    /// - `InsufficientLiquidity` when the order exceeds the fillable size;
    ///   the error carries that size so the caller can retry smaller
    pub fn execute(
        &mut self,
        order: &Order,
        quote: &ExecutionQuote,
    ) -> Result<Fill, ExecutionError> {
        if order.quantity.is_zero() {
            return Err(ExecutionError::invalid("quantity must be non-zero"));
        }
        if quote.mark.is_sign_negative() {
            return Err(ExecutionError::invalid(format!(
                "mark must be non-negative, got {}",
                quote.mark
            )));
        }

        let requested = order.quantity.abs();
        let max_fillable = self.max_fillable(quote.liquidity);
        if requested > max_fillable {
            warn!(
                instrument = %order.instrument.id(),
                %requested,
                %max_fillable,
                "Insufficient liquidity"
            );
            return Err(ExecutionError::InsufficientLiquidity {
                requested,
                max_fillable,
            });
        }

        let quantity = self.draw_fill_quantity(order.quantity);
        let side = order.side();
        let bps = slippage_bps(&self.config.slippage, quantity, quote.liquidity);
        let price = apply_slippage(quote.mark, side, bps)
            .max(Decimal::ZERO)
            .round_dp(QTY_DP);
        let fee = fee_for(
            &self.config,
            order.instrument.kind(),
            quantity,
            price,
            quote.underlying_price,
        );

        let fill = Fill {
            instrument: order.instrument.clone(),
            quantity,
            price,
            fee,
            timestamp: quote.timestamp,
            strategy_id: order.strategy_id.clone(),
            requested_quantity: order.quantity,
        };
        debug!(
            instrument = %fill.instrument.id(),
            %side,
            quantity = %fill.quantity,
            price = %fill.price,
            fee = %fill.fee,
            partial = fill.is_partial(),
            "Simulated fill"
        );
        Ok(fill)
    }

    fn draw_fill_quantity(&mut self, quantity: Decimal) -> Decimal {
        let partial = &self.config.partial_fills;
        if !partial.enabled || !self.rng.random_bool(partial.probability) {
            return quantity;
        }
        let draw = Decimal::try_from(self.rng.random::<f64>()).unwrap_or(Decimal::ONE);
        let fraction = partial.min_fill_fraction
            + (partial.max_fill_fraction - partial.min_fill_fraction) * draw;
        let filled = (quantity * fraction).round_dp(QTY_DP);
        if filled.is_zero() { quantity } else { filled }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::ErrorKind;
    use crate::config::{FeeSchedule, PartialFillConfig, SlippageModel};
    use crate::pricing::Instrument;

    fn quote() -> ExecutionQuote {
        ExecutionQuote {
            mark: dec!(50000),
            underlying_price: dec!(50000),
            liquidity: dec!(100),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn fixed_config() -> ExecutionConfig {
        ExecutionConfig {
            slippage: SlippageModel::FixedBps { bps: dec!(5) },
            fees: FeeSchedule::Fixed { bps: dec!(6) },
            ..ExecutionConfig::default()
        }
    }

    #[test]
    fn test_sell_fill_pays_slippage_and_fee() {
        let mut sim = ExecutionSimulator::new(fixed_config());
        let order = Order::new(Instrument::perpetual("BTC"), dec!(-0.7));
        let fill = sim.execute(&order, &quote()).unwrap();
        assert_eq!(fill.quantity, dec!(-0.7));
        assert_eq!(fill.price, dec!(49975));
        // 0.7 × 49,975 × 6 bps
        assert_eq!(fill.fee, dec!(20.9895));
        assert!(!fill.is_partial());
    }

    #[test]
    fn test_insufficient_liquidity_reports_max() {
        let mut sim = ExecutionSimulator::new(fixed_config());
        let order = Order::new(Instrument::perpetual("BTC"), dec!(15));
        let Err(err) = sim.execute(&order, &quote()) else {
            panic!("15 > 10% of 100 must fail");
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientLiquidity);
        assert_eq!(
            err,
            ExecutionError::InsufficientLiquidity {
                requested: dec!(15),
                max_fillable: dec!(10),
            }
        );
        // retry at the reported size succeeds
        assert!(sim.execute(&order.with_quantity(dec!(10)), &quote()).is_ok());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut sim = ExecutionSimulator::new(fixed_config());
        let order = Order::new(Instrument::perpetual("BTC"), Decimal::ZERO);
        assert!(matches!(
            sim.execute(&order, &quote()),
            Err(ExecutionError::InvalidOrder { .. })
        ));
    }

    #[test]
    fn test_partial_fills_are_seeded() {
        let config = ExecutionConfig {
            partial_fills: PartialFillConfig {
                enabled: true,
                probability: 1.0,
                ..PartialFillConfig::default()
            },
            ..fixed_config()
        };
        let order = Order::new(Instrument::perpetual("BTC"), dec!(1));
        let mut a = ExecutionSimulator::new(config.clone());
        let mut b = ExecutionSimulator::new(config);
        for _ in 0..5 {
            let fa = a.execute(&order, &quote()).unwrap();
            let fb = b.execute(&order, &quote()).unwrap();
            assert_eq!(fa, fb);
            assert!(fa.is_partial());
            assert!(fa.quantity >= dec!(0.3) && fa.quantity <= dec!(0.9));
        }
    }
}
