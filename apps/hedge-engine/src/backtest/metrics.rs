//! Performance metrics over an equity curve.
//!
//! - Total return
//! - Maximum drawdown (peak-to-trough, positive fraction)
//! - Annualized Sharpe ratio (zero risk-free rate)

use rust_decimal::Decimal;

const TWO: Decimal = Decimal::TWO;
const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 12);
const RATIO_DP: u32 = 6;

/// Simple per-period returns of an equity curve.
#[must_use]
pub fn period_returns(equity: &[Decimal]) -> Vec<Decimal> {
    equity
        .windows(2)
        .filter(|w| !w[0].is_zero())
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Return from `initial` to `final_equity` as a fraction.
#[must_use]
pub fn total_return(initial: Decimal, final_equity: Decimal) -> Decimal {
    if initial.is_zero() {
        return Decimal::ZERO;
    }
    ((final_equity - initial) / initial).round_dp(RATIO_DP)
}

/// Largest peak-to-trough decline as a positive fraction (0.2 = 20%).
#[must_use]
pub fn max_drawdown(equity: &[Decimal]) -> Decimal {
    let mut peak = Decimal::MIN;
    let mut worst = Decimal::ZERO;
    for &value in equity {
        peak = peak.max(value);
        if peak > Decimal::ZERO {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst.round_dp(RATIO_DP)
}

/// Annualized Sharpe ratio of per-period returns.
///
/// `None` with fewer than two returns or zero dispersion.
#[must_use]
pub fn sharpe_ratio(returns: &[Decimal], periods_per_year: u32) -> Option<Decimal> {
    let avg = mean(returns)?;
    let std = std_dev(returns)?;
    if std.is_zero() {
        return None;
    }
    let annualizer = sqrt_decimal(Decimal::from(periods_per_year))?;
    Some((avg / std * annualizer).round_dp(4))
}

/// Arithmetic mean.
#[must_use]
pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().sum();
    Some(sum / Decimal::from(values.len()))
}

/// Sample standard deviation.
fn std_dev(values: &[Decimal]) -> Option<Decimal> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance_sum: Decimal = values.iter().map(|v| (*v - avg) * (*v - avg)).sum();
    sqrt_decimal(variance_sum / Decimal::from(values.len() - 1))
}

/// Square root by Newton's method.
fn sqrt_decimal(value: Decimal) -> Option<Decimal> {
    if value < Decimal::ZERO {
        return None;
    }
    if value.is_zero() {
        return Some(Decimal::ZERO);
    }

    let mut guess = if value > Decimal::ONE { value / TWO } else { Decimal::ONE };
    for _ in 0..100 {
        let next = (guess + value / guess) / TWO;
        if (next - guess).abs() < TOLERANCE {
            return Some(next);
        }
        guess = next;
    }
    Some(guess)
}
