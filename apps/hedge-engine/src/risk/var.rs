//! Parametric Value-at-Risk.
//!
//! Delta-normal VaR with an optional gamma term:
//!
//! ```text
//! σ_h     = σ · sqrt(horizon_days / 365)
//! VaR_Δ   = z · |Δ · S| · σ_h
//! gamma   = -½ · Γ · (z · S · σ_h)²          (additive)
//! VaR_ΔΓ  = z · sqrt((Δ·S·σ_h)² + ½·(Γ·S²·σ_h²)²)   (multiplicative)
//! ```
//!
//! VaR is reported as a non-negative loss.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::RiskError;
use crate::config::{GammaMode, RiskConfig};
use crate::greeks::Greeks;
use crate::pricing::{to_decimal, to_f64};

const DAYS_PER_YEAR: f64 = 365.0;

// Acklam's rational approximation of the inverse normal CDF.
const A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_690e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
const B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
const C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
const D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];
const P_LOW: f64 = 0.024_25;

/// Standard normal quantile for `confidence` (0.95 → 1.645).
///
/// # Errors
///
/// Returns `InvalidInput` unless `0 < confidence < 1`.
pub fn z_score(confidence: f64) -> Result<f64, RiskError> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(RiskError::invalid(format!(
            "confidence must be in (0, 1), got {confidence}"
        )));
    }
    let p = confidence;
    let z = if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        tail(q)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -tail(q)
    };
    Ok(z)
}

fn tail(q: f64) -> f64 {
    (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
        / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
}

/// VaR components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarBreakdown {
    /// Delta-only VaR.
    pub delta_var: Decimal,
    /// Signed change the gamma term made to `delta_var`.
    pub gamma_adjustment: Decimal,
    /// Reported VaR, floored at zero.
    pub total: Decimal,
}

/// Parametric VaR of `greeks` at `spot` with annualized `volatility`.
///
/// # Errors
///
/// Returns `InvalidInput` for a bad confidence, horizon or volatility.
pub fn parametric_var(
    greeks: &Greeks,
    spot: Decimal,
    volatility: f64,
    config: &RiskConfig,
) -> Result<VarBreakdown, RiskError> {
    if !volatility.is_finite() || volatility < 0.0 {
        return Err(RiskError::invalid(format!(
            "volatility must be finite and non-negative, got {volatility}"
        )));
    }
    if !config.var_horizon_days.is_finite() || config.var_horizon_days <= 0.0 {
        return Err(RiskError::invalid("horizon must be positive"));
    }
    let z = z_score(config.var_confidence)?;
    let s = to_f64(spot);
    let sigma_h = volatility * (config.var_horizon_days / DAYS_PER_YEAR).sqrt();
    let delta = to_f64(greeks.delta);
    let gamma = to_f64(greeks.gamma);

    let delta_var = z * (delta * s).abs() * sigma_h;
    let total = match config.gamma_mode {
        GammaMode::None => delta_var,
        GammaMode::Additive => {
            let move_size = z * s * sigma_h;
            delta_var - 0.5 * gamma * move_size * move_size
        }
        GammaMode::Multiplicative => {
            let linear = delta * s * sigma_h;
            let convex = gamma * s * s * sigma_h * sigma_h;
            z * (linear * linear + 0.5 * convex * convex).sqrt()
        }
    }
    .max(0.0);

    let delta_var = to_decimal(delta_var);
    let total = to_decimal(total);
    Ok(VarBreakdown {
        delta_var,
        gamma_adjustment: total - delta_var,
        total,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use test_case::test_case;

    use super::*;

    fn config(mode: GammaMode) -> RiskConfig {
        RiskConfig {
            gamma_mode: mode,
            ..RiskConfig::default()
        }
    }

    #[test_case(0.95, 1.644_853_6 ; "ninety_five")]
    #[test_case(0.99, 2.326_347_9 ; "ninety_nine")]
    #[test_case(0.5, 0.0 ; "median")]
    #[test_case(0.01, -2.326_347_9 ; "lower_tail")]
    fn test_z_score(confidence: f64, expected: f64) {
        let z = z_score(confidence).unwrap();
        assert!((z - expected).abs() < 1e-6, "z({confidence}) = {z}");
    }

    #[test_case(0.0 ; "zero")]
    #[test_case(1.0 ; "one")]
    #[test_case(f64::NAN ; "nan")]
    fn test_z_score_rejects(confidence: f64) {
        assert!(z_score(confidence).is_err());
    }

    #[test]
    fn test_delta_only_var() {
        // 1 BTC at 50,000, 60% vol, 1 day: 1.645 * 50,000 * 0.6 / sqrt(365)
        let greeks = Greeks::linear(dec!(1));
        let var = parametric_var(&greeks, dec!(50000), 0.6, &config(GammaMode::None)).unwrap();
        let expected = 1.644_853_6 * 50_000.0 * 0.6 / 365.0_f64.sqrt();
        assert!((to_f64(var.total) - expected).abs() < 0.01);
        assert_eq!(var.gamma_adjustment, Decimal::ZERO);
    }

    #[test]
    fn test_additive_long_gamma_reduces_var() {
        let greeks = Greeks::new(dec!(0.5), dec!(0.00002), dec!(0), dec!(0), dec!(0));
        let plain = parametric_var(&greeks, dec!(50000), 0.6, &config(GammaMode::None)).unwrap();
        let adj = parametric_var(&greeks, dec!(50000), 0.6, &config(GammaMode::Additive)).unwrap();
        assert!(adj.total < plain.total);
        assert!(adj.gamma_adjustment < Decimal::ZERO);
    }

    #[test]
    fn test_additive_short_gamma_increases_var() {
        let greeks = Greeks::new(dec!(0), dec!(-0.00002), dec!(0), dec!(0), dec!(0));
        let var = parametric_var(&greeks, dec!(50000), 0.6, &config(GammaMode::Additive)).unwrap();
        assert_eq!(var.delta_var, Decimal::ZERO);
        assert!(var.total > Decimal::ZERO);
    }

    #[test]
    fn test_var_floors_at_zero() {
        let greeks = Greeks::new(dec!(0), dec!(0.001), dec!(0), dec!(0), dec!(0));
        let var = parametric_var(&greeks, dec!(50000), 0.6, &config(GammaMode::Additive)).unwrap();
        assert_eq!(var.total, Decimal::ZERO);
    }

    #[test]
    fn test_multiplicative_never_below_delta_var() {
        let greeks = Greeks::new(dec!(0.5), dec!(0.00002), dec!(0), dec!(0), dec!(0));
        let var =
            parametric_var(&greeks, dec!(50000), 0.6, &config(GammaMode::Multiplicative)).unwrap();
        assert!(var.total >= var.delta_var);
    }
}
