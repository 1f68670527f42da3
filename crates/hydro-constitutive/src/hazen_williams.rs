//! Smoothed Hazen-Williams pipe headloss.
//!
//! Headloss for a pipe of resistance `R` is `R * sign(q) * h(|q|)`, where `h`
//! is a piecewise function: linear near zero flow, the exact power law away
//! from it, and a fixed cubic bridging the two so the whole thing is C1.

use crate::common::{check_finite, ValueDeriv};
use crate::error::ConstitutiveResult;

/// Lower breakpoint (m^3/s) of the smoothing transition.
pub const Q1: f64 = 3.49347323944e-3;
/// Upper breakpoint (m^3/s) of the smoothing transition.
pub const Q2: f64 = 5.49347323944e-3;

const TRANS_C0: f64 = 2.45944613543e-6;
const TRANS_C1: f64 = 0.0138413824671;
const TRANS_C2: f64 = -2.80374270811;
const TRANS_C3: f64 = 430.125623753;

/// Hazen-Williams pipe resistance, SI units (head in meters, flow in m^3/s).
///
/// `R = 10.667 * C^-1.852 * D^-4.871 * L`
pub fn resistance(hw_coefficient: f64, diameter_m: f64, length_m: f64) -> f64 {
    10.667 * hw_coefficient.powf(-1.852) * diameter_m.powf(-4.871) * length_m
}

/// Evaluate the smoothed shape function `h(|q|)` and its derivative, for
/// `q_abs >= 0`.
fn h_of_abs_q(q_abs: f64) -> ValueDeriv {
    if q_abs < Q1 {
        ValueDeriv::new(0.01 * q_abs, 0.01)
    } else if q_abs > Q2 {
        ValueDeriv::new(q_abs.powf(1.852), 1.852 * q_abs.powf(0.852))
    } else {
        let value = TRANS_C0
            + TRANS_C1 * q_abs
            + TRANS_C2 * q_abs * q_abs
            + TRANS_C3 * q_abs * q_abs * q_abs;
        let deriv = TRANS_C1 + 2.0 * TRANS_C2 * q_abs + 3.0 * TRANS_C3 * q_abs * q_abs;
        ValueDeriv::new(value, deriv)
    }
}

/// Headloss `R * sign(q) * h(|q|)` and its derivative with respect to `q`.
///
/// The derivative is `R * h'(|q|)` uniformly in `q` (the sign and the
/// absolute value cancel algebraically), which keeps the Jacobian entry
/// well-defined and continuous through `q = 0`. Errors if a degenerate
/// resistance (e.g. zero diameter) drives the result non-finite.
pub fn headloss(q: f64, r: f64) -> ConstitutiveResult<ValueDeriv> {
    let h = h_of_abs_q(q.abs());
    let value = r * q.signum() * h.value;
    let deriv = r * h.deriv;
    check_finite(value, "hazen_williams headloss value")?;
    check_finite(deriv, "hazen_williams headloss derivative")?;
    Ok(ValueDeriv::new(value, deriv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuous_at_breakpoints() {
        let below = h_of_abs_q(Q1 - 1e-12);
        let above = h_of_abs_q(Q1 + 1e-12);
        assert!((below.value - above.value).abs() < 1e-9);
        assert!((below.deriv - above.deriv).abs() < 1e-6);

        let below2 = h_of_abs_q(Q2 - 1e-12);
        let above2 = h_of_abs_q(Q2 + 1e-12);
        assert!((below2.value - above2.value).abs() < 1e-9);
        assert!((below2.deriv - above2.deriv).abs() < 1e-6);
    }

    #[test]
    fn headloss_sign_matches_flow() {
        let r = 100.0;
        let pos = headloss(0.01, r).unwrap();
        let neg = headloss(-0.01, r).unwrap();
        assert!(pos.value > 0.0);
        assert!(neg.value < 0.0);
        assert!((pos.value + neg.value).abs() < 1e-9);
    }

    #[test]
    fn resistance_matches_formula() {
        let r = resistance(130.0, 0.3, 500.0);
        let expected = 10.667 * 130f64.powf(-1.852) * 0.3f64.powf(-4.871) * 500.0;
        assert!((r - expected).abs() < 1e-9);
    }

    #[test]
    fn headloss_zero_at_zero_flow() {
        let r = headloss(0.0, 50.0).unwrap();
        assert_eq!(r.value, 0.0);
    }
}
