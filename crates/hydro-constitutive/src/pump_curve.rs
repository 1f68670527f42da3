//! Pump head curve: 1-point and 3-point characteristic curves, with a
//! low-flow patch that keeps the curve (and its derivative) bounded at q=0.

use crate::common::{check_finite, hermite_cubic, ValueDeriv};
use crate::error::{ConstitutiveError, ConstitutiveResult};

/// Coefficients of the fitted curve `H(q) = A - B * q^C`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpCurveCoeffs {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

/// Flow below which the curve is patched with a near-zero-slope line,
/// joined to the fitted curve by a cubic Hermite bridge.
pub const LOW_FLOW_CUTOFF: f64 = 1e-8;
/// Slope of the low-flow patch line.
pub const LOW_FLOW_SLOPE: f64 = -1e-11;

/// Fit a single-point pump curve: `H(q) = (4/3) H1 - (1/3)(H1/Q1^2) q^2`.
///
/// Expressed in `A - B q^C` form this is `A = (4/3) H1`, `B = (1/3)(H1/Q1^2)`,
/// `C = 2`.
pub fn fit_one_point(q1: f64, h1: f64) -> ConstitutiveResult<PumpCurveCoeffs> {
    if q1 <= 0.0 || h1 <= 0.0 {
        return Err(ConstitutiveError::InvalidArg {
            what: "one-point pump curve requires positive Q1 and H1",
        });
    }
    Ok(PumpCurveCoeffs {
        a: (4.0 / 3.0) * h1,
        b: (1.0 / 3.0) * (h1 / (q1 * q1)),
        c: 2.0,
    })
}

/// Fit a three-point pump curve `(Q1,H1), (Q2,H2), (Q3,H3)` to `H = A - B q^C`.
///
/// The first point must carry the largest head. When `Q1 == 0`
/// (the common EPANET convention: first point is shutoff head) the closed
/// form is used directly. Otherwise the 3x3 nonlinear system is solved for
/// `C` by Newton iteration on the single transcendental equation relating
/// the three points, then `A`/`B` are recovered algebraically.
pub fn fit_three_point(
    q1: f64,
    h1: f64,
    q2: f64,
    h2: f64,
    q3: f64,
    h3: f64,
) -> ConstitutiveResult<PumpCurveCoeffs> {
    if !(h1 >= h2 && h2 >= h3) {
        return Err(ConstitutiveError::InvalidArg {
            what: "three-point pump curve requires H1 to be the largest head",
        });
    }
    if q2 <= 0.0 || q3 <= 0.0 || q2 >= q3 {
        return Err(ConstitutiveError::InvalidArg {
            what: "three-point pump curve requires 0 < Q2 < Q3",
        });
    }

    if q1 == 0.0 {
        let c = ((h1 - h2) / (h1 - h3)).ln() / (q2 / q3).ln();
        let b = (h1 - h2) / q2.powf(c);
        return Ok(PumpCurveCoeffs { a: h1, b, c });
    }

    // General case: solve f(C) = 0 for the exponent, then back out A, B.
    let ratio = (h1 - h2) / (h1 - h3);
    let f = |c: f64| (q1.powf(c) - q2.powf(c)) - ratio * (q1.powf(c) - q3.powf(c));
    let fprime = |c: f64| {
        let t1 = q1.powf(c) * q1.ln();
        let t2 = q2.powf(c) * q2.ln();
        let t3 = q3.powf(c) * q3.ln();
        (t1 - t2) - ratio * (t1 - t3)
    };

    let mut c = 2.0;
    for _ in 0..100 {
        let fc = f(c);
        if fc.abs() < 1e-12 {
            break;
        }
        let dc = fprime(c);
        if dc.abs() < 1e-14 {
            break;
        }
        c -= fc / dc;
    }

    let b = (h1 - h2) / (q1.powf(c) - q2.powf(c));
    let a = h1 + b * q1.powf(c);
    Ok(PumpCurveCoeffs { a, b, c })
}

/// Evaluate the raw (unpatched) fitted curve and its derivative at `q >= 0`.
fn eval_raw(coeffs: PumpCurveCoeffs, q: f64) -> ValueDeriv {
    if q <= 0.0 {
        return ValueDeriv::new(coeffs.a, 0.0);
    }
    let value = coeffs.a - coeffs.b * q.powf(coeffs.c);
    let deriv = -coeffs.b * coeffs.c * q.powf(coeffs.c - 1.0);
    ValueDeriv::new(value, deriv)
}

/// Evaluate the modified pump curve (low-flow patched, cubic-bridged) and
/// its derivative at any `q`. Errors if a degenerate fit (e.g. `C` large
/// enough to overflow `q.powf(C)` away from the patched region) drives the
/// result non-finite.
pub fn modified_curve(coeffs: PumpCurveCoeffs, q: f64) -> ConstitutiveResult<ValueDeriv> {
    let r = if q > LOW_FLOW_CUTOFF {
        eval_raw(coeffs, q)
    } else if q <= 0.0 {
        // Low-flow line: passes through the shutoff head at q=0 with a tiny
        // negative slope, extended for reverse flow too.
        let h_at_zero = coeffs.a;
        ValueDeriv::new(h_at_zero + LOW_FLOW_SLOPE * q, LOW_FLOW_SLOPE)
    } else {
        // Cubic bridge on [0, LOW_FLOW_CUTOFF] matching the line at q=0 and
        // the fitted curve at q=LOW_FLOW_CUTOFF.
        let h_at_zero = coeffs.a;
        let at_cutoff = eval_raw(coeffs, LOW_FLOW_CUTOFF);
        hermite_cubic(
            q,
            0.0,
            h_at_zero,
            LOW_FLOW_SLOPE,
            LOW_FLOW_CUTOFF,
            at_cutoff.value,
            at_cutoff.deriv,
        )
    };
    check_finite(r.value, "pump curve head value")?;
    check_finite(r.deriv, "pump curve head derivative")?;
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_point_curve_matches_known_coefficients() {
        let c = fit_one_point(0.1, 50.0).unwrap();
        assert!((c.a - 66.667).abs() < 1e-3);
        assert!((c.b - 16666.67).abs() < 1e-2);
        assert!((c.c - 2.0).abs() < 1e-12);
    }

    #[test]
    fn three_point_q1_zero_reproduces_points() {
        let c = fit_three_point(0.0, 100.0, 0.05, 80.0, 0.1, 40.0).unwrap();
        let h2 = c.a - c.b * 0.05f64.powf(c.c);
        let h3 = c.a - c.b * 0.1f64.powf(c.c);
        assert!((h2 - 80.0).abs() < 1e-6);
        assert!((h3 - 40.0).abs() < 1e-6);
    }

    #[test]
    fn modified_curve_bounded_derivative_at_zero() {
        let c = fit_one_point(0.1, 50.0).unwrap();
        let r = modified_curve(c, 0.0).unwrap();
        assert!(r.deriv.is_finite());
        assert!(r.deriv.abs() < 1.0);
    }

    #[test]
    fn modified_curve_continuous_at_cutoff() {
        let c = fit_one_point(0.1, 50.0).unwrap();
        let below = modified_curve(c, LOW_FLOW_CUTOFF - 1e-12).unwrap();
        let above = modified_curve(c, LOW_FLOW_CUTOFF + 1e-12).unwrap();
        assert!((below.value - above.value).abs() < 1e-6);
    }
}
