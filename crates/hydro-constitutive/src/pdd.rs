//! Pressure-driven demand (PDD): delivered demand as a smoothed function of
//! head above elevation.

use crate::common::{check_finite, hermite_cubic, ValueDeriv};
use crate::error::ConstitutiveResult;

/// Shoulder half-width, as a fraction of `(PF - P0)`, outward from each
/// threshold, beyond which demand is pinned to the asymptotic linear lines.
pub const DELTA: f64 = 0.1;
/// Slope of the two outer linear asymptotes (keeps the Jacobian nonsingular
/// far outside the operating pressure range).
pub const EPS: f64 = 1e-11;

/// Fraction of `(PF - P0)` used to keep the inner shoulder endpoint away
/// from the sqrt singularity at `p = P0` (and symmetrically at `p = PF`).
/// The central `sqrt` formula has unbounded slope exactly at its own
/// endpoints, so the shoulder's inner match point is offset slightly
/// inward; `Phi(P0)` and `Phi(PF)` then hold only approximately.
const SHOULDER_REGULARIZATION: f64 = 1e-3;

fn central_sqrt(p: f64, d_required: f64, p0: f64, span: f64) -> ConstitutiveResult<ValueDeriv> {
    let frac = crate::common::clamp((p - p0) / span, 1e-300, f64::MAX);
    let sqrt_frac = frac.sqrt();
    let value = d_required * sqrt_frac;
    let deriv = d_required / (2.0 * sqrt_frac * span);
    check_finite(value, "PDD central-region demand")?;
    check_finite(deriv, "PDD central-region derivative")?;
    Ok(ValueDeriv::new(value, deriv))
}

/// Evaluate delivered demand `d` and `dd/dp` for head-above-elevation `p`,
/// given the required demand and the node's (P0, PF) thresholds.
///
/// Degenerate case `PF <= P0` collapses to a step function at `PF` (the
/// junction behaves like plain demand-driven once its pressure band is
/// empty).
pub fn delivered_demand(p: f64, d_required: f64, p0: f64, pf: f64) -> ConstitutiveResult<ValueDeriv> {
    if d_required == 0.0 {
        return Ok(ValueDeriv::new(0.0, 0.0));
    }

    let span = pf - p0;
    if span <= 0.0 {
        return Ok(if p >= pf {
            ValueDeriv::new(d_required + EPS * p, EPS)
        } else {
            ValueDeriv::new(EPS * p, EPS)
        });
    }

    let p_low = p0 - DELTA * span;
    let p_high = pf + DELTA * span;
    let w = (SHOULDER_REGULARIZATION * span).min(span * 0.25);
    let inner_lo = p0 + w;
    let inner_hi = pf - w;

    Ok(if p <= p_low {
        ValueDeriv::new(EPS * p, EPS)
    } else if p < inner_lo {
        let inner = central_sqrt(inner_lo, d_required, p0, span)?;
        hermite_cubic(p, p_low, EPS * p_low, EPS, inner_lo, inner.value, inner.deriv)
    } else if p <= inner_hi {
        central_sqrt(p, d_required, p0, span)?
    } else if p < p_high {
        let inner = central_sqrt(inner_hi, d_required, p0, span)?;
        let outer_value = d_required + EPS * p_high;
        hermite_cubic(p, inner_hi, inner.value, inner.deriv, p_high, outer_value, EPS)
    } else {
        ValueDeriv::new(d_required + EPS * p, EPS)
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn delivered_demand_never_exceeds_required(
            p in -20.0_f64..60.0_f64,
            d_required in 0.01_f64..10.0_f64,
            p0 in 0.0_f64..20.0_f64,
            span in 1.0_f64..40.0_f64,
        ) {
            let pf = p0 + span;
            let r = delivered_demand(p, d_required, p0, pf).unwrap();
            prop_assert!(r.value <= d_required + 1e-6);
            prop_assert!(r.deriv.is_finite());
        }

        #[test]
        fn delivered_demand_monotone_over_small_step(
            p in -20.0_f64..60.0_f64,
            d_required in 0.01_f64..10.0_f64,
            p0 in 0.0_f64..20.0_f64,
            span in 1.0_f64..40.0_f64,
        ) {
            let pf = p0 + span;
            let step = span * 1e-3;
            let lo = delivered_demand(p, d_required, p0, pf).unwrap();
            let hi = delivered_demand(p + step, d_required, p0, pf).unwrap();
            prop_assert!(hi.value >= lo.value - 1e-9);
        }
    }
}
