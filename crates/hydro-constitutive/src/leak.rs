//! Orifice leak law: leak demand as a smoothed function of pressure
//! (head above elevation) at the leak node.

use crate::common::{check_finite, hermite_cubic, ValueDeriv};
use crate::error::ConstitutiveResult;
use hydro_core::units::constants::G;

/// Pressure below which the orifice law is replaced by a near-zero-slope
/// line, and above which the exact square-root law applies.
pub const DELTA_LEAK: f64 = 1e-4;
/// Slope of the linear region for `p <= 0`.
pub const EPS: f64 = 1e-11;

fn orifice_law(p: f64, cd: f64, area: f64) -> ConstitutiveResult<ValueDeriv> {
    let k = cd * area * (2.0 * G).sqrt();
    let value = k * p.sqrt();
    let deriv = k * 0.5 / p.sqrt();
    check_finite(value, "leak orifice demand")?;
    check_finite(deriv, "leak orifice derivative")?;
    Ok(ValueDeriv::new(value, deriv))
}

/// Evaluate leak demand `d` and `dd/dp` at pressure `p`, for an orifice
/// with discharge coefficient `cd` and area `area` (m^2).
pub fn leak_demand(p: f64, cd: f64, area: f64) -> ConstitutiveResult<ValueDeriv> {
    if p <= 0.0 {
        return Ok(ValueDeriv::new(EPS * p, EPS));
    }
    if p >= DELTA_LEAK {
        return orifice_law(p, cd, area);
    }

    let at_cutoff = orifice_law(DELTA_LEAK, cd, area)?;
    Ok(hermite_cubic(
        p,
        0.0,
        0.0,
        EPS,
        DELTA_LEAK,
        at_cutoff.value,
        at_cutoff.deriv,
    ))
}
