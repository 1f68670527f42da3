use crate::HydroError;

/// Floating point type used throughout system
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, HydroError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(HydroError::NonFinite { what, value: v })
    }
}

/// Hydraulic switching tolerances shared by the discrete-state reconciler
/// and the testable-property suite.
pub mod htol {
    use super::Real;

    /// Head tolerance (m) governing valve-mode and check-valve transitions.
    pub const H_TOL: Real = 1.5e-4;
    /// Flow tolerance (m^3/s) governing check-valve and backflow closures.
    pub const Q_TOL: Real = 2.8e-5;
    /// Flow below which a pump is treated as delivering zero flow.
    pub const PUMP_ZERO_FLOW: Real = 2.8e-11;
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn nearly_equal_reflexive(v in -1e6_f64..1e6_f64) {
            prop_assert!(nearly_equal(v, v, Tolerances::default()));
        }

        #[test]
        fn nearly_equal_symmetric(a in -1e6_f64..1e6_f64, b in -1e6_f64..1e6_f64) {
            let tol = Tolerances::default();
            prop_assert_eq!(nearly_equal(a, b, tol), nearly_equal(b, a, tol));
        }

        #[test]
        fn ensure_finite_passes_through_finite_values(v in -1e9_f64..1e9_f64) {
            prop_assert_eq!(ensure_finite(v, "prop").unwrap(), v);
        }
    }
}
