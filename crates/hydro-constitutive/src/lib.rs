//! hydro-constitutive: piecewise-smoothed nonlinear relations used by the
//! hydraulic equation assembler.
//!
//! - Hazen-Williams pipe headloss
//! - Pump head curves (1-point, 3-point), low-flow patched
//! - Pressure-driven demand (PDD)
//! - Orifice leak law
//!
//! Every function here returns a value *and* its derivative, since the
//! assembler builds an analytic Jacobian rather than a finite-difference
//! one; all are C1 on the domain the solver actually evaluates.
//!
//! # Example
//!
//! ```
//! use hydro_constitutive::hazen_williams;
//!
//! let r = hazen_williams::resistance(130.0, 0.3, 500.0);
//! let hl = hazen_williams::headloss(0.05, r).unwrap();
//! assert!(hl.value > 0.0);
//! ```

pub mod common;
pub mod error;
pub mod hazen_williams;
pub mod leak;
pub mod pdd;
pub mod pump_curve;

pub use common::ValueDeriv;
pub use error::{ConstitutiveError, ConstitutiveResult};
