//! hydro-core: stable foundation for the hydraulic network simulator.
//!
//! Contains:
//! - units (uom SI types + constructors)
//! - numeric (Real + tolerances + float helpers)
//! - ids (stable compact IDs for graph/model objects)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{HydroError, HydroResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
