use thiserror::Error;

pub type HydroResult<T> = Result<T, HydroError>;

/// Foundational error cases shared by every crate in the workspace.
///
/// Crate-specific errors (`hydro_graph::GraphError`, `hydro_solver::SolverError`, ...)
/// wrap `HydroError` for the cases that are genuinely cross-cutting (non-finite
/// numerics, bad indices, broken invariants) rather than re-deriving them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HydroError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Invariant violated: {what}")]
    Invariant { what: &'static str },
}
