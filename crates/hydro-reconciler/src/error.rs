//! Error types for the per-timestep discrete-state trial loop.

use hydro_core::HydroError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ReconcileError {
    /// The trial loop didn't reach a fixed point within `max_trials`.
    #[error("discrete state failed to stabilize within {trials} trials at t={t_s}s")]
    MaxTrialsExceeded { trials: usize, t_s: f64 },

    #[error("solver error during reconciliation: {0}")]
    Solver(#[from] hydro_solver::SolverError),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

impl From<ReconcileError> for HydroError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::MaxTrialsExceeded { .. } => HydroError::Invariant {
                what: "discrete state did not converge",
            },
            ReconcileError::Solver(_) => HydroError::Invariant {
                what: "solver error",
            },
        }
    }
}
