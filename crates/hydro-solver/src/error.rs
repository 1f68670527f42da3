//! Error types for equation assembly and Newton solving.

use hydro_core::HydroError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SolverError {
    #[error("Problem setup error: {what}")]
    ProblemSetup { what: String },

    /// Newton iteration exhausted `max_iterations`, or backtracking could not
    /// find a step that reduced the residual.
    #[error("Newton iteration diverged: {what}")]
    NewtonDiverged { what: String },

    /// The Jacobian's LU factorization failed at the current iterate.
    #[error("Linear solve failed on a singular Jacobian: {what}")]
    LinearSolverSingular { what: String },

    #[error("Numeric error: {what}")]
    Numeric { what: String },

    #[error("Constitutive error: {0}")]
    Constitutive(#[from] hydro_constitutive::ConstitutiveError),

    #[error("Graph error: {0}")]
    Graph(#[from] hydro_graph::GraphError),

    #[error("Network error: {0}")]
    Network(#[from] hydro_network::NetworkError),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl From<SolverError> for HydroError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::ProblemSetup { .. } => HydroError::InvalidArg {
                what: "problem setup",
            },
            SolverError::NewtonDiverged { .. } => HydroError::Invariant {
                what: "newton iteration diverged",
            },
            SolverError::LinearSolverSingular { .. } => HydroError::Invariant {
                what: "jacobian singular",
            },
            SolverError::Numeric { .. } => HydroError::InvalidArg { what: "numeric" },
            SolverError::Constitutive(_) => HydroError::InvalidArg {
                what: "constitutive law",
            },
            SolverError::Graph(_) => HydroError::InvalidArg { what: "graph" },
            SolverError::Network(_) => HydroError::InvalidArg { what: "network" },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SolverError::NewtonDiverged {
            what: "max iterations".into(),
        };
        assert!(err.to_string().contains("max iterations"));
    }
}
