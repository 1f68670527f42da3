//! Error types for the hydro-app service layer.

/// Application error type unifying every backend crate's error into one
/// enum the CLI can match on to choose an exit code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("input error: {0}")]
    Input(#[from] hydro_inp::InpError),

    #[error("network model error: {0}")]
    Network(#[from] hydro_network::NetworkError),

    #[error("solver error: {0}")]
    Solver(#[from] hydro_solver::SolverError),

    #[error("reconciliation error: {0}")]
    Reconcile(#[from] hydro_reconciler::ReconcileError),

    #[error("eps run error: {0}")]
    Eps(#[from] hydro_eps::EpsError),

    #[error("results error: {0}")]
    Results(#[from] hydro_results::ResultsError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for hydro-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Exit code the CLI surfaces for this error: 1 for input/parse errors,
    /// 2 for a per-step convergence failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Eps(hydro_eps::EpsError::InvalidArg { .. }) => 1,
            AppError::Eps(_) | AppError::Reconcile(_) | AppError::Solver(_) => 2,
            _ => 1,
        }
    }
}
