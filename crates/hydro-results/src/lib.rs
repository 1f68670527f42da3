//! hydro-results: run manifests and reporting-step timeseries storage.
//!
//! A `hash` module for content-addressed run IDs, a `store` module for
//! on-disk persistence, and a `types` module for the serialized node/link
//! reporting-table shapes.

pub mod hash;
pub mod store;
pub mod types;

pub use hash::compute_run_id;
pub use store::RunStore;
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("invalid path: {message}")]
    InvalidPath { message: String },
}
