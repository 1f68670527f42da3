//! Shared application service layer for the hydraulic network simulator.
//!
//! This crate provides a unified interface for CLI frontends, centralizing
//! business logic for input loading, run execution/caching, result
//! querying, and service-level metrics.

pub mod error;
pub mod metrics;
pub mod progress;
pub mod project_service;
pub mod query;
pub mod run_service;

// Re-export key types for convenience
pub use error::{AppError, AppResult};
pub use metrics::{compute_service_metrics, ServiceMetrics};
pub use progress::{RunProgressEvent, RunStage};
pub use project_service::{load_inp, summarize, NetworkSummary};
pub use query::{
    extract_link_series, extract_node_series, get_run_summary, list_link_names, list_node_names,
    RunSummary,
};
pub use run_service::{
    list_runs, load_run, run, RunOptions, RunRequest, RunResponse, RunTimingSummary,
};
