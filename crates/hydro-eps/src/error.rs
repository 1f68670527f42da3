//! Error types for the extended-period simulation driver.

use thiserror::Error;

use crate::EpsRecord;

#[derive(Error, Debug, Clone)]
pub enum EpsError {
    #[error("invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// A per-timestep reconciliation failure. Carries every reporting step
    /// accepted before the failure so a caller can still persist a partial
    /// result rather than discarding the whole run.
    #[error("reconciliation failed at step {step}: {source}")]
    Step {
        step: usize,
        #[source]
        source: hydro_reconciler::ReconcileError,
        partial: EpsRecord,
    },
}

pub type EpsResult<T> = Result<T, EpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_arg_message() {
        let err = EpsError::InvalidArg { what: "dt_s must be positive" };
        assert!(err.to_string().contains("dt_s"));
    }
}
