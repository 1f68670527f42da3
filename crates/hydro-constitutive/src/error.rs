//! Error types for constitutive-law evaluation.

use hydro_core::HydroError;
use thiserror::Error;

/// Errors that can occur while evaluating a constitutive relation.
#[derive(Error, Debug, Clone)]
pub enum ConstitutiveError {
    #[error("Non-physical value: {what}")]
    NonPhysical { what: &'static str },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Pump curve has unsupported point count: {count} (expected 1 or 3)")]
    BadPumpCurve { count: usize },
}

pub type ConstitutiveResult<T> = Result<T, ConstitutiveError>;

impl From<ConstitutiveError> for HydroError {
    fn from(e: ConstitutiveError) -> Self {
        match e {
            ConstitutiveError::NonPhysical { what } => HydroError::InvalidArg { what },
            ConstitutiveError::InvalidArg { what } => HydroError::InvalidArg { what },
            ConstitutiveError::BadPumpCurve { .. } => HydroError::InvalidArg {
                what: "pump curve must have 1 or 3 points",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ConstitutiveError::NonPhysical { what: "pressure" };
        assert!(err.to_string().contains("pressure"));
    }

    #[test]
    fn error_conversion() {
        let err = ConstitutiveError::InvalidArg { what: "test" };
        let hydro_err: HydroError = err.into();
        assert!(matches!(hydro_err, HydroError::InvalidArg { .. }));
    }
}
