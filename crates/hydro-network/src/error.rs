//! Network model errors.

use hydro_core::HydroError;
use thiserror::Error;

/// Errors raised while building or mutating a `NetworkModel`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("unknown node: {name}")]
    UnknownNode { name: String },

    #[error("unknown link: {name}")]
    UnknownLink { name: String },

    #[error("duplicate name: {name}")]
    DuplicateName { name: String },

    #[error("invalid pump curve: expected 1 or 3 points, got {count}")]
    BadCurveLength { count: usize },

    #[error("tank levels out of order for {name}: min={min} init={init} max={max}")]
    BadTankLevels {
        name: String,
        min: f64,
        init: f64,
        max: f64,
    },

    #[error("invariant violated: {what}")]
    Invariant { what: &'static str },
}

pub type NetworkResult<T> = Result<T, NetworkError>;

impl From<NetworkError> for HydroError {
    fn from(e: NetworkError) -> Self {
        HydroError::Invariant {
            what: Box::leak(e.to_string().into_boxed_str()),
        }
    }
}

impl From<hydro_graph::GraphError> for NetworkError {
    fn from(e: hydro_graph::GraphError) -> Self {
        NetworkError::Invariant {
            what: Box::leak(e.to_string().into_boxed_str()),
        }
    }
}

impl From<HydroError> for NetworkError {
    fn from(e: HydroError) -> Self {
        NetworkError::Invariant {
            what: Box::leak(e.to_string().into_boxed_str()),
        }
    }
}
