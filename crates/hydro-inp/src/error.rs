//! Parse errors for EPANET INP input files.

use thiserror::Error;

/// A fatal parse/build error, surfaced with the 1-based input line that
/// triggered it. Input and model-invariant failures are folded into one
/// enum since this crate has no downstream recovery path of its own --
/// every case here is fatal at ingestion time.
#[derive(Error, Debug, Clone)]
pub enum InpError {
    #[error("{path}:{line}: unknown section header {header:?}")]
    UnknownSection {
        path: String,
        line: usize,
        header: String,
    },

    #[error("{path}:{line}: malformed {what}: {text:?}")]
    Malformed {
        path: String,
        line: usize,
        what: &'static str,
        text: String,
    },

    #[error("{path}:{line}: unknown reference to {what} {name:?}")]
    UnknownReference {
        path: String,
        line: usize,
        what: &'static str,
        name: String,
    },

    #[error("{path}: missing required [OPTIONS] UNITS entry")]
    MissingUnits { path: String },

    #[error("{path}:{line}: unrecognized flow units {units:?}")]
    UnknownUnits {
        path: String,
        line: usize,
        units: String,
    },

    #[error("network model error: {0}")]
    Network(#[from] hydro_network::NetworkError),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type InpResult<T> = Result<T, InpError>;
