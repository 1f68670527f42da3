//! hydro-inp: EPANET INP text format ingestion.
//!
//! Turns an `.inp` file into a built `hydro_network::NetworkModel`: a
//! forward scan splits the file into per-section line lists, `[OPTIONS]`
//! is read first to fix the unit system, `[PATTERNS]`/`[CURVES]` are fully
//! collected before any node or link references them, and links are parsed
//! last so node names have already resolved to `NodeId`s.

pub mod error;
pub mod parser;
pub mod units;

pub use error::{InpError, InpResult};
pub use parser::{parse_file, parse_str, ParsedNetwork, PddOptions};
pub use units::{FlowUnit, UnitConverter};
