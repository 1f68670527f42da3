//! Input loading, validation, and network introspection.

use std::path::Path;

use hydro_network::{LinkKindTag, NetworkModel, NodeKindTag};

use crate::error::AppResult;

/// Summary of a parsed network, for a `validate`/`systems`-style listing.
#[derive(Debug, Clone)]
pub struct NetworkSummary {
    pub junction_count: usize,
    pub reservoir_count: usize,
    pub tank_count: usize,
    pub pipe_count: usize,
    pub pump_count: usize,
    pub valve_count: usize,
    pub duration_s: Option<f64>,
    pub hydraulic_timestep_s: Option<f64>,
    pub warnings: Vec<String>,
}

/// Parse an INP file, returning the built network plus any parse warnings.
pub fn load_inp(path: &Path) -> AppResult<hydro_inp::ParsedNetwork> {
    let parsed = hydro_inp::parse_file(path)?;
    Ok(parsed)
}

/// Summarize a parsed network's node/link counts and run-time defaults,
/// the same counts a CLI `validate` subcommand prints before running.
pub fn summarize(parsed: &hydro_inp::ParsedNetwork) -> NetworkSummary {
    let net: &NetworkModel = &parsed.network;
    NetworkSummary {
        junction_count: net.nodes_of_kind(NodeKindTag::Junction).count(),
        reservoir_count: net.nodes_of_kind(NodeKindTag::Reservoir).count(),
        tank_count: net.nodes_of_kind(NodeKindTag::Tank).count(),
        pipe_count: net.links_of_kind(LinkKindTag::Pipe).count(),
        pump_count: net.links_of_kind(LinkKindTag::Pump).count(),
        valve_count: net.links_of_kind(LinkKindTag::Valve).count(),
        duration_s: parsed.duration_s,
        hydraulic_timestep_s: parsed.hydraulic_timestep_s,
        warnings: parsed.warnings.clone(),
    }
}
