//! Result data types: one manifest per run, one timeseries record per
//! accepted reporting step.

use serde::{Deserialize, Serialize};

pub type RunId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DemandMode {
    Dd,
    Pdd,
}

impl std::fmt::Display for DemandMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DemandMode::Dd => write!(f, "DD"),
            DemandMode::Pdd => write!(f, "PDD"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub input_path: String,
    pub timestamp: String,
    pub dt_s: f64,
    pub duration_s: f64,
    pub mode: DemandMode,
    pub solver_version: String,
    /// `true` if the run was cut short by a per-step `SolverError`; the
    /// persisted timeseries then holds every step accepted before the
    /// failure, not the full requested duration.
    pub partial: bool,
}

/// `name`/`kind` tag mirrored from `hydro_network::NodeKindTag` as a plain
/// string so this crate doesn't need `hydro-network` as a dependency just
/// to report which variant a row came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeValueSnapshot {
    pub name: String,
    pub kind: String,
    pub head_m: f64,
    pub pressure_m: f64,
    pub required_demand_cms: f64,
    pub actual_demand_cms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkValueSnapshot {
    pub name: String,
    pub kind: String,
    pub flow_cms: f64,
    /// Velocity in m/s; 0 for everything but pipes.
    pub velocity_m_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeseriesRecord {
    pub time_s: f64,
    pub node_values: Vec<NodeValueSnapshot>,
    pub link_values: Vec<LinkValueSnapshot>,
}

/// The full set of reporting-step records from one run, with column-view
/// accessors in place of a dataframe panel.
#[derive(Debug, Clone, Default)]
pub struct RunResults {
    pub records: Vec<TimeseriesRecord>,
}

impl RunResults {
    pub fn new(records: Vec<TimeseriesRecord>) -> Self {
        Self { records }
    }

    /// `(t, NodeValueSnapshot)` pairs for one node across every reporting
    /// step it appears in, in time order.
    pub fn node_series<'a>(&'a self, name: &'a str) -> impl Iterator<Item = (f64, &'a NodeValueSnapshot)> + 'a {
        self.records.iter().filter_map(move |r| {
            r.node_values
                .iter()
                .find(|n| n.name == name)
                .map(|n| (r.time_s, n))
        })
    }

    /// `(t, LinkValueSnapshot)` pairs for one link across every reporting
    /// step it appears in, in time order.
    pub fn link_series<'a>(&'a self, name: &'a str) -> impl Iterator<Item = (f64, &'a LinkValueSnapshot)> + 'a {
        self.records.iter().filter_map(move |r| {
            r.link_values
                .iter()
                .find(|l| l.name == name)
                .map(|l| (r.time_s, l))
        })
    }
}
