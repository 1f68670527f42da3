//! Tunables for the trial loop, plus the outage/leak schedules that
//! overlay a scenario onto a static network (these configure a run rather
//! than being part of the network model itself).

use hydro_core::{LinkId, NodeId};
use hydro_solver::NewtonConfig;

/// A pump forced into `closed_by_outage` for `[start_s, end_s]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpOutage {
    pub link: LinkId,
    pub start_s: f64,
    pub end_s: f64,
}

/// A leak node active for `[start_s, end_s)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeakSchedule {
    pub node: NodeId,
    pub start_s: f64,
    pub end_s: f64,
}

/// Reconciler configuration: discrete-state trial limits and switching
/// tolerances.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Maximum discrete-state trials per timestep before a fatal error.
    pub max_trials: usize,
    /// Head tolerance, meters.
    pub h_tol: f64,
    /// Flow tolerance, m^3/s.
    pub q_tol: f64,
    /// Whether a low-suction-tripped pump is allowed to reopen once suction
    /// head recovers (Open Question resolution: default `true`, matching
    /// EPANET's own re-examination of tripped pumps every step).
    pub low_suction_reopen: bool,
    pub newton: NewtonConfig,
    pub pump_outages: Vec<PumpOutage>,
    pub leak_schedules: Vec<LeakSchedule>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_trials: 10,
            h_tol: hydro_core::numeric::htol::H_TOL,
            q_tol: hydro_core::numeric::htol::Q_TOL,
            low_suction_reopen: true,
            newton: NewtonConfig::default(),
            pump_outages: Vec::new(),
            leak_schedules: Vec::new(),
        }
    }
}
