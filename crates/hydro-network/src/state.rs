//! Per-timestep discrete simulation state.
//!
//! `SimState` is the thing `hydro-reconciler` mutates across trials within a
//! step, and carries forward between steps. It never holds head/flow
//! values directly -- those live in the solver's solution vector -- only the
//! discrete bookkeeping (which link is closed and why, which valves are in
//! which regime, which leaks are active).

use std::collections::{HashMap, HashSet};

use hydro_core::{LinkId, NodeId};

/// A PRV/PSV/PBV's discrete operating regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveMode {
    Open,
    Closed,
    /// Actively regulating to its setting.
    Active,
}

/// Discrete state carried across an EPS run, one `SimState` per step.
#[derive(Debug, Clone, Default)]
pub struct SimState {
    pub t_s: f64,

    /// Previous step's converged tank heads, used for t>0 tank mass-balance
    /// rows (an explicit-integration approximation, not an implicit solve).
    pub last_tank_head_m: HashMap<NodeId, f64>,
    /// Previous step's converged link flows.
    pub last_link_flow_cms: HashMap<LinkId, f64>,

    /// Links forced closed by time/conditional controls this step.
    pub closed_by_controls: HashSet<LinkId>,
    /// Pumps closed by an outage schedule.
    pub closed_by_outage: HashSet<LinkId>,
    /// Links closed because a tank they feed has hit its cutoff level.
    pub closed_by_tank_cutoff: HashSet<LinkId>,
    /// Links closed this trial because flow reversed into a reservoir/tank
    /// through a check-valve-equipped link.
    pub closed_by_backflow: HashSet<LinkId>,
    /// Pumps tripped off because suction-side head fell below the pump.
    pub closed_by_low_suction: HashSet<LinkId>,

    /// Check-valve pipes currently closed (flow direction violation).
    pub check_valve_closed: HashSet<LinkId>,

    /// Current regime of every PRV/PSV/PBV valve link.
    pub valve_mode: HashMap<LinkId, ValveMode>,

    /// Leak nodes currently delivering (vs. held at zero because e.g. their
    /// host pipe is closed).
    pub active_leaks: HashSet<NodeId>,
    pub inactive_leaks: HashSet<NodeId>,
}

impl SimState {
    pub fn new(t_s: f64) -> Self {
        Self {
            t_s,
            ..Default::default()
        }
    }

    /// A link is closed this trial if any of the independent closure sets
    /// names it.
    pub fn is_closed(&self, link: LinkId) -> bool {
        self.closed_by_controls.contains(&link)
            || self.closed_by_outage.contains(&link)
            || self.closed_by_tank_cutoff.contains(&link)
            || self.closed_by_backflow.contains(&link)
            || self.closed_by_low_suction.contains(&link)
            || self.check_valve_closed.contains(&link)
    }

    /// Start the next step's state from this one: carry forward flows/heads,
    /// drop per-trial closures that are re-derived every step (controls,
    /// backflow, tank cutoff), keep persistent ones (outage schedule is
    /// re-applied by the reconciler from config, so it's also dropped here).
    pub fn advance(&self, next_t_s: f64) -> Self {
        Self {
            t_s: next_t_s,
            last_tank_head_m: self.last_tank_head_m.clone(),
            last_link_flow_cms: self.last_link_flow_cms.clone(),
            valve_mode: self.valve_mode.clone(),
            ..Default::default()
        }
    }
}
