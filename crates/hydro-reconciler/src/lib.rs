//! Per-timestep discrete-state trial loop (C6).
//!
//! Each timestep the network's discrete configuration (which links are
//! closed, which valves are regulating) is a fixed point: the continuous
//! solution depends on the configuration, and the configuration depends on
//! the continuous solution. This crate finds that fixed point by repeatedly
//! assembling and solving (`hydro-solver`) and then re-deriving the
//! configuration from the new solution, the same functional `update(state,
//! ...) -> new_state` shape as a feedback controller, generalized from one
//! control loop to the handful of independent closed-set/valve-mode
//! transitions this crate tracks.

pub mod config;
pub mod error;

use std::collections::{HashMap, HashSet};

use hydro_core::{LinkId, NodeId};
use hydro_network::{
    Comparator, LinkKind, NetworkModel, NodeKind, NodeKindTag, PipeStatus, PumpMode, SimState,
    TimeAction, ValveKind, ValveMode,
};
use hydro_solver::{DemandMode, HydraulicProblem, HydraulicSolution};
use nalgebra::DVector;
use tracing::info;

pub use config::{LeakSchedule, PumpOutage, ReconcilerConfig};
pub use error::{ReconcileError, ReconcileResult};

/// The accepted outcome of one timestep's trial loop.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub state: SimState,
    pub solution: HydraulicSolution,
    pub trials: usize,
}

/// Snapshot of the discrete configuration, compared between trials to
/// detect a fixed point.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DiscreteSnapshot {
    closed_by_controls: HashSet<LinkId>,
    closed_by_outage: HashSet<LinkId>,
    closed_by_tank_cutoff: HashSet<LinkId>,
    closed_by_backflow: HashSet<LinkId>,
    closed_by_low_suction: HashSet<LinkId>,
    check_valve_closed: HashSet<LinkId>,
    valve_mode: Vec<(LinkId, ValveMode)>,
    active_leaks: HashSet<NodeId>,
}

impl DiscreteSnapshot {
    fn of(state: &SimState) -> Self {
        let mut valve_mode: Vec<(LinkId, ValveMode)> = state.valve_mode.iter().map(|(&k, &v)| (k, v)).collect();
        valve_mode.sort_by_key(|(link, _)| link.index());
        Self {
            closed_by_controls: state.closed_by_controls.clone(),
            closed_by_outage: state.closed_by_outage.clone(),
            closed_by_tank_cutoff: state.closed_by_tank_cutoff.clone(),
            closed_by_backflow: state.closed_by_backflow.clone(),
            closed_by_low_suction: state.closed_by_low_suction.clone(),
            check_valve_closed: state.check_valve_closed.clone(),
            valve_mode,
            active_leaks: state.active_leaks.clone(),
        }
    }
}

fn signed_flow_sum_prev(net: &NetworkModel, state: &SimState, node: NodeId) -> f64 {
    let mut value = 0.0;
    for port_id in net.graph().node_ports(node) {
        let Some(port) = net.graph().port(*port_id) else {
            continue;
        };
        let q = state.last_link_flow_cms.get(&port.link).copied().unwrap_or(0.0);
        match port.kind {
            hydro_graph::PortKind::To => value += q,
            hydro_graph::PortKind::From => value -= q,
        }
    }
    value
}

fn latest_time_controls(net: &NetworkModel, t_s: f64) -> HashMap<LinkId, TimeAction> {
    let mut latest: HashMap<LinkId, (f64, TimeAction)> = HashMap::new();
    for tc in &net.controls.time_controls {
        if tc.at_s <= t_s + 1e-9 {
            latest
                .entry(tc.link)
                .and_modify(|cur| {
                    if tc.at_s >= cur.0 {
                        *cur = (tc.at_s, tc.action);
                    }
                })
                .or_insert((tc.at_s, tc.action));
        }
    }
    latest.into_iter().map(|(link, (_, action))| (link, action)).collect()
}

fn apply_time_controls(net: &NetworkModel, state: &mut SimState, t_s: f64) {
    for (link, action) in latest_time_controls(net, t_s) {
        match action {
            TimeAction::Open => {
                state.closed_by_controls.remove(&link);
            }
            TimeAction::Closed => {
                state.closed_by_controls.insert(link);
            }
            TimeAction::Active => {
                state.closed_by_controls.remove(&link);
                state.valve_mode.insert(link, ValveMode::Active);
            }
        }
    }
}

/// Evaluate conditional controls using heads from the last converged step.
fn apply_conditional_controls(net: &NetworkModel, state: &mut SimState, prev_heads: &HashMap<NodeId, f64>) {
    for cc in &net.controls.conditional_controls {
        let Some(&head) = prev_heads.get(&cc.watch_node) else {
            continue;
        };
        let crossed = match cc.comparator {
            Comparator::Above => head > cc.threshold_head_m,
            Comparator::Below => head < cc.threshold_head_m,
        };
        if !crossed {
            continue;
        }
        match cc.action {
            TimeAction::Open => {
                state.closed_by_controls.remove(&cc.link);
            }
            TimeAction::Closed => {
                state.closed_by_controls.insert(cc.link);
            }
            TimeAction::Active => {
                state.closed_by_controls.remove(&cc.link);
                state.valve_mode.insert(cc.link, ValveMode::Active);
            }
        }
    }
}

fn apply_pump_outages(config: &ReconcilerConfig, state: &mut SimState, t_s: f64) {
    for o in &config.pump_outages {
        if t_s >= o.start_s && t_s <= o.end_s {
            state.closed_by_outage.insert(o.link);
        } else {
            state.closed_by_outage.remove(&o.link);
        }
    }
}

fn apply_leak_schedules(config: &ReconcilerConfig, state: &mut SimState, t_s: f64) {
    for l in &config.leak_schedules {
        if t_s >= l.start_s && t_s < l.end_s {
            state.active_leaks.insert(l.node);
            state.inactive_leaks.remove(&l.node);
        } else {
            state.inactive_leaks.insert(l.node);
            state.active_leaks.remove(&l.node);
        }
    }
}

/// `true` if `link` should never be force-closed by tank cutoff even though
/// it's adjacent to the tank: a pump or check-valve pipe whose "to" (end)
/// node is the tank already only ever delivers flow into it.
fn skip_cutoff_closure(net: &NetworkModel, tank: NodeId, link: LinkId) -> bool {
    let to_is_tank = net.graph().link_to_node(link) == Some(tank);
    if !to_is_tank {
        return false;
    }
    match net.link_kind(link) {
        Some(LinkKind::Pump { .. }) => true,
        Some(LinkKind::Pipe {
            base_status: PipeStatus::Cv,
            ..
        }) => true,
        _ => false,
    }
}

fn apply_tank_cutoff_preclose(net: &NetworkModel, state: &mut SimState, dt_s: f64) {
    for tank in net.nodes_of_kind(NodeKindTag::Tank) {
        let Some(NodeKind::Tank {
            elevation_m,
            min_level_m,
            diameter_m,
            ..
        }) = net.node_kind(tank)
        else {
            continue;
        };
        let min_head = elevation_m + min_level_m;
        let current_head = *state
            .last_tank_head_m
            .get(&tank)
            .unwrap_or(&(elevation_m + min_level_m));
        let area = std::f64::consts::PI * diameter_m * diameter_m / 4.0;
        let predicted_head = current_head + dt_s * signed_flow_sum_prev(net, state, tank) / area;

        let adjacent = net.links_for(tank);
        if current_head >= min_head && predicted_head <= min_head {
            for link in &adjacent {
                if !skip_cutoff_closure(net, tank, *link) {
                    state.closed_by_tank_cutoff.insert(*link);
                }
            }
        } else if current_head <= min_head && predicted_head >= min_head {
            for link in &adjacent {
                state.closed_by_tank_cutoff.remove(link);
            }
        }
    }
}

fn apply_backflow_into_reservoir(net: &NetworkModel, state: &mut SimState, sol: &HydraulicSolution, q_tol: f64) {
    for node in net.nodes_of_kind(NodeKindTag::Reservoir) {
        let res_head = sol.head(node);
        for link in net.links_for(node) {
            let from = net.graph().link_from_node(link);
            let to = net.graph().link_to_node(link);
            let q = sol.flow(link);

            let (into_reservoir, other_head) = if to == Some(node) {
                (q > q_tol, from.map(|n| sol.head(n)))
            } else if from == Some(node) {
                (-q > q_tol, to.map(|n| sol.head(n)))
            } else {
                continue;
            };

            if into_reservoir {
                state.closed_by_backflow.insert(link);
            } else if let Some(other_head) = other_head {
                if res_head >= other_head {
                    state.closed_by_backflow.remove(&link);
                }
            }
        }
    }
}

fn apply_tank_cutoff_postsolve(net: &NetworkModel, state: &mut SimState, sol: &HydraulicSolution, h_tol: f64) {
    for tank in net.nodes_of_kind(NodeKindTag::Tank) {
        let Some(NodeKind::Tank {
            elevation_m,
            min_level_m,
            ..
        }) = net.node_kind(tank)
        else {
            continue;
        };
        let min_head = elevation_m + min_level_m;
        let tank_head = sol.head(tank);
        if tank_head > min_head + h_tol {
            continue;
        }
        for link in net.links_for(tank) {
            if skip_cutoff_closure(net, tank, link) {
                continue;
            }
            let from = net.graph().link_from_node(link);
            let to = net.graph().link_to_node(link);
            let other = if from == Some(tank) { to } else { from };
            let lets_water_in = other.map(|n| sol.head(n) > tank_head + h_tol).unwrap_or(false);
            if lets_water_in {
                state.closed_by_tank_cutoff.remove(&link);
            } else {
                state.closed_by_tank_cutoff.insert(link);
            }
        }
    }
}

fn apply_low_suction_trip(
    net: &NetworkModel,
    state: &mut SimState,
    sol: &HydraulicSolution,
    h_tol: f64,
    allow_reopen: bool,
) {
    for link in net.links_of_kind(hydro_network::LinkKindTag::Pump) {
        let Some(suction) = net.graph().link_from_node(link) else {
            continue;
        };
        let Some(kind) = net.node_kind(suction) else {
            continue;
        };
        if kind.is_reservoir() {
            continue;
        }
        let Some(elev) = kind.elevation_m() else {
            continue;
        };
        let suction_head = sol.head(suction);
        if suction_head <= elev + h_tol {
            state.closed_by_low_suction.insert(link);
        } else if allow_reopen && suction_head >= elev + 1.0 {
            state.closed_by_low_suction.remove(&link);
        }
    }
}

fn apply_check_valves(net: &NetworkModel, state: &mut SimState, sol: &HydraulicSolution, h_tol: f64, q_tol: f64) {
    for link in net.links_of_kind(hydro_network::LinkKindTag::Pipe) {
        let Some(LinkKind::Pipe {
            base_status: PipeStatus::Cv,
            ..
        }) = net.link_kind(link)
        else {
            continue;
        };
        let from = net.graph().link_from_node(link);
        let to = net.graph().link_to_node(link);
        let (h_from, h_to) = match (from, to) {
            (Some(f), Some(t)) => (sol.head(f), sol.head(t)),
            _ => continue,
        };
        let q = sol.flow(link);
        if h_to - h_from > h_tol || q < -q_tol {
            state.check_valve_closed.insert(link);
        } else {
            state.check_valve_closed.remove(&link);
        }
    }
}

fn apply_valve_mode_transitions(net: &NetworkModel, state: &mut SimState, sol: &HydraulicSolution, h_tol: f64, q_tol: f64) {
    for link in net.links_of_kind(hydro_network::LinkKindTag::Valve) {
        let Some(LinkKind::Valve {
            kind: ValveKind::Prv,
            setting,
            ..
        }) = net.link_kind(link)
        else {
            continue;
        };
        let Some(from) = net.graph().link_from_node(link) else {
            continue;
        };
        let Some(to) = net.graph().link_to_node(link) else {
            continue;
        };
        let elev_from = net.node_kind(from).and_then(|k| k.elevation_m()).unwrap_or(0.0);
        let h_sp = setting + elev_from;
        let h_from = sol.head(from);
        let h_to = sol.head(to);
        let q = sol.flow(link);

        let mode = state.valve_mode.entry(link).or_insert(ValveMode::Active);
        *mode = match mode {
            ValveMode::Active => {
                if q < -q_tol {
                    ValveMode::Closed
                } else if h_from < h_sp - h_tol {
                    ValveMode::Open
                } else {
                    ValveMode::Active
                }
            }
            ValveMode::Open => {
                if q < -q_tol {
                    ValveMode::Closed
                } else if h_from > h_sp + h_tol {
                    ValveMode::Active
                } else {
                    ValveMode::Open
                }
            }
            ValveMode::Closed => {
                if h_from > h_to + h_tol && h_from < h_sp - h_tol {
                    ValveMode::Open
                } else if h_from > h_to + h_tol && h_to < h_sp - h_tol {
                    ValveMode::Active
                } else {
                    ValveMode::Closed
                }
            }
        };
    }
}

/// Run the C6 trial loop for one timestep, returning the accepted discrete
/// state and converged continuous solution.
///
/// `prev_heads` supplies the previous step's converged node heads for
/// conditional-control evaluation (empty at t=0). `prev_x` seeds the
/// Newton initial guess with the previous step's solution vector.
#[allow(clippy::too_many_arguments)]
pub fn reconcile_step(
    net: &NetworkModel,
    config: &ReconcilerConfig,
    prev_state: &SimState,
    prev_heads: &HashMap<NodeId, f64>,
    prev_x: Option<&DVector<f64>>,
    mode: DemandMode,
    dt_s: f64,
    t_s: f64,
    is_first_step: bool,
) -> ReconcileResult<StepOutcome> {
    let mut state = prev_state.advance(t_s);

    apply_time_controls(net, &mut state, t_s);
    apply_conditional_controls(net, &mut state, prev_heads);
    apply_pump_outages(config, &mut state, t_s);
    apply_leak_schedules(config, &mut state, t_s);
    apply_tank_cutoff_preclose(net, &mut state, dt_s);

    let mut last_x = prev_x.cloned();

    for trial in 1..=config.max_trials {
        let before = DiscreteSnapshot::of(&state);

        let problem = HydraulicProblem::new(net, mode, dt_s, t_s, is_first_step)?;
        let solution = hydro_solver::solve_step(&problem, &state, last_x.as_ref(), &config.newton)?;
        last_x = Some(solution.x.clone());

        apply_backflow_into_reservoir(net, &mut state, &solution, config.q_tol);
        apply_tank_cutoff_postsolve(net, &mut state, &solution, config.h_tol);
        apply_low_suction_trip(net, &mut state, &solution, config.h_tol, config.low_suction_reopen);
        apply_check_valves(net, &mut state, &solution, config.h_tol, config.q_tol);
        apply_valve_mode_transitions(net, &mut state, &solution, config.h_tol, config.q_tol);

        let after = DiscreteSnapshot::of(&state);
        if before == after {
            info!(t_s, trials = trial, "timestep accepted");
            for tank in net.nodes_of_kind(NodeKindTag::Tank) {
                state.last_tank_head_m.insert(tank, solution.head(tank));
            }
            for link in net.graph().links() {
                state.last_link_flow_cms.insert(link.id, solution.flow(link.id));
            }
            return Ok(StepOutcome {
                state,
                solution,
                trials: trial,
            });
        }
    }

    Err(ReconcileError::MaxTrialsExceeded {
        trials: config.max_trials,
        t_s,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use hydro_network::{LinkKind, NetworkBuilder, PipeStatus as PS, ValveKind};
    use proptest::prelude::*;

    fn series_demand_net(
        diam1: f64,
        diam2: f64,
        len1: f64,
        len2: f64,
        d1: f64,
        d2: f64,
    ) -> (NetworkModel, NodeId, NodeId, NodeId, LinkId, LinkId) {
        let mut b = NetworkBuilder::new();
        let r = b.add_reservoir("R1", 50.0, None);
        let j1 = b.add_junction("J1", 0.0, d1, None, 0.0, 20.0);
        let j2 = b.add_junction("J2", 0.0, d2, None, 0.0, 20.0);
        let pa = b.add_pipe("PA", r, j1, len1, diam1, 130.0, 0.0, PS::Open);
        let pb = b.add_pipe("PB", j1, j2, len2, diam2, 130.0, 0.0, PS::Open);
        let net = b.build().unwrap();
        (net, r, j1, j2, pa, pb)
    }

    fn signed_flow_sum_at(net: &NetworkModel, sol: &HydraulicSolution, node: NodeId) -> f64 {
        let mut value = 0.0;
        for link in net.links_for(node) {
            let q = sol.flow(link);
            if net.graph().link_to_node(link) == Some(node) {
                value += q;
            } else {
                value -= q;
            }
        }
        value
    }

    proptest! {
        /// Invariant 1: at every junction, the signed sum of link flows
        /// equals the node's accepted auxiliary (delivered demand).
        #[test]
        fn mass_conserved_at_every_junction(
            diam1 in 0.1_f64..0.5_f64,
            diam2 in 0.1_f64..0.5_f64,
            len1 in 100.0_f64..1000.0_f64,
            len2 in 100.0_f64..1000.0_f64,
            d1 in 0.0_f64..0.03_f64,
            d2 in 0.0_f64..0.03_f64,
        ) {
            let (net, _r, j1, j2, _pa, _pb) = series_demand_net(diam1, diam2, len1, len2, d1, d2);
            let config = ReconcilerConfig::default();
            let state = SimState::new(0.0);
            let outcome = reconcile_step(
                &net, &config, &state, &HashMap::new(), None, DemandMode::Dd, 3600.0, 0.0, true,
            )
            .unwrap();

            let tol = config.q_tol * 10.0;
            prop_assert!((signed_flow_sum_at(&net, &outcome.solution, j1) - outcome.solution.aux(j1)).abs() < tol);
            prop_assert!((signed_flow_sum_at(&net, &outcome.solution, j2) - outcome.solution.aux(j2)).abs() < tol);
        }

        /// Invariant 2: headloss across a pipe always opposes the flow
        /// direction -- head drops from `from` to `to` when `q > 0`.
        #[test]
        fn headloss_sign_matches_pipe_flow_direction(
            diam1 in 0.1_f64..0.5_f64,
            diam2 in 0.1_f64..0.5_f64,
            len1 in 100.0_f64..1000.0_f64,
            len2 in 100.0_f64..1000.0_f64,
            d1 in 0.0_f64..0.03_f64,
            d2 in 0.0_f64..0.03_f64,
        ) {
            let (net, r, j1, j2, pa, pb) = series_demand_net(diam1, diam2, len1, len2, d1, d2);
            let config = ReconcilerConfig::default();
            let state = SimState::new(0.0);
            let outcome = reconcile_step(
                &net, &config, &state, &HashMap::new(), None, DemandMode::Dd, 3600.0, 0.0, true,
            )
            .unwrap();
            let sol = &outcome.solution;

            let qa = sol.flow(pa);
            let dha = sol.head(r) - sol.head(j1);
            if qa > config.q_tol {
                prop_assert!(dha > -1e-6);
            } else if qa < -config.q_tol {
                prop_assert!(dha < 1e-6);
            }

            let qb = sol.flow(pb);
            let dhb = sol.head(j1) - sol.head(j2);
            if qb > config.q_tol {
                prop_assert!(dhb > -1e-6);
            } else if qb < -config.q_tol {
                prop_assert!(dhb < 1e-6);
            }
        }

        /// Invariant 7: given identical inputs, the trial loop is a pure
        /// function -- rerunning it changes nothing.
        #[test]
        fn reconcile_step_is_idempotent_given_same_inputs(
            diam1 in 0.1_f64..0.5_f64,
            len1 in 100.0_f64..1000.0_f64,
            d1 in 0.0_f64..0.03_f64,
        ) {
            let mut b = NetworkBuilder::new();
            let r = b.add_reservoir("R1", 50.0, None);
            let j = b.add_junction("J1", 0.0, d1, None, 0.0, 20.0);
            let p = b.add_pipe("P1", r, j, len1, diam1, 130.0, 0.0, PS::Open);
            let net = b.build().unwrap();
            let config = ReconcilerConfig::default();
            let state = SimState::new(0.0);

            let first = reconcile_step(
                &net, &config, &state, &HashMap::new(), None, DemandMode::Dd, 3600.0, 0.0, true,
            )
            .unwrap();
            let second = reconcile_step(
                &net, &config, &state, &HashMap::new(), None, DemandMode::Dd, 3600.0, 0.0, true,
            )
            .unwrap();

            prop_assert!((first.solution.flow(p) - second.solution.flow(p)).abs() < 1e-12);
            prop_assert!((first.solution.head(j) - second.solution.head(j)).abs() < 1e-12);
            prop_assert_eq!(first.trials, second.trials);
        }

        /// Invariant 3: a PRV settled into `Active` mode pins its
        /// downstream head to `setting + elevation(to)`.
        #[test]
        fn prv_active_pins_downstream_head_to_setting(
            d in 0.001_f64..0.03_f64,
        ) {
            let mut b = NetworkBuilder::new();
            let r = b.add_reservoir("R1", 50.0, None);
            let j_mid = b.add_junction("JMID", 0.0, 0.0, None, 0.0, 20.0);
            let j2 = b.add_junction("J2", 0.0, d, None, 0.0, 20.0);
            let prv = b
                .add_valve(
                    "PRV1",
                    r,
                    j_mid,
                    LinkKind::Valve {
                        diameter_m: 0.3,
                        kind: ValveKind::Prv,
                        minor_loss_k: 0.0,
                        setting: 20.0,
                        base_status: PS::Open,
                    },
                )
                .unwrap();
            b.add_pipe("P2", j_mid, j2, 500.0, 0.3, 130.0, 0.0, PS::Open);
            let net = b.build().unwrap();

            let config = ReconcilerConfig::default();
            let state = SimState::new(0.0);
            let outcome = reconcile_step(
                &net, &config, &state, &HashMap::new(), None, DemandMode::Dd, 3600.0, 0.0, true,
            )
            .unwrap();

            prop_assert_eq!(outcome.state.valve_mode.get(&prv).copied(), Some(ValveMode::Active));
            prop_assert!((outcome.solution.head(j_mid) - 20.0).abs() < config.h_tol * 10.0);
        }

        /// Invariant 8: a check-valve pipe never carries flow against its
        /// permitted direction, regardless of the head gradient offered.
        #[test]
        fn check_valve_never_passes_negative_flow(
            r_lo_head in 10.0_f64..60.0_f64,
        ) {
            let mut b = NetworkBuilder::new();
            let r_hi = b.add_reservoir("RHI", 50.0, None);
            let r_lo = b.add_reservoir("RLO", r_lo_head, None);
            let cv = b.add_pipe("CV1", r_hi, r_lo, 500.0, 0.3, 130.0, 0.0, PS::Cv);
            let net = b.build().unwrap();

            let config = ReconcilerConfig::default();
            let state = SimState::new(0.0);
            let outcome = reconcile_step(
                &net, &config, &state, &HashMap::new(), None, DemandMode::Dd, 3600.0, 0.0, true,
            )
            .unwrap();

            prop_assert!(outcome.solution.flow(cv) > -(config.q_tol * 10.0));
        }
    }
}
