//! Extended-period simulation driver (C7).
//!
//! Chains a sequence of per-timestep discrete-state solves
//! (`hydro-reconciler`) into a full run: at each reporting step it computes
//! demands implicitly through the reconciler/solver, persists the
//! converged `(H, q, d, I, L)` tuple, and carries the step's tank heads,
//! link flows, and Newton seed into the next step. The loop itself is a
//! fixed-step driver in the same shape as a transient integrator's `run_sim`
//! -- just swapping an RK4/Euler `step()` call for a reconciler trial loop.

pub mod error;

use std::collections::HashMap;

use hydro_core::{LinkId, NodeId};
use hydro_network::{NetworkModel, SimState};
use hydro_reconciler::ReconcilerConfig;
use hydro_solver::DemandMode;
use nalgebra::DVector;
use tracing::info;

pub use error::{EpsError, EpsResult};

/// Options for an EPS run.
#[derive(Clone, Debug)]
pub struct EpsOptions {
    /// Hydraulic timestep, seconds.
    pub dt_s: f64,
    /// Total simulated duration, seconds.
    pub duration_s: f64,
    /// Demand law used by every step's solve.
    pub mode: DemandMode,
}

impl Default for EpsOptions {
    fn default() -> Self {
        Self {
            dt_s: 3600.0,
            duration_s: 86_400.0,
            mode: DemandMode::Dd,
        }
    }
}

/// Progress notification emitted once per accepted (or cancelled) step.
#[derive(Clone, Debug)]
pub struct EpsProgress {
    pub step: usize,
    pub total_steps: usize,
    pub t_s: f64,
    pub trials: usize,
}

/// One reporting step's persisted `(H, q, d, I, L)` tuple.
///
/// `node_aux` is the per-node-kind auxiliary variable: delivered demand for
/// junctions, net inflow for tanks, leak demand for leak nodes, and the
/// (always zero) aux for reservoirs -- callers that care which is which
/// should match on `NetworkModel::node_kind`.
#[derive(Clone, Debug)]
pub struct StepRecord {
    pub t_s: f64,
    pub node_head_m: HashMap<NodeId, f64>,
    pub node_aux: HashMap<NodeId, f64>,
    pub link_flow_cms: HashMap<LinkId, f64>,
    pub trials: usize,
}

/// The full set of reporting steps from one EPS run.
#[derive(Clone, Debug, Default)]
pub struct EpsRecord {
    pub steps: Vec<StepRecord>,
}

impl EpsRecord {
    pub fn is_partial(&self, expected_steps: usize) -> bool {
        self.steps.len() < expected_steps
    }
}

fn total_steps(opts: &EpsOptions) -> usize {
    (opts.duration_s / opts.dt_s).ceil() as usize + 1
}

/// Run an EPS simulation to completion (or fatal reconciliation error).
pub fn run_eps(
    net: &NetworkModel,
    config: &ReconcilerConfig,
    opts: &EpsOptions,
) -> EpsResult<EpsRecord> {
    run_eps_with_progress(net, config, opts, None, None)
}

/// Run an EPS simulation, optionally reporting progress and honoring
/// cooperative cancellation checked between timesteps.
///
/// On cancellation, returns `Ok` with all steps accepted so far rather than
/// an error -- a cancelled run is a partial result, not a failure.
pub fn run_eps_with_progress(
    net: &NetworkModel,
    config: &ReconcilerConfig,
    opts: &EpsOptions,
    mut progress_cb: Option<&mut dyn FnMut(EpsProgress)>,
    cancelled: Option<&dyn Fn() -> bool>,
) -> EpsResult<EpsRecord> {
    if opts.dt_s <= 0.0 {
        return Err(EpsError::InvalidArg {
            what: "dt_s must be positive",
        });
    }
    if opts.duration_s < 0.0 {
        return Err(EpsError::InvalidArg {
            what: "duration_s must be non-negative",
        });
    }

    let n = total_steps(opts);
    let mut steps = Vec::with_capacity(n);

    let mut state = SimState::new(0.0);
    let mut prev_heads: HashMap<NodeId, f64> = HashMap::new();
    let mut prev_x: Option<DVector<f64>> = None;

    for step in 0..n {
        if let Some(cancelled) = cancelled {
            if cancelled() {
                info!(step, "eps run cancelled, returning partial results");
                break;
            }
        }

        let t_s = step as f64 * opts.dt_s;
        let is_first_step = step == 0;

        let outcome = match hydro_reconciler::reconcile_step(
            net,
            config,
            &state,
            &prev_heads,
            prev_x.as_ref(),
            opts.mode,
            opts.dt_s,
            t_s,
            is_first_step,
        ) {
            Ok(outcome) => outcome,
            Err(source) => {
                return Err(EpsError::Step {
                    step,
                    source,
                    partial: EpsRecord { steps },
                })
            }
        };

        let mut node_head_m = HashMap::new();
        let mut node_aux = HashMap::new();
        for node in net.graph().nodes() {
            node_head_m.insert(node.id, outcome.solution.head(node.id));
            node_aux.insert(node.id, outcome.solution.aux(node.id));
        }
        let mut link_flow_cms = HashMap::new();
        for link in net.graph().links() {
            link_flow_cms.insert(link.id, outcome.solution.flow(link.id));
        }

        prev_heads = node_head_m.clone();
        prev_x = Some(outcome.solution.x.clone());
        state = outcome.state;

        let trials = outcome.trials;
        steps.push(StepRecord {
            t_s,
            node_head_m,
            node_aux,
            link_flow_cms,
            trials,
        });

        if let Some(cb) = progress_cb.as_deref_mut() {
            cb(EpsProgress {
                step,
                total_steps: n,
                t_s,
                trials,
            });
        }
    }

    Ok(EpsRecord { steps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydro_network::{NetworkBuilder, PipeStatus};

    fn single_pipe_net() -> NetworkModel {
        let mut b = NetworkBuilder::new();
        let r = b.add_reservoir("R1", 50.0, None);
        let j = b.add_junction("J1", 10.0, 0.02, None, 0.0, 20.0);
        b.add_pipe("P1", r, j, 500.0, 0.3, 130.0, 0.0, PipeStatus::Open);
        b.build().unwrap()
    }

    #[test]
    fn total_steps_is_ceil_plus_one() {
        let opts = EpsOptions {
            dt_s: 3600.0,
            duration_s: 7200.0,
            mode: DemandMode::Dd,
        };
        assert_eq!(total_steps(&opts), 3);
    }

    #[test]
    fn run_eps_produces_one_record_per_step() {
        let net = single_pipe_net();
        let config = ReconcilerConfig::default();
        let opts = EpsOptions {
            dt_s: 3600.0,
            duration_s: 7200.0,
            mode: DemandMode::Dd,
        };
        let record = run_eps(&net, &config, &opts).unwrap();
        assert_eq!(record.steps.len(), 3);
        assert_eq!(record.steps[0].t_s, 0.0);
        assert_eq!(record.steps[1].t_s, 3600.0);
        assert!(!record.is_partial(3));
    }

    #[test]
    fn cancellation_returns_partial_record() {
        let net = single_pipe_net();
        let config = ReconcilerConfig::default();
        let opts = EpsOptions {
            dt_s: 3600.0,
            duration_s: 36_000.0,
            mode: DemandMode::Dd,
        };
        let calls = std::cell::Cell::new(0usize);
        let cancel_fn = || {
            calls.set(calls.get() + 1);
            calls.get() > 2
        };
        let record = run_eps_with_progress(&net, &config, &opts, None, Some(&cancel_fn)).unwrap();
        assert!(record.steps.len() < total_steps(&opts));
        assert!(record.is_partial(total_steps(&opts)));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use hydro_network::{NetworkBuilder, PipeStatus};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn total_steps_covers_the_full_duration(
            dt_s in 1.0_f64..10_000.0_f64,
            duration_s in 0.0_f64..1_000_000.0_f64,
        ) {
            let opts = EpsOptions { dt_s, duration_s, mode: DemandMode::Dd };
            let n = total_steps(&opts);
            prop_assert!(n >= 1);
            prop_assert!((n - 1) as f64 * dt_s >= duration_s - dt_s);
        }

        /// Invariant 4: a tank's head moves across a step by exactly
        /// `aux * dt / area`, the explicit-Euler relation the tank's head
        /// row encodes (`aux` here is the prior step's net inflow).
        #[test]
        fn tank_head_matches_explicit_euler_step(
            tank_diam in 1.0_f64..5.0_f64,
            demand in 0.0_f64..0.02_f64,
        ) {
            let mut b = NetworkBuilder::new();
            let r = b.add_reservoir("R1", 60.0, None);
            let tank = b.add_tank("T1", 0.0, 10.0, 0.0, 20.0, tank_diam, 0.0).unwrap();
            let j = b.add_junction("J1", 0.0, demand, None, 0.0, 20.0);
            b.add_pipe("P1", r, tank, 200.0, 0.4, 130.0, 0.0, PipeStatus::Open);
            b.add_pipe("P2", tank, j, 200.0, 0.3, 130.0, 0.0, PipeStatus::Open);
            let net = b.build().unwrap();

            let config = ReconcilerConfig::default();
            let dt_s = 3600.0;
            let opts = EpsOptions { dt_s, duration_s: dt_s, mode: DemandMode::Dd };
            let record = run_eps(&net, &config, &opts).unwrap();
            prop_assert_eq!(record.steps.len(), 2);

            let area = std::f64::consts::PI * tank_diam * tank_diam / 4.0;
            let h0 = record.steps[0].node_head_m[&tank];
            let h1 = record.steps[1].node_head_m[&tank];
            let aux1 = record.steps[1].node_aux[&tank];
            prop_assert!((h1 - h0 - aux1 * dt_s / area).abs() < 1e-6);
        }
    }
}
