//! Equation assembler (C4): builds the residual `F(x)` and analytic Jacobian
//! `J(x)` of the hydraulic system for one trial of one timestep.
//!
//! Variable layout: every node owns 2 unknowns (head, plus one auxiliary
//! variable whose meaning depends on the node's kind), every link owns 1
//! (flow). This gives a square system with the natural convention "row i is
//! the equation that defines variable i" — no separate equation numbering.

use std::collections::HashMap;

use hydro_core::units::constants::{G, RHO_WATER};
use hydro_core::{LinkId, NodeId};
use hydro_graph::PortKind;
use hydro_constitutive::{hazen_williams, leak, pdd, pump_curve};
use hydro_constitutive::pump_curve::PumpCurveCoeffs;
use hydro_network::{
    LinkKind, LinkKindTag, NetworkModel, NodeKind, PipeStatus, PumpMode, SimState, ValveKind,
    ValveMode,
};
use nalgebra::{DMatrix, DVector};

use crate::error::{SolverError, SolverResult};

/// Demand law selection for junctions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandMode {
    /// Demand-driven: delivered demand always equals required demand.
    Dd,
    /// Pressure-driven: delivered demand follows `pdd::delivered_demand`.
    Pdd,
}

/// Maps node/link IDs to their column/row index in the unknown vector.
#[derive(Debug, Clone, Copy)]
pub struct VariableLayout {
    num_nodes: usize,
    num_links: usize,
}

impl VariableLayout {
    pub fn new(net: &NetworkModel) -> Self {
        Self {
            num_nodes: net.graph().nodes().len(),
            num_links: net.graph().links().len(),
        }
    }

    /// Total number of unknowns: `2 * num_nodes + num_links`.
    pub fn len(&self) -> usize {
        2 * self.num_nodes + self.num_links
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn head_idx(&self, node: NodeId) -> usize {
        node.index() as usize * 2
    }

    pub fn aux_idx(&self, node: NodeId) -> usize {
        node.index() as usize * 2 + 1
    }

    pub fn flow_idx(&self, link: LinkId) -> usize {
        2 * self.num_nodes + link.index() as usize
    }
}

/// The static (per-run, not per-trial) part of the hydraulic problem: the
/// network itself plus every pump's fitted curve coefficients, computed once
/// rather than refit on every residual evaluation.
pub struct HydraulicProblem<'a> {
    pub net: &'a NetworkModel,
    pub mode: DemandMode,
    /// Hydraulic timestep, seconds.
    pub dt_s: f64,
    /// Current simulation clock, seconds (used for demand/reservoir pattern
    /// sampling).
    pub t_s: f64,
    /// `true` at t=0: tanks are pinned and their dynamics row is replaced by
    /// a current-flow mass balance instead of the previous-flow one.
    pub is_first_step: bool,
    pump_curves: HashMap<LinkId, PumpCurveCoeffs>,
}

impl<'a> HydraulicProblem<'a> {
    pub fn new(
        net: &'a NetworkModel,
        mode: DemandMode,
        dt_s: f64,
        t_s: f64,
        is_first_step: bool,
    ) -> SolverResult<Self> {
        let mut pump_curves = HashMap::new();
        for link in net.links_of_kind(LinkKindTag::Pump) {
            if let Some(LinkKind::Pump {
                mode: PumpMode::Head,
                curve: Some(curve_id),
                ..
            }) = net.link_kind(link)
            {
                let curve = net.curve(*curve_id).ok_or_else(|| SolverError::ProblemSetup {
                    what: format!(
                        "pump {} references a curve id that doesn't exist",
                        net.link_name(link).unwrap_or("?")
                    ),
                })?;
                let coeffs = match curve.points.len() {
                    1 => {
                        let (q1, h1) = curve.points[0];
                        pump_curve::fit_one_point(q1, h1)?
                    }
                    3 => {
                        let (q1, h1) = curve.points[0];
                        let (q2, h2) = curve.points[1];
                        let (q3, h3) = curve.points[2];
                        pump_curve::fit_three_point(q1, h1, q2, h2, q3, h3)?
                    }
                    n => {
                        return Err(SolverError::ProblemSetup {
                            what: format!(
                                "pump {} curve must have 1 or 3 points, got {n}",
                                net.link_name(link).unwrap_or("?")
                            ),
                        })
                    }
                };
                pump_curves.insert(link, coeffs);
            }
        }
        Ok(Self {
            net,
            mode,
            dt_s,
            t_s,
            is_first_step,
            pump_curves,
        })
    }
}

/// A converged (or in-progress) solution vector, addressable by node/link id.
#[derive(Debug, Clone)]
pub struct HydraulicSolution {
    pub x: DVector<f64>,
    pub layout: VariableLayout,
}

impl HydraulicSolution {
    pub fn head(&self, node: NodeId) -> f64 {
        self.x[self.layout.head_idx(node)]
    }

    pub fn aux(&self, node: NodeId) -> f64 {
        self.x[self.layout.aux_idx(node)]
    }

    pub fn flow(&self, link: LinkId) -> f64 {
        self.x[self.layout.flow_idx(link)]
    }
}

/// One row of the assembled system: its residual value and the (column,
/// partial derivative) pairs that are nonzero.
struct Row {
    residual: f64,
    partials: Vec<(usize, f64)>,
}

impl Row {
    fn pinned(idx: usize, residual: f64) -> Self {
        Self {
            residual,
            partials: vec![(idx, 1.0)],
        }
    }
}

/// Links forced to zero flow by anything other than a pump outage (which is
/// handled separately as a zero-loss bypass, not a closure).
fn is_forced_closed(state: &SimState, link: LinkId) -> bool {
    state.closed_by_controls.contains(&link)
        || state.closed_by_tank_cutoff.contains(&link)
        || state.closed_by_backflow.contains(&link)
        || state.closed_by_low_suction.contains(&link)
        || state.check_valve_closed.contains(&link)
}

fn is_valve_mode_closed(net: &NetworkModel, state: &SimState, link: LinkId) -> bool {
    matches!(
        net.link_kind(link),
        Some(LinkKind::Valve {
            kind: ValveKind::Prv,
            ..
        })
    ) && state.valve_mode.get(&link) == Some(&ValveMode::Closed)
}

/// `true` if `link`'s flow is forced to zero in the current discrete state.
/// An outaged pump is deliberately excluded: it becomes a zero-loss bypass
/// (water still passes through it), not a closure, so it must not count as
/// blocking for either the momentum-equation dispatch or isolation
/// detection below.
fn link_is_effectively_closed(net: &NetworkModel, state: &SimState, link: LinkId) -> bool {
    let Some(kind) = net.link_kind(link) else {
        return true;
    };
    kind.base_status() == PipeStatus::Closed
        || is_forced_closed(state, link)
        || is_valve_mode_closed(net, state, link)
}

fn node_is_isolated(net: &NetworkModel, state: &SimState, node: NodeId) -> bool {
    net.links_for(node)
        .iter()
        .all(|&l| link_is_effectively_closed(net, state, l))
}

/// `sum(q for links flowing in) - sum(q for links flowing out)` at `node`,
/// evaluated from the *current* trial's unknowns, with its Jacobian row.
fn signed_flow_sum(
    net: &NetworkModel,
    layout: &VariableLayout,
    x: &DVector<f64>,
    node: NodeId,
) -> (f64, Vec<(usize, f64)>) {
    let mut value = 0.0;
    let mut partials = Vec::new();
    for port_id in net.graph().node_ports(node) {
        let Some(port) = net.graph().port(*port_id) else {
            continue;
        };
        let q_idx = layout.flow_idx(port.link);
        let q = x[q_idx];
        match port.kind {
            PortKind::To => {
                value += q;
                partials.push((q_idx, 1.0));
            }
            PortKind::From => {
                value -= q;
                partials.push((q_idx, -1.0));
            }
        }
    }
    (value, partials)
}

/// Same signed sum, but from the *previous* accepted step's flows (a
/// constant as far as this trial's unknowns are concerned) -- used for the
/// tank mass-balance row at t>0, an explicit-integration approximation
/// carried over from timestep to timestep rather than solved implicitly.
fn signed_flow_sum_prev(net: &NetworkModel, state: &SimState, node: NodeId) -> f64 {
    let mut value = 0.0;
    for port_id in net.graph().node_ports(node) {
        let Some(port) = net.graph().port(*port_id) else {
            continue;
        };
        let q = state.last_link_flow_cms.get(&port.link).copied().unwrap_or(0.0);
        match port.kind {
            PortKind::To => value += q,
            PortKind::From => value -= q,
        }
    }
    value
}

fn link_row(
    problem: &HydraulicProblem,
    state: &SimState,
    x: &DVector<f64>,
    layout: &VariableLayout,
    link: LinkId,
) -> SolverResult<Row> {
    let net = problem.net;
    let kind = net.link_kind(link).ok_or_else(|| SolverError::ProblemSetup {
        what: format!("no link attributes for link index {}", link.index()),
    })?;
    let from = net.graph().link_from_node(link).ok_or_else(|| SolverError::ProblemSetup {
        what: "link has no 'from' node".to_string(),
    })?;
    let to = net.graph().link_to_node(link).ok_or_else(|| SolverError::ProblemSetup {
        what: "link has no 'to' node".to_string(),
    })?;

    let h_from_idx = layout.head_idx(from);
    let h_to_idx = layout.head_idx(to);
    let q_idx = layout.flow_idx(link);
    let h_from = x[h_from_idx];
    let h_to = x[h_to_idx];
    let q = x[q_idx];

    let outaged_pump = kind.is_pump() && state.closed_by_outage.contains(&link);

    if !outaged_pump
        && (kind.base_status() == PipeStatus::Closed
            || is_forced_closed(state, link)
            || is_valve_mode_closed(net, state, link))
    {
        return Ok(Row::pinned(q_idx, q));
    }

    if outaged_pump {
        // Modeled as a zero-loss pipe for the duration of the outage.
        return Ok(Row {
            residual: h_from - h_to,
            partials: vec![(h_from_idx, 1.0), (h_to_idx, -1.0)],
        });
    }

    match kind {
        LinkKind::Pipe {
            length_m,
            diameter_m,
            hw_coefficient,
            ..
        } => {
            let r = hazen_williams::resistance(*hw_coefficient, *diameter_m, *length_m);
            let hl = hazen_williams::headloss(q, r)?;
            Ok(Row {
                residual: hl.value - (h_from - h_to),
                partials: vec![(h_from_idx, -1.0), (h_to_idx, 1.0), (q_idx, hl.deriv)],
            })
        }

        LinkKind::Pump {
            mode: PumpMode::Head,
            ..
        } => {
            let coeffs = problem.pump_curves.get(&link).ok_or_else(|| SolverError::ProblemSetup {
                what: format!(
                    "pump {} has no fitted curve (mode Head requires one)",
                    net.link_name(link).unwrap_or("?")
                ),
            })?;
            let hc = pump_curve::modified_curve(*coeffs, q)?;
            Ok(Row {
                residual: (h_to - h_from) - hc.value,
                partials: vec![(h_from_idx, -1.0), (h_to_idx, 1.0), (q_idx, -hc.deriv)],
            })
        }

        LinkKind::Pump {
            mode: PumpMode::Power,
            power_w,
            ..
        } => {
            let power = power_w.ok_or_else(|| SolverError::ProblemSetup {
                what: format!(
                    "pump {} is mode Power but has no power_w",
                    net.link_name(link).unwrap_or("?")
                ),
            })?;
            let rho_g = RHO_WATER * G;
            Ok(Row {
                residual: (h_from - h_to) * q * rho_g + power,
                partials: vec![
                    (h_from_idx, q * rho_g),
                    (h_to_idx, -q * rho_g),
                    (q_idx, (h_from - h_to) * rho_g),
                ],
            })
        }

        LinkKind::Valve {
            kind: ValveKind::Prv,
            minor_loss_k,
            ..
        } => match state.valve_mode.get(&link).copied().unwrap_or(ValveMode::Open) {
            ValveMode::Active => {
                let setting = match kind {
                    LinkKind::Valve { setting, .. } => *setting,
                    _ => unreachable!(),
                };
                let elev_to = net.node_kind(to).and_then(|k| k.elevation_m()).unwrap_or(0.0);
                Ok(Row::pinned(h_to_idx, h_to - (setting + elev_to)))
            }
            ValveMode::Open | ValveMode::Closed => {
                // Closed was already handled above; Open falls through to
                // the same fixed-loss form every other valve kind uses.
                Ok(fixed_loss_valve_row(
                    *minor_loss_k,
                    h_from_idx,
                    h_to_idx,
                    q_idx,
                    h_from,
                    h_to,
                    q,
                ))
            }
        },

        LinkKind::Valve { minor_loss_k, .. } => {
            // PSV/PBV/FCV/TCV/GPV: parsed and stored, but only PRV
            // participates in the Active/Open/Closed state machine (DESIGN.md
            // Open Question 4). Every other kind is a fixed minor-loss device.
            Ok(fixed_loss_valve_row(
                *minor_loss_k,
                h_from_idx,
                h_to_idx,
                q_idx,
                h_from,
                h_to,
                q,
            ))
        }
    }
}

/// `k_v * q * |q| = H_from - H_to`: a sign-preserving quadratic minor loss,
/// already C1 at q=0 (value and derivative both vanish there) without
/// needing the Hazen-Williams-style piecewise smoothing.
fn fixed_loss_valve_row(
    k_v: f64,
    h_from_idx: usize,
    h_to_idx: usize,
    q_idx: usize,
    h_from: f64,
    h_to: f64,
    q: f64,
) -> Row {
    let value = k_v * q * q.abs();
    let deriv = 2.0 * k_v * q.abs();
    Row {
        residual: value - (h_from - h_to),
        partials: vec![(h_from_idx, -1.0), (h_to_idx, 1.0), (q_idx, deriv)],
    }
}

fn node_rows(
    problem: &HydraulicProblem,
    state: &SimState,
    x: &DVector<f64>,
    layout: &VariableLayout,
    node: NodeId,
) -> SolverResult<(Row, Row)> {
    let net = problem.net;
    let kind = net.node_kind(node).ok_or_else(|| SolverError::ProblemSetup {
        what: format!("no node attributes for node index {}", node.index()),
    })?;
    let head_idx = layout.head_idx(node);
    let aux_idx = layout.aux_idx(node);
    let h = x[head_idx];
    let aux = x[aux_idx];

    match kind {
        NodeKind::Reservoir { head_m, .. } => {
            let base_head = hydro_network::demand::reservoir_head(net, node, problem.t_s).unwrap_or(*head_m);
            let head_row = Row::pinned(head_idx, h - base_head);

            let (sum_val, mut partials) = signed_flow_sum(net, layout, x, node);
            partials.push((aux_idx, -1.0));
            let aux_row = Row {
                residual: sum_val - aux,
                partials,
            };
            Ok((head_row, aux_row))
        }

        NodeKind::Tank {
            elevation_m,
            init_level_m,
            diameter_m,
            ..
        } => {
            if problem.is_first_step {
                let pinned_head = elevation_m + init_level_m;
                let head_row = Row::pinned(head_idx, h - pinned_head);

                let (sum_val, mut partials) = signed_flow_sum(net, layout, x, node);
                partials.push((aux_idx, -1.0));
                let aux_row = Row {
                    residual: sum_val - aux,
                    partials,
                };
                Ok((head_row, aux_row))
            } else {
                let h_prev = *state.last_tank_head_m.get(&node).ok_or_else(|| {
                    SolverError::ProblemSetup {
                        what: "tank has no previous-step head carried forward".to_string(),
                    }
                })?;
                let area = std::f64::consts::PI * diameter_m * diameter_m / 4.0;
                // (I_t * dt * 4) / (pi * D^2) = H_t - H_t_prev
                let head_row = Row {
                    residual: (aux * problem.dt_s / area) - (h - h_prev),
                    partials: vec![(aux_idx, problem.dt_s / area), (head_idx, -1.0)],
                };

                let sum_prev = signed_flow_sum_prev(net, state, node);
                let aux_row = Row {
                    residual: sum_prev - aux,
                    partials: vec![(aux_idx, -1.0)],
                };
                Ok((head_row, aux_row))
            }
        }

        NodeKind::Junction {
            elevation_m,
            base_demand_cms,
            p0_m,
            pf_m,
            ..
        } => {
            if node_is_isolated(net, state, node) {
                let head_row = Row::pinned(head_idx, h - elevation_m);
                let aux_row = Row::pinned(aux_idx, aux);
                return Ok((head_row, aux_row));
            }

            let d_required =
                hydro_network::demand::required_demand(net, node, problem.t_s).unwrap_or(*base_demand_cms);

            let (sum_val, mut partials) = signed_flow_sum(net, layout, x, node);
            partials.push((aux_idx, -1.0));
            let head_row = Row {
                residual: sum_val - aux,
                partials,
            };

            let aux_row = if d_required == 0.0 {
                Row::pinned(aux_idx, aux)
            } else {
                match problem.mode {
                    DemandMode::Dd => Row {
                        residual: aux - d_required,
                        partials: vec![(aux_idx, 1.0)],
                    },
                    DemandMode::Pdd => {
                        let p = h - elevation_m;
                        let phi = pdd::delivered_demand(p, d_required, *p0_m, *pf_m)?;
                        Row {
                            residual: aux - phi.value,
                            partials: vec![(aux_idx, 1.0), (head_idx, -phi.deriv)],
                        }
                    }
                }
            };
            Ok((head_row, aux_row))
        }

        NodeKind::Leak {
            elevation_m,
            area_m2,
            discharge_coeff,
        } => {
            let (sum_val, mut partials) = signed_flow_sum(net, layout, x, node);
            partials.push((aux_idx, -1.0));
            let head_row = Row {
                residual: sum_val - aux,
                partials,
            };

            let aux_row = if state.active_leaks.contains(&node) {
                let p = h - elevation_m;
                let ld = leak::leak_demand(p, *discharge_coeff, *area_m2)?;
                Row {
                    residual: aux - ld.value,
                    partials: vec![(aux_idx, 1.0), (head_idx, -ld.deriv)],
                }
            } else {
                Row::pinned(aux_idx, aux)
            };
            Ok((head_row, aux_row))
        }
    }
}

fn assemble_rows(
    problem: &HydraulicProblem,
    state: &SimState,
    x: &DVector<f64>,
    layout: &VariableLayout,
) -> SolverResult<Vec<Row>> {
    let n = layout.len();
    let mut rows: Vec<Option<Row>> = (0..n).map(|_| None).collect();

    for node in problem.net.graph().nodes() {
        let (head_row, aux_row) = node_rows(problem, state, x, layout, node.id)?;
        rows[layout.head_idx(node.id)] = Some(head_row);
        rows[layout.aux_idx(node.id)] = Some(aux_row);
    }
    for link in problem.net.graph().links() {
        let row = link_row(problem, state, x, layout, link.id)?;
        rows[layout.flow_idx(link.id)] = Some(row);
    }

    rows.into_iter()
        .enumerate()
        .map(|(i, r)| {
            r.ok_or_else(|| SolverError::ProblemSetup {
                what: format!("row {i} was never assigned an equation"),
            })
        })
        .collect()
}

/// Residual `F(x)` of the assembled system.
pub fn residual(
    problem: &HydraulicProblem,
    state: &SimState,
    x: &DVector<f64>,
    layout: &VariableLayout,
) -> SolverResult<DVector<f64>> {
    let rows = assemble_rows(problem, state, x, layout)?;
    Ok(DVector::from_iterator(rows.len(), rows.iter().map(|r| r.residual)))
}

/// Analytic Jacobian `J(x)` of the assembled system.
pub fn jacobian(
    problem: &HydraulicProblem,
    state: &SimState,
    x: &DVector<f64>,
    layout: &VariableLayout,
) -> SolverResult<DMatrix<f64>> {
    let rows = assemble_rows(problem, state, x, layout)?;
    let n = rows.len();
    let mut j = DMatrix::zeros(n, n);
    for (i, row) in rows.iter().enumerate() {
        for &(col, val) in &row.partials {
            j[(i, col)] += val;
        }
    }
    Ok(j)
}

/// Build the initial guess for a trial's Newton solve: the previous
/// converged solution if it's compatible with the current layout (same node
////link counts -- topology never changes mid-run), else sensible per-kind
/// defaults; either way, flows are perturbed slightly and negative pump
/// flows are reset to a small positive value so the Jacobian stays well
/// conditioned near the solution boundary.
pub fn initial_guess(
    problem: &HydraulicProblem,
    layout: &VariableLayout,
    previous: Option<&DVector<f64>>,
) -> DVector<f64> {
    const PERTURB: f64 = 1e-6;
    let n = layout.len();
    let net = problem.net;

    let mut x = match previous {
        Some(prev) if prev.len() == n => prev.clone(),
        _ => {
            let mut fresh = DVector::from_element(n, 0.0);
            for node in net.graph().nodes() {
                let head = match net.node_kind(node.id) {
                    Some(NodeKind::Reservoir { head_m, .. }) => *head_m,
                    Some(NodeKind::Tank {
                        elevation_m,
                        init_level_m,
                        ..
                    }) => elevation_m + init_level_m,
                    Some(NodeKind::Junction { elevation_m, .. }) => *elevation_m,
                    Some(NodeKind::Leak { elevation_m, .. }) => *elevation_m,
                    None => 0.0,
                };
                fresh[layout.head_idx(node.id)] = head;
            }
            for link in net.graph().links() {
                fresh[layout.flow_idx(link.id)] = 1e-3;
            }
            fresh
        }
    };

    for link in net.graph().links() {
        let idx = layout.flow_idx(link.id);
        if matches!(net.link_kind(link.id), Some(LinkKind::Pump { .. })) && x[idx] <= 0.0 {
            x[idx] = 1e-4;
        }
        x[idx] += PERTURB;
    }

    x
}
