//! Run execution and caching service: parse an INP file, drive an EPS run,
//! persist the result, and optionally reuse a cached run by content hash.

use std::path::Path;
use std::time::Instant;

use hydro_core::{LinkId, NodeId};
use hydro_eps::{EpsError, EpsOptions, EpsRecord, EpsProgress};
use hydro_network::{LinkKind, NetworkModel, NodeKind};
use hydro_reconciler::ReconcilerConfig;
use hydro_results::{
    DemandMode, LinkValueSnapshot, NodeValueSnapshot, RunManifest, RunResults, RunStore,
    TimeseriesRecord,
};

use crate::error::{AppError, AppResult};
use crate::progress::{RunProgressEvent, RunStage};
use crate::project_service;

/// Options for one `run` invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Hydraulic timestep, seconds. Falls back to the INP file's
    /// `[TIMES] HYDRAULIC TIMESTEP` if not given.
    pub dt_s: Option<f64>,
    /// Total simulated duration, seconds. Falls back to the INP file's
    /// `[TIMES] DURATION` if not given.
    pub duration_s: Option<f64>,
    pub mode: DemandMode,
    pub use_cache: bool,
    pub solver_version: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dt_s: None,
            duration_s: None,
            mode: DemandMode::Dd,
            use_cache: true,
            solver_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Request to execute a run.
pub struct RunRequest<'a> {
    pub inp_path: &'a Path,
    pub options: RunOptions,
}

/// Concise timing summary for a run.
#[derive(Debug, Clone, Default)]
pub struct RunTimingSummary {
    pub parse_time_s: f64,
    pub solve_time_s: f64,
    pub save_time_s: f64,
    pub total_time_s: f64,
}

/// Result of a run request: the persisted manifest, the results, whether it
/// came from cache, and how long each stage took.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub manifest: RunManifest,
    pub results: RunResults,
    pub from_cache: bool,
    pub timing: RunTimingSummary,
}

fn to_solver_mode(mode: DemandMode) -> hydro_solver::DemandMode {
    match mode {
        DemandMode::Dd => hydro_solver::DemandMode::Dd,
        DemandMode::Pdd => hydro_solver::DemandMode::Pdd,
    }
}

fn node_kind_str(kind: &NodeKind) -> String {
    match kind {
        NodeKind::Junction { .. } => "junction",
        NodeKind::Reservoir { .. } => "reservoir",
        NodeKind::Tank { .. } => "tank",
        NodeKind::Leak { .. } => "leak",
    }
    .to_string()
}

fn link_kind_str(kind: &LinkKind) -> String {
    match kind {
        LinkKind::Pipe { .. } => "pipe",
        LinkKind::Pump { .. } => "pump",
        LinkKind::Valve { .. } => "valve",
    }
    .to_string()
}

/// Velocity in m/s for a pipe at the given flow; 0 for every other link kind.
fn link_velocity_m_s(kind: &LinkKind, flow_cms: f64) -> f64 {
    match kind {
        LinkKind::Pipe { diameter_m, .. } => {
            let area_m2 = std::f64::consts::PI * diameter_m * diameter_m / 4.0;
            if area_m2 > 0.0 {
                flow_cms.abs() / area_m2
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn node_value(net: &NetworkModel, id: NodeId, head_m: f64, actual_demand_cms: f64, t_s: f64) -> NodeValueSnapshot {
    let kind = net.node_kind(id).expect("node id from this network's own graph");
    let pressure_m = kind.elevation_m().map(|elev| head_m - elev).unwrap_or(0.0);
    let required_demand_cms = hydro_network::demand::required_demand(net, id, t_s).unwrap_or(0.0);
    NodeValueSnapshot {
        name: net.node_name(id).unwrap_or_default().to_string(),
        kind: node_kind_str(kind),
        head_m,
        pressure_m,
        required_demand_cms,
        actual_demand_cms,
    }
}

fn link_value(net: &NetworkModel, id: LinkId, flow_cms: f64) -> LinkValueSnapshot {
    let kind = net.link_kind(id).expect("link id from this network's own graph");
    LinkValueSnapshot {
        name: net.link_name(id).unwrap_or_default().to_string(),
        kind: link_kind_str(kind),
        flow_cms,
        velocity_m_s: link_velocity_m_s(kind, flow_cms),
    }
}

/// Convert the EPS driver's per-step node/link maps into the reporting
/// table the results artifact exposes externally.
fn build_results(net: &NetworkModel, record: &EpsRecord) -> RunResults {
    let mut records = Vec::with_capacity(record.steps.len());
    for step in &record.steps {
        let node_values = net
            .graph()
            .nodes()
            .iter()
            .map(|node| {
                let head_m = step.node_head_m.get(&node.id).copied().unwrap_or(0.0);
                let aux = step.node_aux.get(&node.id).copied().unwrap_or(0.0);
                node_value(net, node.id, head_m, aux, step.t_s)
            })
            .collect();
        let link_values = net
            .graph()
            .links()
            .iter()
            .map(|link| {
                let flow_cms = step.link_flow_cms.get(&link.id).copied().unwrap_or(0.0);
                link_value(net, link.id, flow_cms)
            })
            .collect();
        records.push(TimeseriesRecord {
            time_s: step.t_s,
            node_values,
            link_values,
        });
    }
    RunResults::new(records)
}

/// Run a request to completion, persisting the result and returning it.
///
/// `progress_cb` is called once per accepted EPS step plus once at each
/// stage transition; pass `None` for a silent run.
pub fn run(
    request: &RunRequest,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunResponse> {
    let total_start = Instant::now();
    fn emit_stage(
        progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
        stage: RunStage,
        elapsed_wall_s: f64,
        message: Option<String>,
    ) {
        if let Some(cb) = progress_cb.as_deref_mut() {
            cb(RunProgressEvent::stage(stage, elapsed_wall_s, message));
        }
    }

    emit_stage(&mut progress_cb, RunStage::ParsingInput, 0.0, None);
    let parse_start = Instant::now();
    let inp_bytes = std::fs::read(request.inp_path)?;
    let parsed = project_service::load_inp(request.inp_path)?;
    let parse_time_s = parse_start.elapsed().as_secs_f64();

    let dt_s = request
        .options
        .dt_s
        .or(parsed.hydraulic_timestep_s)
        .ok_or_else(|| AppError::InvalidInput("no hydraulic timestep given or found in [TIMES]".to_string()))?;
    let duration_s = request
        .options
        .duration_s
        .or(parsed.duration_s)
        .ok_or_else(|| AppError::InvalidInput("no duration given or found in [TIMES]".to_string()))?;

    let store = RunStore::for_input(request.inp_path)?;
    let run_id = hydro_results::compute_run_id(
        &inp_bytes,
        dt_s,
        duration_s,
        request.options.mode,
        &request.options.solver_version,
    );

    if request.options.use_cache && store.has_run(&run_id) {
        let manifest = store.load_manifest(&run_id)?;
        let results = store.load_results(&run_id)?;
        emit_stage(&mut progress_cb, RunStage::Completed, total_start.elapsed().as_secs_f64(), None);
        return Ok(RunResponse {
            manifest,
            results,
            from_cache: true,
            timing: RunTimingSummary {
                parse_time_s,
                solve_time_s: 0.0,
                save_time_s: 0.0,
                total_time_s: total_start.elapsed().as_secs_f64(),
            },
        });
    }

    let config = ReconcilerConfig::default();
    let eps_opts = EpsOptions {
        dt_s,
        duration_s,
        mode: to_solver_mode(request.options.mode),
    };

    let solve_start = Instant::now();
    let mut eps_cb = |p: EpsProgress| {
        if let Some(cb) = progress_cb.as_deref_mut() {
            cb(RunProgressEvent::from_eps(&p, total_start.elapsed().as_secs_f64()));
        }
    };

    let eps_result = hydro_eps::run_eps_with_progress(
        &parsed.network,
        &config,
        &eps_opts,
        Some(&mut eps_cb),
        None,
    );
    let solve_time_s = solve_start.elapsed().as_secs_f64();

    let timestamp = chrono::Utc::now().to_rfc3339();
    let base_manifest = RunManifest {
        run_id: run_id.clone(),
        input_path: request.inp_path.to_string_lossy().to_string(),
        timestamp,
        dt_s,
        duration_s,
        mode: request.options.mode,
        solver_version: request.options.solver_version.clone(),
        partial: false,
    };

    let save_start = Instant::now();
    let (manifest, results, run_error) = match eps_result {
        Ok(record) => {
            let results = build_results(&parsed.network, &record);
            (base_manifest, results, None)
        }
        Err(EpsError::Step { step, source, partial }) => {
            let results = build_results(&parsed.network, &partial);
            let manifest = RunManifest { partial: true, ..base_manifest };
            let err = EpsError::Step { step, source, partial };
            (manifest, results, Some(err))
        }
        Err(other) => return Err(AppError::from(other)),
    };

    store.save_run(&manifest, &results)?;
    let save_time_s = save_start.elapsed().as_secs_f64();

    if let Some(err) = run_error {
        return Err(AppError::from(err));
    }

    emit_stage(
        &mut progress_cb,
        RunStage::SavingResults,
        total_start.elapsed().as_secs_f64(),
        None,
    );
    emit_stage(
        &mut progress_cb,
        RunStage::Completed,
        total_start.elapsed().as_secs_f64(),
        None,
    );

    Ok(RunResponse {
        manifest,
        results,
        from_cache: false,
        timing: RunTimingSummary {
            parse_time_s,
            solve_time_s,
            save_time_s,
            total_time_s: total_start.elapsed().as_secs_f64(),
        },
    })
}

pub fn list_runs(inp_path: &Path) -> AppResult<Vec<RunManifest>> {
    let store = RunStore::for_input(inp_path)?;
    Ok(store.list_runs(&inp_path.to_string_lossy())?)
}

pub fn load_run(inp_path: &Path, run_id: &str) -> AppResult<RunResponse> {
    let store = RunStore::for_input(inp_path)?;
    let manifest = store.load_manifest(run_id)?;
    let results = store.load_results(run_id)?;
    Ok(RunResponse {
        manifest,
        results,
        from_cache: true,
        timing: RunTimingSummary::default(),
    })
}
