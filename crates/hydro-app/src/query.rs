//! Query helpers for extracting data from a loaded run's results.

use hydro_results::{RunResults, TimeseriesRecord};

use crate::error::{AppError, AppResult};

/// Summary of a run's time range and the node/link count it reported.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub time_range: (f64, f64),
    pub record_count: usize,
    pub node_count: usize,
    pub link_count: usize,
}

pub fn get_run_summary(results: &RunResults) -> AppResult<RunSummary> {
    let first = results
        .records
        .first()
        .ok_or_else(|| AppError::InvalidInput("run has no recorded steps".to_string()))?;
    let last = results.records.last().unwrap_or(first);

    Ok(RunSummary {
        time_range: (first.time_s, last.time_s),
        record_count: results.records.len(),
        node_count: first.node_values.len(),
        link_count: first.link_values.len(),
    })
}

pub fn list_node_names(results: &RunResults) -> Vec<String> {
    results
        .records
        .first()
        .map(|r| r.node_values.iter().map(|n| n.name.clone()).collect())
        .unwrap_or_default()
}

pub fn list_link_names(results: &RunResults) -> Vec<String> {
    results
        .records
        .first()
        .map(|r| r.link_values.iter().map(|l| l.name.clone()).collect())
        .unwrap_or_default()
}

/// Extract a node variable's time series by name.
///
/// `variable` is one of `head`, `pressure`, `required_demand`,
/// `actual_demand`.
pub fn extract_node_series(
    results: &RunResults,
    node_name: &str,
    variable: &str,
) -> AppResult<Vec<(f64, f64)>> {
    let mut series = Vec::new();
    for (t_s, snapshot) in results.node_series(node_name) {
        let value = match variable {
            "head" | "head_m" => snapshot.head_m,
            "pressure" | "pressure_m" => snapshot.pressure_m,
            "required_demand" | "required_demand_cms" => snapshot.required_demand_cms,
            "actual_demand" | "actual_demand_cms" => snapshot.actual_demand_cms,
            other => {
                return Err(AppError::InvalidInput(format!(
                    "unknown node variable: {other}"
                )))
            }
        };
        series.push((t_s, value));
    }
    if series.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "no such node in run: {node_name}"
        )));
    }
    Ok(series)
}

/// Extract a link variable's time series by name.
///
/// `variable` is one of `flow`, `velocity`.
pub fn extract_link_series(
    results: &RunResults,
    link_name: &str,
    variable: &str,
) -> AppResult<Vec<(f64, f64)>> {
    let mut series = Vec::new();
    for (t_s, snapshot) in results.link_series(link_name) {
        let value = match variable {
            "flow" | "flow_cms" => snapshot.flow_cms,
            "velocity" | "velocity_m_s" => snapshot.velocity_m_s,
            other => {
                return Err(AppError::InvalidInput(format!(
                    "unknown link variable: {other}"
                )))
            }
        };
        series.push((t_s, value));
    }
    if series.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "no such link in run: {link_name}"
        )));
    }
    Ok(series)
}
