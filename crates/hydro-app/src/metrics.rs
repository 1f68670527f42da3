//! Run-level service metrics: summary statistics over a completed run's
//! node time series, built around the average fraction of demand met.

use serde::{Deserialize, Serialize};

use hydro_results::RunResults;

/// Service-level summary for one run, computed across every junction that
/// has a nonzero required demand at any reporting step.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceMetrics {
    /// Mean of `actual_demand / required_demand` across all (junction, step)
    /// pairs with nonzero required demand. `None` if no such pair exists.
    pub avg_fraction_demand_met: Option<f64>,
    /// Minimum pressure observed across every node and step.
    pub min_pressure_m: Option<f64>,
    /// Maximum pressure observed across every node and step.
    pub max_pressure_m: Option<f64>,
    /// Number of (junction, step) pairs where actual demand fell short of
    /// required demand by more than a millimeter^3/s-scale tolerance.
    pub undersupplied_steps: usize,
}

const DEMAND_SHORTFALL_TOL_CMS: f64 = 1e-6;

/// Compute [`ServiceMetrics`] over every reporting step in `results`.
pub fn compute_service_metrics(results: &RunResults) -> ServiceMetrics {
    let mut fraction_sum = 0.0;
    let mut fraction_count = 0usize;
    let mut min_pressure_m: Option<f64> = None;
    let mut max_pressure_m: Option<f64> = None;
    let mut undersupplied_steps = 0usize;

    for record in &results.records {
        for node in &record.node_values {
            min_pressure_m = Some(min_pressure_m.map_or(node.pressure_m, |m| m.min(node.pressure_m)));
            max_pressure_m = Some(max_pressure_m.map_or(node.pressure_m, |m| m.max(node.pressure_m)));

            if node.required_demand_cms > 0.0 {
                fraction_sum += node.actual_demand_cms / node.required_demand_cms;
                fraction_count += 1;
                if node.required_demand_cms - node.actual_demand_cms > DEMAND_SHORTFALL_TOL_CMS {
                    undersupplied_steps += 1;
                }
            }
        }
    }

    ServiceMetrics {
        avg_fraction_demand_met: (fraction_count > 0).then(|| fraction_sum / fraction_count as f64),
        min_pressure_m,
        max_pressure_m,
        undersupplied_steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydro_results::{LinkValueSnapshot, NodeValueSnapshot, TimeseriesRecord};

    fn record(required: f64, actual: f64, pressure: f64) -> TimeseriesRecord {
        TimeseriesRecord {
            time_s: 0.0,
            node_values: vec![NodeValueSnapshot {
                name: "J1".to_string(),
                kind: "junction".to_string(),
                head_m: 0.0,
                pressure_m: pressure,
                required_demand_cms: required,
                actual_demand_cms: actual,
            }],
            link_values: vec![LinkValueSnapshot {
                name: "P1".to_string(),
                kind: "pipe".to_string(),
                flow_cms: 0.0,
                velocity_m_s: 0.0,
            }],
        }
    }

    #[test]
    fn full_service_gives_fraction_one() {
        let results = RunResults::new(vec![record(0.01, 0.01, 40.0), record(0.02, 0.02, 35.0)]);
        let metrics = compute_service_metrics(&results);
        assert_eq!(metrics.avg_fraction_demand_met, Some(1.0));
        assert_eq!(metrics.undersupplied_steps, 0);
        assert_eq!(metrics.min_pressure_m, Some(35.0));
        assert_eq!(metrics.max_pressure_m, Some(40.0));
    }

    #[test]
    fn partial_service_is_fractional_and_flagged() {
        let results = RunResults::new(vec![record(0.02, 0.01, 5.0)]);
        let metrics = compute_service_metrics(&results);
        assert_eq!(metrics.avg_fraction_demand_met, Some(0.5));
        assert_eq!(metrics.undersupplied_steps, 1);
    }

    #[test]
    fn zero_demand_nodes_are_excluded() {
        let results = RunResults::new(vec![record(0.0, 0.0, 10.0)]);
        let metrics = compute_service_metrics(&results);
        assert_eq!(metrics.avg_fraction_demand_met, None);
        assert_eq!(metrics.undersupplied_steps, 0);
    }
}
