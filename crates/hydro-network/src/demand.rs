//! Demand & pattern evaluator (C2): required demand and reservoir head at a
//! given simulation time.

use hydro_core::NodeId;

use crate::network::NetworkModel;
use crate::node::NodeKind;

/// `required_demand(j, t) = base_demand(j) * pattern(j)[t]` when the
/// junction has a bound pattern, else just the base demand.
///
/// Demands are non-negative by convention; a negative base demand is
/// preserved as-is and treated as a sink (it's still scaled by the pattern).
/// Returns `None` if `node` isn't a junction.
pub fn required_demand(net: &NetworkModel, node: NodeId, t_s: f64) -> Option<f64> {
    match net.node_kind(node)? {
        NodeKind::Junction {
            base_demand_cms,
            pattern,
            ..
        } => {
            let multiplier = match pattern {
                Some(pid) => net.pattern(*pid).map(|p| p.sample(t_s, net.pattern_step_s)).unwrap_or(1.0),
                None => 1.0,
            };
            Some(base_demand_cms * multiplier)
        }
        _ => None,
    }
}

/// Reservoir head, optionally pattern-modulated, at `t_s`.
///
/// Returns `None` if `node` isn't a reservoir.
pub fn reservoir_head(net: &NetworkModel, node: NodeId, t_s: f64) -> Option<f64> {
    match net.node_kind(node)? {
        NodeKind::Reservoir { head_m, pattern } => {
            let multiplier = match pattern {
                Some(pid) => net.pattern(*pid).map(|p| p.sample(t_s, net.pattern_step_s)).unwrap_or(1.0),
                None => 1.0,
            };
            Some(head_m * multiplier)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::PipeStatus;
    use crate::network::NetworkBuilder;

    #[test]
    fn required_demand_without_pattern_is_base_demand() {
        let mut b = NetworkBuilder::new();
        let j = b.add_junction("J1", 10.0, 0.05, None, 0.0, 20.0);
        let r = b.add_reservoir("R1", 100.0, None);
        b.add_pipe("P1", r, j, 100.0, 0.3, 130.0, 0.0, PipeStatus::Open);
        let net = b.build().unwrap();

        assert_eq!(required_demand(&net, j, 0.0), Some(0.05));
        assert_eq!(required_demand(&net, j, 9999.0), Some(0.05));
    }

    #[test]
    fn required_demand_applies_pattern_multiplier() {
        let mut b = NetworkBuilder::new();
        b.set_pattern_step_s(3600.0);
        let pat = b.add_pattern(vec![1.0, 0.5, 2.0]);
        let j = b.add_junction("J1", 10.0, 0.1, Some(pat), 0.0, 20.0);
        let r = b.add_reservoir("R1", 100.0, None);
        b.add_pipe("P1", r, j, 100.0, 0.3, 130.0, 0.0, PipeStatus::Open);
        let net = b.build().unwrap();

        assert_eq!(required_demand(&net, j, 0.0), Some(0.1));
        assert_eq!(required_demand(&net, j, 3600.0), Some(0.05));
        assert_eq!(required_demand(&net, j, 7200.0), Some(0.2));
    }

    #[test]
    fn reservoir_head_constant_without_pattern() {
        let mut b = NetworkBuilder::new();
        let r = b.add_reservoir("R1", 50.0, None);
        let j = b.add_junction("J1", 10.0, 0.05, None, 0.0, 20.0);
        b.add_pipe("P1", r, j, 100.0, 0.3, 130.0, 0.0, PipeStatus::Open);
        let net = b.build().unwrap();

        assert_eq!(reservoir_head(&net, r, 0.0), Some(50.0));
        assert_eq!(reservoir_head(&net, r, 3600.0), Some(50.0));
    }

    #[test]
    fn required_demand_on_non_junction_is_none() {
        let mut b = NetworkBuilder::new();
        let r = b.add_reservoir("R1", 50.0, None);
        let j = b.add_junction("J1", 10.0, 0.05, None, 0.0, 20.0);
        b.add_pipe("P1", r, j, 100.0, 0.3, 130.0, 0.0, PipeStatus::Open);
        let net = b.build().unwrap();

        assert_eq!(required_demand(&net, r, 0.0), None);
    }
}
