//! Typed node attributes (junctions, reservoirs, tanks, leaks).

use hydro_core::PatternId;

/// The hydraulic role of a node, with the attributes specific to that role.
///
/// The underlying `hydro_graph::Node` only carries an ID and a name; all
/// hydraulic data lives here, one `NodeKind` per graph node, indexed in
/// parallel with `hydro_graph::Graph::nodes()`.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Junction {
        elevation_m: f64,
        base_demand_cms: f64,
        pattern: Option<PatternId>,
        /// Pressure-driven-demand lower shoulder (head above elevation, m).
        p0_m: f64,
        /// Pressure-driven-demand full-delivery head (head above elevation, m).
        pf_m: f64,
    },
    Reservoir {
        head_m: f64,
        pattern: Option<PatternId>,
    },
    Tank {
        elevation_m: f64,
        init_level_m: f64,
        min_level_m: f64,
        max_level_m: f64,
        diameter_m: f64,
        min_vol_m3: f64,
    },
    /// Synthetic node inserted by `split_pipe_with_leak` at a pipe midpoint.
    Leak {
        elevation_m: f64,
        area_m2: f64,
        discharge_coeff: f64,
    },
}

impl NodeKind {
    pub fn is_junction(&self) -> bool {
        matches!(self, NodeKind::Junction { .. })
    }

    pub fn is_reservoir(&self) -> bool {
        matches!(self, NodeKind::Reservoir { .. })
    }

    pub fn is_tank(&self) -> bool {
        matches!(self, NodeKind::Tank { .. })
    }

    pub fn is_leak(&self) -> bool {
        matches!(self, NodeKind::Leak { .. })
    }

    /// Elevation above datum, in meters, for every node kind except reservoirs
    /// (a reservoir is specified directly by head, with no separate elevation).
    pub fn elevation_m(&self) -> Option<f64> {
        match self {
            NodeKind::Junction { elevation_m, .. } => Some(*elevation_m),
            NodeKind::Tank { elevation_m, .. } => Some(*elevation_m),
            NodeKind::Leak { elevation_m, .. } => Some(*elevation_m),
            NodeKind::Reservoir { .. } => None,
        }
    }

    /// `true` for nodes whose head is a fixed boundary condition at every
    /// instant within a trial solve (reservoirs always; tanks are fixed
    /// within a single Newton solve but integrated between steps).
    pub fn is_fixed_head_in_trial(&self) -> bool {
        matches!(self, NodeKind::Reservoir { .. } | NodeKind::Tank { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn junction_elevation() {
        let j = NodeKind::Junction {
            elevation_m: 10.0,
            base_demand_cms: 0.01,
            pattern: None,
            p0_m: 0.0,
            pf_m: 20.0,
        };
        assert_eq!(j.elevation_m(), Some(10.0));
        assert!(j.is_junction());
        assert!(!j.is_fixed_head_in_trial());
    }

    #[test]
    fn reservoir_has_no_elevation() {
        let r = NodeKind::Reservoir {
            head_m: 100.0,
            pattern: None,
        };
        assert_eq!(r.elevation_m(), None);
        assert!(r.is_fixed_head_in_trial());
    }

    #[test]
    fn tank_is_fixed_in_trial() {
        let t = NodeKind::Tank {
            elevation_m: 5.0,
            init_level_m: 2.0,
            min_level_m: 0.5,
            max_level_m: 6.0,
            diameter_m: 10.0,
            min_vol_m3: 0.0,
        };
        assert!(t.is_fixed_head_in_trial());
        assert!(!t.is_junction());
    }
}
