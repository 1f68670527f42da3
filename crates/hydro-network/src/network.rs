//! The network model: a frozen `hydro_graph::Graph` plus typed attribute
//! side-tables, patterns, curves, and controls.

use std::collections::HashMap;

use hydro_core::{CurveId, LinkId, NodeId, PatternId};
use hydro_graph::{Graph, GraphBuilder};

use crate::controls::{Controls, TimeControl, ConditionalControl};
use crate::curve::Curve;
use crate::error::{NetworkError, NetworkResult};
use crate::link::{LinkKind, PipeStatus};
use crate::node::NodeKind;
use crate::pattern::Pattern;

/// Which hydraulic role to filter on, for `nodes_of_kind`/`links_of_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKindTag {
    Junction,
    Reservoir,
    Tank,
    Leak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKindTag {
    Pipe,
    Pump,
    Valve,
}

fn node_kind_tag(k: &NodeKind) -> NodeKindTag {
    match k {
        NodeKind::Junction { .. } => NodeKindTag::Junction,
        NodeKind::Reservoir { .. } => NodeKindTag::Reservoir,
        NodeKind::Tank { .. } => NodeKindTag::Tank,
        NodeKind::Leak { .. } => NodeKindTag::Leak,
    }
}

fn link_kind_tag(k: &LinkKind) -> LinkKindTag {
    match k {
        LinkKind::Pipe { .. } => LinkKindTag::Pipe,
        LinkKind::Pump { .. } => LinkKindTag::Pump,
        LinkKind::Valve { .. } => LinkKindTag::Valve,
    }
}

/// The built, immutable (except via the typed mutators) network.
///
/// Node/link attributes are indexed in parallel with `graph.nodes()`/
/// `graph.links()`: `node_attrs[id.index()]` is the `NodeKind` for node `id`.
#[derive(Debug, Clone)]
pub struct NetworkModel {
    pub(crate) graph: Graph,
    pub(crate) node_attrs: Vec<NodeKind>,
    pub(crate) link_attrs: Vec<LinkKind>,
    pub(crate) patterns: Vec<Pattern>,
    pub(crate) curves: Vec<Curve>,
    pub(crate) name_to_node: HashMap<String, NodeId>,
    pub(crate) name_to_link: HashMap<String, LinkId>,
    pub controls: Controls,
    pub pattern_step_s: f64,
}

impl NetworkModel {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn get_node(&self, name: &str) -> Option<NodeId> {
        self.name_to_node.get(name).copied()
    }

    pub fn get_link(&self, name: &str) -> Option<LinkId> {
        self.name_to_link.get(name).copied()
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.graph.node(id).map(|n| n.name.as_str())
    }

    pub fn link_name(&self, id: LinkId) -> Option<&str> {
        self.graph.link(id).map(|l| l.name.as_str())
    }

    pub fn node_kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node_attrs.get(id.index() as usize)
    }

    pub fn link_kind(&self, id: LinkId) -> Option<&LinkKind> {
        self.link_attrs.get(id.index() as usize)
    }

    pub fn pattern(&self, id: PatternId) -> Option<&Pattern> {
        self.patterns.get(id.index() as usize)
    }

    pub fn curve(&self, id: CurveId) -> Option<&Curve> {
        self.curves.get(id.index() as usize)
    }

    /// All links incident to `node`, regardless of direction (union of
    /// in-edges and out-edges).
    pub fn links_for(&self, node: NodeId) -> Vec<LinkId> {
        self.graph
            .node_ports(node)
            .iter()
            .filter_map(|p| self.graph.port(*p))
            .map(|p| p.link)
            .collect()
    }

    pub fn nodes_of_kind(&self, tag: NodeKindTag) -> impl Iterator<Item = NodeId> + '_ {
        self.graph
            .nodes()
            .iter()
            .enumerate()
            .filter(move |(i, _)| node_kind_tag(&self.node_attrs[*i]) == tag)
            .map(|(_, n)| n.id)
    }

    pub fn links_of_kind(&self, tag: LinkKindTag) -> impl Iterator<Item = LinkId> + '_ {
        self.graph
            .links()
            .iter()
            .enumerate()
            .filter(move |(i, _)| link_kind_tag(&self.link_attrs[*i]) == tag)
            .map(|(_, l)| l.id)
    }

    /// Remove a pipe from the network, returning a new model.
    ///
    /// The underlying graph is frozen once built, so this rebuilds a fresh
    /// one from every node and link except the pipe being removed. Controls
    /// that referenced the removed pipe are dropped. Used during network
    /// preparation, not mid-run: topology is immutable during a run, only
    /// simulation state mutates.
    pub fn remove_pipe(&self, pipe: LinkId) -> NetworkResult<NetworkModel> {
        match self.link_kind(pipe) {
            Some(LinkKind::Pipe { .. }) => {}
            _ => {
                return Err(NetworkError::Invariant {
                    what: "remove_pipe called on a non-pipe link",
                })
            }
        }

        let mut rebuild = Rebuild::new(self);
        rebuild.copy_all_nodes();
        rebuild.copy_all_links_except(&[pipe]);
        rebuild.finish(|link_map, _node_map| {
            rewrite_controls_drop(&self.controls, pipe, link_map)
        })
    }

    /// Split a pipe into two half-pipes joined by a new leak node, per the
    /// data model's `__A`/`__B` suffix convention. Controls referencing the
    /// original pipe are rewritten onto both halves.
    pub fn split_pipe_with_leak(
        &self,
        pipe: LinkId,
        leak_name: &str,
        area_m2: f64,
        discharge_coeff: f64,
    ) -> NetworkResult<NetworkModel> {
        let pipe_name = self
            .link_name(pipe)
            .ok_or_else(|| NetworkError::UnknownLink {
                name: format!("<link {pipe}>"),
            })?
            .to_string();

        let (length_m, diameter_m, hw_coefficient, minor_loss_k, base_status) =
            match self.link_kind(pipe) {
                Some(LinkKind::Pipe {
                    length_m,
                    diameter_m,
                    hw_coefficient,
                    minor_loss_k,
                    base_status,
                }) => (*length_m, *diameter_m, *hw_coefficient, *minor_loss_k, *base_status),
                _ => {
                    return Err(NetworkError::Invariant {
                        what: "split_pipe_with_leak called on a non-pipe link",
                    })
                }
            };

        let from_node = self
            .graph
            .link_from_node(pipe)
            .ok_or(NetworkError::Invariant {
                what: "pipe missing from-node",
            })?;
        let to_node = self
            .graph
            .link_to_node(pipe)
            .ok_or(NetworkError::Invariant {
                what: "pipe missing to-node",
            })?;

        // Elevation for the synthetic leak node: the average of the two
        // endpoints' elevations when both are known, else whichever is
        // known, else 0. The data model calls for "zero elevation offset
        // from the midpoint" without defining "the midpoint's elevation"
        // when endpoints differ; the average is the natural reading for a
        // straight pipe run and keeps the leak's pressure well-defined even
        // when one endpoint is a reservoir (no elevation of its own).
        let elev_from = self.node_kind(from_node).and_then(|k| k.elevation_m());
        let elev_to = self.node_kind(to_node).and_then(|k| k.elevation_m());
        let leak_elevation_m = match (elev_from, elev_to) {
            (Some(a), Some(b)) => (a + b) / 2.0,
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => 0.0,
        };

        let mut rebuild = Rebuild::new(self);
        rebuild.copy_all_nodes();
        rebuild.copy_all_links_except(&[pipe]);

        let leak_node = rebuild.builder.add_node_raw(
            leak_name,
            NodeKind::Leak {
                elevation_m: leak_elevation_m,
                area_m2,
                discharge_coeff,
            },
        );

        let half_a = format!("{pipe_name}__A");
        let half_b = format!("{pipe_name}__B");
        let half_len = length_m / 2.0;

        let id_a = rebuild.builder.add_link_raw(
            &half_a,
            from_node,
            leak_node,
            LinkKind::Pipe {
                length_m: half_len,
                diameter_m,
                hw_coefficient,
                minor_loss_k,
                base_status,
            },
        );
        let id_b = rebuild.builder.add_link_raw(
            &half_b,
            leak_node,
            to_node,
            LinkKind::Pipe {
                length_m: half_len,
                diameter_m,
                hw_coefficient,
                minor_loss_k,
                base_status,
            },
        );

        rebuild.finish(|link_map, _node_map| {
            rewrite_controls_split(&self.controls, pipe, id_a, id_b, link_map)
        })
    }
}

/// Incremental builder for a `NetworkModel`, paralleling `hydro_graph::GraphBuilder`.
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    graph: GraphBuilder,
    node_attrs: Vec<NodeKind>,
    link_attrs: Vec<LinkKind>,
    patterns: Vec<Pattern>,
    curves: Vec<Curve>,
    controls: Controls,
    pattern_step_s: f64,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self {
            pattern_step_s: 3600.0,
            ..Default::default()
        }
    }

    pub fn set_pattern_step_s(&mut self, step_s: f64) {
        self.pattern_step_s = step_s;
    }

    pub fn set_controls(&mut self, controls: Controls) {
        self.controls = controls;
    }

    pub fn add_pattern(&mut self, multipliers: Vec<f64>) -> PatternId {
        let id = PatternId::from_index(self.patterns.len() as u32);
        self.patterns.push(Pattern::new(multipliers));
        id
    }

    pub fn add_curve(&mut self, points: Vec<(f64, f64)>) -> CurveId {
        let id = CurveId::from_index(self.curves.len() as u32);
        self.curves.push(Curve::new(points));
        id
    }

    pub fn add_junction(
        &mut self,
        name: &str,
        elevation_m: f64,
        base_demand_cms: f64,
        pattern: Option<PatternId>,
        p0_m: f64,
        pf_m: f64,
    ) -> NodeId {
        self.add_node_raw(
            name,
            NodeKind::Junction {
                elevation_m,
                base_demand_cms,
                pattern,
                p0_m,
                pf_m,
            },
        )
    }

    pub fn add_reservoir(&mut self, name: &str, head_m: f64, pattern: Option<PatternId>) -> NodeId {
        self.add_node_raw(name, NodeKind::Reservoir { head_m, pattern })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_tank(
        &mut self,
        name: &str,
        elevation_m: f64,
        init_level_m: f64,
        min_level_m: f64,
        max_level_m: f64,
        diameter_m: f64,
        min_vol_m3: f64,
    ) -> NetworkResult<NodeId> {
        if !(min_level_m <= init_level_m && init_level_m <= max_level_m) {
            return Err(NetworkError::BadTankLevels {
                name: name.to_string(),
                min: min_level_m,
                init: init_level_m,
                max: max_level_m,
            });
        }
        Ok(self.add_node_raw(
            name,
            NodeKind::Tank {
                elevation_m,
                init_level_m,
                min_level_m,
                max_level_m,
                diameter_m,
                min_vol_m3,
            },
        ))
    }

    fn add_node_raw(&mut self, name: &str, kind: NodeKind) -> NodeId {
        let id = self.graph.add_node(name);
        self.node_attrs.push(kind);
        id
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_pipe(
        &mut self,
        name: &str,
        from: NodeId,
        to: NodeId,
        length_m: f64,
        diameter_m: f64,
        hw_coefficient: f64,
        minor_loss_k: f64,
        base_status: PipeStatus,
    ) -> LinkId {
        self.add_link_raw(
            name,
            from,
            to,
            LinkKind::Pipe {
                length_m,
                diameter_m,
                hw_coefficient,
                minor_loss_k,
                base_status,
            },
        )
    }

    pub fn add_pump(&mut self, name: &str, from: NodeId, to: NodeId, kind: LinkKind) -> NetworkResult<LinkId> {
        if !kind.is_pump() {
            return Err(NetworkError::Invariant {
                what: "add_pump requires a Pump LinkKind",
            });
        }
        Ok(self.add_link_raw(name, from, to, kind))
    }

    pub fn add_valve(&mut self, name: &str, from: NodeId, to: NodeId, kind: LinkKind) -> NetworkResult<LinkId> {
        if !kind.is_valve() {
            return Err(NetworkError::Invariant {
                what: "add_valve requires a Valve LinkKind",
            });
        }
        Ok(self.add_link_raw(name, from, to, kind))
    }

    fn add_link_raw(&mut self, name: &str, from: NodeId, to: NodeId, kind: LinkKind) -> LinkId {
        let id = self.graph.add_link(name, from, to);
        self.link_attrs.push(kind);
        id
    }

    pub fn build(self) -> NetworkResult<NetworkModel> {
        let graph = self.graph.build()?;

        let mut name_to_node = HashMap::new();
        for node in graph.nodes() {
            name_to_node.insert(node.name.clone(), node.id);
        }
        let mut name_to_link = HashMap::new();
        for link in graph.links() {
            name_to_link.insert(link.name.clone(), link.id);
        }

        Ok(NetworkModel {
            graph,
            node_attrs: self.node_attrs,
            link_attrs: self.link_attrs,
            patterns: self.patterns,
            curves: self.curves,
            name_to_node,
            name_to_link,
            controls: self.controls,
            pattern_step_s: self.pattern_step_s,
        })
    }
}

/// Helper that copies an existing model's nodes/links into a fresh builder,
/// tracking the old->new `LinkId` remap needed to rewrite controls (node IDs
/// never change across a rebuild since no node is ever removed by either
/// typed mutator, only links).
struct Rebuild<'a> {
    source: &'a NetworkModel,
    builder: NetworkBuilder,
    link_map: HashMap<LinkId, LinkId>,
}

impl<'a> Rebuild<'a> {
    fn new(source: &'a NetworkModel) -> Self {
        let mut builder = NetworkBuilder::new();
        builder.patterns = source.patterns.clone();
        builder.curves = source.curves.clone();
        builder.pattern_step_s = source.pattern_step_s;
        Self {
            source,
            builder,
            link_map: HashMap::new(),
        }
    }

    fn copy_all_nodes(&mut self) {
        for node in self.source.graph.nodes() {
            let kind = self.source.node_attrs[node.id.index() as usize].clone();
            self.builder.add_node_raw(&node.name, kind);
        }
    }

    fn copy_all_links_except(&mut self, skip: &[LinkId]) {
        for link in self.source.graph.links() {
            if skip.contains(&link.id) {
                continue;
            }
            let from = self
                .source
                .graph
                .link_from_node(link.id)
                .expect("link has from-node");
            let to = self.source.graph.link_to_node(link.id).expect("link has to-node");
            let kind = self.source.link_attrs[link.id.index() as usize].clone();
            let new_id = self.builder.add_link_raw(&link.name, from, to, kind);
            self.link_map.insert(link.id, new_id);
        }
    }

    fn finish(
        mut self,
        rewrite: impl FnOnce(&HashMap<LinkId, LinkId>, &HashMap<NodeId, NodeId>) -> Controls,
    ) -> NetworkResult<NetworkModel> {
        // Node IDs are preserved identically (same insertion order, nothing
        // skipped), so the node map is the identity -- only needed to keep
        // the rewrite closure's signature uniform.
        let node_map: HashMap<NodeId, NodeId> = self
            .source
            .graph
            .nodes()
            .iter()
            .map(|n| (n.id, n.id))
            .collect();
        let controls = rewrite(&self.link_map, &node_map);
        self.builder.set_controls(controls);
        self.builder.build()
    }
}

fn rewrite_controls_drop(
    controls: &Controls,
    removed: LinkId,
    link_map: &HashMap<LinkId, LinkId>,
) -> Controls {
    let mut out = Controls::new();
    for tc in &controls.time_controls {
        if tc.link == removed {
            continue;
        }
        if let Some(&new_link) = link_map.get(&tc.link) {
            out.time_controls.push(TimeControl { link: new_link, ..*tc });
        }
    }
    for cc in &controls.conditional_controls {
        if cc.link == removed {
            continue;
        }
        if let Some(&new_link) = link_map.get(&cc.link) {
            out.conditional_controls.push(ConditionalControl {
                link: new_link,
                ..*cc
            });
        }
    }
    out
}

fn rewrite_controls_split(
    controls: &Controls,
    split: LinkId,
    half_a: LinkId,
    half_b: LinkId,
    link_map: &HashMap<LinkId, LinkId>,
) -> Controls {
    let mut out = Controls::new();
    for tc in &controls.time_controls {
        if tc.link == split {
            out.time_controls.push(TimeControl { link: half_a, ..*tc });
            out.time_controls.push(TimeControl { link: half_b, ..*tc });
        } else if let Some(&new_link) = link_map.get(&tc.link) {
            out.time_controls.push(TimeControl { link: new_link, ..*tc });
        }
    }
    for cc in &controls.conditional_controls {
        if cc.link == split {
            out.conditional_controls.push(ConditionalControl { link: half_a, ..*cc });
            out.conditional_controls.push(ConditionalControl { link: half_b, ..*cc });
        } else if let Some(&new_link) = link_map.get(&cc.link) {
            out.conditional_controls.push(ConditionalControl {
                link: new_link,
                ..*cc
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::PipeStatus;

    fn sample_network() -> NetworkModel {
        let mut b = NetworkBuilder::new();
        let j1 = b.add_junction("J1", 10.0, 0.01, None, 0.0, 20.0);
        let j2 = b.add_junction("J2", 8.0, 0.02, None, 0.0, 20.0);
        b.add_pipe("P1", j1, j2, 500.0, 0.3, 130.0, 0.0, PipeStatus::Open);
        b.build().unwrap()
    }

    #[test]
    fn get_node_and_link_by_name() {
        let net = sample_network();
        assert!(net.get_node("J1").is_some());
        assert!(net.get_link("P1").is_some());
        assert!(net.get_node("nope").is_none());
    }

    #[test]
    fn links_for_node_returns_incident_links() {
        let net = sample_network();
        let j1 = net.get_node("J1").unwrap();
        assert_eq!(net.links_for(j1).len(), 1);
    }

    #[test]
    fn remove_pipe_drops_the_link() {
        let net = sample_network();
        let p1 = net.get_link("P1").unwrap();
        let net2 = net.remove_pipe(p1).unwrap();
        assert!(net2.get_link("P1").is_none());
        assert!(net2.get_node("J1").is_some());
        assert!(net2.get_node("J2").is_some());
    }

    #[test]
    fn split_pipe_with_leak_creates_two_halves_and_leak_node() {
        let net = sample_network();
        let p1 = net.get_link("P1").unwrap();
        let net2 = net.split_pipe_with_leak(p1, "LK1", 0.001, 0.6).unwrap();

        assert!(net2.get_link("P1").is_none());
        let a = net2.get_link("P1__A").expect("half A exists");
        let b = net2.get_link("P1__B").expect("half B exists");
        let leak = net2.get_node("LK1").expect("leak node exists");

        match net2.link_kind(a).unwrap() {
            LinkKind::Pipe { length_m, .. } => assert!((*length_m - 250.0).abs() < 1e-9),
            _ => panic!("expected pipe"),
        }
        match net2.link_kind(b).unwrap() {
            LinkKind::Pipe { length_m, .. } => assert!((*length_m - 250.0).abs() < 1e-9),
            _ => panic!("expected pipe"),
        }
        match net2.node_kind(leak).unwrap() {
            NodeKind::Leak { elevation_m, .. } => assert!((*elevation_m - 9.0).abs() < 1e-9),
            _ => panic!("expected leak node"),
        }
    }

    #[test]
    fn split_pipe_rewrites_time_controls_onto_both_halves() {
        let mut b = NetworkBuilder::new();
        let j1 = b.add_junction("J1", 10.0, 0.01, None, 0.0, 20.0);
        let j2 = b.add_junction("J2", 8.0, 0.02, None, 0.0, 20.0);
        let p1 = b.add_pipe("P1", j1, j2, 500.0, 0.3, 130.0, 0.0, PipeStatus::Open);
        let mut controls = Controls::new();
        controls.time_controls.push(TimeControl {
            link: p1,
            at_s: 3600.0,
            action: crate::controls::TimeAction::Closed,
        });
        b.set_controls(controls);
        let net = b.build().unwrap();

        let net2 = net.split_pipe_with_leak(p1, "LK1", 0.001, 0.6).unwrap();
        assert_eq!(net2.controls.time_controls.len(), 2);
    }
}
