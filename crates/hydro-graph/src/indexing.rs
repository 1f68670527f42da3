//! Stable indexing for solver integration.
//!
//! Provides bidirectional mappings between domain IDs (NodeId, LinkId, PortId)
//! and contiguous solver indices (0..N).

use hydro_core::{HydroResult, LinkId, NodeId, PortId};

use crate::error::GraphError;
use crate::graph::Graph;

/// Index map providing stable, contiguous indices for graph objects.
///
/// This is used by the solver to map graph entities to contiguous arrays/
/// vectors (the unknown-vector layout and the Jacobian row/column order).
/// Provides O(1) bidirectional lookup between IDs and indices.
#[derive(Debug, Clone)]
pub struct IndexMap {
    /// Contiguous list of node IDs (index -> NodeId).
    node_ids: Vec<NodeId>,

    /// Contiguous list of link IDs (index -> LinkId).
    link_ids: Vec<LinkId>,

    /// Contiguous list of port IDs (index -> PortId).
    port_ids: Vec<PortId>,

    /// Reverse lookup: NodeId -> index.
    node_to_idx: Vec<Option<usize>>,

    /// Reverse lookup: LinkId -> index.
    link_to_idx: Vec<Option<usize>>,

    /// Reverse lookup: PortId -> index.
    port_to_idx: Vec<Option<usize>>,
}

impl IndexMap {
    /// Build an index map from a graph.
    pub fn from_graph(graph: &Graph) -> Self {
        let nodes = graph.nodes();
        let links = graph.links();
        let ports = graph.ports();

        let node_ids: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
        let link_ids: Vec<LinkId> = links.iter().map(|c| c.id).collect();
        let port_ids: Vec<PortId> = ports.iter().map(|p| p.id).collect();

        let max_node_idx = node_ids
            .iter()
            .map(|id| id.index() as usize)
            .max()
            .unwrap_or(0);
        let max_link_idx = link_ids
            .iter()
            .map(|id| id.index() as usize)
            .max()
            .unwrap_or(0);
        let max_port_idx = port_ids
            .iter()
            .map(|id| id.index() as usize)
            .max()
            .unwrap_or(0);

        let mut node_to_idx = vec![None; max_node_idx + 1];
        let mut link_to_idx = vec![None; max_link_idx + 1];
        let mut port_to_idx = vec![None; max_port_idx + 1];

        for (i, &id) in node_ids.iter().enumerate() {
            node_to_idx[id.index() as usize] = Some(i);
        }
        for (i, &id) in link_ids.iter().enumerate() {
            link_to_idx[id.index() as usize] = Some(i);
        }
        for (i, &id) in port_ids.iter().enumerate() {
            port_to_idx[id.index() as usize] = Some(i);
        }

        Self {
            node_ids,
            link_ids,
            port_ids,
            node_to_idx,
            link_to_idx,
            port_to_idx,
        }
    }

    /// Number of nodes in the index.
    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    /// Number of links in the index.
    pub fn link_count(&self) -> usize {
        self.link_ids.len()
    }

    /// Number of ports in the index.
    pub fn port_count(&self) -> usize {
        self.port_ids.len()
    }

    /// Get the contiguous index for a node ID.
    pub fn node_idx(&self, id: NodeId) -> HydroResult<usize> {
        let idx = id.index() as usize;
        self.node_to_idx
            .get(idx)
            .and_then(|&opt| opt)
            .ok_or_else(|| GraphError::IdNotFound { what: "NodeId" }.into())
    }

    /// Get the contiguous index for a link ID.
    pub fn link_idx(&self, id: LinkId) -> HydroResult<usize> {
        let idx = id.index() as usize;
        self.link_to_idx
            .get(idx)
            .and_then(|&opt| opt)
            .ok_or_else(|| GraphError::IdNotFound { what: "LinkId" }.into())
    }

    /// Get the contiguous index for a port ID.
    pub fn port_idx(&self, id: PortId) -> HydroResult<usize> {
        let idx = id.index() as usize;
        self.port_to_idx
            .get(idx)
            .and_then(|&opt| opt)
            .ok_or_else(|| GraphError::IdNotFound { what: "PortId" }.into())
    }

    /// Get the node ID for a contiguous index (panics if out of bounds).
    pub fn node_id(&self, i: usize) -> NodeId {
        self.node_ids[i]
    }

    /// Get the link ID for a contiguous index (panics if out of bounds).
    pub fn link_id(&self, i: usize) -> LinkId {
        self.link_ids[i]
    }

    /// Get the port ID for a contiguous index (panics if out of bounds).
    pub fn port_id(&self, i: usize) -> PortId {
        self.port_ids[i]
    }

    /// Iterate over all node IDs in index order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    /// Iterate over all link IDs in index order.
    pub fn link_ids(&self) -> &[LinkId] {
        &self.link_ids
    }

    /// Iterate over all port IDs in index order.
    pub fn port_ids(&self) -> &[PortId] {
        &self.port_ids
    }
}
