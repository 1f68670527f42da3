//! Core graph data structures.

use hydro_core::{LinkId, NodeId, PortId};

/// Direction/kind of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    /// "From" port (start of the link, in EPANET terms).
    From,
    /// "To" port (end of the link).
    To,
}

/// A node in the network graph (a junction, reservoir, or tank).
///
/// Nodes are minimal here: they hold no hydraulic data, just an ID and a
/// name for human reference. The typed attributes (elevation, demand,
/// tank geometry, ...) live one layer up in `hydro-network`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
}

/// A port connects a link to a node.
///
/// Each link has exactly 2 ports (from, to). Each port references its
/// owning link, its connected node, and its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub id: PortId,
    pub link: LinkId,
    pub node: NodeId,
    pub kind: PortKind,
}

/// A link represents a pipe, pump, or valve connecting two nodes.
///
/// Each link has exactly 2 ports: one "from" and one "to".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    /// Exactly 2 ports: [from_port_id, to_port_id].
    pub ports: [PortId; 2],
}

impl Link {
    /// Get the "from" port ID.
    pub fn from_port(&self) -> PortId {
        self.ports[0]
    }

    /// Get the "to" port ID.
    pub fn to_port(&self) -> PortId {
        self.ports[1]
    }
}

/// The graph: a validated, immutable collection of nodes, links, and ports.
///
/// The graph stores:
/// - All nodes, links, and ports in vectors (indexed by their IDs).
/// - Compact adjacency: for each node, which ports are incident.
///
/// This structure is optimized for solver indexing: the equation assembler
/// walks `node_ports` to build each node's mass-balance row.
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) links: Vec<Link>,
    pub(crate) ports: Vec<Port>,

    /// Offsets for node->port adjacency: node i's ports are in node_ports[node_port_offsets[i]..node_port_offsets[i+1]].
    pub(crate) node_port_offsets: Vec<usize>,

    /// Flat list of port IDs incident to nodes (sorted by node ID then port ID for determinism).
    pub(crate) node_ports: Vec<PortId>,
}

impl Graph {
    /// Return all nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return all links.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Return all ports.
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Get a node by ID (returns None if ID out of bounds).
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index() as usize)
    }

    /// Get a link by ID (returns None if ID out of bounds).
    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.index() as usize)
    }

    /// Get a port by ID (returns None if ID out of bounds).
    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.get(id.index() as usize)
    }

    /// Iterate over all port IDs incident to a given node.
    pub fn node_ports(&self, node_id: NodeId) -> &[PortId] {
        let idx = node_id.index() as usize;
        if idx >= self.nodes.len() {
            return &[];
        }
        let start = self.node_port_offsets[idx];
        let end = self.node_port_offsets[idx + 1];
        &self.node_ports[start..end]
    }

    /// Get the "from" node of a link.
    pub fn link_from_node(&self, link_id: LinkId) -> Option<NodeId> {
        let link = self.link(link_id)?;
        let port = self.port(link.from_port())?;
        Some(port.node)
    }

    /// Get the "to" node of a link.
    pub fn link_to_node(&self, link_id: LinkId) -> Option<NodeId> {
        let link = self.link(link_id)?;
        let port = self.port(link.to_port())?;
        Some(port.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydro_core::Id;

    #[test]
    fn port_kind_equality() {
        assert_eq!(PortKind::From, PortKind::From);
        assert_ne!(PortKind::From, PortKind::To);
    }

    #[test]
    fn link_accessors() {
        let link = Link {
            id: Id::from_index(0),
            name: "Test".into(),
            ports: [Id::from_index(10), Id::from_index(11)],
        };
        assert_eq!(link.from_port().index(), 10);
        assert_eq!(link.to_port().index(), 11);
    }
}
