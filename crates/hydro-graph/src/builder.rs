//! Incremental graph builder.

use std::collections::HashMap;
use hydro_core::{HydroResult, LinkId, NodeId, PortId};

use crate::graph::{Graph, Link, Node, Port, PortKind};
use crate::validate;

/// Builder for constructing a graph incrementally.
///
/// Use `add_node` and `add_link` to build up the graph, then call `build()`
/// to validate and freeze it into an immutable `Graph`.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    links: Vec<Link>,
    ports: Vec<Port>,
    next_node_id: u32,
    next_link_id: u32,
    next_port_id: u32,
}

impl GraphBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph and return its ID.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId::from_index(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.push(Node {
            id,
            name: name.into(),
        });
        id
    }

    /// Add a link with "from" and "to" nodes.
    ///
    /// Automatically creates two ports (from, to) and attaches them to the
    /// nodes. Returns the link ID.
    pub fn add_link(&mut self, name: impl Into<String>, from_node: NodeId, to_node: NodeId) -> LinkId {
        let link_id = LinkId::from_index(self.next_link_id);
        self.next_link_id += 1;

        let from_port_id = PortId::from_index(self.next_port_id);
        self.next_port_id += 1;
        self.ports.push(Port {
            id: from_port_id,
            link: link_id,
            node: from_node,
            kind: PortKind::From,
        });

        let to_port_id = PortId::from_index(self.next_port_id);
        self.next_port_id += 1;
        self.ports.push(Port {
            id: to_port_id,
            link: link_id,
            node: to_node,
            kind: PortKind::To,
        });

        self.links.push(Link {
            id: link_id,
            name: name.into(),
            ports: [from_port_id, to_port_id],
        });

        link_id
    }

    /// Rename a node (useful for post-construction adjustments).
    pub fn rename_node(&mut self, node_id: NodeId, new_name: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(node_id.index() as usize) {
            node.name = new_name.into();
        }
    }

    /// Rename a link (useful for post-construction adjustments).
    pub fn rename_link(&mut self, link_id: LinkId, new_name: impl Into<String>) {
        if let Some(link) = self.links.get_mut(link_id.index() as usize) {
            link.name = new_name.into();
        }
    }

    /// Build and validate the graph, returning an immutable `Graph`.
    ///
    /// This performs validation and constructs compact adjacency lists.
    pub fn build(self) -> HydroResult<Graph> {
        validate::validate_structure(&self.nodes, &self.links, &self.ports)?;

        let (node_port_offsets, node_ports) = Self::build_adjacency(&self.nodes, &self.ports);

        validate::validate_adjacency(&self.nodes, &self.ports, &node_port_offsets, &node_ports)?;

        Ok(Graph {
            nodes: self.nodes,
            links: self.links,
            ports: self.ports,
            node_port_offsets,
            node_ports,
        })
    }

    /// Build compact adjacency lists: for each node, collect its incident ports.
    fn build_adjacency(nodes: &[Node], ports: &[Port]) -> (Vec<usize>, Vec<PortId>) {
        let mut node_to_ports: HashMap<NodeId, Vec<PortId>> = HashMap::new();
        for port in ports {
            node_to_ports.entry(port.node).or_default().push(port.id);
        }

        for ports_list in node_to_ports.values_mut() {
            ports_list.sort_by_key(|p| p.index());
        }

        let mut offsets = Vec::with_capacity(nodes.len() + 1);
        let mut flat_ports = Vec::new();
        offsets.push(0);

        for node in nodes {
            if let Some(ports_list) = node_to_ports.get(&node.id) {
                flat_ports.extend_from_slice(ports_list);
            }
            offsets.push(flat_ports.len());
        }

        (offsets, flat_ports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_basic() {
        let mut builder = GraphBuilder::new();
        let n1 = builder.add_node("J1");
        let n2 = builder.add_node("J2");
        let l1 = builder.add_link("P1", n1, n2);

        assert_eq!(n1.index(), 0);
        assert_eq!(n2.index(), 1);
        assert_eq!(l1.index(), 0);
        assert_eq!(builder.nodes.len(), 2);
        assert_eq!(builder.links.len(), 1);
        assert_eq!(builder.ports.len(), 2);
    }

    #[test]
    fn builder_rename() {
        let mut builder = GraphBuilder::new();
        let n1 = builder.add_node("Old");
        builder.rename_node(n1, "New");
        assert_eq!(builder.nodes[0].name, "New");

        let n2 = builder.add_node("N2");
        let l1 = builder.add_link("OldLink", n1, n2);
        builder.rename_link(l1, "NewLink");
        assert_eq!(builder.links[0].name, "NewLink");
    }

    #[test]
    fn builder_build_simple() {
        let mut builder = GraphBuilder::new();
        let n1 = builder.add_node("N1");
        let n2 = builder.add_node("N2");
        builder.add_link("L1", n1, n2);

        let graph = builder.build().unwrap();
        assert_eq!(graph.nodes().len(), 2);
        assert_eq!(graph.links().len(), 1);
        assert_eq!(graph.ports().len(), 2);

        let n1_ports = graph.node_ports(n1);
        assert_eq!(n1_ports.len(), 1);
        let n2_ports = graph.node_ports(n2);
        assert_eq!(n2_ports.len(), 1);
    }
}
