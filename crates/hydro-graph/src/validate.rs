//! Graph validation logic.

use std::collections::HashSet;
use hydro_core::{HydroResult, NodeId, PortId};

use crate::error::GraphError;
use crate::graph::{Link, Node, Port};

/// Validate the graph structure: all references exist, ports are consistent, etc.
pub(crate) fn validate_structure(nodes: &[Node], links: &[Link], ports: &[Port]) -> HydroResult<()> {
    for (i, port) in ports.iter().enumerate() {
        if port.id.index() as usize != i {
            return Err(GraphError::InconsistentAdjacency {
                port: port.id,
                node: port.node,
            }
            .into());
        }
    }

    for port in ports {
        if port.node.index() as usize >= nodes.len() {
            return Err(GraphError::InvalidNodeRef {
                port: port.id,
                node: port.node,
            }
            .into());
        }
    }

    for port in ports {
        if port.link.index() as usize >= links.len() {
            return Err(GraphError::InvalidLinkRef {
                port: port.id,
                link: port.link,
            }
            .into());
        }
    }

    for link in links {
        if link.ports.len() != 2 {
            return Err(GraphError::InvalidPortCount {
                link: link.id,
                count: link.ports.len(),
            }
            .into());
        }

        if link.ports[0] == link.ports[1] {
            return Err(GraphError::DuplicatePorts { link: link.id }.into());
        }

        for &port_id in &link.ports {
            if port_id.index() as usize >= ports.len() {
                return Err(GraphError::InvalidLinkRef {
                    port: port_id,
                    link: link.id,
                }
                .into());
            }
            let port = &ports[port_id.index() as usize];
            if port.link != link.id {
                return Err(GraphError::PortLinkMismatch {
                    port: port_id,
                    expected: link.id,
                    actual: port.link,
                }
                .into());
            }
        }
    }

    Ok(())
}

/// Validate adjacency lists for consistency.
pub(crate) fn validate_adjacency(
    nodes: &[Node],
    ports: &[Port],
    node_port_offsets: &[usize],
    node_ports: &[PortId],
) -> HydroResult<()> {
    if node_port_offsets.len() != nodes.len() + 1 {
        return Err(GraphError::InconsistentAdjacency {
            port: PortId::from_index(0),
            node: nodes.first().map_or(NodeId::from_index(0), |n| n.id),
        }
        .into());
    }

    for node in nodes {
        let idx = node.id.index() as usize;
        let start = node_port_offsets[idx];
        let end = node_port_offsets[idx + 1];

        for &port_id in &node_ports[start..end] {
            if port_id.index() as usize >= ports.len() {
                return Err(GraphError::InconsistentAdjacency {
                    port: port_id,
                    node: node.id,
                }
                .into());
            }

            let port = &ports[port_id.index() as usize];
            if port.node != node.id {
                return Err(GraphError::InconsistentAdjacency {
                    port: port_id,
                    node: node.id,
                }
                .into());
            }
        }
    }

    let mut ports_in_adj: HashSet<PortId> = HashSet::new();
    for &port_id in node_ports {
        if !ports_in_adj.insert(port_id) {
            return Err(GraphError::InconsistentAdjacency {
                port: port_id,
                node: ports[port_id.index() as usize].node,
            }
            .into());
        }
    }

    for port in ports {
        if !ports_in_adj.contains(&port.id) {
            return Err(GraphError::InconsistentAdjacency {
                port: port.id,
                node: port.node,
            }
            .into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PortKind;
    use hydro_core::Id;

    #[test]
    fn validate_empty_graph() {
        let nodes = vec![];
        let links = vec![];
        let ports = vec![];
        assert!(validate_structure(&nodes, &links, &ports).is_ok());
    }

    #[test]
    fn validate_invalid_node_ref() {
        let nodes = vec![Node {
            id: Id::from_index(0),
            name: "N1".into(),
        }];
        let links = vec![];
        let ports = vec![Port {
            id: Id::from_index(0),
            link: Id::from_index(0),
            node: Id::from_index(99),
            kind: PortKind::From,
        }];

        let result = validate_structure(&nodes, &links, &ports);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            hydro_core::HydroError::Invariant { .. }
        ));
    }

    #[test]
    fn validate_link_port_mismatch() {
        let nodes = vec![
            Node {
                id: Id::from_index(0),
                name: "N1".into(),
            },
            Node {
                id: Id::from_index(1),
                name: "N2".into(),
            },
        ];
        let ports = vec![
            Port {
                id: Id::from_index(0),
                link: Id::from_index(0),
                node: Id::from_index(0),
                kind: PortKind::From,
            },
            Port {
                id: Id::from_index(1),
                link: Id::from_index(999),
                node: Id::from_index(1),
                kind: PortKind::To,
            },
        ];
        let links = vec![Link {
            id: Id::from_index(0),
            name: "L1".into(),
            ports: [Id::from_index(0), Id::from_index(1)],
        }];

        let result = validate_structure(&nodes, &links, &ports);
        assert!(result.is_err());
    }
}
