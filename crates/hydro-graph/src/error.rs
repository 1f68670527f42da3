//! Graph-specific error types.

use hydro_core::{HydroError, LinkId, NodeId, PortId};

/// Graph construction and validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A port refers to a node that doesn't exist.
    InvalidNodeRef { port: PortId, node: NodeId },

    /// A port refers to a link that doesn't exist.
    InvalidLinkRef { port: PortId, link: LinkId },

    /// A link has an invalid number of ports (expected 2).
    InvalidPortCount { link: LinkId, count: usize },

    /// A link has duplicate port IDs.
    DuplicatePorts { link: LinkId },

    /// A port's link field doesn't match the link containing it.
    PortLinkMismatch {
        port: PortId,
        expected: LinkId,
        actual: LinkId,
    },

    /// Adjacency list is inconsistent (port in node's list but port doesn't reference node).
    InconsistentAdjacency { port: PortId, node: NodeId },

    /// ID not found in index map.
    IdNotFound { what: &'static str },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::InvalidNodeRef { port, node } => {
                write!(f, "Port {} refers to non-existent node {}", port, node)
            }
            GraphError::InvalidLinkRef { port, link } => {
                write!(f, "Port {} refers to non-existent link {}", port, link)
            }
            GraphError::InvalidPortCount { link, count } => {
                write!(f, "Link {} has {} ports (expected 2)", link, count)
            }
            GraphError::DuplicatePorts { link } => {
                write!(f, "Link {} has duplicate port IDs", link)
            }
            GraphError::PortLinkMismatch {
                port,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Port {} should belong to link {} but references {}",
                    port, expected, actual
                )
            }
            GraphError::InconsistentAdjacency { port, node } => {
                write!(
                    f,
                    "Port {} in node {}'s adjacency list but doesn't reference that node",
                    port, node
                )
            }
            GraphError::IdNotFound { what } => {
                write!(f, "{} not found in index map", what)
            }
        }
    }
}

impl std::error::Error for GraphError {}

impl From<GraphError> for HydroError {
    fn from(err: GraphError) -> Self {
        HydroError::Invariant {
            what: Box::leak(err.to_string().into_boxed_str()),
        }
    }
}
