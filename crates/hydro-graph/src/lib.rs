//! hydro-graph: two-port component graph layer for the network model.
//!
//! Provides:
//! - Core graph data structures (Node, Link, Port, Graph)
//! - Incremental graph builder with validation
//! - Stable indexing for solver integration
//!
//! # Example
//!
//! ```
//! use hydro_graph::GraphBuilder;
//!
//! let mut builder = GraphBuilder::new();
//! let n1 = builder.add_node("J1");
//! let n2 = builder.add_node("J2");
//! let l1 = builder.add_link("P1", n1, n2);
//! let graph = builder.build().unwrap();
//!
//! assert_eq!(graph.nodes().len(), 2);
//! assert_eq!(graph.links().len(), 1);
//! ```

pub mod builder;
pub mod error;
pub mod graph;
pub mod indexing;
pub(crate) mod validate;

// Re-exports for ergonomics
pub use builder::GraphBuilder;
pub use error::GraphError;
pub use graph::{Graph, Link, Node, Port, PortKind};
pub use indexing::IndexMap;
