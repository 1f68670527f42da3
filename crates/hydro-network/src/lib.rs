//! hydro-network: the typed network model (C1) and demand/pattern evaluator
//! (C2).
//!
//! Wraps a frozen `hydro_graph::Graph` with typed node/link attributes
//! (`NodeKind`/`LinkKind`), pattern and curve tables, controls, and the
//! per-step discrete simulation state the reconciler mutates.

pub mod controls;
pub mod curve;
pub mod demand;
pub mod error;
pub mod link;
pub mod network;
pub mod node;
pub mod pattern;
pub mod state;

pub use controls::{Comparator, ConditionalControl, Controls, TimeAction, TimeControl};
pub use curve::Curve;
pub use error::{NetworkError, NetworkResult};
pub use link::{LinkKind, PipeStatus, PumpMode, ValveKind};
pub use network::{LinkKindTag, NetworkBuilder, NetworkModel, NodeKindTag};
pub use node::NodeKind;
pub use pattern::Pattern;
pub use state::{SimState, ValveMode};
