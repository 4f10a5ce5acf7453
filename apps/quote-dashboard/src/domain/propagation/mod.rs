//! Propagation Engine
//!
//! A directed acyclic dataflow graph of named nodes with cached values.
//!
//! # Design
//!
//! - **Leaves** are written from outside, in batches. All writes of a batch
//!   land before any recomputation starts.
//! - **Derived nodes** are pure functions of their dependencies. After a
//!   batch, the engine walks forward over dependents in topological rank
//!   order, so every node is recomputed at most once per batch even when it
//!   is reachable through several paths.
//! - A recomputed value equal to the cached one stops propagation along that
//!   path and produces no notification.
//! - Subscribers get the current value immediately, then one update per
//!   batch in which their node changed. Updates of a batch are sent after the
//!   whole batch has settled.
//!
//! The engine is generic over the node key and value types; the dashboard
//! graph is one instantiation.

mod graph;
mod subscription;

pub use graph::{BatchOutcome, ComputeFn, GraphBuilder, PropagationGraph};
pub use subscription::{NodeUpdate, Subscription, SubscriptionId};

/// Errors raised while building or writing to a graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Two nodes registered under the same key.
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    /// A derived node depends on a key that was never registered.
    #[error("node {node} depends on unknown node {dependency}")]
    UnknownDependency {
        /// The node declaring the dependency.
        node: String,
        /// The missing dependency.
        dependency: String,
    },

    /// The dependency relation contains a cycle.
    #[error("dependency cycle through: {}", .0.join(", "))]
    Cycle(Vec<String>),

    /// Lookup of a key the graph does not contain.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// Attempted to write a derived node.
    #[error("node {0} is derived and cannot be written")]
    NotALeaf(String),
}
