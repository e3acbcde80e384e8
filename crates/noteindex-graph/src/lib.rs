//! # Link Graph
//!
//! Directed graph of notes and the references between them, maintained
//! incrementally as notes are saved, moved and deleted.
//!
//! ## Core Concepts
//!
//! - **Nodes**: stored notes, plus placeholder nodes for internal references
//!   that match no note
//! - **Edges**: one per resolved or dangling internal reference, labelled with
//!   the link kind and the literal target text
//! - **Deltas**: [`GraphDelta::between`] diffs a note's old and new link sets
//!   without any I/O; [`LinkGraph::apply`] applies the result
//!
//! Deleting a note keeps the edges that pointed at it, now targeting a
//! placeholder. Unresolved links are re-resolved only when their source note
//! is saved again or the graph is rebuilt.
//!
//! ## Quick Start
//!
//! ```
//! use noteindex_graph::LinkGraph;
//! use noteindex_core::{Link, LinkKind, LinkTarget, PathValidator};
//!
//! let a = PathValidator::note("a").unwrap();
//! let b = PathValidator::note("b").unwrap();
//!
//! let mut graph = LinkGraph::new();
//! graph.upsert_note(&b, vec![]);
//! graph.upsert_note(&a, vec![Link::new("b", LinkTarget::Resolved(b.clone()), LinkKind::Internal)]);
//! assert_eq!(graph.backlinks(&b).unwrap(), vec![a]);
//! ```

pub mod delta;
pub mod graph;

pub use delta::GraphDelta;
pub use graph::{GraphNode, GraphSnapshot, GraphStats, LinkGraph, NodeKind, SnapshotEdge, SnapshotNode};

pub mod prelude {
    pub use crate::delta::GraphDelta;
    pub use crate::graph::{GraphSnapshot, GraphStats, LinkGraph};
}
