//! Atlas Graph - Relationship graph views and traversal
//!
//! This crate stores project relationships in a graph and walks them
//! through views: a view fixes the roots, the acceptance filter, the version
//! mediation strategy and the provenance in scope, and every traversal of the
//! same view over the same storage gives the same answer.
//!
//! # Architecture
//!
//! - [`codec`] maps relationships to and from stored edge records
//! - [`RelationshipGraph`] holds those records in a petgraph graph
//! - [`ViewConnection`] scopes the graph to a [`ViewParams`]
//! - [`GraphMutator`]s mediate versions, [`MembershipEvaluator`] drives
//!   acceptance and [`walk`] ties them into a breadth-first traversal
//! - [`GraphStore`] persists graphs per workspace
//!
//! # Example
//!
//! ```
//! use atlas_core::{DependencyRelationship, DependencyScope, ProjectRelationship, ProjectVersionRef};
//! use atlas_graph::{walk, Direction, FilteringTraversal, Provenance, RelationshipGraph, ViewParams};
//! use std::sync::Arc;
//!
//! let app: ProjectVersionRef = "org.example:app:1.0".parse().unwrap();
//! let lib: ProjectVersionRef = "org.example:lib:2.0".parse().unwrap();
//! let rel: ProjectRelationship =
//!     DependencyRelationship::new(app.clone(), lib.as_artifact("jar"), DependencyScope::Compile, 0, false)
//!         .into();
//!
//! let mut graph = RelationshipGraph::new();
//! graph.add_relationship(&rel, Provenance::default());
//!
//! let view = Arc::new(ViewParams::builder("demo").with_roots(vec![app]).build().unwrap());
//! let connection = graph.connect(view.clone());
//! let outcome = walk(&connection, Arc::new(FilteringTraversal::from_view(&view)), Direction::Outgoing);
//! assert_eq!(outcome.accepted, vec![rel]);
//! ```

pub mod codec;
pub mod connection;
pub mod filter;
pub mod graph;
pub mod mutate;
pub mod store;
pub mod traverse;
pub mod view;

pub use codec::{CodecError, EncodedRelationship, GraphRelType, PropertyBag, PropertyValue, RelationshipId};
pub use connection::{GraphConnection, ViewConnection};
pub use filter::{AnyFilter, DependencyFilter, NoneFilter, OrFilter, ParentFilter, ProjectRelationshipFilter};
pub use graph::{EdgeId, GraphEdge, GraphStats, NodeId, Provenance, RelationshipGraph};
pub use mutate::{
    GraphMutator, ManagedDependencyMutator, MutatorChain, NoOpMutator, VersionManagerMutator,
};
pub use petgraph::Direction;
pub use store::{GraphStore, StoreError, WorkspaceInfo};
pub use traverse::{
    walk, AncestryTraversal, Evaluation, FilteringTraversal, MembershipEvaluator, PathEvaluator,
    PathExpander, TraversalOutcome, TraversalPath, TraversalStats, TraversalStrategy,
};
pub use view::{SelectionKey, ViewError, ViewParams, ViewParamsBuilder};
