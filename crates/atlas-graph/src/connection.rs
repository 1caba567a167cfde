//! Storage access as seen by traversal and mediation.
//!
//! [`GraphConnection`] is everything the evaluator and the mutators need from
//! storage: view-scoped membership, adjacency, decoding and managed-version
//! lookups. [`ViewConnection`] implements it over a [`RelationshipGraph`].

use crate::codec::{CodecError, GraphRelType};
use crate::graph::{GraphEdge, NodeId, RelationshipGraph};
use crate::view::ViewParams;
use atlas_core::{ProjectRelationship, ProjectVersionRef, RelationshipType};
use petgraph::Direction;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::warn;
use url::Url;

/// A storage connection scoped to one view.
///
/// All methods are reads and may be called from several traversals at once.
pub trait GraphConnection: Send + Sync {
    fn view(&self) -> &ViewParams;

    /// Whether a node belongs to the view.
    fn node_in_membership(&self, node: NodeId) -> bool;

    /// Whether an edge belongs to the view.
    fn edge_in_membership(&self, edge: &GraphEdge) -> bool;

    fn adjacency(&self, node: NodeId, direction: Direction) -> Vec<GraphEdge>;

    /// Decodes one edge. `Ok(None)` for edges with no domain variant.
    fn relationship(&self, edge: &GraphEdge) -> Result<Option<ProjectRelationship>, CodecError>;

    fn coordinate(&self, node: NodeId) -> Option<ProjectVersionRef>;

    fn node_for(&self, gav: &ProjectVersionRef) -> Option<NodeId>;

    /// Finds the managed version of `target` closest to the end of
    /// `lineage` (the chain of declaring projects, root first).
    fn managed_target_for(
        &self,
        target: &ProjectVersionRef,
        lineage: &[ProjectVersionRef],
        kind: RelationshipType,
    ) -> Option<ProjectVersionRef>;

    /// Decodes a path of edges in order. Edges that fail to decode or have
    /// no domain variant are left out.
    fn decode_path(&self, edges: &[GraphEdge]) -> Vec<ProjectRelationship> {
        edges
            .iter()
            .filter_map(|edge| match self.relationship(edge) {
                Ok(rel) => rel,
                Err(e) => {
                    warn!("Skipping undecodable relationship {}: {}", edge.id.short(), e);
                    None
                }
            })
            .collect()
    }
}

/// A [`RelationshipGraph`] seen through a [`ViewParams`].
///
/// Membership follows provenance: when the view names active sources, only
/// edges from those sources and nodes reached from them are members; when
/// it names active POM locations, edges declared elsewhere are not. View
/// roots are always members.
pub struct ViewConnection<'g> {
    graph: &'g RelationshipGraph,
    view: Arc<ViewParams>,
}

impl<'g> ViewConnection<'g> {
    pub fn new(graph: &'g RelationshipGraph, view: Arc<ViewParams>) -> Self {
        Self { graph, view }
    }

    pub fn graph(&self) -> &'g RelationshipGraph {
        self.graph
    }

    pub fn view_handle(&self) -> Arc<ViewParams> {
        self.view.clone()
    }

    fn sources_active(&self, sources: &BTreeSet<Url>) -> bool {
        let active = self.view.active_sources();
        active.is_empty() || sources.iter().any(|s| active.contains(s))
    }

    /// Managed declarations of `kind` made directly by `node`.
    fn managed_on(
        &self,
        node: NodeId,
        target: &ProjectVersionRef,
        tag: GraphRelType,
    ) -> Option<ProjectVersionRef> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .into_iter()
            .filter(|edge| edge.rel_type == tag && self.edge_in_membership(edge))
            .filter_map(|edge| self.coordinate(edge.target))
            .find(|managed| managed.matches_project(&target.as_project_ref()))
    }

    /// Checks `node`, then its ancestry, for a managed declaration.
    fn managed_in_ancestry(
        &self,
        node: NodeId,
        target: &ProjectVersionRef,
        tag: GraphRelType,
    ) -> Option<ProjectVersionRef> {
        let mut visited = HashSet::new();
        let mut current = Some(node);

        while let Some(n) = current {
            if !visited.insert(n) {
                break;
            }
            if let Some(found) = self.managed_on(n, target, tag) {
                return Some(found);
            }
            current = self
                .graph
                .edges_directed(n, Direction::Outgoing)
                .into_iter()
                .find(|edge| edge.rel_type == GraphRelType::Parent && edge.target != n)
                .map(|edge| edge.target);
        }

        None
    }
}

impl GraphConnection for ViewConnection<'_> {
    fn view(&self) -> &ViewParams {
        &self.view
    }

    fn node_in_membership(&self, node: NodeId) -> bool {
        let Some(record) = self.graph.node(node) else {
            return false;
        };

        if let Some(gav) = self.coordinate(node) {
            if self.view.is_root(&gav) {
                return true;
            }
        }

        self.sources_active(&record.sources)
    }

    fn edge_in_membership(&self, edge: &GraphEdge) -> bool {
        let Some(record) = self.graph.edge_record(edge.index) else {
            return false;
        };

        if !self.sources_active(&record.provenance.sources) {
            return false;
        }

        let locations = self.view.active_pom_locations();
        match &record.provenance.pom_location {
            Some(location) if !locations.is_empty() => locations.contains(location),
            _ => true,
        }
    }

    fn adjacency(&self, node: NodeId, direction: Direction) -> Vec<GraphEdge> {
        self.graph.edges_directed(node, direction)
    }

    fn relationship(&self, edge: &GraphEdge) -> Result<Option<ProjectRelationship>, CodecError> {
        self.graph.relationship(edge)
    }

    fn coordinate(&self, node: NodeId) -> Option<ProjectVersionRef> {
        match self.graph.coordinate(node)? {
            Ok(gav) => Some(gav),
            Err(e) => {
                warn!("Node {} has a malformed coordinate: {}", node.index(), e);
                None
            }
        }
    }

    fn node_for(&self, gav: &ProjectVersionRef) -> Option<NodeId> {
        self.graph.node_for(gav)
    }

    fn managed_target_for(
        &self,
        target: &ProjectVersionRef,
        lineage: &[ProjectVersionRef],
        kind: RelationshipType,
    ) -> Option<ProjectVersionRef> {
        let tag = GraphRelType::managed(kind)?;

        lineage
            .iter()
            .rev()
            .filter_map(|gav| self.graph.node_for(gav))
            .find_map(|node| self.managed_in_ancestry(node, target, tag))
    }
}
