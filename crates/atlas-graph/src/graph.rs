//! In-memory relationship graph.
//!
//! The RelationshipGraph wraps petgraph and stores relationships the way a
//! graph database would: nodes carry coordinate properties, edges carry a
//! type tag and the encoded relationship. Everything above this layer reads
//! relationships back through the codec.

use crate::codec::{
    self, CodecError, EncodedRelationship, GraphRelType, PropertyBag, RelationshipId,
};
use crate::connection::ViewConnection;
use crate::view::ViewParams;
use atlas_core::{ProjectRelationship, ProjectVersionRef};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use url::Url;

/// Unique identifier for a node in the graph.
pub type NodeId = NodeIndex;

/// Unique identifier for a stored edge.
pub type EdgeId = EdgeIndex;

/// Where a relationship was read from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Repositories or other locations the declaring descriptor came from.
    pub sources: BTreeSet<Url>,
    /// The descriptor that declared the relationship, when known.
    pub pom_location: Option<Url>,
}

impl Provenance {
    pub fn from_source(source: Url) -> Self {
        Self {
            sources: BTreeSet::from([source]),
            pom_location: None,
        }
    }

    pub fn with_pom_location(mut self, location: Url) -> Self {
        self.pom_location = Some(location);
        self
    }
}

/// A stored project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub properties: PropertyBag,
    /// Union of the sources of every relationship touching this node.
    pub sources: BTreeSet<Url>,
}

/// A stored relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: RelationshipId,
    pub encoded: EncodedRelationship,
    pub provenance: Provenance,
}

/// Lightweight handle on a stored edge, handed out during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphEdge {
    pub index: EdgeId,
    pub id: RelationshipId,
    pub rel_type: GraphRelType,
    pub source: NodeId,
    pub target: NodeId,
}

/// The stored relationship graph.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RelationshipGraph {
    pub(crate) graph: DiGraph<NodeRecord, EdgeRecord>,

    /// Maps GAVs to node indexes.
    gav_index: HashMap<ProjectVersionRef, NodeId>,

    /// Maps relationship ids to edges, for deduplication.
    rel_index: HashMap<RelationshipId, EdgeId>,
}

impl RelationshipGraph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the node for a GAV, creating it if needed.
    pub fn ensure_node(&mut self, gav: &ProjectVersionRef) -> NodeId {
        if let Some(index) = self.gav_index.get(gav) {
            return *index;
        }

        let index = self.graph.add_node(NodeRecord {
            properties: codec::encode_node(gav),
            sources: BTreeSet::new(),
        });
        self.gav_index.insert(gav.clone(), index);
        index
    }

    /// Stores a relationship.
    ///
    /// Relationships are content-addressed: storing the same relationship
    /// twice keeps one edge and merges the provenance.
    pub fn add_relationship(
        &mut self,
        rel: &ProjectRelationship,
        provenance: Provenance,
    ) -> RelationshipId {
        let id = codec::id(rel);
        let from = self.ensure_node(rel.declaring());
        let to = self.ensure_node(rel.target());
        self.merge_node_sources(from, &provenance.sources);
        self.merge_node_sources(to, &provenance.sources);

        if self.merge_edge_provenance(id, &provenance) {
            return id;
        }

        let index = self.graph.add_edge(
            from,
            to,
            EdgeRecord {
                id,
                encoded: codec::encode(rel),
                provenance,
            },
        );
        self.rel_index.insert(id, index);
        id
    }

    /// Stores several relationships sharing one provenance.
    pub fn add_relationships<'a>(
        &mut self,
        rels: impl IntoIterator<Item = &'a ProjectRelationship>,
        provenance: &Provenance,
    ) -> Vec<RelationshipId> {
        rels.into_iter()
            .map(|rel| self.add_relationship(rel, provenance.clone()))
            .collect()
    }

    /// Stores an edge exactly as given, bypassing the codec.
    ///
    /// Used for storage bookkeeping edges (such as [`GraphRelType::Cycle`])
    /// and for importing records written by other tools.
    pub fn add_raw_edge(
        &mut self,
        from: &ProjectVersionRef,
        to: &ProjectVersionRef,
        encoded: EncodedRelationship,
        provenance: Provenance,
    ) -> RelationshipId {
        let canonical = format!(
            "{:?} [{} => {}] {:?}",
            encoded.rel_type, from, to, encoded.properties
        );
        let id = codec::id_of_canonical(&canonical);
        let from = self.ensure_node(from);
        let to = self.ensure_node(to);
        self.merge_node_sources(from, &provenance.sources);
        self.merge_node_sources(to, &provenance.sources);

        if self.merge_edge_provenance(id, &provenance) {
            return id;
        }

        let index = self.graph.add_edge(
            from,
            to,
            EdgeRecord {
                id,
                encoded,
                provenance,
            },
        );
        self.rel_index.insert(id, index);
        id
    }

    /// Folds `provenance` into an already stored edge. Returns false when
    /// `id` is not stored yet.
    fn merge_edge_provenance(&mut self, id: RelationshipId, provenance: &Provenance) -> bool {
        let Some(existing) = self.rel_index.get(&id) else {
            return false;
        };
        if let Some(record) = self.graph.edge_weight_mut(*existing) {
            record
                .provenance
                .sources
                .extend(provenance.sources.iter().cloned());
            if record.provenance.pom_location.is_none() {
                record.provenance.pom_location = provenance.pom_location.clone();
            }
        }
        true
    }

    fn merge_node_sources(&mut self, node: NodeId, sources: &BTreeSet<Url>) {
        if let Some(record) = self.graph.node_weight_mut(node) {
            record.sources.extend(sources.iter().cloned());
        }
    }

    pub fn node_for(&self, gav: &ProjectVersionRef) -> Option<NodeId> {
        self.gav_index.get(gav).copied()
    }

    pub fn node(&self, node: NodeId) -> Option<&NodeRecord> {
        self.graph.node_weight(node)
    }

    /// Reads a node's GAV back from its properties.
    pub fn coordinate(&self, node: NodeId) -> Option<Result<ProjectVersionRef, CodecError>> {
        self.graph
            .node_weight(node)
            .map(|record| codec::decode_node(&record.properties))
    }

    pub fn edge_record(&self, edge: EdgeId) -> Option<&EdgeRecord> {
        self.graph.edge_weight(edge)
    }

    /// Handle for the edge storing `id`, if present.
    pub fn edge_for(&self, id: &RelationshipId) -> Option<GraphEdge> {
        let index = *self.rel_index.get(id)?;
        let (source, target) = self.graph.edge_endpoints(index)?;
        let record = self.graph.edge_weight(index)?;
        Some(GraphEdge {
            index,
            id: record.id,
            rel_type: record.encoded.rel_type,
            source,
            target,
        })
    }

    /// Edges leaving (`Outgoing`) or entering (`Incoming`) a node.
    pub fn edges_directed(&self, node: NodeId, direction: Direction) -> Vec<GraphEdge> {
        self.graph
            .edges_directed(node, direction)
            .map(|edge_ref| GraphEdge {
                index: edge_ref.id(),
                id: edge_ref.weight().id,
                rel_type: edge_ref.weight().encoded.rel_type,
                source: edge_ref.source(),
                target: edge_ref.target(),
            })
            .collect()
    }

    /// Decodes the relationship stored on an edge.
    ///
    /// Returns `Ok(None)` when the edge is gone or its type has no domain
    /// counterpart.
    pub fn relationship(&self, edge: &GraphEdge) -> Result<Option<ProjectRelationship>, CodecError> {
        let Some(record) = self.graph.edge_weight(edge.index) else {
            return Ok(None);
        };
        let (Some(from), Some(to)) = (self.coordinate(edge.source), self.coordinate(edge.target))
        else {
            return Ok(None);
        };

        codec::decode(
            record.encoded.rel_type,
            from?,
            to?,
            &record.encoded.properties,
        )
    }

    /// Decodes every stored relationship, skipping the ones that fail.
    pub fn relationships(&self) -> Vec<ProjectRelationship> {
        self.graph
            .edge_indices()
            .filter_map(|index| {
                let (source, target) = self.graph.edge_endpoints(index)?;
                let record = self.graph.edge_weight(index)?;
                let edge = GraphEdge {
                    index,
                    id: record.id,
                    rel_type: record.encoded.rel_type,
                    source,
                    target,
                };
                self.relationship(&edge).ok().flatten()
            })
            .collect()
    }

    /// Scopes the graph to a view.
    pub fn connect(&self, view: Arc<ViewParams>) -> ViewConnection<'_> {
        ViewConnection::new(self, view)
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Graph statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub sources: usize,
}

impl RelationshipGraph {
    /// Returns graph statistics.
    pub fn stats(&self) -> GraphStats {
        let sources: BTreeSet<&Url> = self
            .graph
            .edge_weights()
            .flat_map(|record| record.provenance.sources.iter())
            .collect();

        GraphStats {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            sources: sources.len(),
        }
    }
}
