//! Traversal over a view.
//!
//! A walk is split the way graph databases split it: a driver
//! ([`walk`](walk::walk)) owns the frontier, an expander enumerates the
//! candidate edges leaving a path, and an evaluator decides whether a path
//! ending in a new edge is included, and whether to continue past it.
//! [`MembershipEvaluator`] plays both roles and delegates the actual
//! acceptance decision to a caller-supplied [`TraversalStrategy`].

pub mod evaluator;
pub mod strategy;
pub mod walk;

pub use evaluator::{MembershipEvaluator, TraversalStats};
pub use strategy::{AncestryTraversal, FilteringTraversal, TraversalStrategy};
pub use walk::{walk, TraversalOutcome};

use crate::graph::{GraphEdge, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict on a path ending in a new edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Evaluation {
    IncludeAndContinue,
    ExcludeAndContinue,
    ExcludeAndPrune,
}

impl Evaluation {
    pub fn includes(&self) -> bool {
        matches!(self, Evaluation::IncludeAndContinue)
    }

    pub fn continues(&self) -> bool {
        !matches!(self, Evaluation::ExcludeAndPrune)
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::IncludeAndContinue => write!(f, "include-and-continue"),
            Evaluation::ExcludeAndContinue => write!(f, "exclude-and-continue"),
            Evaluation::ExcludeAndPrune => write!(f, "exclude-and-prune"),
        }
    }
}

/// A path through stored edges, starting at a root node.
///
/// `end` is tracked separately from the last edge so a driver can continue
/// from the node of a mediated target rather than the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalPath {
    start: NodeId,
    edges: Vec<GraphEdge>,
    end: NodeId,
}

impl TraversalPath {
    /// A path of no edges, sitting on `node`.
    pub fn root(node: NodeId) -> Self {
        Self {
            start: node,
            edges: Vec::new(),
            end: node,
        }
    }

    /// Returns a copy of this path extended by `edge`, ending at `end`.
    pub fn extend(&self, edge: GraphEdge, end: NodeId) -> Self {
        let mut edges = self.edges.clone();
        edges.push(edge);
        Self {
            start: self.start,
            edges,
            end,
        }
    }

    pub fn start_node(&self) -> NodeId {
        self.start
    }

    pub fn end_node(&self) -> NodeId {
        self.end
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn last_edge(&self) -> Option<&GraphEdge> {
        self.edges.last()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Decides inclusion for paths offered by a driver.
pub trait PathEvaluator {
    fn evaluate(&mut self, path: &TraversalPath) -> Evaluation;
}

/// Enumerates the edges a driver may follow from the end of a path.
pub trait PathExpander: Sized {
    fn expand(&mut self, path: &TraversalPath) -> Vec<GraphEdge>;

    /// The same expander walking edges the other way.
    fn reverse(&self) -> Self;
}
