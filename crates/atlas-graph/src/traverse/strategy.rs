//! Traversal strategies: the acceptance decision a walk delegates to.

use crate::filter::{ParentFilter, ProjectRelationshipFilter};
use crate::view::ViewParams;
use atlas_core::ProjectRelationship;
use std::sync::Arc;

/// Decides whether a candidate relationship joins the explored graph.
///
/// `path` holds the relationships leading to the candidate, root first
/// (reversed for reverse walks). A strategy may run several passes and
/// vary its answer by `pass`.
pub trait TraversalStrategy: Send + Sync {
    fn pre_check(&self, rel: &ProjectRelationship, path: &[ProjectRelationship], pass: usize) -> bool;

    /// Number of passes a walk should run.
    fn passes(&self) -> usize {
        1
    }
}

/// Accepts what a relationship filter accepts.
#[derive(Debug, Clone)]
pub struct FilteringTraversal {
    filter: Arc<dyn ProjectRelationshipFilter>,
}

impl FilteringTraversal {
    pub fn new(filter: Arc<dyn ProjectRelationshipFilter>) -> Self {
        Self { filter }
    }

    /// Uses the view's own filter.
    pub fn from_view(view: &ViewParams) -> Self {
        Self::new(view.filter_handle())
    }

    pub fn filter(&self) -> &dyn ProjectRelationshipFilter {
        self.filter.as_ref()
    }
}

impl TraversalStrategy for FilteringTraversal {
    fn pre_check(&self, rel: &ProjectRelationship, _path: &[ProjectRelationship], _pass: usize) -> bool {
        self.filter.accept(rel)
    }
}

/// Follows parent relationships only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AncestryTraversal;

impl TraversalStrategy for AncestryTraversal {
    fn pre_check(&self, rel: &ProjectRelationship, _path: &[ProjectRelationship], _pass: usize) -> bool {
        ParentFilter.accept(rel)
    }
}
