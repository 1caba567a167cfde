//! Relationship filters.
//!
//! A filter decides whether a single relationship belongs in a view. Filters
//! render a `long_id` that takes part in the owning view's identity, so two
//! filters that accept the same things must render the same id.

use atlas_core::{DependencyScope, ProjectRelationship, RelationshipType};
use std::fmt;
use std::sync::Arc;

pub trait ProjectRelationshipFilter: fmt::Debug + Send + Sync {
    fn accept(&self, rel: &ProjectRelationship) -> bool;

    /// Stable description, used when computing view ids.
    fn long_id(&self) -> String;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyFilter;

impl ProjectRelationshipFilter for AnyFilter {
    fn accept(&self, _rel: &ProjectRelationship) -> bool {
        true
    }

    fn long_id(&self) -> String {
        "ANY".to_string()
    }
}

/// Accepts nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneFilter;

impl ProjectRelationshipFilter for NoneFilter {
    fn accept(&self, _rel: &ProjectRelationship) -> bool {
        false
    }

    fn long_id(&self) -> String {
        "NONE".to_string()
    }
}

/// Dependencies visible from a scope, plus the parents that carry them.
#[derive(Debug, Clone)]
pub struct DependencyFilter {
    scope: DependencyScope,
    include_managed: bool,
    include_concrete: bool,
}

impl DependencyFilter {
    /// Concrete (non-managed) dependencies in `scope` or a scope it implies.
    pub fn new(scope: DependencyScope) -> Self {
        Self {
            scope,
            include_managed: false,
            include_concrete: true,
        }
    }

    pub fn include_managed(mut self, include: bool) -> Self {
        self.include_managed = include;
        self
    }

    pub fn include_concrete(mut self, include: bool) -> Self {
        self.include_concrete = include;
        self
    }
}

impl ProjectRelationshipFilter for DependencyFilter {
    fn accept(&self, rel: &ProjectRelationship) -> bool {
        match rel {
            ProjectRelationship::Parent(_) => true,
            ProjectRelationship::Dependency(dep) => {
                let kind_ok = if dep.managed {
                    self.include_managed
                } else {
                    self.include_concrete
                };
                kind_ok && self.scope.implies(dep.scope)
            }
            _ => false,
        }
    }

    fn long_id(&self) -> String {
        format!(
            "DependencyFilter(scope:{},managed:{},concrete:{})",
            self.scope, self.include_managed, self.include_concrete
        )
    }
}

/// Parent relationships only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParentFilter;

impl ProjectRelationshipFilter for ParentFilter {
    fn accept(&self, rel: &ProjectRelationship) -> bool {
        rel.relationship_type() == RelationshipType::Parent
    }

    fn long_id(&self) -> String {
        "PARENTS".to_string()
    }
}

/// Accepts what any of its members accepts.
#[derive(Debug, Clone)]
pub struct OrFilter {
    filters: Vec<Arc<dyn ProjectRelationshipFilter>>,
}

impl OrFilter {
    pub fn new(filters: Vec<Arc<dyn ProjectRelationshipFilter>>) -> Self {
        Self { filters }
    }
}

impl ProjectRelationshipFilter for OrFilter {
    fn accept(&self, rel: &ProjectRelationship) -> bool {
        self.filters.iter().any(|f| f.accept(rel))
    }

    fn long_id(&self) -> String {
        let ids: Vec<String> = self.filters.iter().map(|f| f.long_id()).collect();
        format!("OR({})", ids.join(","))
    }
}
