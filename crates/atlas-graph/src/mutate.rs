//! Version mediation.
//!
//! A [`GraphMutator`] decides which version of a relationship's target a
//! traversal actually follows. Mutators never touch the relationship they
//! are given: a rewrite comes back as [`Cow::Owned`], a pass-through as
//! [`Cow::Borrowed`], so the same edge can be mediated differently along
//! different paths.

use crate::connection::GraphConnection;
use crate::view::ViewParams;
use atlas_core::{ProjectRelationship, ProjectVersionRef, RelationshipType};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

pub trait GraphMutator: fmt::Debug + Send + Sync {
    /// Mediates `rel`, reached by following `path` (root first).
    fn select_for<'r>(
        &self,
        rel: &'r ProjectRelationship,
        path: &[ProjectRelationship],
        connection: &dyn GraphConnection,
        view: &ViewParams,
    ) -> Cow<'r, ProjectRelationship>;

    /// Stable description, used when computing view ids.
    fn long_id(&self) -> String;
}

fn retarget<'r>(
    rel: &'r ProjectRelationship,
    selected: &ProjectVersionRef,
) -> Cow<'r, ProjectRelationship> {
    if selected == rel.target() {
        Cow::Borrowed(rel)
    } else {
        Cow::Owned(rel.select_target(selected.clone()))
    }
}

/// Leaves every relationship as declared.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMutator;

impl GraphMutator for NoOpMutator {
    fn select_for<'r>(
        &self,
        rel: &'r ProjectRelationship,
        _path: &[ProjectRelationship],
        _connection: &dyn GraphConnection,
        _view: &ViewParams,
    ) -> Cow<'r, ProjectRelationship> {
        Cow::Borrowed(rel)
    }

    fn long_id(&self) -> String {
        "NoOpMutator".to_string()
    }
}

/// Applies the view's explicit version selections.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionManagerMutator;

impl GraphMutator for VersionManagerMutator {
    fn select_for<'r>(
        &self,
        rel: &'r ProjectRelationship,
        _path: &[ProjectRelationship],
        _connection: &dyn GraphConnection,
        view: &ViewParams,
    ) -> Cow<'r, ProjectRelationship> {
        match view.get_selection(rel.target()) {
            Some(selected) => retarget(rel, selected),
            None => Cow::Borrowed(rel),
        }
    }

    fn long_id(&self) -> String {
        "VersionManagerMutator".to_string()
    }
}

/// Dependency mediation: explicit selections first, then the nearest
/// managed declaration along the path.
///
/// Only dependencies are mediated; other relationships pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagedDependencyMutator;

impl GraphMutator for ManagedDependencyMutator {
    fn select_for<'r>(
        &self,
        rel: &'r ProjectRelationship,
        path: &[ProjectRelationship],
        connection: &dyn GraphConnection,
        view: &ViewParams,
    ) -> Cow<'r, ProjectRelationship> {
        if rel.relationship_type() != RelationshipType::Dependency {
            return Cow::Borrowed(rel);
        }

        // A selection that rewrites the target is final.
        let selected = VersionManagerMutator.select_for(rel, path, connection, view);
        if matches!(selected, Cow::Owned(_)) {
            return selected;
        }

        let lineage: Vec<ProjectVersionRef> = path
            .iter()
            .map(|r| r.declaring().clone())
            .chain(std::iter::once(rel.declaring().clone()))
            .collect();

        match connection.managed_target_for(rel.target(), &lineage, RelationshipType::Dependency) {
            Some(managed) => retarget(rel, &managed),
            None => Cow::Borrowed(rel),
        }
    }

    fn long_id(&self) -> String {
        "ManagedDependencyMutator".to_string()
    }
}

/// Runs several mutators in order, each seeing the previous one's output.
#[derive(Debug, Clone, Default)]
pub struct MutatorChain {
    mutators: Vec<Arc<dyn GraphMutator>>,
}

impl MutatorChain {
    pub fn new(mutators: Vec<Arc<dyn GraphMutator>>) -> Self {
        Self { mutators }
    }
}

impl GraphMutator for MutatorChain {
    fn select_for<'r>(
        &self,
        rel: &'r ProjectRelationship,
        path: &[ProjectRelationship],
        connection: &dyn GraphConnection,
        view: &ViewParams,
    ) -> Cow<'r, ProjectRelationship> {
        let mut current = Cow::Borrowed(rel);
        for mutator in &self.mutators {
            let next = match mutator.select_for(&current, path, connection, view) {
                Cow::Owned(next) => Some(next),
                Cow::Borrowed(_) => None,
            };
            if let Some(next) = next {
                current = Cow::Owned(next);
            }
        }
        current
    }

    fn long_id(&self) -> String {
        let ids: Vec<String> = self.mutators.iter().map(|m| m.long_id()).collect();
        format!("Chain({})", ids.join(","))
    }
}
