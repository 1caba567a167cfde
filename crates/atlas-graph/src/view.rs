//! Views over the relationship graph.
//!
//! A [`ViewParams`] describes one query: where traversal starts, which
//! relationships it accepts, how versions are mediated, which provenance is
//! in scope. Its [`long_id`](ViewParams::long_id) and
//! [`short_id`](ViewParams::short_id) are derived from that description only,
//! so two views built the same way share query results.

use crate::filter::{AnyFilter, ProjectRelationshipFilter};
use crate::mutate::{GraphMutator, ManagedDependencyMutator};
use atlas_core::{ProjectRef, ProjectVersionRef};
use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use url::Url;

static DEFAULT_FILTER: AnyFilter = AnyFilter;
static DEFAULT_MUTATOR: ManagedDependencyMutator = ManagedDependencyMutator;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// A filter or mutator selects a sub-graph, which needs somewhere to start.
    #[error("View in workspace '{0}' sets a filter or mutator but has no roots")]
    MissingRoots(String),
}

/// Key of a version selection: a whole project or one specific GAV.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SelectionKey {
    Project(ProjectRef),
    Version(ProjectVersionRef),
}

impl From<ProjectRef> for SelectionKey {
    fn from(value: ProjectRef) -> Self {
        Self::Project(value)
    }
}

impl From<ProjectVersionRef> for SelectionKey {
    fn from(value: ProjectVersionRef) -> Self {
        Self::Version(value)
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project(r) => write!(f, "{}", r),
            Self::Version(r) => write!(f, "{}", r),
        }
    }
}

/// Immutable description of a graph query.
#[derive(Debug)]
pub struct ViewParams {
    workspace_id: String,
    roots: BTreeSet<ProjectVersionRef>,
    filter: Option<Arc<dyn ProjectRelationshipFilter>>,
    mutator: Option<Arc<dyn GraphMutator>>,
    selections: BTreeMap<SelectionKey, ProjectVersionRef>,
    active_pom_locations: BTreeSet<Url>,
    active_sources: BTreeSet<Url>,
    properties: BTreeMap<String, String>,
    /// Milliseconds since the epoch. Bookkeeping only, never part of the id.
    last_access: AtomicI64,
    long_id: OnceLock<String>,
    short_id: OnceLock<String>,
}

impl ViewParams {
    pub fn builder(workspace_id: impl Into<String>) -> ViewParamsBuilder {
        ViewParamsBuilder::new(workspace_id)
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn roots(&self) -> &BTreeSet<ProjectVersionRef> {
        &self.roots
    }

    pub fn is_root(&self, gav: &ProjectVersionRef) -> bool {
        self.roots.contains(gav)
    }

    /// The acceptance filter, [`AnyFilter`] when none was given.
    pub fn filter(&self) -> &dyn ProjectRelationshipFilter {
        match &self.filter {
            Some(filter) => filter.as_ref(),
            None => &DEFAULT_FILTER,
        }
    }

    /// Shared handle on [`filter`](Self::filter), for strategies that outlive
    /// a borrow of the view.
    pub fn filter_handle(&self) -> Arc<dyn ProjectRelationshipFilter> {
        match &self.filter {
            Some(filter) => filter.clone(),
            None => Arc::new(AnyFilter),
        }
    }

    /// The mediation strategy, [`ManagedDependencyMutator`] when none was given.
    pub fn mutator(&self) -> &dyn GraphMutator {
        match &self.mutator {
            Some(mutator) => mutator.as_ref(),
            None => &DEFAULT_MUTATOR,
        }
    }

    pub fn selections(&self) -> &BTreeMap<SelectionKey, ProjectVersionRef> {
        &self.selections
    }

    /// Looks up a selection for `gav`: exact GAV first, then its project.
    pub fn get_selection(&self, gav: &ProjectVersionRef) -> Option<&ProjectVersionRef> {
        self.selections
            .get(&SelectionKey::Version(gav.clone()))
            .or_else(|| {
                self.selections
                    .get(&SelectionKey::Project(gav.as_project_ref()))
            })
    }

    pub fn has_selection(&self, gav: &ProjectVersionRef) -> bool {
        self.get_selection(gav).is_some()
    }

    pub fn has_selections(&self) -> bool {
        !self.selections.is_empty()
    }

    pub fn active_pom_locations(&self) -> &BTreeSet<Url> {
        &self.active_pom_locations
    }

    pub fn active_sources(&self) -> &BTreeSet<Url> {
        &self.active_sources
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn property_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.property(key).unwrap_or(default)
    }

    /// Records an access, for least-recently-used eviction by the store.
    pub fn touch(&self) {
        self.last_access
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_access(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.last_access.load(Ordering::Relaxed))
            .single()
    }

    pub fn render_selections(&self) -> String {
        self.selections
            .iter()
            .map(|(key, value)| format!("{} => {}", key, value))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Canonical rendering of everything that affects query results.
    ///
    /// Computed on first use and cached; all collections are ordered so the
    /// string never depends on insertion order.
    pub fn long_id(&self) -> &str {
        self.long_id.get_or_init(|| {
            let roots = join(self.roots.iter());
            let filter = self
                .filter
                .as_ref()
                .map(|f| f.long_id())
                .unwrap_or_else(|| "none".to_string());
            let mutator = self
                .mutator
                .as_ref()
                .map(|m| m.long_id())
                .unwrap_or_else(|| "none".to_string());
            let properties = self
                .properties
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(",");

            format!(
                "ViewParams(workspace:{},roots:{},filter:{},mutator:{},selections:[{}],pom-locations:[{}],sources:[{}],properties:[{}])",
                self.workspace_id,
                roots,
                filter,
                mutator,
                self.render_selections(),
                join(self.active_pom_locations.iter()),
                join(self.active_sources.iter()),
                properties
            )
        })
    }

    /// Hex SHA-256 of [`long_id`](Self::long_id).
    pub fn short_id(&self) -> &str {
        self.short_id.get_or_init(|| {
            let mut hasher = Sha256::new();
            hasher.update(self.long_id().as_bytes());
            hex::encode(hasher.finalize())
        })
    }
}

fn join<T: fmt::Display>(items: impl Iterator<Item = T>) -> String {
    items.map(|i| i.to_string()).collect::<Vec<_>>().join(",")
}

impl Clone for ViewParams {
    fn clone(&self) -> Self {
        Self {
            workspace_id: self.workspace_id.clone(),
            roots: self.roots.clone(),
            filter: self.filter.clone(),
            mutator: self.mutator.clone(),
            selections: self.selections.clone(),
            active_pom_locations: self.active_pom_locations.clone(),
            active_sources: self.active_sources.clone(),
            properties: self.properties.clone(),
            last_access: AtomicI64::new(self.last_access.load(Ordering::Relaxed)),
            long_id: self.long_id.clone(),
            short_id: self.short_id.clone(),
        }
    }
}

impl fmt::Display for ViewParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (shortId: {})", self.long_id(), self.short_id())
    }
}

/// Assembles a [`ViewParams`].
///
/// `with_roots`, `with_filter` and `with_mutator` replace what was set
/// before. Selections, properties, POM locations and sources merge.
#[derive(Debug, Clone)]
pub struct ViewParamsBuilder {
    workspace_id: String,
    roots: BTreeSet<ProjectVersionRef>,
    filter: Option<Arc<dyn ProjectRelationshipFilter>>,
    mutator: Option<Arc<dyn GraphMutator>>,
    selections: BTreeMap<SelectionKey, ProjectVersionRef>,
    active_pom_locations: BTreeSet<Url>,
    active_sources: BTreeSet<Url>,
    properties: BTreeMap<String, String>,
}

impl ViewParamsBuilder {
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            roots: BTreeSet::new(),
            filter: None,
            mutator: None,
            selections: BTreeMap::new(),
            active_pom_locations: BTreeSet::new(),
            active_sources: BTreeSet::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_roots(mut self, roots: impl IntoIterator<Item = ProjectVersionRef>) -> Self {
        self.roots = roots.into_iter().collect();
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn ProjectRelationshipFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_mutator(mut self, mutator: Arc<dyn GraphMutator>) -> Self {
        self.mutator = Some(mutator);
        self
    }

    pub fn with_selection(
        mut self,
        key: impl Into<SelectionKey>,
        selected: ProjectVersionRef,
    ) -> Self {
        self.selections.insert(key.into(), selected);
        self
    }

    pub fn with_selections(
        mut self,
        selections: impl IntoIterator<Item = (SelectionKey, ProjectVersionRef)>,
    ) -> Self {
        self.selections.extend(selections);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: impl IntoIterator<Item = (String, String)>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_active_pom_locations(mut self, locations: impl IntoIterator<Item = Url>) -> Self {
        self.active_pom_locations.extend(locations);
        self
    }

    pub fn with_active_sources(mut self, sources: impl IntoIterator<Item = Url>) -> Self {
        self.active_sources.extend(sources);
        self
    }

    /// Finishes the view. A filter or mutator without roots is rejected.
    pub fn build(self) -> Result<ViewParams, ViewError> {
        if self.roots.is_empty() && (self.filter.is_some() || self.mutator.is_some()) {
            return Err(ViewError::MissingRoots(self.workspace_id));
        }

        Ok(ViewParams {
            workspace_id: self.workspace_id,
            roots: self.roots,
            filter: self.filter,
            mutator: self.mutator,
            selections: self.selections,
            active_pom_locations: self.active_pom_locations,
            active_sources: self.active_sources,
            properties: self.properties,
            last_access: AtomicI64::new(Utc::now().timestamp_millis()),
            long_id: OnceLock::new(),
            short_id: OnceLock::new(),
        })
    }
}

impl From<&ViewParams> for ViewParamsBuilder {
    fn from(params: &ViewParams) -> Self {
        Self {
            workspace_id: params.workspace_id.clone(),
            roots: params.roots.clone(),
            filter: params.filter.clone(),
            mutator: params.mutator.clone(),
            selections: params.selections.clone(),
            active_pom_locations: params.active_pom_locations.clone(),
            active_sources: params.active_sources.clone(),
            properties: params.properties.clone(),
        }
    }
}
