//! Persistent storage for relationship graphs, one per workspace.

use crate::graph::{GraphStats, RelationshipGraph};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::Path;
use thiserror::Error;

const GRAPHS_TREE: &str = "graphs";
const META_TREE: &str = "workspaces";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Bookkeeping recorded alongside each saved graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub workspace: String,
    /// Milliseconds since the epoch.
    pub saved_at: i64,
    pub stats: GraphStats,
}

impl WorkspaceInfo {
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.saved_at).single()
    }
}

pub struct GraphStore {
    db: Db,
    graphs: Tree,
    meta: Tree,
}

impl GraphStore {
    /// Opens or creates a graph store at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let graphs = db.open_tree(GRAPHS_TREE)?;
        let meta = db.open_tree(META_TREE)?;
        Ok(Self { db, graphs, meta })
    }

    /// Saves a workspace's graph, replacing what was stored before.
    ///
    /// The graph is serialized using bincode and keyed by workspace id.
    pub fn save_graph(&self, workspace: &str, graph: &RelationshipGraph) -> Result<(), StoreError> {
        let info = WorkspaceInfo {
            workspace: workspace.to_string(),
            saved_at: Utc::now().timestamp_millis(),
            stats: graph.stats(),
        };

        self.graphs.insert(workspace, bincode::serialize(graph)?)?;
        self.meta.insert(workspace, bincode::serialize(&info)?)?;
        self.db.flush()?;
        Ok(())
    }

    /// Loads a workspace's graph.
    pub fn load_graph(&self, workspace: &str) -> Result<Option<RelationshipGraph>, StoreError> {
        if let Some(bytes) = self.graphs.get(workspace)? {
            let graph: RelationshipGraph = bincode::deserialize(&bytes)?;
            Ok(Some(graph))
        } else {
            Ok(None)
        }
    }

    /// Loads a workspace's graph, or an empty one if none was saved.
    pub fn load_or_default(&self, workspace: &str) -> Result<RelationshipGraph, StoreError> {
        Ok(self.load_graph(workspace)?.unwrap_or_default())
    }

    pub fn info(&self, workspace: &str) -> Result<Option<WorkspaceInfo>, StoreError> {
        match self.meta.get(workspace)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every saved workspace, ordered by id.
    pub fn workspaces(&self) -> Result<Vec<WorkspaceInfo>, StoreError> {
        self.meta
            .iter()
            .values()
            .map(|bytes| -> Result<WorkspaceInfo, StoreError> {
                Ok(bincode::deserialize(&bytes?)?)
            })
            .collect()
    }

    /// Clears one workspace's graph.
    pub fn clear(&self, workspace: &str) -> Result<(), StoreError> {
        self.graphs.remove(workspace)?;
        self.meta.remove(workspace)?;
        self.db.flush()?;
        Ok(())
    }

    /// Clears every workspace.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.graphs.clear()?;
        self.meta.clear()?;
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Provenance;
    use atlas_core::{DependencyRelationship, DependencyScope, ProjectRelationship, ProjectVersionRef};
    use tempfile::tempdir;
    use url::Url;

    fn sample_graph() -> RelationshipGraph {
        let app: ProjectVersionRef = "org.example:app:1.0".parse().unwrap();
        let lib: ProjectVersionRef = "org.example:lib:2.0".parse().unwrap();
        let rel: ProjectRelationship =
            DependencyRelationship::new(app, lib.as_artifact("jar"), DependencyScope::Runtime, 0, false)
                .into();

        let mut graph = RelationshipGraph::new();
        graph.add_relationship(
            &rel,
            Provenance::from_source(Url::parse("http://repo.example/").unwrap()),
        );
        graph
    }

    #[test]
    fn test_save_load_graph() {
        let dir = tempdir().unwrap();
        let store = GraphStore::open(dir.path()).unwrap();

        let graph = sample_graph();
        store.save_graph("ws", &graph).unwrap();

        let loaded = store.load_graph("ws").unwrap().unwrap();
        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.edge_count(), 1);
        assert_eq!(loaded.relationships(), graph.relationships());

        let lib: ProjectVersionRef = "org.example:lib:2.0".parse().unwrap();
        assert!(loaded.node_for(&lib).is_some());
    }

    #[test]
    fn test_workspaces_are_separate() {
        let dir = tempdir().unwrap();
        let store = GraphStore::open(dir.path()).unwrap();

        store.save_graph("one", &sample_graph()).unwrap();
        store.save_graph("two", &RelationshipGraph::new()).unwrap();

        let names: Vec<String> = store
            .workspaces()
            .unwrap()
            .into_iter()
            .map(|info| info.workspace)
            .collect();
        assert_eq!(names, vec!["one".to_string(), "two".to_string()]);

        let info = store.info("one").unwrap().unwrap();
        assert_eq!(info.stats.edge_count, 1);
        assert!(info.saved_at().is_some());

        store.clear("one").unwrap();
        assert!(store.load_graph("one").unwrap().is_none());
        assert!(store.load_graph("two").unwrap().is_some());
        assert_eq!(store.load_or_default("one").unwrap().node_count(), 0);

        store.clear_all().unwrap();
        assert!(store.workspaces().unwrap().is_empty());
    }
}
