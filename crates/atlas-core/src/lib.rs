//! Atlas Core - Coordinates and relationships
//!
//! This crate holds the value types the relationship graph is built from:
//! artifact coordinates (GA, GAV, artifacts) and the relationships a
//! project descriptor declares (parents, dependencies, plugins, plugin
//! dependencies, extensions).
//!
//! # Example
//!
//! ```
//! use atlas_core::{DependencyRelationship, DependencyScope, ProjectRelationship, ProjectVersionRef};
//!
//! let app: ProjectVersionRef = "org.example:app:1.0".parse().unwrap();
//! let lib: ProjectVersionRef = "org.example:lib:2.1".parse().unwrap();
//!
//! let rel: ProjectRelationship =
//!     DependencyRelationship::new(app, lib.as_artifact("jar"), DependencyScope::Compile, 0, false)
//!         .into();
//! assert_eq!(rel.target().version(), "2.1");
//! ```

pub mod error;
pub mod refs;
pub mod relationship;

pub use error::{RefError, Result};
pub use refs::{ArtifactRef, ProjectRef, ProjectVersionRef};
pub use relationship::{
    DependencyRelationship, DependencyScope, ExtensionRelationship, ParentRelationship,
    PluginDependencyRelationship, PluginRelationship, ProjectRelationship, RelationshipType,
};
