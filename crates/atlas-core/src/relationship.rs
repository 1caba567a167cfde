//! Relationship types for the project graph.
//!
//! A relationship is a directed edge declared by one project (the
//! `declaring` GAV) pointing at another (the target). We keep one variant
//! per kind of declaration found in a project descriptor: parents,
//! dependencies, build plugins, plugin dependencies and build extensions.
//!
//! Relationships are plain values. Rewriting one (for version mediation)
//! always produces a new value through [`ProjectRelationship::select_target`].

use crate::error::RefError;
use crate::refs::{ArtifactRef, ProjectRef, ProjectVersionRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The kind of a relationship, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// Project A inherits from parent POM B.
    Parent,

    /// Project A depends on artifact B.
    Dependency,

    /// Project A builds with plugin B.
    Plugin,

    /// Plugin declared by project A depends on artifact B.
    PluginDependency,

    /// Project A loads build extension B.
    Extension,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Dependency => "dependency",
            Self::Plugin => "plugin",
            Self::PluginDependency => "plugin_dependency",
            Self::Extension => "extension",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dependency scopes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DependencyScope {
    #[default]
    Compile,
    Provided,
    Runtime,
    Test,
    System,
    Import,
    Toolchain,
    Embedded,
}

impl DependencyScope {
    /// The name used in project descriptors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Provided => "provided",
            Self::Runtime => "runtime",
            Self::Test => "test",
            Self::System => "system",
            Self::Import => "import",
            Self::Toolchain => "toolchain",
            Self::Embedded => "embedded",
        }
    }

    /// Whether a classpath built for `self` also contains `other`.
    ///
    /// `test` sees everything but `import`/`toolchain`/`embedded`,
    /// `runtime` and `provided` see `compile`.
    pub fn implies(&self, other: DependencyScope) -> bool {
        if *self == other {
            return true;
        }

        match self {
            Self::Test => matches!(
                other,
                Self::Compile | Self::Provided | Self::Runtime | Self::System
            ),
            Self::Runtime | Self::Provided => other == Self::Compile,
            _ => false,
        }
    }
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DependencyScope {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let scope = match s.trim().to_ascii_lowercase().as_str() {
            "compile" => Self::Compile,
            "provided" => Self::Provided,
            "runtime" => Self::Runtime,
            "test" => Self::Test,
            "system" => Self::System,
            "import" => Self::Import,
            "toolchain" => Self::Toolchain,
            "embedded" => Self::Embedded,
            _ => return Err(RefError::UnknownScope(s.to_string())),
        };
        Ok(scope)
    }
}

/// A dependency declared in a project's `dependencies` or
/// `dependencyManagement` section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyRelationship {
    pub declaring: ProjectVersionRef,
    pub target: ArtifactRef,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub scope: DependencyScope,
    /// Declared under `dependencyManagement`.
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub excludes: BTreeSet<ProjectRef>,
}

impl DependencyRelationship {
    pub fn new(
        declaring: ProjectVersionRef,
        target: ArtifactRef,
        scope: DependencyScope,
        index: u32,
        managed: bool,
    ) -> Self {
        Self {
            declaring,
            target,
            index,
            scope,
            managed,
            excludes: BTreeSet::new(),
        }
    }

    pub fn with_excludes(mut self, excludes: impl IntoIterator<Item = ProjectRef>) -> Self {
        self.excludes.extend(excludes);
        self
    }
}

/// A build plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginRelationship {
    pub declaring: ProjectVersionRef,
    pub target: ProjectVersionRef,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub managed: bool,
    /// Declared under `reporting` rather than `build`.
    #[serde(default)]
    pub reporting: bool,
}

impl PluginRelationship {
    pub fn new(
        declaring: ProjectVersionRef,
        target: ProjectVersionRef,
        index: u32,
        managed: bool,
        reporting: bool,
    ) -> Self {
        Self {
            declaring,
            target,
            index,
            managed,
            reporting,
        }
    }
}

/// A dependency of one of the declaring project's plugins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginDependencyRelationship {
    pub declaring: ProjectVersionRef,
    pub plugin: ProjectRef,
    pub target: ArtifactRef,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub managed: bool,
}

impl PluginDependencyRelationship {
    pub fn new(
        declaring: ProjectVersionRef,
        plugin: ProjectRef,
        target: ArtifactRef,
        index: u32,
        managed: bool,
    ) -> Self {
        Self {
            declaring,
            plugin,
            target,
            index,
            managed,
        }
    }
}

/// Inheritance from a parent POM.
///
/// A project with no parent is recorded as its own parent; that
/// self-referential edge is the terminus of the ancestry chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRelationship {
    pub declaring: ProjectVersionRef,
    pub target: ProjectVersionRef,
}

impl ParentRelationship {
    pub fn new(declaring: ProjectVersionRef, target: ProjectVersionRef) -> Self {
        Self { declaring, target }
    }

    /// Marks `declaring` as the top of its ancestry.
    pub fn terminus(declaring: ProjectVersionRef) -> Self {
        Self {
            target: declaring.clone(),
            declaring,
        }
    }

    pub fn is_terminus(&self) -> bool {
        self.declaring == self.target
    }
}

/// A build extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtensionRelationship {
    pub declaring: ProjectVersionRef,
    pub target: ProjectVersionRef,
    #[serde(default)]
    pub index: u32,
}

impl ExtensionRelationship {
    pub fn new(declaring: ProjectVersionRef, target: ProjectVersionRef, index: u32) -> Self {
        Self {
            declaring,
            target,
            index,
        }
    }
}

/// A relationship between two projects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectRelationship {
    Parent(ParentRelationship),
    Dependency(DependencyRelationship),
    Plugin(PluginRelationship),
    PluginDependency(PluginDependencyRelationship),
    Extension(ExtensionRelationship),
}

impl ProjectRelationship {
    pub fn relationship_type(&self) -> RelationshipType {
        match self {
            Self::Parent(_) => RelationshipType::Parent,
            Self::Dependency(_) => RelationshipType::Dependency,
            Self::Plugin(_) => RelationshipType::Plugin,
            Self::PluginDependency(_) => RelationshipType::PluginDependency,
            Self::Extension(_) => RelationshipType::Extension,
        }
    }

    pub fn declaring(&self) -> &ProjectVersionRef {
        match self {
            Self::Parent(rel) => &rel.declaring,
            Self::Dependency(rel) => &rel.declaring,
            Self::Plugin(rel) => &rel.declaring,
            Self::PluginDependency(rel) => &rel.declaring,
            Self::Extension(rel) => &rel.declaring,
        }
    }

    /// The GAV this relationship points at.
    pub fn target(&self) -> &ProjectVersionRef {
        match self {
            Self::Parent(rel) => &rel.target,
            Self::Dependency(rel) => rel.target.gav(),
            Self::Plugin(rel) => &rel.target,
            Self::PluginDependency(rel) => rel.target.gav(),
            Self::Extension(rel) => &rel.target,
        }
    }

    /// The target as an artifact. Variants that point at a bare GAV use
    /// the artifact type implied by the relationship kind.
    pub fn target_artifact(&self) -> ArtifactRef {
        match self {
            Self::Parent(rel) => rel.target.as_artifact("pom"),
            Self::Dependency(rel) => rel.target.clone(),
            Self::Plugin(rel) => rel.target.as_artifact("maven-plugin"),
            Self::PluginDependency(rel) => rel.target.clone(),
            Self::Extension(rel) => rel.target.as_artifact("jar"),
        }
    }

    /// Position among the siblings declared by the same project.
    ///
    /// A project has at most one parent, so parents always report 0.
    pub fn index(&self) -> u32 {
        match self {
            Self::Parent(_) => 0,
            Self::Dependency(rel) => rel.index,
            Self::Plugin(rel) => rel.index,
            Self::PluginDependency(rel) => rel.index,
            Self::Extension(rel) => rel.index,
        }
    }

    pub fn is_managed(&self) -> bool {
        match self {
            Self::Dependency(rel) => rel.managed,
            Self::Plugin(rel) => rel.managed,
            Self::PluginDependency(rel) => rel.managed,
            Self::Parent(_) | Self::Extension(_) => false,
        }
    }

    /// Returns a copy pointed at `target`, keeping the artifact type,
    /// classifier and every variant field.
    pub fn select_target(&self, target: ProjectVersionRef) -> Self {
        match self {
            Self::Parent(rel) => Self::Parent(ParentRelationship {
                declaring: rel.declaring.clone(),
                target,
            }),
            Self::Dependency(rel) => Self::Dependency(DependencyRelationship {
                target: rel.target.select_gav(target),
                ..rel.clone()
            }),
            Self::Plugin(rel) => Self::Plugin(PluginRelationship {
                target,
                ..rel.clone()
            }),
            Self::PluginDependency(rel) => {
                Self::PluginDependency(PluginDependencyRelationship {
                    target: rel.target.select_gav(target),
                    ..rel.clone()
                })
            }
            Self::Extension(rel) => Self::Extension(ExtensionRelationship {
                target,
                ..rel.clone()
            }),
        }
    }

    /// Returns a copy declared by `declaring`.
    pub fn select_declaring(&self, declaring: ProjectVersionRef) -> Self {
        match self {
            Self::Parent(rel) => Self::Parent(ParentRelationship {
                declaring,
                target: rel.target.clone(),
            }),
            Self::Dependency(rel) => Self::Dependency(DependencyRelationship {
                declaring,
                ..rel.clone()
            }),
            Self::Plugin(rel) => Self::Plugin(PluginRelationship {
                declaring,
                ..rel.clone()
            }),
            Self::PluginDependency(rel) => {
                Self::PluginDependency(PluginDependencyRelationship {
                    declaring,
                    ..rel.clone()
                })
            }
            Self::Extension(rel) => Self::Extension(ExtensionRelationship {
                declaring,
                ..rel.clone()
            }),
        }
    }
}

/// Canonical rendering. Every field takes part, in a fixed order, so the
/// string can be hashed into a content-addressed identity.
impl fmt::Display for ProjectRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent(rel) => write!(
                f,
                "ParentRelationship [{} => {}, terminus={}]",
                rel.declaring,
                rel.target,
                rel.is_terminus()
            ),
            Self::Dependency(rel) => {
                write!(
                    f,
                    "DependencyRelationship [{} => {}, index={}, scope={}, managed={}, excludes=[",
                    rel.declaring, rel.target, rel.index, rel.scope, rel.managed
                )?;
                for (i, exclude) in rel.excludes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", exclude)?;
                }
                write!(f, "]]")
            }
            Self::Plugin(rel) => write!(
                f,
                "PluginRelationship [{} => {}, index={}, managed={}, reporting={}]",
                rel.declaring, rel.target, rel.index, rel.managed, rel.reporting
            ),
            Self::PluginDependency(rel) => write!(
                f,
                "PluginDependencyRelationship [{} => {} ({}), index={}, managed={}]",
                rel.declaring, rel.target, rel.plugin, rel.index, rel.managed
            ),
            Self::Extension(rel) => write!(
                f,
                "ExtensionRelationship [{} => {}, index={}]",
                rel.declaring, rel.target, rel.index
            ),
        }
    }
}

impl From<ParentRelationship> for ProjectRelationship {
    fn from(rel: ParentRelationship) -> Self {
        Self::Parent(rel)
    }
}

impl From<DependencyRelationship> for ProjectRelationship {
    fn from(rel: DependencyRelationship) -> Self {
        Self::Dependency(rel)
    }
}

impl From<PluginRelationship> for ProjectRelationship {
    fn from(rel: PluginRelationship) -> Self {
        Self::Plugin(rel)
    }
}

impl From<PluginDependencyRelationship> for ProjectRelationship {
    fn from(rel: PluginDependencyRelationship) -> Self {
        Self::PluginDependency(rel)
    }
}

impl From<ExtensionRelationship> for ProjectRelationship {
    fn from(rel: ExtensionRelationship) -> Self {
        Self::Extension(rel)
    }
}
