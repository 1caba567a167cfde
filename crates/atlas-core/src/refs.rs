//! Artifact coordinates.
//!
//! A coordinate names a project (`group:artifact`), a versioned project
//! (`group:artifact:version`, the GAV) or a concrete artifact of a versioned
//! project (GAV plus type, classifier and the optional flag). All three are
//! immutable values compared field by field.

use crate::error::{RefError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// A project identity without a version (`group:artifact`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectRef {
    group: String,
    artifact: String,
}

impl ProjectRef {
    /// Creates a project reference, rejecting empty parts.
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Result<Self> {
        let group = group.into();
        let artifact = artifact.into();
        if is_blank(&group) || is_blank(&artifact) {
            return Err(RefError::EmptyPart {
                group,
                artifact,
                version: String::new(),
            });
        }
        Ok(Self { group, artifact })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// Attaches a version, producing a GAV.
    pub fn with_version(&self, version: impl Into<String>) -> Result<ProjectVersionRef> {
        ProjectVersionRef::new(self.group.clone(), self.artifact.clone(), version)
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

impl FromStr for ProjectRef {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [g, a] => ProjectRef::new(*g, *a),
            _ => Err(RefError::Malformed {
                input: s.to_string(),
                expected: "group:artifact",
            }),
        }
    }
}

impl TryFrom<String> for ProjectRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ProjectRef> for String {
    fn from(value: ProjectRef) -> Self {
        value.to_string()
    }
}

/// A versioned project (GAV).
///
/// Equality and hashing cover all three parts. Use
/// [`as_project_ref`](Self::as_project_ref) for version-less matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectVersionRef {
    group: String,
    artifact: String,
    version: String,
}

impl ProjectVersionRef {
    /// Creates a GAV. None of the parts may be empty.
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self> {
        let group = group.into();
        let artifact = artifact.into();
        let version = version.into();
        if is_blank(&group) || is_blank(&artifact) || is_blank(&version) {
            return Err(RefError::EmptyPart {
                group,
                artifact,
                version,
            });
        }
        Ok(Self {
            group,
            artifact,
            version,
        })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Drops the version.
    pub fn as_project_ref(&self) -> ProjectRef {
        ProjectRef {
            group: self.group.clone(),
            artifact: self.artifact.clone(),
        }
    }

    /// Returns true when group and artifact match, whatever the versions.
    pub fn matches_project(&self, other: &ProjectRef) -> bool {
        self.group == other.group && self.artifact == other.artifact
    }

    /// Same project, different version.
    pub fn select_version(&self, version: impl Into<String>) -> Result<Self> {
        ProjectVersionRef::new(self.group.clone(), self.artifact.clone(), version)
    }

    /// Wraps this GAV as an artifact of the given type.
    pub fn as_artifact(&self, kind: impl Into<String>) -> ArtifactRef {
        ArtifactRef::new(self.clone(), kind, None, false)
    }
}

impl fmt::Display for ProjectVersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

impl FromStr for ProjectVersionRef {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [g, a, v] => ProjectVersionRef::new(*g, *a, *v),
            _ => Err(RefError::Malformed {
                input: s.to_string(),
                expected: "group:artifact:version",
            }),
        }
    }
}

impl TryFrom<String> for ProjectVersionRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ProjectVersionRef> for String {
    fn from(value: ProjectVersionRef) -> Self {
        value.to_string()
    }
}

fn default_type() -> String {
    "jar".to_string()
}

/// A concrete artifact of a versioned project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactRef {
    gav: ProjectVersionRef,
    #[serde(rename = "type", default = "default_type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    classifier: Option<String>,
    #[serde(default)]
    optional: bool,
}

impl ArtifactRef {
    /// Creates an artifact reference. An empty type falls back to `jar`,
    /// a blank classifier is treated as absent.
    pub fn new(
        gav: ProjectVersionRef,
        kind: impl Into<String>,
        classifier: Option<String>,
        optional: bool,
    ) -> Self {
        let kind = kind.into();
        let kind = if is_blank(&kind) { default_type() } else { kind };
        let classifier = classifier.filter(|c| !is_blank(c));
        Self {
            gav,
            kind,
            classifier,
            optional,
        }
    }

    pub fn gav(&self) -> &ProjectVersionRef {
        &self.gav
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Same artifact coordinates pointed at another GAV.
    pub fn select_gav(&self, gav: ProjectVersionRef) -> Self {
        Self {
            gav,
            kind: self.kind.clone(),
            classifier: self.classifier.clone(),
            optional: self.optional,
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.gav, self.kind)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        if self.optional {
            write!(f, " (optional)")?;
        }
        Ok(())
    }
}
