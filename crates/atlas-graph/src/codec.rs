//! Conversion between relationships and their stored form.
//!
//! The storage layer only knows nodes and edges carrying property bags and
//! an edge type tag. This module maps coordinates onto node properties and
//! relationships onto `(type tag, edge properties)` pairs, and back. It also
//! computes the content-addressed [`RelationshipId`] used as the cache key
//! during traversal.

use atlas_core::{
    ArtifactRef, DependencyRelationship, DependencyScope, ExtensionRelationship,
    ParentRelationship, PluginDependencyRelationship, PluginRelationship, ProjectRef,
    ProjectRelationship, ProjectVersionRef, RefError, RelationshipType,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::warn;

pub const RELATIONSHIP_ID: &str = "relationship-id";
pub const GROUP_ID: &str = "groupId";
pub const ARTIFACT_ID: &str = "artifactId";
pub const VERSION: &str = "version";
pub const GAV: &str = "gav";
pub const INDEX: &str = "index";
pub const IS_REPORTING_PLUGIN: &str = "reporting";
pub const IS_MANAGED: &str = "managed";
pub const PLUGIN_GROUP_ID: &str = "plugin-groupId";
pub const PLUGIN_ARTIFACT_ID: &str = "plugin-artifactId";
pub const TYPE: &str = "type";
pub const CLASSIFIER: &str = "classifier";
pub const SCOPE: &str = "scope";
pub const OPTIONAL: &str = "optional";
pub const EXCLUDES: &str = "excludes";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Missing property '{0}'")]
    MissingProperty(&'static str),

    #[error("Property '{key}' is not a {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },

    #[error("Property '{key}' is out of range: {value}")]
    OutOfRange { key: &'static str, value: i64 },

    #[error("Unrecognized dependency scope: '{0}'")]
    UnknownScope(String),

    #[error("Invalid coordinate: {0}")]
    Coordinate(#[from] RefError),
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// A single stored property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyValue {
    Str(String),
    Bool(bool),
    Int(i64),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

/// Properties attached to a stored node or edge.
pub type PropertyBag = BTreeMap<String, PropertyValue>;

/// Edge type tags as the storage layer sees them.
///
/// Managed declarations get their own tags so that managed-version lookups
/// can scan a node's edges by type. `Cycle` marks bookkeeping edges that have
/// no domain counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GraphRelType {
    Parent,
    Dependency,
    ManagedDependency,
    Plugin,
    ManagedPlugin,
    PluginDependency,
    ManagedPluginDependency,
    Extension,
    Cycle,
}

impl GraphRelType {
    /// The domain variant this tag decodes to, if any.
    pub fn atlas_type(&self) -> Option<RelationshipType> {
        match self {
            Self::Parent => Some(RelationshipType::Parent),
            Self::Dependency | Self::ManagedDependency => Some(RelationshipType::Dependency),
            Self::Plugin | Self::ManagedPlugin => Some(RelationshipType::Plugin),
            Self::PluginDependency | Self::ManagedPluginDependency => {
                Some(RelationshipType::PluginDependency)
            }
            Self::Extension => Some(RelationshipType::Extension),
            Self::Cycle => None,
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(
            self,
            Self::ManagedDependency | Self::ManagedPlugin | Self::ManagedPluginDependency
        )
    }

    /// The tag a relationship is stored under.
    pub fn for_relationship(rel: &ProjectRelationship) -> Self {
        match (rel.relationship_type(), rel.is_managed()) {
            (RelationshipType::Parent, _) => Self::Parent,
            (RelationshipType::Dependency, false) => Self::Dependency,
            (RelationshipType::Dependency, true) => Self::ManagedDependency,
            (RelationshipType::Plugin, false) => Self::Plugin,
            (RelationshipType::Plugin, true) => Self::ManagedPlugin,
            (RelationshipType::PluginDependency, false) => Self::PluginDependency,
            (RelationshipType::PluginDependency, true) => Self::ManagedPluginDependency,
            (RelationshipType::Extension, _) => Self::Extension,
        }
    }

    /// The managed tag for a relationship kind.
    pub fn managed(kind: RelationshipType) -> Option<Self> {
        match kind {
            RelationshipType::Dependency => Some(Self::ManagedDependency),
            RelationshipType::Plugin => Some(Self::ManagedPlugin),
            RelationshipType::PluginDependency => Some(Self::ManagedPluginDependency),
            RelationshipType::Parent | RelationshipType::Extension => None,
        }
    }
}

/// Content-addressed identity of a relationship.
///
/// Two relationships with the same canonical form share an id, whichever
/// storage edge or path they were read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipId([u8; 32]);

impl RelationshipId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// SHA-256 of the relationship's canonical string form.
pub fn id(rel: &ProjectRelationship) -> RelationshipId {
    id_of_canonical(&rel.to_string())
}

pub(crate) fn id_of_canonical(canonical: &str) -> RelationshipId {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    RelationshipId(hasher.finalize().into())
}

/// A relationship as stored on an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedRelationship {
    pub rel_type: GraphRelType,
    pub properties: PropertyBag,
}

/// Node properties for a GAV.
pub fn encode_node(gav: &ProjectVersionRef) -> PropertyBag {
    let mut bag = PropertyBag::new();
    bag.insert(GROUP_ID.to_string(), gav.group().into());
    bag.insert(ARTIFACT_ID.to_string(), gav.artifact().into());
    bag.insert(VERSION.to_string(), gav.version().into());
    bag.insert(GAV.to_string(), gav.to_string().into());
    bag
}

/// Reads a GAV back from node properties. Empty or missing parts fail.
pub fn decode_node(bag: &PropertyBag) -> Result<ProjectVersionRef> {
    let g = get_str(bag, GROUP_ID)?.unwrap_or_default();
    let a = get_str(bag, ARTIFACT_ID)?.unwrap_or_default();
    let v = get_str(bag, VERSION)?.unwrap_or_default();
    Ok(ProjectVersionRef::new(g, a, v)?)
}

/// Edge properties for a relationship. Coordinates live on the nodes.
pub fn encode(rel: &ProjectRelationship) -> EncodedRelationship {
    let mut bag = PropertyBag::new();
    bag.insert(RELATIONSHIP_ID.to_string(), id(rel).to_string().into());
    bag.insert(INDEX.to_string(), rel.index().into());

    match rel {
        ProjectRelationship::Dependency(dep) => {
            encode_artifact(&dep.target, &mut bag);
            bag.insert(IS_MANAGED.to_string(), dep.managed.into());
            bag.insert(SCOPE.to_string(), dep.scope.as_str().into());

            if !dep.excludes.is_empty() {
                let excludes = dep
                    .excludes
                    .iter()
                    .map(|e| format!("{}:{}", e.group(), e.artifact()))
                    .collect::<Vec<_>>()
                    .join(",");
                bag.insert(EXCLUDES.to_string(), excludes.into());
            }
        }
        ProjectRelationship::PluginDependency(dep) => {
            encode_artifact(&dep.target, &mut bag);
            bag.insert(PLUGIN_GROUP_ID.to_string(), dep.plugin.group().into());
            bag.insert(PLUGIN_ARTIFACT_ID.to_string(), dep.plugin.artifact().into());
            bag.insert(IS_MANAGED.to_string(), dep.managed.into());
        }
        ProjectRelationship::Plugin(plugin) => {
            bag.insert(IS_MANAGED.to_string(), plugin.managed.into());
            bag.insert(IS_REPORTING_PLUGIN.to_string(), plugin.reporting.into());
        }
        ProjectRelationship::Parent(_) | ProjectRelationship::Extension(_) => {}
    }

    EncodedRelationship {
        rel_type: GraphRelType::for_relationship(rel),
        properties: bag,
    }
}

/// Rebuilds a relationship from its edge tag, endpoints and properties.
///
/// Returns `Ok(None)` for tags with no domain variant.
pub fn decode(
    rel_type: GraphRelType,
    from: ProjectVersionRef,
    to: ProjectVersionRef,
    bag: &PropertyBag,
) -> Result<Option<ProjectRelationship>> {
    let Some(kind) = rel_type.atlas_type() else {
        return Ok(None);
    };

    let index = get_index(bag)?;

    let rel = match kind {
        RelationshipType::Dependency => {
            let artifact = decode_artifact(to, bag)?;
            let managed = require_bool(bag, IS_MANAGED)?;
            let scope_str = get_str(bag, SCOPE)?.ok_or(CodecError::MissingProperty(SCOPE))?;
            let scope = scope_str
                .parse::<DependencyScope>()
                .map_err(|_| CodecError::UnknownScope(scope_str.to_string()))?;
            let excludes = match get_str(bag, EXCLUDES)? {
                Some(list) => parse_excludes(list, &from, &artifact),
                None => BTreeSet::new(),
            };

            DependencyRelationship::new(from, artifact, scope, index, managed)
                .with_excludes(excludes)
                .into()
        }
        RelationshipType::PluginDependency => {
            let artifact = decode_artifact(to, bag)?;
            let pg = get_str(bag, PLUGIN_GROUP_ID)?.unwrap_or_default();
            let pa = get_str(bag, PLUGIN_ARTIFACT_ID)?.unwrap_or_default();
            let managed = require_bool(bag, IS_MANAGED)?;

            PluginDependencyRelationship::new(from, ProjectRef::new(pg, pa)?, artifact, index, managed)
                .into()
        }
        RelationshipType::Plugin => {
            let managed = require_bool(bag, IS_MANAGED)?;
            let reporting = require_bool(bag, IS_REPORTING_PLUGIN)?;

            PluginRelationship::new(from, to, index, managed, reporting).into()
        }
        RelationshipType::Extension => ExtensionRelationship::new(from, to, index).into(),
        RelationshipType::Parent => ParentRelationship::new(from, to).into(),
    };

    Ok(Some(rel))
}

/// Parses `g:a,g:a` exclusion lists. Bad entries are logged and skipped.
fn parse_excludes(
    list: &str,
    from: &ProjectVersionRef,
    artifact: &ArtifactRef,
) -> BTreeSet<ProjectRef> {
    let mut excludes = BTreeSet::new();
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let parsed = match entry.split(':').collect::<Vec<_>>().as_slice() {
            [g, a] => ProjectRef::new(*g, *a).ok(),
            _ => None,
        };

        match parsed {
            Some(exclude) => {
                excludes.insert(exclude);
            }
            None => warn!(
                "In: {} -> {} skipping invalid exclude specification: '{}'",
                from, artifact, entry
            ),
        }
    }
    excludes
}

fn encode_artifact(target: &ArtifactRef, bag: &mut PropertyBag) {
    bag.insert(OPTIONAL.to_string(), target.is_optional().into());
    bag.insert(TYPE.to_string(), target.kind().into());
    if let Some(classifier) = target.classifier() {
        bag.insert(CLASSIFIER.to_string(), classifier.into());
    }
}

fn decode_artifact(gav: ProjectVersionRef, bag: &PropertyBag) -> Result<ArtifactRef> {
    let kind = get_str(bag, TYPE)?.ok_or(CodecError::MissingProperty(TYPE))?;
    let classifier = get_str(bag, CLASSIFIER)?.map(str::to_string);
    let optional = require_bool(bag, OPTIONAL)?;
    Ok(ArtifactRef::new(gav, kind, classifier, optional))
}

fn get_str<'a>(bag: &'a PropertyBag, key: &'static str) -> Result<Option<&'a str>> {
    match bag.get(key) {
        None => Ok(None),
        Some(PropertyValue::Str(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(CodecError::WrongType {
            key,
            expected: "string",
        }),
    }
}

fn require_bool(bag: &PropertyBag, key: &'static str) -> Result<bool> {
    match bag.get(key) {
        None => Err(CodecError::MissingProperty(key)),
        Some(PropertyValue::Bool(b)) => Ok(*b),
        Some(_) => Err(CodecError::WrongType {
            key,
            expected: "boolean",
        }),
    }
}

fn get_index(bag: &PropertyBag) -> Result<u32> {
    match bag.get(INDEX) {
        None => Err(CodecError::MissingProperty(INDEX)),
        Some(PropertyValue::Int(i)) => u32::try_from(*i).map_err(|_| CodecError::OutOfRange {
            key: INDEX,
            value: *i,
        }),
        Some(_) => Err(CodecError::WrongType {
            key: INDEX,
            expected: "integer",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gav(s: &str) -> ProjectVersionRef {
        s.parse().unwrap()
    }

    fn round_trip(rel: &ProjectRelationship) -> ProjectRelationship {
        let encoded = encode(rel);
        let from = decode_node(&encode_node(rel.declaring())).unwrap();
        let to = decode_node(&encode_node(rel.target())).unwrap();
        decode(encoded.rel_type, from, to, &encoded.properties)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_dependency_with_excludes_round_trip() {
        let target = ArtifactRef::new(gav("g:b:1.0"), "test-jar", Some("tests".to_string()), true);
        let rel: ProjectRelationship =
            DependencyRelationship::new(gav("g:a:1.0"), target, DependencyScope::Test, 4, false)
                .with_excludes(vec!["x:y".parse().unwrap(), "x:z".parse().unwrap()])
                .into();

        assert_eq!(round_trip(&rel), rel);
    }

    #[test]
    fn test_managed_plugin_dependency_round_trip() {
        let rel: ProjectRelationship = PluginDependencyRelationship::new(
            gav("g:a:1.0"),
            "org.apache.maven.plugins:maven-compiler-plugin".parse().unwrap(),
            gav("g:helper:2").as_artifact("jar"),
            1,
            true,
        )
        .into();

        let encoded = encode(&rel);
        assert_eq!(encoded.rel_type, GraphRelType::ManagedPluginDependency);
        assert_eq!(round_trip(&rel), rel);
    }

    #[test]
    fn test_other_variants_round_trip() {
        let rels: Vec<ProjectRelationship> = vec![
            PluginRelationship::new(gav("g:a:1.0"), gav("g:plug:3"), 2, false, true).into(),
            ParentRelationship::new(gav("g:a:1.0"), gav("g:parent:7")).into(),
            ParentRelationship::terminus(gav("g:parent:7")).into(),
            ExtensionRelationship::new(gav("g:a:1.0"), gav("g:ext:1"), 0).into(),
        ];

        for rel in rels {
            assert_eq!(round_trip(&rel), rel);
        }
    }

    #[test]
    fn test_unknown_scope_is_an_error() {
        let rel: ProjectRelationship = DependencyRelationship::new(
            gav("g:a:1.0"),
            gav("g:b:1.0").as_artifact("jar"),
            DependencyScope::Compile,
            0,
            false,
        )
        .into();
        let mut encoded = encode(&rel);
        encoded
            .properties
            .insert(SCOPE.to_string(), "sideways".into());

        let result = decode(encoded.rel_type, gav("g:a:1.0"), gav("g:b:1.0"), &encoded.properties);
        assert_eq!(result, Err(CodecError::UnknownScope("sideways".to_string())));
    }

    #[test]
    fn test_bad_exclude_entries_are_skipped() {
        let rel: ProjectRelationship = DependencyRelationship::new(
            gav("g:a:1.0"),
            gav("g:b:1.0").as_artifact("jar"),
            DependencyScope::Compile,
            0,
            false,
        )
        .into();
        let mut encoded = encode(&rel);
        encoded
            .properties
            .insert(EXCLUDES.to_string(), "x:y, broken ,a:b:c, p:q".into());

        let decoded = decode(encoded.rel_type, gav("g:a:1.0"), gav("g:b:1.0"), &encoded.properties)
            .unwrap()
            .unwrap();
        match decoded {
            ProjectRelationship::Dependency(dep) => {
                let names: Vec<String> = dep.excludes.iter().map(|e| e.to_string()).collect();
                assert_eq!(names, vec!["p:q".to_string(), "x:y".to_string()]);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_unmodeled_edge_type_is_absent() {
        let decoded = decode(GraphRelType::Cycle, gav("g:a:1"), gav("g:b:1"), &PropertyBag::new());
        assert_eq!(decoded, Ok(None));
    }

    #[test]
    fn test_empty_node_coordinate_fails() {
        let mut bag = encode_node(&gav("g:a:1.0"));
        bag.insert(VERSION.to_string(), "".into());
        assert!(matches!(decode_node(&bag), Err(CodecError::Coordinate(_))));
    }

    #[test]
    fn test_id_is_content_addressed() {
        let a: ProjectRelationship =
            ExtensionRelationship::new(gav("g:a:1.0"), gav("g:ext:1"), 0).into();
        let b: ProjectRelationship =
            ExtensionRelationship::new(gav("g:a:1.0"), gav("g:ext:1"), 0).into();
        let c: ProjectRelationship =
            ExtensionRelationship::new(gav("g:a:1.0"), gav("g:ext:1"), 1).into();

        assert_eq!(id(&a), id(&b));
        assert_ne!(id(&a), id(&c));
        assert_eq!(id(&a).to_string().len(), 64);
    }
}
