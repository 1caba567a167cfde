//! Error types for coordinate and relationship construction.

use thiserror::Error;

/// Errors raised while building coordinates or relationship fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefError {
    /// One of group, artifact or version was empty.
    #[error("GAV cannot contain empty parts: '{group}:{artifact}:{version}'")]
    EmptyPart {
        group: String,
        artifact: String,
        version: String,
    },

    /// A coordinate string did not have the expected number of parts.
    #[error("Malformed coordinate '{input}': expected {expected}")]
    Malformed {
        input: String,
        expected: &'static str,
    },

    /// A dependency scope name outside the known set.
    #[error("Unrecognized dependency scope: '{0}'")]
    UnknownScope(String),
}

/// Result alias for coordinate operations.
pub type Result<T> = std::result::Result<T, RefError>;
