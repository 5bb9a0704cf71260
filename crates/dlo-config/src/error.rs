//! Error types for config loading and editing
//!
//! - [`ValueError`]: YAML text that cannot become a [`ConfigDocument`](crate::ConfigDocument)
//! - [`ConfigLoadError`]: a base config file that exists but cannot be used
//! - [`FieldEditError`]: user input that does not fit a field's kind
//!
//! Cache corruption has no error type: the store degrades to an empty cache.

use std::path::PathBuf;

use crate::field::FieldKind;
use crate::path::OverridePath;

/// Errors converting YAML into config values
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// Text is not valid YAML
    #[error("invalid YAML: {0}")]
    Yaml(#[source] serde_yaml::Error),

    /// Mapping key that is not a scalar
    #[error("unsupported mapping key: {0}")]
    UnsupportedKey(String),

    /// Document top level is not a mapping
    #[error("expected a mapping at the top level, found {0}")]
    NotAMapping(&'static str),
}

/// Errors loading a base config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// File exists but could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not a usable config document
    #[error("malformed config {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: ValueError,
    },
}

impl ConfigLoadError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create malformed-document error for path
    pub fn malformed(path: impl Into<PathBuf>, source: ValueError) -> Self {
        Self::Malformed {
            path: path.into(),
            source,
        }
    }
}

/// Errors applying user input to a field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldEditError {
    /// Text cannot be read as the field's kind
    #[error("{path}: '{input}' is not a valid {kind}")]
    InvalidInput {
        path: OverridePath,
        kind: FieldKind,
        input: String,
    },

    /// Typed setter does not match the field's kind
    #[error("{path}: cannot assign a {given} to a {kind} field")]
    KindMismatch {
        path: OverridePath,
        kind: FieldKind,
        given: FieldKind,
    },
}
