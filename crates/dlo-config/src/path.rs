//! Override paths
//!
//! Provides [`OverridePath`] for addressing a leaf inside a [`ConfigDocument`](crate::ConfigDocument).

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Location of a value inside a config document
///
/// A non-empty sequence of mapping keys, rendered canonically as dot-joined
/// keys for storage and command-line overrides.
///
/// # Examples
/// - `["model", "unet", "channels"]` → `model.unet.channels`
/// - `["trainer", "max_epochs"]` → `trainer.max_epochs`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverridePath(Vec<String>);

impl OverridePath {
    /// Create path from segments
    ///
    /// # Errors
    /// Returns error if `segments` is empty or contains an empty key
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Result<Self, PathError> {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment);
        }
        Ok(Self(segments))
    }

    /// Create path from a single key
    ///
    /// # Errors
    /// Returns error if `key` is empty
    pub fn single(key: impl Into<String>) -> Result<Self, PathError> {
        Self::new([key.into()])
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Leaf key
    #[inline]
    #[must_use]
    pub fn last(&self) -> &str {
        self.0.last().map_or("", String::as_str)
    }

    /// Keys of the enclosing groups (empty for a top-level leaf)
    #[inline]
    #[must_use]
    pub fn parents(&self) -> &[String] {
        &self.0[..self.0.len() - 1]
    }

    /// Append a key, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(key.into());
        new
    }

    /// Check if this path is a prefix of another
    ///
    /// - `model` is prefix of `model.lr`
    /// - `model` is NOT prefix of `model_name`
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Iterator over keys from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Join keys with custom separator
    #[inline]
    #[must_use]
    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }
}

impl Display for OverridePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for OverridePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        Self::new(s.split('.'))
    }
}

impl TryFrom<Vec<String>> for OverridePath {
    type Error = PathError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

/// Errors related to override paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// No keys at all
    #[error("override path is empty")]
    Empty,

    /// Empty key in path (`a..b`)
    #[error("override path contains an empty key")]
    EmptySegment,
}
