//! Config store
//!
//! Loads base config files and keeps user overrides in a single shared cache
//! file, one sparse document per scope:
//!
//! ```yaml
//! training:
//!   trainer:
//!     max_epochs: 50
//! prediction:
//!   checkpoint: runs/best.ckpt
//! ```
//!
//! The cache is auxiliary: a missing or corrupt cache reads as empty and a
//! failed write is logged, never raised. The file is not locked; when two
//! sessions save concurrently the later write wins.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::ConfigDocument;
use crate::error::ConfigLoadError;

/// Whole contents of the override cache file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheArtifact {
    scopes: IndexMap<String, ConfigDocument>,
}

impl CacheArtifact {
    /// Overrides stored for `scope`
    #[inline]
    #[must_use]
    pub fn get(&self, scope: &str) -> Option<&ConfigDocument> {
        self.scopes.get(scope)
    }

    /// Replace the overrides of `scope`; an empty document drops the scope
    pub fn set(&mut self, scope: &str, overrides: ConfigDocument) {
        if overrides.is_empty() {
            self.scopes.shift_remove(scope);
        } else {
            self.scopes.insert(scope.to_string(), overrides);
        }
    }

    /// Scope names in file order
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }
}

/// Base-config loader and override cache
#[derive(Debug, Clone)]
pub struct ConfigStore {
    cache_path: PathBuf,
}

impl ConfigStore {
    /// Store backed by the cache file at `cache_path`
    #[inline]
    #[must_use]
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
        }
    }

    /// Path of the shared cache file
    #[inline]
    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Load a base config file
    ///
    /// A missing file is an empty document.
    ///
    /// # Errors
    /// Returns [`ConfigLoadError`] if the file exists but cannot be read or is
    /// not a YAML mapping
    pub fn load(&self, path: &Path) -> Result<ConfigDocument, ConfigLoadError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "base config missing, nothing to edit");
                return Ok(ConfigDocument::new());
            }
            Err(err) => return Err(ConfigLoadError::io(path, err)),
        };
        ConfigDocument::from_yaml_str(&text).map_err(|e| ConfigLoadError::malformed(path, e))
    }

    /// Cached overrides for `scope`, empty on any failure
    #[must_use]
    pub fn load_overrides(&self, scope: &str) -> ConfigDocument {
        self.read_artifact().get(scope).cloned().unwrap_or_default()
    }

    /// Replace the cached overrides of `scope`
    ///
    /// Other scopes are preserved. Failures are logged and swallowed so that
    /// saving never blocks a launch.
    pub fn save_overrides(&self, scope: &str, overrides: &ConfigDocument) {
        let mut artifact = self.read_artifact();
        artifact.set(scope, overrides.clone());
        match self.write_artifact(&artifact) {
            Ok(()) => info!(
                scope,
                entries = overrides.leaves().len(),
                path = %self.cache_path.display(),
                "saved config overrides"
            ),
            Err(err) => warn!(
                scope,
                path = %self.cache_path.display(),
                error = %err,
                "failed to save config overrides"
            ),
        }
    }

    /// Whole cache file, empty on any failure
    #[must_use]
    pub fn read_artifact(&self) -> CacheArtifact {
        let text = match std::fs::read_to_string(&self.cache_path) {
            Ok(text) => text,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(path = %self.cache_path.display(), error = %err, "unreadable override cache, ignoring");
                }
                return CacheArtifact::default();
            }
        };
        if text.trim().is_empty() {
            return CacheArtifact::default();
        }
        match serde_yaml::from_str::<CacheArtifact>(&text) {
            Ok(artifact) => artifact,
            Err(err) => {
                warn!(path = %self.cache_path.display(), error = %err, "corrupt override cache, ignoring");
                CacheArtifact::default()
            }
        }
    }

    /// Write the whole cache through a temporary file and a rename
    fn write_artifact(&self, artifact: &CacheArtifact) -> io::Result<()> {
        let text = serde_yaml::to_string(artifact)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let dir = match self.cache_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.cache_path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_set_empty_drops_scope() {
        let mut artifact = CacheArtifact::default();
        let doc = ConfigDocument::from_yaml_str("a: 1\n").unwrap();
        artifact.set("training", doc);
        assert_eq!(artifact.scopes().collect::<Vec<_>>(), vec!["training"]);
        artifact.set("training", ConfigDocument::new());
        assert!(artifact.get("training").is_none());
    }

    #[test]
    fn artifact_yaml_shape_is_scope_mapping() {
        let mut artifact = CacheArtifact::default();
        artifact.set("prediction", ConfigDocument::from_yaml_str("x:\n  y: true\n").unwrap());
        let text = serde_yaml::to_string(&artifact).unwrap();
        assert_eq!(text, "prediction:\n  x:\n    y: true\n");
    }
}
