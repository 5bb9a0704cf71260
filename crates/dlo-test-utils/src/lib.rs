//! Testing utilities for the DLO launcher workspace
//!
//! Shared fixtures: sample configs and a throwaway project layout on disk.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use dlo_config::{ConfigDocument, ConfigStore};
use tempfile::TempDir;

/// Hydra-style training config with every leaf kind
pub const TRAIN_CONFIG: &str = r"
defaults:
  - model: unet
  - _self_
seed: 42
trainer:
  max_epochs: 100
  lr: 0.0001
  use_amp: true
  devices: [0]
model:
  name: unet
  channels: [64, 128, 256]
  dropout: 0.1
data:
  root: data/dlo
  num_workers: 8
  checkpoint: ~
";

/// Parse YAML into a document, panicking on bad fixtures
pub fn doc(yaml: &str) -> ConfigDocument {
    ConfigDocument::from_yaml_str(yaml).unwrap()
}

/// Temporary directory laid out like the pipeline repository
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Root of the workspace
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `relative`, creating parent directories
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    /// Read a file under the workspace
    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.dir.path().join(relative)).unwrap()
    }

    /// Location used for the override cache
    pub fn cache_path(&self) -> PathBuf {
        self.dir.path().join("cache").join("overrides.yaml")
    }

    /// Store writing into [`TestWorkspace::cache_path`]
    pub fn store(&self) -> ConfigStore {
        ConfigStore::new(self.cache_path())
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
