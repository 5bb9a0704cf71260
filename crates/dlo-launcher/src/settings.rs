//! Launcher settings with layered loading.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Settings file (`--settings`, default `<config_dir>/dlo-launcher/settings.toml`)
//! 3. Environment variables (`DLO_*`)
//!
//! Each layer overrides the previous. A missing settings file is ignored.
//!
//! ```toml
//! root = "/home/me/dlo"
//! python = "/home/me/miniconda3/envs/dlo/bin/python"
//! conda_env = "dlo"
//!
//! [scripts.training]
//! config = "dlo_diffusion/config/train_small.yaml"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SettingsError;
use crate::script::{ScriptKind, ScriptTarget};

/// Directory name under the platform config and cache dirs
pub const APP_DIR: &str = "dlo-launcher";

/// AGX installation the pipeline is developed against
pub const DEFAULT_AGX_SETUP: &str = "/opt/Algoryx/AGX-2.40.1.5/setup_env.bash";

/// Environment variables read by [`SettingsLoader`]
pub const ENV_ROOT: &str = "DLO_ROOT";
/// Interpreter override
pub const ENV_PYTHON: &str = "DLO_PYTHON";
/// Conda environment override
pub const ENV_CONDA_ENV: &str = "DLO_CONDA_ENV";
/// AGX setup script override; empty disables sourcing
pub const ENV_AGX_SETUP: &str = "DLO_AGX_SETUP";
/// Override cache location
pub const ENV_CACHE_FILE: &str = "DLO_CACHE_FILE";

/// Per-script path overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptSettings {
    /// Script path, relative to the project root unless absolute
    pub script: Option<PathBuf>,
    /// Base config path, relative to the project root unless absolute
    pub config: Option<PathBuf>,
}

/// Overrides for each of the three scripts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptTable {
    /// Dataset generator
    pub dataset_generator: ScriptSettings,
    /// Training
    pub training: ScriptSettings,
    /// Prediction
    pub prediction: ScriptSettings,
}

impl ScriptTable {
    fn get(&self, kind: ScriptKind) -> &ScriptSettings {
        match kind {
            ScriptKind::DatasetGenerator => &self.dataset_generator,
            ScriptKind::Training => &self.training,
            ScriptKind::Prediction => &self.prediction,
        }
    }
}

/// Launcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Project root holding `agxLibrary/` and `dlo_diffusion/`
    pub root: PathBuf,
    /// Python interpreter
    pub python: String,
    /// Conda environment activated in terminal launches
    pub conda_env: Option<String>,
    /// AGX environment setup script
    pub agx_setup: Option<PathBuf>,
    /// Override cache file
    pub cache_file: PathBuf,
    /// Per-script paths
    pub scripts: ScriptTable,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            python: "python3".to_string(),
            conda_env: None,
            agx_setup: Some(PathBuf::from(DEFAULT_AGX_SETUP)),
            cache_file: default_cache_path(),
            scripts: ScriptTable::default(),
        }
    }
}

impl Settings {
    /// Parse a settings document
    ///
    /// # Errors
    /// Returns the TOML error for invalid syntax or unknown keys
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// `path` resolved against the project root
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Script and base config locations for `kind`
    #[must_use]
    pub fn target(&self, kind: ScriptKind) -> ScriptTarget {
        let overrides = self.scripts.get(kind);
        let script = overrides
            .script
            .clone()
            .unwrap_or_else(|| kind.default_script());
        let config = overrides
            .config
            .clone()
            .unwrap_or_else(|| kind.default_config());
        ScriptTarget {
            kind,
            script: self.resolve_path(&script),
            config: self.resolve_path(&config),
        }
    }
}

/// `<config_dir>/dlo-launcher/settings.toml`
#[must_use]
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("settings.toml")
}

/// `<cache_dir>/dlo-launcher/overrides.yaml`
#[must_use]
pub fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("overrides.yaml")
}

/// Settings loader with builder pattern
///
/// ```ignore
/// let settings = SettingsLoader::new()
///     .with_file("/etc/dlo/settings.toml")
///     .load()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct SettingsLoader {
    file: Option<PathBuf>,
    skip_file: bool,
    env: Option<HashMap<String, String>>,
    skip_env: bool,
}

impl SettingsLoader {
    /// Loader reading the default file and the process environment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from `path` instead of the default location
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Skip the settings file
    #[must_use]
    pub fn skip_file(mut self) -> Self {
        self.skip_file = true;
        self
    }

    /// Read `DLO_*` variables from `vars` instead of the process environment
    #[must_use]
    pub fn with_env_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Skip environment variables
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Load and merge all layers
    ///
    /// A relative `root` is made absolute against the current directory.
    ///
    /// # Errors
    /// Returns [`SettingsError`] if the settings file exists but cannot be
    /// read or parsed, or a `DLO_*` variable is empty where a value is required
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let mut settings = Settings::default();

        if !self.skip_file {
            let path = self.file.clone().unwrap_or_else(default_settings_path);
            if let Some(from_file) = load_file(&path)? {
                debug!(path = %path.display(), "loaded settings file");
                settings = from_file;
            }
        }

        if !self.skip_env {
            self.apply_env_vars(&mut settings)?;
        }

        if settings.root.is_relative() {
            if let Ok(cwd) = std::env::current_dir() {
                settings.root = cwd.join(&settings.root);
            }
        }
        Ok(settings)
    }

    fn var(&self, name: &str) -> Option<String> {
        match &self.env {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }

    fn required_var(&self, name: &str) -> Result<Option<String>, SettingsError> {
        match self.var(name) {
            Some(value) if value.trim().is_empty() => {
                Err(SettingsError::invalid_env_var(name, "must not be empty"))
            }
            other => Ok(other),
        }
    }

    fn apply_env_vars(&self, settings: &mut Settings) -> Result<(), SettingsError> {
        if let Some(root) = self.required_var(ENV_ROOT)? {
            settings.root = PathBuf::from(root);
        }
        if let Some(python) = self.required_var(ENV_PYTHON)? {
            settings.python = python;
        }
        if let Some(env) = self.var(ENV_CONDA_ENV) {
            settings.conda_env = Some(env).filter(|e| !e.is_empty());
        }
        if let Some(agx) = self.var(ENV_AGX_SETUP) {
            settings.agx_setup = Some(PathBuf::from(agx)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(cache) = self.required_var(ENV_CACHE_FILE)? {
            settings.cache_file = PathBuf::from(cache);
        }
        Ok(())
    }
}

fn load_file(path: &Path) -> Result<Option<Settings>, SettingsError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| SettingsError::read_file(path, e))?;
    Settings::from_toml(&text)
        .map(Some)
        .map_err(|e| SettingsError::parse_toml(path, e))
}
