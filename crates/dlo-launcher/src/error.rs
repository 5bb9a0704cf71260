//! Launcher error types

use std::path::PathBuf;

use dlo_config::{ConfigLoadError, FieldEditError, OverridePath, PathError};
use dlo_process::{SpawnError, TerminalError};

/// Errors loading launcher settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Settings file exists but could not be read
    #[error("failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid TOML for [`Settings`](crate::Settings)
    #[error("failed to parse settings file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Environment variable with an unusable value
    #[error("invalid environment variable {name}: {message}")]
    InvalidEnvVar { name: String, message: String },
}

impl SettingsError {
    /// Creates a read file error
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Creates a TOML parse error
    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid env var error
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Errors from launcher operations
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    /// Launcher settings
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Base config of a script
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    /// Script file does not exist
    #[error("script not found: {}", path.display())]
    MissingScript { path: PathBuf },

    /// No editable field at the given path
    #[error("no editable field '{path}'")]
    UnknownField { path: OverridePath },

    /// Assignment not of the form `path=value`
    #[error("invalid assignment '{0}', expected path=value")]
    InvalidAssignment(String),

    /// Malformed field path
    #[error("invalid field path: {0}")]
    InvalidPath(#[from] PathError),

    /// Value rejected by the field
    #[error(transparent)]
    Edit(#[from] FieldEditError),

    /// Supervised process could not be started
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// Terminal launch failed
    #[error(transparent)]
    Terminal(#[from] TerminalError),

    /// Unknown script name
    #[error("unknown script '{0}', expected one of: dataset-generator, training, prediction")]
    UnknownScript(String),
}

/// Result alias for launcher operations
pub type Result<T> = std::result::Result<T, LauncherError>;
