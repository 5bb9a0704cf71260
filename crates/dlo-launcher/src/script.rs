//! The pipeline scripts the launcher knows about

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use dlo_config::ArgStyle;
use serde::{Deserialize, Serialize};

use crate::error::LauncherError;

/// One of the three pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    /// AGX cable simulation producing the dataset
    DatasetGenerator,
    /// Diffusion model training
    Training,
    /// Inference with a trained checkpoint
    Prediction,
}

impl ScriptKind {
    /// All scripts in menu order
    pub const ALL: [Self; 3] = [Self::DatasetGenerator, Self::Training, Self::Prediction];

    /// Command-line name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::DatasetGenerator => "dataset-generator",
            Self::Training => "training",
            Self::Prediction => "prediction",
        }
    }

    /// Key of this script's overrides in the shared cache
    #[must_use]
    pub fn scope(self) -> &'static str {
        match self {
            Self::DatasetGenerator => "dataset_generator",
            Self::Training => "training",
            Self::Prediction => "prediction",
        }
    }

    /// Human-readable title
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::DatasetGenerator => "Dataset Generator",
            Self::Training => "Training",
            Self::Prediction => "Prediction",
        }
    }

    /// Script location relative to the project root
    #[must_use]
    pub fn default_script(self) -> PathBuf {
        match self {
            Self::DatasetGenerator => ["agxLibrary", "dataset_generator_launch.py"].iter().collect(),
            Self::Training => ["dlo_diffusion", "train.py"].iter().collect(),
            Self::Prediction => ["dlo_diffusion", "predict.py"].iter().collect(),
        }
    }

    /// Base config location relative to the project root
    #[must_use]
    pub fn default_config(self) -> PathBuf {
        match self {
            Self::DatasetGenerator => ["agxLibrary", "config", "dataset_generator.yaml"]
                .iter()
                .collect(),
            Self::Training => ["dlo_diffusion", "config", "train.yaml"].iter().collect(),
            Self::Prediction => ["dlo_diffusion", "config", "predict.yaml"].iter().collect(),
        }
    }

    /// How the script reads overrides
    #[must_use]
    pub fn arg_style(self) -> ArgStyle {
        match self {
            Self::DatasetGenerator => ArgStyle::Flags,
            Self::Training | Self::Prediction => ArgStyle::Hydra,
        }
    }
}

impl Display for ScriptKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScriptKind {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "dataset-generator" | "dataset" | "generator" => Ok(Self::DatasetGenerator),
            "training" | "train" => Ok(Self::Training),
            "prediction" | "predict" => Ok(Self::Prediction),
            _ => Err(LauncherError::UnknownScript(s.to_string())),
        }
    }
}

/// A script resolved against the launcher settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTarget {
    /// Which stage
    pub kind: ScriptKind,
    /// Absolute script path
    pub script: PathBuf,
    /// Absolute base config path
    pub config: PathBuf,
}
