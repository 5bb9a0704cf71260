//! Command-line rendering of override documents

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::document::ConfigDocument;
use crate::value::ConfigValue;

/// How a target script expects overrides on its command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgStyle {
    /// Hydra overrides: `trainer.max_epochs=50`
    Hydra,
    /// argparse-style flags: `--trainer.max_epochs 50`
    Flags,
}

impl Display for ArgStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hydra => f.write_str("hydra"),
            Self::Flags => f.write_str("flags"),
        }
    }
}

/// Flatten an override document into process arguments, in document order
///
/// Hydra values use YAML flow syntax so that strings which look like numbers
/// or booleans stay strings. Flag values are passed through verbatim, with
/// list items joined by commas.
#[must_use]
pub fn override_args(overrides: &ConfigDocument, style: ArgStyle) -> Vec<String> {
    let leaves = overrides.leaves();
    let mut args = Vec::with_capacity(match style {
        ArgStyle::Hydra => leaves.len(),
        ArgStyle::Flags => leaves.len() * 2,
    });
    for (path, value) in leaves {
        match style {
            ArgStyle::Hydra => args.push(format!("{path}={}", value.to_flow())),
            ArgStyle::Flags => {
                args.push(format!("--{path}"));
                args.push(flag_value(value));
            }
        }
    }
    args
}

/// Flag value: lists become comma-joined items, everything else [`ConfigValue::to_arg`]
fn flag_value(value: &ConfigValue) -> String {
    match value {
        ConfigValue::List(items) => items
            .iter()
            .map(ConfigValue::to_arg)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_arg(),
    }
}
