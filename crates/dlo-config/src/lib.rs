//! DLO Config
//!
//! Generic editing of hierarchical YAML configuration with cached overrides.
//!
//! # Core Concepts
//!
//! - [`ConfigDocument`] / [`ConfigValue`]: ordered tagged-union view of a YAML file
//! - [`OverridePath`]: dot-joined location of a leaf
//! - [`reflect`]: one [`FieldDescriptor`] per editable leaf
//! - [`extract`]: sparse override document of the fields that changed
//! - [`ConfigStore`]: base config loading and the shared override cache
//! - [`override_args`]: override document rendered as process arguments
//!
//! # Example
//!
//! ```rust,ignore
//! use dlo_config::{extract, reflect, ConfigStore};
//!
//! let store = ConfigStore::new("/tmp/overrides.yaml");
//! let base = store.load("conf/train.yaml".as_ref())?;
//! let mut fields = reflect(&base, &store.load_overrides("training"));
//!
//! fields.get_mut(&"trainer.max_epochs".parse()?).unwrap().edit("50")?;
//!
//! let overrides = extract(&fields);
//! store.save_overrides("training", &overrides);
//! ```

#![warn(unreachable_pub)]

mod document;
mod error;
mod path;
mod value;

pub mod args;
pub mod extract;
pub mod field;
pub mod merge;
pub mod reflect;
pub mod store;

// Re-exports
pub use args::{override_args, ArgStyle};
pub use document::ConfigDocument;
pub use error::{ConfigLoadError, FieldEditError, ValueError};
pub use extract::{extract, parse_list_text};
pub use field::{FieldDescriptor, FieldKind, FieldSet, FieldState};
pub use merge::{effective_value, merge, resolve};
pub use path::{OverridePath, PathError};
pub use reflect::{classify, reflect, RESERVED_KEYS};
pub use store::{CacheArtifact, ConfigStore};
pub use value::ConfigValue;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
