//! DLO Launcher
//!
//! Configure and run the DLO pipeline scripts: the AGX dataset generator,
//! diffusion training and prediction.
//!
//! - [`Settings`] / [`SettingsLoader`]: where the project, interpreter and cache live
//! - [`EditSession`]: reflected config fields of one script, committed to the cache
//! - [`Launcher`]: supervised or terminal launches with the resolved environment

#![warn(unreachable_pub)]

mod error;
mod launcher;
mod script;
mod session;

pub mod settings;

// Re-exports
pub use error::{LauncherError, Result, SettingsError};
pub use launcher::Launcher;
pub use script::{ScriptKind, ScriptTarget};
pub use session::EditSession;
pub use settings::{Settings, SettingsLoader};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
