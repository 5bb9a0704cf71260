//! DLO Process
//!
//! Launching pipeline scripts, either supervised with captured output or in a
//! detached terminal window.
//!
//! # Core Concepts
//!
//! - [`ResolvedEnvironment`]: the explicit environment every child receives
//! - [`ScriptInvocation`]: `<python> -u <script> <args...>` from the script's directory
//! - [`ProcessSupervisor`]: one child, streamed output, terminate-then-kill
//! - [`terminal::launch`]: activation command line in the first installed emulator
//!
//! # Example
//!
//! ```rust,ignore
//! use dlo_process::{ProcessEvent, ProcessSupervisor, ResolvedEnvironment, ScriptInvocation};
//!
//! let env = ResolvedEnvironment::resolve("/repo".as_ref(), None);
//! let invocation = ScriptInvocation::new("python3", "/repo/dlo_diffusion/train.py", args);
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let supervisor = ProcessSupervisor::new(tx);
//! supervisor.start(&invocation.launch_spec(&env))?;
//! while let Some(event) = rx.recv().await {
//!     if let ProcessEvent::Finished { .. } = event {
//!         break;
//!     }
//! }
//! ```

#![warn(unreachable_pub)]

mod environment;
mod error;
mod invocation;

pub mod supervisor;
pub mod terminal;

// Re-exports
pub use environment::{parse_env0, ResolvedEnvironment, TERMINAL_UNSAFE_VARS};
pub use error::{SpawnError, TerminalError};
pub use invocation::ScriptInvocation;
pub use supervisor::{
    LaunchSpec, OutputStream, ProcessEvent, ProcessState, ProcessStatus, ProcessSupervisor,
    Signaller, UnixSignaller, KILL_GRACE_PERIOD, OUTPUT_DRAIN_TIMEOUT,
};
pub use terminal::{
    build_activation_script, find_terminal, find_terminal_in, Activation, TerminalEmulator,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
