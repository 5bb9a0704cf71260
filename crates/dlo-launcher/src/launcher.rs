//! Launching scripts with their overrides

use std::sync::Arc;

use dlo_config::ConfigStore;
use dlo_process::terminal::{self, Activation, TerminalEmulator};
use dlo_process::{ProcessEvent, ProcessSupervisor, ResolvedEnvironment, ScriptInvocation, Signaller};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{LauncherError, Result};
use crate::script::{ScriptKind, ScriptTarget};
use crate::session::EditSession;
use crate::settings::Settings;

/// Entry point tying settings, the override cache and process launching together
#[derive(Debug, Clone)]
pub struct Launcher {
    settings: Settings,
    env: ResolvedEnvironment,
    store: ConfigStore,
}

impl Launcher {
    /// Launcher with the environment resolved from the current process
    ///
    /// Sources the AGX setup script (if configured and present) and prepends
    /// the project root to `PYTHONPATH`.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        let env = ResolvedEnvironment::resolve(&settings.root, settings.agx_setup.as_deref());
        Self::with_environment(settings, env)
    }

    /// Launcher with an explicit child environment
    #[must_use]
    pub fn with_environment(settings: Settings, env: ResolvedEnvironment) -> Self {
        let store = ConfigStore::new(&settings.cache_file);
        Self {
            settings,
            env,
            store,
        }
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Environment every child receives
    #[inline]
    #[must_use]
    pub fn environment(&self) -> &ResolvedEnvironment {
        &self.env
    }

    /// Script and config locations for `kind`
    #[must_use]
    pub fn target(&self, kind: ScriptKind) -> ScriptTarget {
        self.settings.target(kind)
    }

    /// Open a config session for `kind`
    ///
    /// # Errors
    /// Returns [`LauncherError::Config`] for an unusable base config
    pub fn open_session(&self, kind: ScriptKind) -> Result<EditSession> {
        EditSession::open(self.target(kind), self.store.clone())
    }

    /// Invocation of the script for `kind` with `args`
    ///
    /// # Errors
    /// Returns [`LauncherError::MissingScript`] if the script file does not exist
    pub fn invocation(&self, kind: ScriptKind, args: Vec<String>) -> Result<ScriptInvocation> {
        let target = self.target(kind);
        if !target.script.is_file() {
            return Err(LauncherError::MissingScript {
                path: target.script,
            });
        }
        Ok(ScriptInvocation::new(
            self.settings.python.clone(),
            target.script,
            args,
        ))
    }

    /// Start the script under supervision, reporting to `events`
    ///
    /// # Errors
    /// Fails if the script is missing or the interpreter cannot be started
    pub fn spawn_captured(
        &self,
        kind: ScriptKind,
        args: Vec<String>,
        events: mpsc::UnboundedSender<ProcessEvent>,
    ) -> Result<ProcessSupervisor> {
        self.spawn_with(kind, args, ProcessSupervisor::new(events))
    }

    /// [`Launcher::spawn_captured`] with a custom [`Signaller`]
    ///
    /// # Errors
    /// Fails if the script is missing or the interpreter cannot be started
    pub fn spawn_captured_with_signaller(
        &self,
        kind: ScriptKind,
        args: Vec<String>,
        events: mpsc::UnboundedSender<ProcessEvent>,
        signaller: Arc<dyn Signaller>,
    ) -> Result<ProcessSupervisor> {
        self.spawn_with(kind, args, ProcessSupervisor::with_signaller(events, signaller))
    }

    fn spawn_with(
        &self,
        kind: ScriptKind,
        args: Vec<String>,
        supervisor: ProcessSupervisor,
    ) -> Result<ProcessSupervisor> {
        let invocation = self.invocation(kind, args)?;
        let pid = supervisor.start(&invocation.launch_spec(&self.env))?;
        info!(script = %kind, pid, "launched with captured output");
        Ok(supervisor)
    }

    /// Activation steps for terminal launches
    #[must_use]
    pub fn activation(&self) -> Activation {
        Activation {
            conda_sh: Activation::conda_sh_from(&self.env),
            conda_env: self.settings.conda_env.clone(),
            agx_setup: self.settings.agx_setup.clone(),
        }
    }

    /// Open the script in a new terminal window
    ///
    /// # Errors
    /// Fails if the script is missing, no terminal emulator is installed, or
    /// the emulator cannot be started
    pub fn launch_in_terminal(&self, kind: ScriptKind, args: Vec<String>) -> Result<TerminalEmulator> {
        let invocation = self.invocation(kind, args)?;
        let terminal = terminal::launch(&invocation, &self.activation(), &self.env)?;
        info!(script = %kind, terminal = terminal.name(), "launched in terminal");
        Ok(terminal)
    }
}
