//! Detached terminal launches
//!
//! Opens a terminal emulator running a bash command line that activates the
//! conda and AGX environments, runs the script, and waits for Enter so the
//! window stays open. The launcher does not track the terminal afterwards.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::environment::{ResolvedEnvironment, TERMINAL_UNSAFE_VARS};
use crate::error::TerminalError;
use crate::invocation::ScriptInvocation;

/// Supported emulators in probe order, with the arguments placed before the
/// bash command text
pub const TERMINAL_CANDIDATES: &[(&str, &[&str])] = &[
    ("gnome-terminal", &["--", "bash", "-lc"]),
    ("konsole", &["-e", "bash", "-lc"]),
    ("xfce4-terminal", &["-x", "bash", "-lc"]),
    ("x-terminal-emulator", &["-e", "bash", "-lc"]),
    ("kitty", &["bash", "-lc"]),
    ("alacritty", &["-e", "bash", "-lc"]),
    ("xterm", &["-e", "bash", "-lc"]),
];

/// An installed terminal emulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalEmulator {
    name: &'static str,
    program: PathBuf,
    prefix_args: &'static [&'static str],
}

impl TerminalEmulator {
    /// Emulator at `program` taking `prefix_args` before the command text
    #[must_use]
    pub fn new(name: &'static str, program: PathBuf, prefix_args: &'static [&'static str]) -> Self {
        Self {
            name,
            program,
            prefix_args,
        }
    }

    /// Candidate name, e.g. `konsole`
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Resolved executable
    #[inline]
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments to run `command_text` inside this emulator
    #[must_use]
    pub fn args(&self, command_text: &str) -> Vec<String> {
        self.prefix_args
            .iter()
            .map(|arg| (*arg).to_string())
            .chain(std::iter::once(command_text.to_string()))
            .collect()
    }

    /// Open the terminal running `command_text` and return its pid
    ///
    /// `LD_LIBRARY_PATH` and `LD_PRELOAD` are removed from the terminal's
    /// environment. The terminal is not waited for.
    ///
    /// # Errors
    /// Returns [`TerminalError::Spawn`] if the emulator cannot be started
    pub fn spawn(&self, command_text: &str, env: &ResolvedEnvironment) -> Result<Option<u32>, TerminalError> {
        let env = env.without(TERMINAL_UNSAFE_VARS);
        let child = Command::new(&self.program)
            .args(self.args(command_text))
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|source| TerminalError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let pid = child.id();
        info!(terminal = self.name, pid, "opened terminal");
        // dropping the handle detaches; the runtime reaps the child when it exits
        drop(child);
        Ok(pid)
    }
}

/// First supported emulator on `PATH`
#[must_use]
pub fn find_terminal() -> Option<TerminalEmulator> {
    probe(|name| which::which(name).ok())
}

/// First supported emulator in the given search path
#[must_use]
pub fn find_terminal_in(search_path: impl AsRef<OsStr>) -> Option<TerminalEmulator> {
    let search_path = search_path.as_ref();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    probe(|name| which::which_in(name, Some(search_path), &cwd).ok())
}

fn probe(mut lookup: impl FnMut(&str) -> Option<PathBuf>) -> Option<TerminalEmulator> {
    TERMINAL_CANDIDATES.iter().find_map(|(name, prefix)| {
        let program = lookup(name)?;
        debug!(terminal = name, path = %program.display(), "found terminal emulator");
        Some(TerminalEmulator::new(name, program, prefix))
    })
}

/// Names of all supported emulators, for error messages
#[must_use]
pub fn supported_terminals() -> Vec<&'static str> {
    TERMINAL_CANDIDATES.iter().map(|(name, _)| *name).collect()
}

/// Environment activation performed before the script runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    /// `etc/profile.d/conda.sh` of the conda installation
    pub conda_sh: Option<PathBuf>,
    /// Conda environment to activate
    pub conda_env: Option<String>,
    /// AGX `setup_env.bash`
    pub agx_setup: Option<PathBuf>,
}

impl Activation {
    /// Locate `conda.sh` from `CONDA_EXE` (`<base>/bin/conda`)
    #[must_use]
    pub fn conda_sh_from(env: &ResolvedEnvironment) -> Option<PathBuf> {
        let conda_exe = Path::new(env.get("CONDA_EXE")?);
        let base = conda_exe.parent()?.parent()?;
        Some(base.join("etc").join("profile.d").join("conda.sh"))
    }
}

/// Bash command text that activates the environment and runs `invocation`
///
/// Statements are joined with `"; "`. Sourcing steps are included only for
/// files that exist.
#[must_use]
pub fn build_activation_script(invocation: &ScriptInvocation, activation: &Activation) -> String {
    let mut statements = Vec::new();

    if let Some(conda_sh) = activation.conda_sh.as_deref().filter(|p| p.exists()) {
        statements.push(format!("source {}", quote_path(conda_sh)));
    }
    if let Some(env_name) = &activation.conda_env {
        statements.push(format!("conda activate {}", quote(env_name)));
    }
    if let Some(agx) = activation.agx_setup.as_deref().filter(|p| p.exists()) {
        statements.push(format!("source {}", quote_path(agx)));
    }
    statements.push(r#"export LD_LIBRARY_PATH="$CONDA_PREFIX/lib:${LD_LIBRARY_PATH:-}""#.to_string());
    statements.push(format!("cd {}", quote_path(invocation.working_dir())));

    let argv = invocation.argv();
    statements.push(format!("echo {}", quote(&format!("Running: {}", argv.join(" ")))));
    statements.push(argv.iter().map(|arg| quote(arg)).collect::<Vec<_>>().join(" "));
    statements.push(format!("read -r -p {} _", quote("Press Enter to close...")));

    statements.join("; ")
}

/// Open a terminal running `invocation` with `activation`
///
/// Emulators are looked up on the `PATH` of `env`. Returns the emulator that
/// was used.
///
/// # Errors
/// [`TerminalError::NotFound`] when no supported emulator is installed (nothing
/// is spawned); [`TerminalError::Spawn`] if the emulator fails to start
pub fn launch(
    invocation: &ScriptInvocation,
    activation: &Activation,
    env: &ResolvedEnvironment,
) -> Result<TerminalEmulator, TerminalError> {
    let found = match env.get("PATH") {
        Some(path) => find_terminal_in(path),
        None => find_terminal(),
    };
    let terminal = found.ok_or_else(|| TerminalError::NotFound {
        tried: supported_terminals(),
    })?;
    let script = build_activation_script(invocation, activation);
    debug!(terminal = terminal.name(), %script, "launching in terminal");
    terminal.spawn(&script, env)?;
    Ok(terminal)
}

fn quote(text: &str) -> String {
    shlex::try_quote(text)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| format!("{text:?}"))
}

fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}
