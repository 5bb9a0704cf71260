//! Python script invocations

use std::path::{Path, PathBuf};

use crate::environment::ResolvedEnvironment;
use crate::supervisor::LaunchSpec;

/// `<python> -u <script> <args...>`, run from the script's directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    /// Interpreter
    pub python: String,
    /// Absolute path of the script
    pub script: PathBuf,
    /// Arguments after the script
    pub args: Vec<String>,
}

impl ScriptInvocation {
    /// Invocation of `script` with `python`
    #[must_use]
    pub fn new(python: impl Into<String>, script: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            python: python.into(),
            script: script.into(),
            args,
        }
    }

    /// Directory the script runs in
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        match self.script.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Interpreter arguments: unbuffered output, the script, then its arguments
    #[must_use]
    pub fn interpreter_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.args.len() + 2);
        args.push("-u".to_string());
        args.push(self.script.to_string_lossy().into_owned());
        args.extend(self.args.iter().cloned());
        args
    }

    /// Full argv including the interpreter
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.python.clone()];
        argv.extend(self.interpreter_args());
        argv
    }

    /// Supervised launch with a private copy of `env`
    #[must_use]
    pub fn launch_spec(&self, env: &ResolvedEnvironment) -> LaunchSpec {
        LaunchSpec {
            program: self.python.clone(),
            args: self.interpreter_args(),
            cwd: self.working_dir().to_path_buf(),
            env: env.clone(),
        }
    }
}
