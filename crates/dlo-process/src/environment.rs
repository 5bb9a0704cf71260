//! Resolved child environment
//!
//! The environment every launched script receives is computed once: the
//! launcher's own environment, updated with whatever the AGX setup script
//! exports, with the project root prepended to `PYTHONPATH`. The launcher
//! never mutates its own process environment; each spawn gets a clone.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

/// Variables that break terminal emulators when inherited from a conda env
pub const TERMINAL_UNSAFE_VARS: &[&str] = &["LD_LIBRARY_PATH", "LD_PRELOAD"];

/// Explicit set of environment variables for a child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    vars: BTreeMap<String, String>,
}

impl ResolvedEnvironment {
    /// Empty environment
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    #[must_use]
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// Full environment for pipeline scripts
    ///
    /// Sources `agx_setup` when it exists (failures are logged and ignored)
    /// and prepends `project_root` to `PYTHONPATH`.
    #[must_use]
    pub fn resolve(project_root: &Path, agx_setup: Option<&Path>) -> Self {
        let mut env = Self::from_process();
        if let Some(script) = agx_setup {
            env.source_script(script);
        }
        env.prepend_path_var("PYTHONPATH", &project_root.to_string_lossy());
        env
    }

    /// Value of `key`
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set `key` to `value`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Remove `key`, returning its old value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// Copy without the given variables
    #[must_use]
    pub fn without(&self, keys: &[&str]) -> Self {
        let mut copy = self.clone();
        for key in keys {
            copy.vars.remove(*key);
        }
        copy
    }

    /// Number of variables
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether no variables are set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Prepend `entry` to a colon-separated list variable
    ///
    /// An unset or empty variable becomes just `entry`.
    pub fn prepend_path_var(&mut self, key: &str, entry: &str) {
        let value = match self.vars.get(key) {
            Some(old) if !old.is_empty() => format!("{entry}:{old}"),
            _ => entry.to_string(),
        };
        self.vars.insert(key.to_string(), value);
    }

    /// Apply the variables a bash script exports
    ///
    /// Returns the number of variables applied. A missing script or a failing
    /// `bash` leaves the environment untouched.
    pub fn source_script(&mut self, script: &Path) -> usize {
        if !script.exists() {
            debug!(script = %script.display(), "setup script not found, skipping");
            return 0;
        }
        match capture_sourced_env(script, self) {
            Ok(captured) => {
                let count = captured.len();
                self.vars.extend(captured);
                debug!(script = %script.display(), count, "applied setup script environment");
                count
            }
            Err(err) => {
                warn!(script = %script.display(), error = %err, "failed to source setup script, ignoring");
                0
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResolvedEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ResolvedEnvironment {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

/// Run `source <script> && env -0` in a login bash and collect the result
fn capture_sourced_env(
    script: &Path,
    base: &ResolvedEnvironment,
) -> std::io::Result<Vec<(String, String)>> {
    let quoted = shlex::try_quote(&script.to_string_lossy())
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let output = Command::new("bash")
        .arg("-lc")
        .arg(format!("source {quoted} >/dev/null 2>&1 && env -0"))
        .env_clear()
        .envs(base)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()?;
    if !output.status.success() {
        return Err(std::io::Error::other(format!(
            "bash exited with {}",
            output.status
        )));
    }
    Ok(parse_env0(&output.stdout))
}

/// Parse `env -0` output: NUL-separated `KEY=value` records
#[must_use]
pub fn parse_env0(bytes: &[u8]) -> Vec<(String, String)> {
    bytes
        .split(|b| *b == 0)
        .filter_map(|record| {
            let eq = record.iter().position(|b| *b == b'=')?;
            let (key, value) = (&record[..eq], &record[eq + 1..]);
            if key.is_empty() {
                return None;
            }
            Some((
                String::from_utf8_lossy(key).into_owned(),
                String::from_utf8_lossy(value).into_owned(),
            ))
        })
        .collect()
}
