//! Error types for process launches

use std::path::PathBuf;

/// Errors starting a supervised process
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// The supervisor already ran (or tried to run) a process
    #[error("process was already started")]
    AlreadyStarted,

    /// The operating system refused to start the program
    #[error("failed to start {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    /// Create IO error for program
    pub fn io(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            program: program.into(),
            source,
        }
    }
}

/// Errors launching a script in a terminal window
#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    /// No supported terminal emulator is installed
    #[error("no terminal emulator found on PATH (tried: {})", tried.join(", "))]
    NotFound { tried: Vec<&'static str> },

    /// The terminal program could not be started
    #[error("failed to start terminal {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_alternatives() {
        let err = TerminalError::NotFound {
            tried: vec!["konsole", "xterm"],
        };
        assert_eq!(
            err.to_string(),
            "no terminal emulator found on PATH (tried: konsole, xterm)"
        );
    }

    #[test]
    fn spawn_error_names_program() {
        let err = SpawnError::io("python3", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.to_string().starts_with("failed to start python3:"));
    }
}
