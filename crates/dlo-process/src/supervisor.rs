//! Process supervision
//!
//! A [`ProcessSupervisor`] owns at most one child process. It streams the
//! child's output line by line to an observer channel, tracks the lifecycle
//! state, and implements terminate-then-kill:
//!
//! ```text
//! NotStarted ──start()──► Running{pid} ──exit──► Exited{code}
//!     │                        │        └──signal──► Crashed{signal}
//!     └──spawn error──► FailedToStart
//! ```
//!
//! `stop()` sends SIGTERM to the child's process group and, if the child is
//! still running after [`KILL_GRACE_PERIOD`], exactly one SIGKILL.

use std::fmt::{self, Display, Formatter};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::environment::ResolvedEnvironment;
use crate::error::SpawnError;

/// Time between SIGTERM and the forced SIGKILL
pub const KILL_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// How long output is still forwarded after the child has exited
///
/// Descendants that inherited the output pipes can keep them open; their
/// readers are detached once this runs out.
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// What to run and how
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Program to execute, looked up on the child's `PATH` if relative
    pub program: String,
    /// Arguments after the program
    pub args: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// Complete environment of the child
    pub env: ResolvedEnvironment,
}

impl LaunchSpec {
    /// Program and arguments joined for display
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output stream of the child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Notification sent to the observer channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// The child is running
    Started { pid: u32 },
    /// One line of output, without its line terminator
    Output { stream: OutputStream, text: String },
    /// Spawning or waiting failed
    ErrorOccurred { description: String },
    /// The child terminated and both output streams are drained
    ///
    /// For a crash, `exit_code` is the terminating signal number.
    Finished {
        exit_code: i32,
        crashed: bool,
        was_killed: bool,
    },
}

/// Lifecycle state of a supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// `start()` was not called yet
    NotStarted,
    /// Child is alive
    Running { pid: u32 },
    /// Child exited normally
    Exited { code: i32 },
    /// Child was terminated by a signal
    Crashed { signal: i32 },
    /// The program could not be started
    FailedToStart,
}

impl ProcessState {
    /// Whether the child ran and is gone
    #[inline]
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Exited { .. } | Self::Crashed { .. })
    }

    /// Whether no further transition will happen
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.is_finished() || self == Self::FailedToStart
    }
}

/// State plus whether the user asked to stop the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStatus {
    /// Lifecycle state
    pub state: ProcessState,
    /// `stop()` was called while running
    pub killed: bool,
}

impl Default for ProcessStatus {
    fn default() -> Self {
        Self {
            state: ProcessState::NotStarted,
            killed: false,
        }
    }
}

impl Display for ProcessStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.state {
            ProcessState::NotStarted => f.write_str("Not started")?,
            ProcessState::Running { pid } => write!(f, "Running (pid={pid})")?,
            ProcessState::Exited { code } => write!(f, "Exit code={code}")?,
            ProcessState::Crashed { signal } => write!(f, "Crash code={signal}")?,
            ProcessState::FailedToStart => f.write_str("Failed to start")?,
        }
        if self.killed {
            f.write_str(" (killed)")?;
        }
        Ok(())
    }
}

/// Delivers signals to a process group
#[cfg_attr(test, mockall::automock)]
pub trait Signaller: Send + Sync {
    /// Send `signal` to the process group `pgid`
    ///
    /// # Errors
    /// Returns the OS error if the signal could not be delivered
    fn signal_group(&self, pgid: u32, signal: Signal) -> nix::Result<()>;
}

/// [`Signaller`] backed by `killpg(2)`
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixSignaller;

impl Signaller for UnixSignaller {
    fn signal_group(&self, pgid: u32, signal: Signal) -> nix::Result<()> {
        let pgid = i32::try_from(pgid).map_err(|_| nix::errno::Errno::EINVAL)?;
        killpg(Pid::from_raw(pgid), signal)
    }
}

struct Shared {
    status: Mutex<ProcessStatus>,
    kill_scheduled: AtomicBool,
    finished: watch::Sender<bool>,
    events: mpsc::UnboundedSender<ProcessEvent>,
    signaller: Arc<dyn Signaller>,
}

impl Shared {
    fn emit(&self, event: ProcessEvent) {
        // a closed observer must not affect the child
        let _ = self.events.send(event);
    }
}

/// Supervises a single child process
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct ProcessSupervisor {
    shared: Arc<Shared>,
}

impl ProcessSupervisor {
    /// Supervisor signalling with [`UnixSignaller`]
    #[must_use]
    pub fn new(events: mpsc::UnboundedSender<ProcessEvent>) -> Self {
        Self::with_signaller(events, Arc::new(UnixSignaller))
    }

    /// Supervisor with a custom [`Signaller`]
    #[must_use]
    pub fn with_signaller(
        events: mpsc::UnboundedSender<ProcessEvent>,
        signaller: Arc<dyn Signaller>,
    ) -> Self {
        let (finished, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                status: Mutex::new(ProcessStatus::default()),
                kill_scheduled: AtomicBool::new(false),
                finished,
                events,
                signaller,
            }),
        }
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> ProcessStatus {
        *self.shared.status.lock()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.status().state
    }

    /// Spawn the child described by `spec`
    ///
    /// The child gets exactly `spec.env`, a null stdin and its own process
    /// group. Returns the child's pid.
    ///
    /// # Errors
    /// [`SpawnError::AlreadyStarted`] on a second call; [`SpawnError::Io`] if
    /// the program cannot be started, after emitting
    /// [`ProcessEvent::ErrorOccurred`]
    pub fn start(&self, spec: &LaunchSpec) -> Result<u32, SpawnError> {
        let mut status = self.shared.status.lock();
        if status.state != ProcessState::NotStarted {
            return Err(SpawnError::AlreadyStarted);
        }

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .env_clear()
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        let spawned = command.spawn().and_then(|child| match child.id() {
            Some(pid) => Ok((child, pid)),
            None => Err(std::io::Error::other("child exited before its pid was read")),
        });
        let (mut child, pid) = match spawned {
            Ok(spawned) => spawned,
            Err(err) => {
                status.state = ProcessState::FailedToStart;
                drop(status);
                warn!(program = %spec.program, error = %err, "failed to start process");
                self.shared.emit(ProcessEvent::ErrorOccurred {
                    description: format!("failed to start {}: {err}", spec.program),
                });
                self.shared.finished.send_replace(true);
                return Err(SpawnError::io(&spec.program, err));
            }
        };

        status.state = ProcessState::Running { pid };
        drop(status);
        info!(pid, command = %spec.command_line(), cwd = %spec.cwd.display(), "process started");
        self.shared.emit(ProcessEvent::Started { pid });

        let readers = [
            child
                .stdout
                .take()
                .map(|out| spawn_reader(out, OutputStream::Stdout, Arc::clone(&self.shared))),
            child
                .stderr
                .take()
                .map(|err| spawn_reader(err, OutputStream::Stderr, Arc::clone(&self.shared))),
        ];

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let waited = child.wait().await;
            let exit = record_exit(&shared, pid, waited);
            drain_output(readers, pid).await;
            info!(
                pid,
                exit_code = exit.code,
                crashed = exit.crashed,
                was_killed = exit.was_killed,
                "process finished"
            );
            shared.emit(ProcessEvent::Finished {
                exit_code: exit.code,
                crashed: exit.crashed,
                was_killed: exit.was_killed,
            });
            shared.finished.send_replace(true);
        });

        Ok(pid)
    }

    /// Ask the child to terminate
    ///
    /// No-op unless running. Sends SIGTERM to the child's process group; the
    /// first call also schedules a single SIGKILL after [`KILL_GRACE_PERIOD`]
    /// in case the child is still running by then.
    pub fn stop(&self) {
        let pid = {
            let mut status = self.shared.status.lock();
            let ProcessState::Running { pid } = status.state else {
                debug!(state = ?status.state, "stop ignored, process not running");
                return;
            };
            status.killed = true;
            pid
        };

        info!(pid, "terminating process group");
        if let Err(err) = self.shared.signaller.signal_group(pid, Signal::SIGTERM) {
            warn!(pid, error = %err, "failed to send SIGTERM");
        }

        if self.shared.kill_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(KILL_GRACE_PERIOD).await;
            let still_running = shared.status.lock().state == ProcessState::Running { pid };
            if still_running {
                warn!(pid, "process ignored SIGTERM, sending SIGKILL");
                if let Err(err) = shared.signaller.signal_group(pid, Signal::SIGKILL) {
                    warn!(pid, error = %err, "failed to send SIGKILL");
                }
            }
        });
    }

    /// Wait until the child has finished or failed to start
    ///
    /// Resolves together with [`ProcessEvent::Finished`], after the remaining
    /// output was forwarded. Returns immediately when nothing was started.
    pub async fn wait(&self) -> ProcessStatus {
        if self.state() == ProcessState::NotStarted {
            return self.status();
        }
        let mut finished = self.shared.finished.subscribe();
        // the sender lives in `self`, so the channel cannot close while waiting
        let _ = finished.wait_for(|done| *done).await;
        self.status()
    }
}

impl fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

fn spawn_reader<R>(pipe: R, stream: OutputStream, shared: Arc<Shared>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if line.last() == Some(&b'\n') {
                        line.pop();
                    }
                    shared.emit(ProcessEvent::Output {
                        stream,
                        text: String::from_utf8_lossy(&line).into_owned(),
                    });
                }
                Err(err) => {
                    debug!(?stream, error = %err, "output stream closed with error");
                    break;
                }
            }
        }
    })
}

/// How the child ended, as reported in [`ProcessEvent::Finished`]
#[derive(Debug, Clone, Copy)]
struct ExitOutcome {
    code: i32,
    crashed: bool,
    was_killed: bool,
}

/// Move to `Exited`/`Crashed` as soon as the child is reaped
fn record_exit(shared: &Shared, pid: u32, waited: std::io::Result<ExitStatus>) -> ExitOutcome {
    let (state, code, crashed) = match waited {
        Ok(exit) => match (exit.code(), exit.signal()) {
            (Some(code), _) => (ProcessState::Exited { code }, code, false),
            (None, Some(signal)) => (ProcessState::Crashed { signal }, signal, true),
            (None, None) => (ProcessState::Crashed { signal: 0 }, 0, true),
        },
        Err(err) => {
            warn!(pid, error = %err, "failed to wait for process");
            shared.emit(ProcessEvent::ErrorOccurred {
                description: format!("failed to wait for pid {pid}: {err}"),
            });
            (ProcessState::Crashed { signal: 0 }, 0, true)
        }
    };

    let was_killed = {
        let mut status = shared.status.lock();
        status.state = state;
        status.killed
    };
    debug!(pid, ?state, "process exited");
    ExitOutcome {
        code,
        crashed,
        was_killed,
    }
}

/// Let the readers forward what is left, detaching them after [`OUTPUT_DRAIN_TIMEOUT`]
async fn drain_output(readers: [Option<JoinHandle<()>>; 2], pid: u32) {
    let mut readers: Vec<_> = readers.into_iter().flatten().collect();
    let drained = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, async {
        for reader in &mut readers {
            let _ = reader.await;
        }
    })
    .await;
    if drained.is_err() {
        debug!(pid, "output pipes still open after exit, detaching readers");
        for reader in &readers {
            reader.abort();
        }
    }
}
