use std::sync::Arc;

use dlo_config::{ConfigValue, OverridePath};
use dlo_launcher::{Launcher, LauncherError, ScriptKind, Settings};
use dlo_process::{OutputStream, ProcessEvent, ProcessState, Signaller, UnixSignaller};
use dlo_test_utils::{doc, TestWorkspace, TRAIN_CONFIG};
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

/// Shell script standing in for a python entry point: prints its arguments,
/// `PYTHONPATH` and working directory
const ECHO_SCRIPT: &str = "for arg in \"$@\"; do echo \"arg:$arg\"; done\n\
                           echo \"pythonpath:$PYTHONPATH\"\n\
                           echo \"cwd:$(pwd -P)\"\n";

const GENERATOR_CONFIG: &str = "num_samples: 100\nheadless: true\noutput_dir: data/raw\n";

fn project() -> (TestWorkspace, Settings) {
    let ws = TestWorkspace::new();
    ws.write("dlo_diffusion/config/train.yaml", TRAIN_CONFIG);
    ws.write("dlo_diffusion/train.py", ECHO_SCRIPT);
    ws.write("agxLibrary/config/dataset_generator.yaml", GENERATOR_CONFIG);
    ws.write("agxLibrary/dataset_generator_launch.py", ECHO_SCRIPT);

    let settings = Settings {
        root: ws.root().canonicalize().unwrap(),
        // `sh -u <script>` runs the stand-in the way `python -u <script>` would
        python: "sh".to_string(),
        conda_env: None,
        agx_setup: None,
        cache_file: ws.cache_path(),
        ..Settings::default()
    };
    (ws, settings)
}

fn path(s: &str) -> OverridePath {
    s.parse().unwrap()
}

async fn collect(rx: &mut mpsc::UnboundedReceiver<ProcessEvent>) -> Vec<ProcessEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let done = matches!(event, ProcessEvent::Finished { .. });
        events.push(event);
        if done {
            break;
        }
    }
    events
}

fn stdout(events: &[ProcessEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            ProcessEvent::Output {
                stream: OutputStream::Stdout,
                text,
            } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn commit_saves_and_returns_hydra_args() {
    let (ws, settings) = project();
    let launcher = Launcher::with_environment(settings, Default::default());

    let mut session = launcher.open_session(ScriptKind::Training).unwrap();
    session.assign("trainer.max_epochs=5").unwrap();
    session.assign("model.channels=32, 64").unwrap();
    session.assign("trainer.use_amp=no").unwrap();
    let args = session.commit();

    assert_eq!(
        args,
        vec![
            "trainer.max_epochs=5",
            "trainer.use_amp=false",
            "model.channels=[32, 64]"
        ]
    );
    let cached = ws.store().load_overrides("training");
    assert_eq!(
        cached,
        doc("trainer:\n  max_epochs: 5\n  use_amp: false\nmodel:\n  channels: [32, 64]\n")
    );
}

#[test]
fn reopened_session_shows_cached_values() {
    let (_ws, settings) = project();
    let launcher = Launcher::with_environment(settings, Default::default());

    let mut first = launcher.open_session(ScriptKind::Training).unwrap();
    first.assign("seed=7").unwrap();
    let _ = first.commit();

    let second = launcher.open_session(ScriptKind::Training).unwrap();
    let seed = second.fields().get(&path("seed")).unwrap();
    assert_eq!(seed.current_value(), ConfigValue::Int(7));
    assert!(seed.is_modified());
    assert_eq!(
        second.effective().get_path(&path("seed")),
        Some(&ConfigValue::Int(7))
    );
}

#[test]
fn reset_drops_the_scope() {
    let (ws, settings) = project();
    let launcher = Launcher::with_environment(settings, Default::default());
    let mut session = launcher.open_session(ScriptKind::Training).unwrap();
    session.assign("seed=7").unwrap();
    let _ = session.commit();

    let mut session = launcher.open_session(ScriptKind::Training).unwrap();
    session.reset_all();
    assert!(session.commit().is_empty());

    assert!(ws.store().read_artifact().get("training").is_none());
}

#[test]
fn scopes_are_independent() {
    let (ws, settings) = project();
    let launcher = Launcher::with_environment(settings, Default::default());

    let mut training = launcher.open_session(ScriptKind::Training).unwrap();
    training.assign("seed=1").unwrap();
    let _ = training.commit();
    let mut generator = launcher.open_session(ScriptKind::DatasetGenerator).unwrap();
    generator.assign("num_samples=5").unwrap();
    let _ = generator.commit();

    let artifact = ws.store().read_artifact();
    assert_eq!(
        artifact.scopes().collect::<Vec<_>>(),
        vec!["training", "dataset_generator"]
    );
}

#[test]
fn bad_assignments_are_rejected() {
    let (_ws, settings) = project();
    let launcher = Launcher::with_environment(settings, Default::default());
    let mut session = launcher.open_session(ScriptKind::Training).unwrap();

    assert!(matches!(
        session.assign("seed"),
        Err(LauncherError::InvalidAssignment(_))
    ));
    assert!(matches!(
        session.assign("trainer.nope=1"),
        Err(LauncherError::UnknownField { .. })
    ));
    assert!(matches!(
        session.assign("trainer=1"),
        Err(LauncherError::UnknownField { .. })
    ));
    assert!(matches!(
        session.assign("seed=abc"),
        Err(LauncherError::Edit(_))
    ));
    assert!(matches!(
        session.assign("trainer..lr=1"),
        Err(LauncherError::InvalidPath(_))
    ));
    assert!(session.overrides().is_empty());
}

#[test]
fn missing_base_config_has_no_fields() {
    let (_ws, settings) = project();
    let launcher = Launcher::with_environment(settings, Default::default());

    let session = launcher.open_session(ScriptKind::Prediction).unwrap();

    assert!(session.fields().is_empty());
    assert!(session.commit().is_empty());
}

#[test]
fn malformed_base_config_is_an_error() {
    let (ws, settings) = project();
    ws.write("dlo_diffusion/config/predict.yaml", "checkpoint: [unclosed\n");
    let launcher = Launcher::with_environment(settings, Default::default());

    assert!(matches!(
        launcher.open_session(ScriptKind::Prediction),
        Err(LauncherError::Config(_))
    ));
}

#[tokio::test]
async fn missing_script_is_reported_before_spawning() {
    let (_ws, settings) = project();
    let launcher = Launcher::with_environment(settings, Default::default());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let err = launcher
        .spawn_captured(ScriptKind::Prediction, Vec::new(), tx)
        .unwrap_err();

    assert!(matches!(err, LauncherError::MissingScript { .. }));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn captured_run_receives_args_and_pythonpath() {
    let (ws, settings) = project();
    let root = settings.root.clone();
    let launcher = Launcher::new(settings);
    let mut session = launcher.open_session(ScriptKind::Training).unwrap();
    session.assign("trainer.lr=0.5").unwrap();
    let args = session.commit();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let supervisor = launcher
        .spawn_captured(ScriptKind::Training, args, tx)
        .unwrap();
    let events = collect(&mut rx).await;

    let lines = stdout(&events);
    assert_eq!(lines[0], "arg:trainer.lr=0.5");
    let pythonpath = lines[1].strip_prefix("pythonpath:").unwrap();
    assert!(pythonpath.starts_with(&root.to_string_lossy().into_owned()));
    assert_eq!(
        lines[2],
        format!("cwd:{}", root.join("dlo_diffusion").display())
    );
    assert_eq!(supervisor.state(), ProcessState::Exited { code: 0 });
    drop(ws);
}

#[tokio::test]
async fn generator_receives_flag_args() {
    let (_ws, settings) = project();
    let launcher = Launcher::new(settings);
    let mut session = launcher.open_session(ScriptKind::DatasetGenerator).unwrap();
    session.assign("num_samples=5").unwrap();
    session.assign("output_dir=data/my run").unwrap();
    let args = session.commit();

    let (tx, mut rx) = mpsc::unbounded_channel();
    launcher
        .spawn_captured(ScriptKind::DatasetGenerator, args, tx)
        .unwrap();
    let events = collect(&mut rx).await;

    assert_eq!(
        &stdout(&events)[..4],
        &[
            "arg:--num_samples",
            "arg:5",
            "arg:--output_dir",
            "arg:data/my run"
        ]
    );
}

#[derive(Default)]
struct RecordingSignaller {
    sent: Mutex<Vec<Signal>>,
}

impl Signaller for RecordingSignaller {
    fn signal_group(&self, pgid: u32, signal: Signal) -> nix::Result<()> {
        self.sent.lock().push(signal);
        UnixSignaller.signal_group(pgid, signal)
    }
}

#[tokio::test]
async fn stopping_a_run_terminates_it() {
    let (ws, settings) = project();
    ws.write("dlo_diffusion/train.py", "echo started\nsleep 30\n");
    let launcher = Launcher::new(settings);
    let signaller = Arc::new(RecordingSignaller::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let supervisor = launcher
        .spawn_captured_with_signaller(ScriptKind::Training, Vec::new(), tx, signaller.clone())
        .unwrap();
    while let Some(event) = rx.recv().await {
        if matches!(event, ProcessEvent::Output { .. }) {
            break;
        }
    }
    supervisor.stop();
    let status = supervisor.wait().await;

    assert!(status.killed);
    assert!(status.state.is_finished());
    assert_eq!(signaller.sent.lock().first(), Some(&Signal::SIGTERM));
}
