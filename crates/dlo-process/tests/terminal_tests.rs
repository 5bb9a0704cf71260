use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dlo_process::terminal::{launch, supported_terminals};
use dlo_process::{find_terminal_in, Activation, ResolvedEnvironment, ScriptInvocation, TerminalError};
use pretty_assertions::assert_eq;

/// Executable that records its arguments and a few variables, one per line
fn fake_terminal(dir: &Path, name: &str, record: &Path) -> PathBuf {
    let path = dir.join(name);
    let body = format!(
        "#!/bin/sh\n\
         {{ for arg in \"$@\"; do printf '%s\\n' \"$arg\"; done; \
            printf 'LD_PRELOAD=%s\\n' \"${{LD_PRELOAD:-unset}}\"; \
            printf 'LD_LIBRARY_PATH=%s\\n' \"${{LD_LIBRARY_PATH:-unset}}\"; \
            printf 'PYTHONPATH=%s\\n' \"${{PYTHONPATH:-unset}}\"; }} > '{}.tmp'\n\
         mv '{0}.tmp' '{0}'\n",
        record.display()
    );
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

async fn wait_for(path: &Path) -> String {
    for _ in 0..100 {
        if let Ok(text) = std::fs::read_to_string(path) {
            return text;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("{} was never written", path.display());
}

#[test]
fn probe_follows_priority_order() {
    let dir = tempfile::tempdir().unwrap();
    let record = dir.path().join("unused");
    fake_terminal(dir.path(), "xterm", &record);
    fake_terminal(dir.path(), "konsole", &record);

    let found = find_terminal_in(dir.path()).unwrap();

    assert_eq!(found.name(), "konsole");
    assert_eq!(found.program(), dir.path().join("konsole"));
}

#[test]
fn probe_ignores_non_executables() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("gnome-terminal"), "not executable").unwrap();
    let record = dir.path().join("unused");
    fake_terminal(dir.path(), "xterm", &record);

    assert_eq!(find_terminal_in(dir.path()).unwrap().name(), "xterm");
}

#[test]
fn launch_without_terminal_lists_alternatives() {
    let empty = tempfile::tempdir().unwrap();
    let env: ResolvedEnvironment = [("PATH", empty.path().to_string_lossy().into_owned())]
        .into_iter()
        .collect();
    let invocation = ScriptInvocation::new("python3", "/repo/train.py", Vec::new());

    let err = launch(&invocation, &Activation::default(), &env).unwrap_err();

    match err {
        TerminalError::NotFound { tried } => assert_eq!(tried, supported_terminals()),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn launch_strips_loader_variables_and_passes_command_text() {
    let dir = tempfile::tempdir().unwrap();
    let record = dir.path().join("record.txt");
    fake_terminal(dir.path(), "gnome-terminal", &record);
    let path = format!("{}:/usr/bin:/bin", dir.path().display());
    let env: ResolvedEnvironment = [
        ("PATH", path.as_str()),
        ("LD_PRELOAD", "/lib/evil.so"),
        ("LD_LIBRARY_PATH", "/opt/conda/lib"),
        ("PYTHONPATH", "/repo"),
    ]
    .into_iter()
    .collect();
    let invocation = ScriptInvocation::new(
        "python3",
        "/repo/dlo_diffusion/train.py",
        vec!["seed=1".to_string()],
    );
    let activation = Activation {
        conda_env: Some("dlo".to_string()),
        ..Activation::default()
    };

    let terminal = launch(&invocation, &activation, &env).unwrap();
    let recorded = wait_for(&record).await;
    let lines: Vec<_> = recorded.lines().collect();

    assert_eq!(terminal.name(), "gnome-terminal");
    assert_eq!(&lines[..3], &["--", "bash", "-lc"]);
    assert_eq!(
        lines[3],
        dlo_process::build_activation_script(&invocation, &activation)
    );
    assert_eq!(
        &lines[4..],
        &["LD_PRELOAD=unset", "LD_LIBRARY_PATH=unset", "PYTHONPATH=/repo"]
    );
}
