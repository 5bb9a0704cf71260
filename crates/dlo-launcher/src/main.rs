use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use dlo_config::{ConfigDocument, FieldDescriptor};
use dlo_launcher::{EditSession, Launcher, ScriptKind, SettingsLoader};
use dlo_process::{OutputStream, ProcessEvent, ProcessState};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn script_arg() -> Arg {
    Arg::new("script")
        .required(true)
        .value_parser(["dataset-generator", "training", "prediction"])
        .help("Pipeline script")
}

fn assignments_arg(long: bool) -> Arg {
    let arg = Arg::new("assignments")
        .value_name("PATH=VALUE")
        .action(ArgAction::Append)
        .help("Field assignment, e.g. trainer.max_epochs=50");
    if long {
        arg.long("set").short('s')
    } else {
        arg.required(true).num_args(1..)
    }
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print JSON instead of YAML")
}

fn cli() -> Command {
    Command::new("dlo-launcher")
        .version(dlo_launcher::VERSION)
        .about("Configure and launch the DLO dataset, training and prediction scripts")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("settings")
                .long("settings")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Settings file (default: <config dir>/dlo-launcher/settings.toml)"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("More log output (-v debug, -vv trace)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("fields")
                .about("List the editable fields of a script's config")
                .arg(script_arg()),
        )
        .subcommand(
            Command::new("set")
                .about("Change fields and store the overrides")
                .arg(script_arg())
                .arg(assignments_arg(false)),
        )
        .subcommand(
            Command::new("reset")
                .about("Drop all stored overrides of a script")
                .arg(script_arg()),
        )
        .subcommand(
            Command::new("overrides")
                .about("Print the stored overrides of a script")
                .arg(script_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("show")
                .about("Print the effective config of a script")
                .arg(script_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("run")
                .about("Run a script with its stored overrides")
                .arg(script_arg())
                .arg(assignments_arg(true))
                .arg(
                    Arg::new("terminal")
                        .long("terminal")
                        .short('t')
                        .action(ArgAction::SetTrue)
                        .help("Open the script in a new terminal window"),
                ),
        )
}

fn init_tracing(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_document(document: &ConfigDocument, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(document)?);
    } else {
        print!("{}", document.to_yaml_string()?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_count("verbose"), matches.get_flag("log-json"));

    let mut loader = SettingsLoader::new();
    if let Some(path) = matches.get_one::<PathBuf>("settings") {
        loader = loader.with_file(path);
    }
    let settings = loader.load().context("failed to load launcher settings")?;
    info!(root = %settings.root.display(), "project root");
    let launcher = Launcher::new(settings);

    let Some((name, args)) = matches.subcommand() else {
        return Ok(());
    };
    let kind: ScriptKind = args
        .get_one::<String>("script")
        .context("missing script")?
        .parse()?;

    match name {
        "fields" => {
            let session = launcher.open_session(kind)?;
            print_fields(&session);
        }
        "set" => {
            let mut session = launcher.open_session(kind)?;
            apply_assignments(&mut session, args)?;
            let _ = session.commit();
            print!("{}", session.overrides().to_yaml_string()?);
        }
        "reset" => {
            let mut session = launcher.open_session(kind)?;
            session.reset_all();
            let _ = session.commit();
            println!("Cleared overrides for {}", kind.title());
        }
        "overrides" => {
            let session = launcher.open_session(kind)?;
            print_document(&session.overrides(), args.get_flag("json"))?;
        }
        "show" => {
            let session = launcher.open_session(kind)?;
            print_document(&session.effective(), args.get_flag("json"))?;
        }
        "run" => {
            let mut session = launcher.open_session(kind)?;
            apply_assignments(&mut session, args)?;
            let script_args = session.commit();
            if args.get_flag("terminal") {
                let terminal = launcher.launch_in_terminal(kind, script_args)?;
                println!("Opened {} in {}", kind.title(), terminal.name());
            } else {
                let code = run_captured(&launcher, kind, script_args).await?;
                std::process::exit(code);
            }
        }
        other => anyhow::bail!("unknown command {other}"),
    }
    Ok(())
}

fn apply_assignments(session: &mut EditSession, args: &ArgMatches) -> Result<()> {
    for assignment in args.get_many::<String>("assignments").into_iter().flatten() {
        session
            .assign(assignment)
            .with_context(|| format!("cannot apply '{assignment}'"))?;
    }
    Ok(())
}

fn print_fields(session: &EditSession) {
    let fields: Vec<&FieldDescriptor> = session.fields().iter().collect();
    if fields.is_empty() {
        println!(
            "No editable fields ({} missing or empty)",
            session.target().config.display()
        );
        return;
    }
    let width = fields
        .iter()
        .map(|f| f.path().to_string().len())
        .max()
        .unwrap_or(0);
    for field in fields {
        let marker = if field.is_modified() { "*" } else { " " };
        println!(
            "{marker} {:<width$}  {:<5}  {}  (default: {})",
            field.path().to_string(),
            field.kind().as_str(),
            field.state(),
            field.default_value().to_flow(),
        );
    }
}

/// Reaction to a Ctrl-C during a captured run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Nothing to do
    Ignore,
    /// Ask the child to terminate
    Stop,
    /// Leave without waiting for the child
    Quit,
}

/// Ctrl-C bookkeeping for a captured run
#[derive(Debug)]
struct Interrupts {
    listening: bool,
    received: u32,
}

impl Interrupts {
    fn new() -> Self {
        Self {
            listening: true,
            received: 0,
        }
    }

    /// False once the Ctrl-C handler failed to install
    fn listening(&self) -> bool {
        self.listening
    }

    fn on_signal(&mut self, signal: std::io::Result<()>) -> Interrupt {
        if let Err(err) = signal {
            warn!(error = %err, "cannot listen for Ctrl-C, interrupts disabled");
            self.listening = false;
            return Interrupt::Ignore;
        }
        self.received += 1;
        if self.received > 1 {
            Interrupt::Quit
        } else {
            Interrupt::Stop
        }
    }
}

/// Run with output forwarded to the terminal; returns the exit code to use
async fn run_captured(launcher: &Launcher, kind: ScriptKind, args: Vec<String>) -> Result<i32> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let supervisor = launcher.spawn_captured(kind, args, tx)?;
    let mut interrupts = Interrupts::new();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(ProcessEvent::Started { pid }) => eprintln!("[{}] Running (pid={pid})", kind.title()),
                Some(ProcessEvent::Output { stream: OutputStream::Stdout, text }) => println!("{text}"),
                Some(ProcessEvent::Output { stream: OutputStream::Stderr, text }) => eprintln!("{text}"),
                Some(ProcessEvent::ErrorOccurred { description }) => eprintln!("[error] {description}"),
                Some(ProcessEvent::Finished { .. }) | None => break,
            },
            signal = tokio::signal::ctrl_c(), if interrupts.listening() => match interrupts.on_signal(signal) {
                Interrupt::Ignore => {}
                Interrupt::Stop => {
                    eprintln!("[{}] Stopping (press Ctrl-C again to quit)", kind.title());
                    supervisor.stop();
                }
                Interrupt::Quit => {
                    eprintln!("[{}] Interrupted again, leaving without waiting", kind.title());
                    return Ok(130);
                }
            },
        }
    }

    let status = supervisor.wait().await;
    eprintln!("[{}] {status}", kind.title());
    Ok(match status.state {
        ProcessState::Exited { code } => code,
        ProcessState::Crashed { signal } => 128 + signal,
        _ => 1,
    })
}
