// Mobile Miner console shell
//
// Stages the bundled ccminer binary, starts the controller and the
// environment monitor, then takes start/stop commands from stdin.

use anyhow::{Context, Result};
use clap::Parser;
use mobile_miner::controller::{ControllerHandle, MinerController};
use mobile_miner::event::{start_emitter, StatusPresenter};
use mobile_miner::monitor::{EnvironmentMonitor, SysfsBattery, ThresholdPolicy};
use mobile_miner::notification::LogPresence;
use mobile_miner::staging::stage_executable;
use mobile_miner::{ControllerState, EnvironmentSample, MinerConfig, StartOutcome, StopOutcome};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mobile-miner", version, about = "Run ccminer with battery and thermal auto-pause")]
struct Cli {
    /// Config file (defaults to <config_dir>/mobile-miner/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "mobile_miner=debug"
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Start mining right away
    #[arg(long)]
    start: bool,
}

/// Prints presenter events to the terminal
struct ConsolePresenter;

impl StatusPresenter for ConsolePresenter {
    fn append_line(&mut self, line: &str) {
        println!("{}", line);
    }

    fn state_changed(&mut self, state: ControllerState) {
        println!("[{}]", state);
    }

    fn environment_sampled(&mut self, sample: &EnvironmentSample) {
        tracing::debug!(%sample, "Environment sample");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = MinerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    tracing::info!(data_dir = %config.data_dir.display(), "Configuration loaded");

    let (emitter, dispatch) = start_emitter(Box::new(ConsolePresenter));

    // A staging failure is reported; start() then fails on the missing binary
    match stage_executable(&config.asset_path, &config.executable_path()) {
        Ok(staged) => emitter.line(staged.user_message()),
        Err(e) => emitter.line(e.user_message()),
    }

    let controller = MinerController::start(config.clone(), emitter.clone(), Arc::new(LogPresence));
    let handle = controller.handle();

    let monitor = EnvironmentMonitor::start(
        Box::new(SysfsBattery::new(&config.power_supply_dir)),
        ThresholdPolicy::from_config(&config),
        handle.clone(),
        emitter.clone(),
        config.sample_interval(),
    );

    if cli.start {
        run_command(&handle, "start");
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read command")?;
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command == "quit" || command == "exit" {
            break;
        }
        run_command(&handle, command);
    }

    tracing::info!("Shutting down");
    monitor.stop();
    controller.shutdown();
    drop(emitter);
    if dispatch.join().is_err() {
        tracing::error!("Presenter thread panicked");
    }

    Ok(())
}

fn run_command(handle: &ControllerHandle, command: &str) {
    match command {
        "start" => match handle.start() {
            Ok(StartOutcome::Started { pid, worker }) => {
                tracing::info!(pid, worker = %worker, "Mining started");
            }
            Ok(StartOutcome::AlreadyRunning) => println!("Miner is already running."),
            Err(e) => tracing::debug!(error = %e, "Start failed"),
        },
        "stop" => match handle.stop() {
            Ok(StopOutcome::Stopped) => {}
            Ok(StopOutcome::NotRunning) => println!("Miner is not running."),
            Err(e) => tracing::error!(error = %e, "Stop failed"),
        },
        "toggle" => {
            if let Err(e) = handle.toggle() {
                tracing::debug!(error = %e, "Toggle failed");
            }
        }
        "status" => println!("State: {}", handle.state()),
        "help" => println!("Commands: start, stop, toggle, status, quit"),
        other => println!("Unknown command: {} (try \"help\")", other),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs on stderr so miner output on stdout stays readable
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}
