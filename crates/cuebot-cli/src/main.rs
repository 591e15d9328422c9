//! `cuebot` – robot show runner.
//!
//! Boots a simulated rig from `~/.cuebot/config.toml` (or `--config PATH`)
//! and runs one of the modes below.  In `run` and `monitor`, line commands
//! on stdin stand in for the physical buttons and knobs (type `help`).
//!
//! | Mode | What it does |
//! |---|---|
//! | `run` (default) | action runtime, starting at `MainLoop` |
//! | `monitor` | live ADC/LED/servo readout on the display |
//! | `ledtest` | toggle every LED twice a second |
//! | `servotest` | sweep each servo 0 → 1 → 0 |
//! | `actions` | list the registered actions and their tags |
//!
//! Ctrl-C stops any mode cleanly.

mod config;
mod console;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser, ValueEnum};
use colored::Colorize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use cuebot_hal::sim::{SimHardware, SimRig};
use cuebot_runtime::monitor::{self, StatusMonitor, MONITOR_INTERVAL};
use cuebot_runtime::{init_tracing, ActionRegistry, Runner};
use cuebot_sensors::{ButtonBoard, SensorPoller};
use cuebot_types::{CueError, EventPayload};

use crate::config::Config;
use crate::console::Console;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Run,
    Monitor,
    Ledtest,
    Servotest,
    Actions,
}

#[derive(Debug, Parser)]
#[command(name = "cuebot", version, about = "Robot show runner")]
struct Cli {
    #[arg(value_enum, default_value_t = Mode::Run)]
    mode: Mode,

    /// Config file (defaults to ~/.cuebot/config.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _tracing = init_tracing(
        "cuebot",
        Some(if cli.verbose > 0 { "debug" } else { "info" }),
    );

    let path = cli.config.clone().unwrap_or_else(config::config_path);
    let first_run = cli.config.is_none() && !path.exists();
    let cfg = match config::load_from(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    if first_run {
        match config::save_to(&cfg, &path) {
            Ok(()) => println!(
                "  {} Default config written to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            ),
            Err(e) => warn!(error = %e, "could not write default config"),
        }
    }
    info!(config = %path.display(), mode = ?cli.mode, "starting");

    match run_mode(cli.mode, cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "cuebot stopped with an error");
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run_mode(mode: Mode, cfg: Config) -> Result<(), CueError> {
    if mode == Mode::Actions {
        print_actions();
        return Ok(());
    }

    print_banner();
    let rig = build_rig(&cfg);
    let buttons = Arc::new(ButtonBoard::new(&cfg.buttons, Arc::clone(&rig.context)));

    match mode {
        Mode::Run => run(cfg, rig, buttons).await,
        Mode::Monitor => run_monitor(cfg, rig, buttons).await,
        Mode::Ledtest => {
            tokio::select! {
                _ = ctrl_c() => {}
                res = monitor::led_test(&rig.context, None) => res?,
            }
            rig.context.clear_all_leds()
        }
        Mode::Servotest => {
            tokio::select! {
                _ = ctrl_c() => Ok(()),
                res = monitor::servo_test(&rig.context) => res,
            }
        }
        Mode::Actions => Ok(()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Modes
// ─────────────────────────────────────────────────────────────────────────────

async fn run(cfg: Config, rig: SimHardware, buttons: Arc<ButtonBoard>) -> Result<(), CueError> {
    let runner = Runner::new(
        cfg.to_runner_config(),
        Arc::clone(&rig.context),
        Box::new(rig.sensors),
        Arc::clone(&buttons),
        Arc::new(ActionRegistry::builtin()),
    )?;

    let mut events = runner.bus().subscribe();
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match event.payload {
                EventPayload::ActionStarted { action } => {
                    println!("  {} {}", "▶".cyan(), action.bold());
                }
                EventPayload::ActionFailed { action, error } => {
                    println!("  {} {}: {}", "✗".red(), action.bold(), error);
                }
                _ => {}
            }
        }
    });

    let console = Console::new(
        Arc::clone(&rig.context),
        buttons,
        rig.sensor_handle,
        cfg.channels,
        Some(runner.handle()),
    );
    println!("  Type {} for a list of commands.\n", "help".bold().cyan());

    runner
        .run_until(async {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = console.run() => {}
            }
        })
        .await
}

async fn run_monitor(
    cfg: Config,
    rig: SimHardware,
    buttons: Arc<ButtonBoard>,
) -> Result<(), CueError> {
    let poller = SensorPoller::new(Box::new(rig.sensors)).with_tolerance(cfg.change_tolerance);
    let _adc_buttons = buttons.install_adc_buttons(&poller.registrar(), cfg.button_threshold);

    let console = Console::new(
        Arc::clone(&rig.context),
        buttons,
        rig.sensor_handle,
        cfg.channels,
        None,
    );
    println!("  Type {} for a list of commands.\n", "help".bold().cyan());

    StatusMonitor::new(Arc::clone(&rig.context))
        .run_until(poller, MONITOR_INTERVAL, async {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = console.run() => {}
            }
        })
        .await
}

fn print_actions() {
    let registry = ActionRegistry::builtin();
    for name in registry.names() {
        let tags = registry.tags_of(name).unwrap_or_default();
        if tags.is_empty() {
            println!("  {}", name.bold());
        } else {
            println!("  {} {}", name.bold(), format!("[{}]", tags.join(", ")).dimmed());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn build_rig(cfg: &Config) -> SimHardware {
    let mut rig = SimRig::new(cfg.channels)
        .with_leds(cfg.led_count())
        .with_display()
        .with_sound();
    for servo in &cfg.servos {
        rig = rig.with_servo(servo.label.clone());
    }
    rig.build()
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    println!();
    println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
}

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "cuebot".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Robot show runner (simulated hardware)");
    println!();
}
