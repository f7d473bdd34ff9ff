//! # MMvector Drive
//!
//! Runs one synchronized move on the arm and reports the result.
//!
//! ```text
//! mmvector_drive --config config/arm.toml --move "0:+100,1:-50,5:1"
//! ```
//!
//! Ctrl-C asserts the panic stop: the move is aborted on the next tick with
//! no ramp-out, and the process exits with status 2.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use mmvector_common::consts::DEFAULT_CONFIG_PATH;
use mmvector_common::prelude::*;
use mmvector_drive::bus::sim::SimulatedLines;
use mmvector_drive::command::MoveCommand;
use mmvector_drive::cycle::{FreeRunning, PeriodicPacer, TickPacer, rt_setup};
use mmvector_drive::safety::TracingStatus;
use mmvector_drive::scheduler::{DriveContext, DriveScheduler, MoveOutcome};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// MMvector Drive — synchronized ramp-and-multiplex stepper drive
#[derive(Parser, Debug)]
#[command(name = "mmvector_drive")]
#[command(version)]
#[command(about = "Synchronized six-axis stepper drive over a multiplexed bus")]
struct Args {
    /// Arm configuration TOML. Defaults to /etc/mmvector/arm.toml when
    /// present, built-in reference wiring otherwise.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Move to run, as signed step counts per axis: "0:+100,1:-50,5:1".
    #[arg(short = 'm', long = "move", value_name = "AXIS:STEPS,...", default_value = "")]
    move_steps: String,

    /// Run ticks back to back instead of on the configured tick period.
    #[arg(long)]
    free_run: bool,

    /// Lock memory, pin the thread and use SCHED_FIFO (needs the `rt` feature).
    #[arg(long)]
    realtime: bool,

    /// CPU core to pin the drive thread to.
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority.
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Print the move report as JSON on stdout.
    #[arg(long)]
    report_json: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = load_config(args.config.as_deref());

    let level = match &config {
        Ok(config) => config.shared.log_level,
        Err(_) => LogLevel::Info,
    };
    setup_tracing(&args, level);

    info!("MMvector drive v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|config| run(&args, config));

    match result {
        Ok(MoveOutcome::Completed) => info!("MMvector drive finished"),
        Ok(MoveOutcome::Aborted) => {
            warn!("Move aborted, exiting");
            process::exit(2);
        }
        Ok(MoveOutcome::BusFault) => {
            error!("Move stopped by bus fault, exiting");
            process::exit(1);
        }
        Err(e) => {
            error!("FATAL: {e}");
            process::exit(1);
        }
    }
}

fn run(args: &Args, config: ArmConfig) -> Result<MoveOutcome, Box<dyn std::error::Error>> {
    let ctx = DriveContext::from_config(&config)?;
    info!(
        service = %config.shared.service_name,
        tick_period_us = ctx.tick_period_us,
        total_ramp_delay = ctx.ramp.total_ramp_delay(),
        "Config OK"
    );

    if args.realtime {
        rt_setup(args.cpu_core, args.rt_priority)?;
        info!(
            "RT setup complete (cpu_core={}, priority={})",
            args.cpu_core, args.rt_priority
        );
    }

    let command: MoveCommand = args.move_steps.parse()?;
    let tick_period_us = ctx.tick_period_us;
    // Dry run: no GPIO backend is wired into the binary, and the latch log
    // would grow with every pulse.
    let lines = SimulatedLines::unlogged(ctx.pins);
    let mut drive = DriveScheduler::new(ctx, lines);
    drive.init_driver()?;

    let plan = drive.context().plan(&command);
    info!(
        command = %command,
        predicted_end_tick = plan.predicted_end_tick(&drive.context().ramp),
        "Move planned"
    );

    let mut panic = Arc::new(AtomicBool::new(false));
    let flag = panic.clone();
    ctrlc::set_handler(move || {
        info!("Received stop signal, asserting panic stop");
        flag.store(true, Ordering::SeqCst);
    })?;

    let mut pacer: Box<dyn TickPacer> = if args.free_run {
        Box::new(FreeRunning)
    } else {
        Box::new(PeriodicPacer::from_micros(tick_period_us))
    };

    let report = drive.run_move(&plan, &mut panic, &mut TracingStatus, pacer.as_mut())?;

    if let Some(stats) = pacer.stats() {
        info!(
            ticks = stats.tick_count,
            avg_ns = stats.avg_tick_ns(),
            max_ns = stats.max_tick_ns,
            max_latency_ns = stats.max_latency_ns,
            overruns = stats.overruns,
            "Tick statistics"
        );
    }

    if args.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(report.outcome)
}

/// Explicit path, then the system default path, then built-in defaults.
fn load_config(path: Option<&Path>) -> Result<ArmConfig, ConfigError> {
    match path {
        Some(path) => ArmConfig::load_validated(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                ArmConfig::load_validated(default)
            } else {
                Ok(ArmConfig::default())
            }
        }
    }
}

/// Setup tracing subscriber: `RUST_LOG` wins, then `-v`, then the config.
fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose { LogLevel::Debug } else { level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
