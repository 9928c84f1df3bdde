//! # HandMov Binary
//!
//! Runs one stepper axis: programs the driver, optionally homes and tours
//! the stored slots, then services buttons until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Simulated board, default config
//! handmov --simulate
//!
//! # Home, visit two slots 10 s apart, then exit
//! handmov -c config/handmov.toml -s --home --tour pos1,pos2 --oneshot
//!
//! # Verbose JSON logs
//! handmov -c config/handmov.toml -s -v --json
//! ```

use clap::Parser;
use handmov_axis::clock::{Clock, SystemClock};
use handmov_axis::hw::ButtonInput;
use handmov_axis::sim::{SimBoard, SimInput};
use handmov_axis::Controller;
use handmov_common::config::{load_unit_config, LogLevel, UnitConfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// HandMov - single-axis stepper control with stall homing and position buttons
#[derive(Parser, Debug)]
#[command(name = "handmov")]
#[command(version)]
#[command(about = "Single-axis stepper control with stall homing and position buttons")]
#[command(long_about = None)]
struct Args {
    /// Unit configuration file (TOML). Built-in defaults when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use the simulated board
    #[arg(short = 's', long)]
    simulate: bool,

    /// Simulated travel above the hard stop [steps]
    #[arg(long, default_value_t = 2_000)]
    travel: i64,

    /// Home before anything else
    #[arg(long)]
    home: bool,

    /// Visit these slots in order (comma separated)
    #[arg(long, value_delimiter = ',')]
    tour: Vec<String>,

    /// Dwell between tour stops [s]
    #[arg(long, default_value_t = 10)]
    dwell: u64,

    /// Exit after homing / touring instead of servicing buttons
    #[arg(long)]
    oneshot: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("HandMov failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_unit_config(path),
        None => Ok(UnitConfig::default()),
    };
    let log_level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);
    let config = config?;

    info!("HandMov v{} starting...", env!("CARGO_PKG_VERSION"));

    if !args.simulate {
        warn!("No hardware backend built in; using the simulated board");
    }
    let board = SimBoard::new(config.driver.descriptor(), args.travel);
    let inputs = config
        .buttons
        .iter()
        .map(|b| ButtonInput::new(b.id.clone(), Box::new(SimInput::released())))
        .collect();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let mut controller = Controller::initialize(
        board.pins(),
        board.bus(config.driver.transaction_timeout()),
        &config,
        clock,
    )?
    .with_inputs(inputs);
    controller.verify_link()?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        let cancel = controller.cancel_token();
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            running.store(false, Ordering::SeqCst);
            cancel.cancel();
        })?;
    }

    if args.home {
        let report = controller.home_configured()?;
        info!(
            "Homed {:?}: stall after {} steps",
            report.direction, report.steps_to_stall
        );
    }

    if !args.tour.is_empty() {
        let outcomes = controller.tour(&args.tour, Duration::from_secs(args.dwell))?;
        info!("Tour finished ({} stops)", outcomes.len());
    }

    if args.oneshot {
        controller.disable();
    } else {
        controller.run(&running);
    }

    info!(
        "HandMov shutdown complete (position {}, simulated carriage {})",
        controller.position(),
        board.axis.position()
    );
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured.as_str()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
