//! # Skid Pilot
//!
//! Drive a two-wheeled skid-steer vehicle from a dual-analog gamepad.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with a non-blocking tracing subscriber
//!    - Load configuration (first argument, else `config/default.toml`)
//!    - Open the gamepad, calibration storage, motor port and buzzer
//!
//! 2. **Main Loop**
//!    - One cycle per period: read, validate, run the active mode, drive
//!    - Starts in wait mode; R3 enters drive, R3 + Right + Select calibration
//!
//! 3. **Graceful Shutdown**
//!    - Ctrl+C stops both motors and flushes telemetry
//!
//! Set `RUST_LOG=skid_pilot::cycle=debug` for one log line per cycle.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use skid_pilot::calibration::storage::FileStorage;
use skid_pilot::config::Config;
use skid_pilot::controller::dualsense::DualSenseGamepad;
use skid_pilot::feedback::pc_speaker::PcSpeaker;
use skid_pilot::feedback::{Buzzer, SilentBuzzer};
use skid_pilot::motors::sabertooth::SabertoothDriver;
use skid_pilot::motors::{DryRunMotors, MotorOutput};
use skid_pilot::scheduler::{ClockScheduler, SystemClock};
use skid_pilot::serial::open_motor_port;
use skid_pilot::telemetry::TelemetryLogger;
use skid_pilot::vehicle::{ControlLoop, Vehicle};

/// Configuration used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Picks the configuration file: the explicit argument, else the default
/// file if present, else none (built-in defaults).
fn config_path(arg: Option<String>, default: &Path) -> Option<PathBuf> {
    match arg {
        Some(path) => Some(PathBuf::from(path)),
        None if default.exists() => Some(default.to_path_buf()),
        None => None,
    }
}

fn load_config() -> Result<Config> {
    match config_path(std::env::args().nth(1), Path::new(DEFAULT_CONFIG_PATH)) {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))
        }
        None => {
            info!("No configuration file, using defaults");
            Ok(Config::default())
        }
    }
}

fn open_motors(config: &Config) -> Result<Box<dyn MotorOutput>> {
    if !config.motors.enabled {
        info!("Motors disabled, running dry");
        return Ok(Box::new(DryRunMotors::new()));
    }
    let port = open_motor_port(&config.motors.port, config.motors.baud_rate)
        .context("Failed to open motor port")?;
    let driver = SabertoothDriver::new(port, config.motors.address)?;
    Ok(Box::new(driver))
}

fn open_buzzer(config: &Config) -> Box<dyn Buzzer> {
    if !config.feedback.enabled {
        return Box::new(SilentBuzzer);
    }
    match PcSpeaker::open(&config.feedback.device_path) {
        Ok(speaker) => Box::new(speaker),
        Err(e) => {
            warn!("No buzzer, continuing silently: {}", e);
            Box::new(SilentBuzzer)
        }
    }
}

fn open_telemetry(config: &Config) -> Option<TelemetryLogger> {
    if !config.telemetry.enabled {
        return None;
    }
    match TelemetryLogger::new(&config.telemetry) {
        Ok(logger) => Some(logger),
        Err(e) => {
            warn!("Telemetry unavailable: {}", e);
            None
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Skid Pilot v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    let gamepad = DualSenseGamepad::new(&config.controller);
    let storage = FileStorage::new(&config.calibration.storage_path);
    let vehicle = Vehicle::new(gamepad, storage, &config);

    let motors = open_motors(&config)?;
    let buzzer = open_buzzer(&config);
    let telemetry = open_telemetry(&config);
    let scheduler = ClockScheduler::new(SystemClock::new(), config.timing.cycle_period_ms);

    let mut control = ControlLoop::new(vehicle, motors, buzzer, scheduler, telemetry);
    control.start();
    info!("Press Ctrl+C to exit");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    control.run(shutdown).await;

    info!("Stopped after {} cycles", control.cycles());
    Ok(())
}
