//! Theia head daemon.
//!
//! Runs one motorized head: a seek loop stepping the physical position
//! toward its target, a telemetry loop reporting every step onto the
//! event bus, and a synchronous TCP command surface for operators and the
//! curator.

mod config;
mod error;
mod motor;
mod seek;
mod server;

use crate::config::HeadDaemonConfig;
use crate::error::Result;
use crate::motor::DisconnectedMotor;
use crate::seek::{SeekLoop, TelemetryLoop};
use crate::server::CommandServer;
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use theia_core::bus::BusPublisher;
use theia_core::stepper::StepperState;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `theia-head <path>` (positional)
/// - `theia-head --config <path>` (flag-based)
/// - `theia-head -c <path>` (short flag)
///
/// Defaults to `/etc/theia-head.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/theia-head.toml".to_string()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Theia head daemon v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = parse_config_path();
    let config = if Path::new(&config_path).exists() {
        log::info!("Using config: {}", config_path);
        HeadDaemonConfig::load(&config_path)?
    } else {
        log::info!("No config at {}, using defaults", config_path);
        HeadDaemonConfig::default()
    };

    log::info!(
        "Head {} ({}): {} steps/rev, {} steps/sec",
        config.head.name,
        config.head.installation,
        config.stepper.num_steps,
        config.stepper.speed
    );

    // Bus connection is required: a head that cannot report positions can
    // still move, but a head that cannot connect at startup is misconfigured.
    let publisher = BusPublisher::connect(&config.bus.address)?;

    let state = Arc::new(StepperState::new(
        config.stepper.num_steps,
        config.stepper.speed,
    ));

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| error::HeadError::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    // Seek and telemetry loops, decoupled by an unbounded FIFO queue
    let (position_tx, position_rx) = crossbeam_channel::unbounded::<i64>();

    let seek = SeekLoop::new(
        Arc::clone(&state),
        Box::new(DisconnectedMotor::new()),
        position_tx,
        Arc::clone(&running),
    );
    let seek_handle = thread::Builder::new()
        .name("seek".to_string())
        .spawn(move || seek.run())?;

    let telemetry = TelemetryLoop::new(
        position_rx,
        publisher,
        Arc::clone(&state),
        config.bus.channel.clone(),
        config.head.name.clone(),
        config.head.installation.clone(),
    );
    let telemetry_handle = thread::Builder::new()
        .name("telemetry".to_string())
        .spawn(move || telemetry.run())?;

    // Command server
    let server = CommandServer::bind(
        &config.server.bind_address,
        Arc::clone(&state),
        config.head.name.clone(),
        Arc::clone(&running),
    )?;
    log::info!("Command server listening on {}", server.local_addr()?);
    let server_handle = thread::Builder::new()
        .name("command-server".to_string())
        .spawn(move || {
            if let Err(e) = server.run() {
                log::error!("Command server error: {}", e);
            }
        })?;

    log::info!("Theia head running. Press Ctrl-C to stop.");

    // Main loop - periodic status while the threads work
    let mut last_stats = Instant::now();
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));

        if last_stats.elapsed().as_secs() >= 10 {
            log::debug!(
                "Position {} target {} speed {}",
                state.pos(),
                state.target(),
                state.speed()
            );
            last_stats = Instant::now();
        }
    }

    log::info!("Shutting down...");
    if seek_handle.join().is_err() {
        log::error!("Seek thread panicked");
    }
    // Seek loop dropped the queue sender; telemetry drains and exits.
    if telemetry_handle.join().is_err() {
        log::error!("Telemetry thread panicked");
    }
    if server_handle.join().is_err() {
        log::error!("Command server thread panicked");
    }

    log::info!("Theia head stopped");
    Ok(())
}
