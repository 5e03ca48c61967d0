//! Theia curator: the installation's coordinating process.
//!
//! Subscribes to the shared event bus, folds camera motion events into a
//! decaying attention grid, and points every head at the grid's focus.
//!
//! ## Threads
//!
//! - **Relay**: pulls bus messages in order, updates the grid, drives the
//!   orchestrator, forwards passthrough kinds to observers
//! - **Decay**: periodic sweep bleeding energy out of the grid
//! - **Observer hub**: fans selected messages out to connected dashboards
//! - **Snapshot**: serves one PGM image of the grid per connection

mod config;
mod decay;
mod error;
mod observers;
mod orchestrator;
mod relay;
mod snapshot;

use crate::config::CuratorConfig;
use crate::decay::DecayTask;
use crate::error::Result;
use crate::observers::ObserverHub;
use crate::orchestrator::{Orchestrator, PointAtFocus};
use crate::relay::Relay;
use crate::snapshot::SnapshotServer;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use theia_core::bus::BusSubscriber;
use theia_core::grid::{AttentionGrid, SharedGrid};
use theia_core::installation::Topology;
use theia_core::metrics::MessageCounters;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("theia_curator=info".parse().unwrap()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let config = if args.len() > 1 && !args[1].starts_with("--") {
        let config_path = Path::new(&args[1]);
        info!("Loading configuration from {:?}", config_path);
        CuratorConfig::load(config_path)?
    } else if Path::new("curator.toml").exists() {
        info!("Loading configuration from curator.toml");
        CuratorConfig::load(Path::new("curator.toml"))?
    } else {
        info!("Using default configuration");
        CuratorConfig::default()
    };

    info!("Theia curator v{}", env!("CARGO_PKG_VERSION"));

    // Resolve topology
    let topology = Topology::build(&config.stands)?;
    info!(
        "Topology: {} cameras, {} heads",
        topology.camera_count(),
        topology.head_count()
    );
    if topology.camera_count() == 0 {
        warn!("No cameras configured; the grid will never receive deposits");
    }

    // Process-lifetime grid, shared between relay and decay
    let grid: SharedGrid = Arc::new(Mutex::new(AttentionGrid::new(&config.grid)));
    info!(
        "Attention grid: {}x{} cells over [{}, {}] x [{}, {}]",
        config.grid.width,
        config.grid.height,
        config.grid.min_x,
        config.grid.max_x,
        config.grid.min_y,
        config.grid.max_y
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let r = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(true, Ordering::Relaxed);
    })
    .map_err(|e| error::CuratorError::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    // Observer fan-out and diagnostic snapshot endpoints
    let mut observer_hub = ObserverHub::start(&config.observers.bind_address, Arc::clone(&shutdown))?;
    info!("Observer fan-out listening on {}", observer_hub.local_addr());
    let mut snapshot_server = SnapshotServer::start(
        &config.snapshot.bind_address,
        Arc::clone(&grid),
        Arc::clone(&shutdown),
    )?;
    info!("Snapshot endpoint listening on {}", snapshot_server.local_addr());

    // Bus subscription is required: without it this process has no inputs.
    let subscriber = BusSubscriber::connect(&config.bus.address, &[config.bus.channel.as_str()])?;

    let counters = Arc::new(MessageCounters::new());

    // Decay thread
    let decay_handle = DecayTask::new(
        Arc::clone(&grid),
        Duration::from_millis(config.decay.interval_ms),
        config.decay.mode.clone(),
        Arc::clone(&shutdown),
    )
    .spawn()?;

    // Relay thread
    let orchestrator = Orchestrator::new(Box::new(PointAtFocus), topology.clone());
    let mut relay = Relay::new(
        Arc::clone(&grid),
        topology,
        orchestrator,
        observer_hub.sender(),
        Arc::clone(&counters),
        config.attention.deposit_energy,
        config.attention.ray_length,
    );
    let relay_shutdown = Arc::clone(&shutdown);
    let relay_handle = thread::Builder::new()
        .name("relay".to_string())
        .spawn(move || {
            if let Err(e) = relay.run(subscriber, relay_shutdown) {
                error!("Relay error: {}", e);
            }
        })?;

    info!("Theia curator running. Press Ctrl-C to stop.");

    // Main thread: monitor and periodic stats
    let mut last_stats = Instant::now();
    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(500));

        if relay_handle.is_finished() {
            warn!("Relay thread exited; shutting down");
            shutdown.store(true, Ordering::Relaxed);
            break;
        }

        if last_stats.elapsed().as_secs() >= 60 {
            info!(
                "Ingested {} messages, grid energy {:.4}",
                counters.total(),
                grid.lock().total_energy()
            );
            last_stats = Instant::now();
        }
    }

    shutdown.store(true, Ordering::Relaxed);
    info!("Waiting for threads to finish...");

    if relay_handle.join().is_err() {
        error!("Relay thread panicked");
    }
    if decay_handle.join().is_err() {
        error!("Decay thread panicked");
    }
    observer_hub.join();
    snapshot_server.join();

    counters.log_summary();
    info!("Theia curator finished");
    Ok(())
}
