//! Theia bus: pub/sub broker for the installation event channel.
//!
//! Carries every installation-wide event between processes: camera motion
//! detections in, head telemetry out, all as channel-tagged JSON frames.
//! Per-publisher ordering is preserved; a dead subscriber is dropped, not
//! waited on. Dev and test installations run this daemon; production may
//! substitute any broker honoring the same frame format.

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use theia_core::bus::Broker;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5600";

fn main() -> theia_core::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Bind address from argv, default otherwise; no other configuration.
    let args: Vec<String> = env::args().collect();
    let bind_address = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

    log::info!("Theia bus v{} starting...", env!("CARGO_PKG_VERSION"));

    let shutdown = Arc::new(AtomicBool::new(false));
    let r = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(true, Ordering::Relaxed);
    })
    .map_err(|e| theia_core::Error::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    let broker = Broker::bind(&bind_address)?;
    log::info!("Theia bus running. Press Ctrl-C to stop.");
    broker.run(shutdown)?;

    log::info!("Theia bus stopped");
    Ok(())
}
