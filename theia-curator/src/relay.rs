//! Event relay: the curator's ingest loop.
//!
//! One subscriber pulls every installation event off the bus and handles
//! it to completion before the next is touched. That single-threaded
//! discipline is what makes the pipeline coherent: a motion event's grid
//! deposit always lands before any later message is dispatched, and the
//! orchestrator only ever acts on the focus its own event produced.

use crate::error::Result;
use crate::observers::ObserverSender;
use crate::orchestrator::Orchestrator;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use theia_core::bus::{BusSubscriber, Envelope};
use theia_core::geom::Vec2;
use theia_core::grid::SharedGrid;
use theia_core::installation::Topology;
use theia_core::messages::{BusMessage, MotionDetected};
use theia_core::metrics::MessageCounters;

/// The relay and everything a message dispatch can touch.
pub struct Relay {
    grid: SharedGrid,
    topology: Topology,
    orchestrator: Orchestrator,
    observers: ObserverSender,
    counters: Arc<MessageCounters>,
    deposit_energy: f32,
    ray_length: f32,
}

impl Relay {
    pub fn new(
        grid: SharedGrid,
        topology: Topology,
        orchestrator: Orchestrator,
        observers: ObserverSender,
        counters: Arc<MessageCounters>,
        deposit_energy: f32,
        ray_length: f32,
    ) -> Self {
        Self {
            grid,
            topology,
            orchestrator,
            observers,
            counters,
            deposit_energy,
            ray_length,
        }
    }

    /// Receive loop. Runs until shutdown; a bus failure is fatal to this
    /// process's event path and is returned to the caller (reconnection
    /// policy lives outside the core).
    pub fn run(&mut self, subscriber: BusSubscriber, shutdown: Arc<AtomicBool>) -> Result<()> {
        let mut subscriber = subscriber;
        subscriber.set_timeout(Some(Duration::from_millis(500)))?;

        tracing::info!(
            "Relay started ({} cameras, {} heads)",
            self.topology.camera_count(),
            self.topology.head_count()
        );

        while !shutdown.load(Ordering::Relaxed) {
            match subscriber.try_recv() {
                Ok(Some(envelope)) => self.handle_envelope(&envelope),
                Ok(None) => {} // timeout, poll shutdown again
                Err(e) => {
                    tracing::error!("Bus receive failed: {}", e);
                    return Err(e.into());
                }
            }
        }

        tracing::info!("Relay exiting ({} messages ingested)", self.counters.total());
        Ok(())
    }

    /// Dispatch one bus message, strictly in arrival order.
    pub fn handle_envelope(&mut self, envelope: &Envelope) {
        let message = match envelope.decode() {
            Ok(message) => message,
            Err(e) => {
                self.counters.increment(&envelope.channel, "rejected", "unknown");
                tracing::warn!("Rejected undecodable message: {}", e);
                return;
            }
        };

        self.counters.increment(
            &envelope.channel,
            message.kind(),
            message.source().unwrap_or("unknown"),
        );

        match message {
            BusMessage::MotionDetected(motion) => self.handle_motion(&motion),
            BusMessage::HeadPositioned(_) | BusMessage::Active(_) => {
                // Re-broadcast verbatim for live dashboards; never fed back
                // into the grid.
                self.observers.send(envelope.payload.clone());
            }
        }
    }

    /// Fold one motion detection into the grid and act on the new focus.
    fn handle_motion(&self, motion: &MotionDetected) {
        let Some(camera) = self.topology.camera(&motion.camera_name) else {
            tracing::warn!("Motion from unknown camera {:?}", motion.camera_name);
            return;
        };

        // Camera-local ray: from the mount origin, `ray_length` along the
        // detected angle, mapped into the world frame.
        let angle = motion.position.to_radians();
        let tip_local = Vec2::new(
            self.ray_length * angle.cos(),
            self.ray_length * angle.sin(),
        );

        let p0 = camera.mount.origin();
        let p1 = camera.mount.apply(tip_local);

        // Deposit and focus under one lock; the orchestrator acts after the
        // lock drops, still before the next message is dispatched.
        let focus = {
            let mut grid = self.grid.lock();
            grid.deposit(p0, p1, self.deposit_energy);
            grid.focus()
        };

        self.orchestrator.act(focus);
    }
}
