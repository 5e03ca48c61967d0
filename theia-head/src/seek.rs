//! Seek and telemetry loops.
//!
//! Two threads share the stepper state: the seek loop advances the
//! physical position one step per tick, the telemetry loop reports each
//! step onto the bus. They are decoupled by an unbounded FIFO queue so a
//! stalled bus never delays physical stepping, and a burst of steps is
//! never coalesced; every step becomes exactly one telemetry event, in
//! order.

use crate::motor::MotorDriver;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use theia_core::bus::BusPublisher;
use theia_core::messages::{BusMessage, HeadPositioned};
use theia_core::stepper::StepperState;

/// One seek tick: step toward the target if not already there.
///
/// Returns true when a physical step was taken. The new position is
/// enqueued for telemetry with a non-blocking send; the queue is unbounded
/// so the seek cadence never depends on the publisher.
pub fn seek_tick(
    state: &StepperState,
    motor: &mut dyn MotorDriver,
    queue: &Sender<i64>,
) -> bool {
    let Some((pos, direction)) = state.step_toward_target() else {
        return false;
    };

    if let Err(e) = motor.step(direction) {
        // A failed pulse must not stop the loop; the head keeps seeking.
        log::error!("Motor step failed: {}", e);
    }

    if queue.send(pos).is_err() {
        log::warn!("Telemetry queue closed, position {} not reported", pos);
    }

    true
}

/// The seek loop thread body.
pub struct SeekLoop {
    state: Arc<StepperState>,
    motor: Box<dyn MotorDriver>,
    queue: Sender<i64>,
    shutdown: Arc<AtomicBool>,
}

impl SeekLoop {
    pub fn new(
        state: Arc<StepperState>,
        motor: Box<dyn MotorDriver>,
        queue: Sender<i64>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            state,
            motor,
            queue,
            shutdown,
        }
    }

    /// Run until shutdown. Tick period is `1 / speed`, re-read every tick
    /// so speed changes apply without restarting the loop.
    pub fn run(mut self) {
        log::info!("Seek loop started ({} steps/rev)", self.state.num_steps());

        while !self.shutdown.load(Ordering::Relaxed) {
            seek_tick(&self.state, self.motor.as_mut(), &self.queue);
            std::thread::sleep(self.state.tick_interval());
        }

        log::info!("Seek loop exiting");
        // Dropping self.queue here closes the telemetry loop's receive end.
    }
}

/// The telemetry loop thread body.
///
/// Blocks on the queue and publishes one `head-positioned` event per
/// enqueued step. Publish failures are logged and dropped: lost telemetry
/// is acceptable, lost physical control is not.
pub struct TelemetryLoop {
    queue: Receiver<i64>,
    publisher: BusPublisher,
    state: Arc<StepperState>,
    channel: String,
    head_name: String,
    installation: String,
}

impl TelemetryLoop {
    pub fn new(
        queue: Receiver<i64>,
        publisher: BusPublisher,
        state: Arc<StepperState>,
        channel: String,
        head_name: String,
        installation: String,
    ) -> Self {
        Self {
            queue,
            publisher,
            state,
            channel,
            head_name,
            installation,
        }
    }

    /// Run until the seek loop drops its end of the queue.
    pub fn run(mut self) {
        log::info!("Telemetry loop started for {}", self.head_name);
        let mut published: u64 = 0;
        let mut failed: u64 = 0;

        while let Ok(pos) = self.queue.recv() {
            let message = BusMessage::HeadPositioned(HeadPositioned {
                head_name: self.head_name.clone(),
                step_position: pos,
                rotation: self.state.rotation_degrees(pos),
                installation: Some(self.installation.clone()),
            });

            match self.publisher.publish(&self.channel, &message) {
                Ok(()) => published += 1,
                Err(e) => {
                    failed += 1;
                    log::error!("Failed to publish position {}: {}", pos, e);
                }
            }
        }

        log::info!(
            "Telemetry loop exiting ({} published, {} failed)",
            published,
            failed
        );
    }
}
