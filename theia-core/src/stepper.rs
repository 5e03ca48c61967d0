//! Stepper position controller core.
//!
//! A head's rotational position lives on a ring of `num_steps` discrete
//! positions. The seek loop advances one step per tick toward the target,
//! always taking the shorter modular direction. This module holds the
//! shared controller state and the single-tick decision; the loops
//! themselves live in the head daemon.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

/// Steps per full revolution for the installed stepper hardware.
pub const DEFAULT_NUM_STEPS: i64 = 200;

/// Default seek speed in steps per second.
pub const DEFAULT_SPEED: f32 = 50.0;

/// Atomic wrapper for f32 values.
/// Uses AtomicU32 with bit reinterpretation.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(val: f32) -> Self {
        Self(AtomicU32::new(val.to_bits()))
    }

    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    pub fn store(&self, val: f32, order: Ordering) {
        self.0.store(val.to_bits(), order);
    }
}

/// Direction of a single physical step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Forward,
    Backward,
}

/// Shared stepper state.
///
/// `pos` is written only by the seek tick and `zero()`; `target` and
/// `speed` are set from the command server and picked up on the next tick.
#[derive(Debug)]
pub struct StepperState {
    pos: AtomicI64,
    target: AtomicI64,
    speed: AtomicF32,
    num_steps: i64,
}

impl StepperState {
    /// Create controller state at position 0.
    pub fn new(num_steps: i64, speed: f32) -> Self {
        Self {
            pos: AtomicI64::new(0),
            target: AtomicI64::new(0),
            speed: AtomicF32::new(speed),
            num_steps,
        }
    }

    pub fn num_steps(&self) -> i64 {
        self.num_steps
    }

    /// Current step position in [0, num_steps).
    pub fn pos(&self) -> i64 {
        self.pos.load(Ordering::Acquire)
    }

    pub fn target(&self) -> i64 {
        self.target.load(Ordering::Acquire)
    }

    pub fn speed(&self) -> f32 {
        self.speed.load(Ordering::Acquire)
    }

    /// Set the target step index. Any integer is accepted; the seek
    /// arithmetic reduces it modulo `num_steps`.
    pub fn set_target(&self, target: i64) {
        self.target.store(target, Ordering::Release);
    }

    /// Set the seek speed in steps per second. Takes effect on the next
    /// tick without restarting the loop. Callers validate the value.
    pub fn set_speed(&self, speed: f32) {
        self.speed.store(speed, Ordering::Release);
    }

    /// Recalibration primitive: reset both current and target position to
    /// 0. Moves the logical frame, not the physical actuator.
    pub fn zero(&self) {
        self.pos.store(0, Ordering::Release);
        self.target.store(0, Ordering::Release);
    }

    /// Convert a rotation in degrees to the nearest step index.
    pub fn steps_for_degrees(&self, degrees: f32) -> i64 {
        (degrees as f64 / 360.0 * self.num_steps as f64).round() as i64
    }

    /// Rotation in degrees for a step position.
    pub fn rotation_degrees(&self, pos: i64) -> f32 {
        pos as f32 / self.num_steps as f32 * 360.0
    }

    /// Time between seek ticks at the current speed.
    pub fn tick_interval(&self) -> Duration {
        // floor keeps a bogus stored speed from producing a zero or
        // non-finite interval
        let speed = self.speed().max(0.001) as f64;
        Duration::from_secs_f64(1.0 / speed)
    }

    /// One seek tick: move one step along the shorter modular direction
    /// toward the target.
    ///
    /// Returns the new position and the direction stepped, or `None` when
    /// already at the target (at rest, nothing to do this tick). Ties
    /// between the two directions favor forward.
    pub fn step_toward_target(&self) -> Option<(i64, StepDirection)> {
        let n = self.num_steps;
        let pos = self.pos.load(Ordering::Acquire);
        let target = self.target.load(Ordering::Acquire);

        let forward = (target - pos).rem_euclid(n);
        let backward = (pos - target).rem_euclid(n);

        let (distance, direction) = if forward <= backward {
            (forward, StepDirection::Forward)
        } else {
            (backward, StepDirection::Backward)
        };

        if distance == 0 {
            return None;
        }

        let delta = match direction {
            StepDirection::Forward => 1,
            StepDirection::Backward => -1,
        };
        let new_pos = (pos + delta).rem_euclid(n);
        self.pos.store(new_pos, Ordering::Release);

        Some((new_pos, direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeks_backward_when_shorter() {
        // target 190 from 0: backward distance 10 beats forward distance 190
        let state = StepperState::new(200, DEFAULT_SPEED);
        state.set_target(190);

        let (pos, dir) = state.step_toward_target().unwrap();
        assert_eq!(pos, 199);
        assert_eq!(dir, StepDirection::Backward);
    }

    #[test]
    fn seeks_forward_when_shorter() {
        let state = StepperState::new(200, DEFAULT_SPEED);
        state.set_target(10);

        let (pos, dir) = state.step_toward_target().unwrap();
        assert_eq!(pos, 1);
        assert_eq!(dir, StepDirection::Forward);
    }

    #[test]
    fn tie_favors_forward() {
        let state = StepperState::new(200, DEFAULT_SPEED);
        state.set_target(100);

        let (pos, dir) = state.step_toward_target().unwrap();
        assert_eq!(pos, 1);
        assert_eq!(dir, StepDirection::Forward);
    }

    #[test]
    fn at_target_is_a_no_op() {
        let state = StepperState::new(200, DEFAULT_SPEED);
        assert!(state.step_toward_target().is_none());

        state.set_target(200); // ≡ 0 on the ring
        assert!(state.step_toward_target().is_none());
    }

    #[test]
    fn position_wraps_around_zero() {
        let state = StepperState::new(200, DEFAULT_SPEED);
        state.set_target(-2); // ≡ 198: backward through 0

        let (pos, dir) = state.step_toward_target().unwrap();
        assert_eq!(pos, 199);
        assert_eq!(dir, StepDirection::Backward);

        let (pos, _) = state.step_toward_target().unwrap();
        assert_eq!(pos, 198);
        assert!(state.step_toward_target().is_none());
    }

    #[test]
    fn converges_in_minimal_distance() {
        let state = StepperState::new(200, DEFAULT_SPEED);
        state.set_target(190);

        let mut ticks = 0;
        while state.step_toward_target().is_some() {
            ticks += 1;
            assert!(ticks < 200, "seek failed to converge");
        }
        assert_eq!(ticks, 10);
        assert_eq!(state.pos(), 190);
    }

    #[test]
    fn degrees_round_to_nearest_step() {
        let state = StepperState::new(200, DEFAULT_SPEED);
        assert_eq!(state.steps_for_degrees(0.0), 0);
        assert_eq!(state.steps_for_degrees(342.0), 190);
        assert_eq!(state.steps_for_degrees(360.0), 200);
        assert_eq!(state.steps_for_degrees(90.0), 50);
        assert!((state.rotation_degrees(50) - 90.0).abs() < 1e-5);
    }

    #[test]
    fn zero_resets_position_and_target() {
        let state = StepperState::new(200, DEFAULT_SPEED);
        state.set_target(5);
        state.step_toward_target();
        assert_ne!(state.pos(), 0);

        state.zero();
        assert_eq!(state.pos(), 0);
        assert_eq!(state.target(), 0);
        assert!(state.step_toward_target().is_none());
    }

    #[test]
    fn speed_changes_apply_to_tick_interval() {
        let state = StepperState::new(200, 50.0);
        assert_eq!(state.tick_interval(), Duration::from_millis(20));

        state.set_speed(100.0);
        assert_eq!(state.tick_interval(), Duration::from_millis(10));
    }
}
