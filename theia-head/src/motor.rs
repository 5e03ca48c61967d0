//! Physical motor seam.
//!
//! The seek loop drives whatever implements `MotorDriver`; the actual
//! hardware binding lives outside this daemon. The disconnected driver
//! keeps the daemon fully functional on a bench with no motor attached.

use crate::error::Result;
use theia_core::stepper::StepDirection;

/// One physical step per call, in the given direction.
pub trait MotorDriver: Send {
    fn step(&mut self, direction: StepDirection) -> Result<()>;
}

/// Driver used when no motor hardware is attached.
///
/// Steps are counted and logged at trace level; useful for development
/// and soak testing the control path.
#[derive(Debug, Default)]
pub struct DisconnectedMotor {
    steps: u64,
}

impl DisconnectedMotor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MotorDriver for DisconnectedMotor {
    fn step(&mut self, direction: StepDirection) -> Result<()> {
        self.steps += 1;
        log::trace!("Motor step {:?} (total {})", direction, self.steps);
        Ok(())
    }
}
