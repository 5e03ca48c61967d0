//! Configuration for the head daemon.
//!
//! Loaded from a TOML file whose parameters arrive already resolved
//! (broker address, bind address, identity); service discovery is a
//! separate concern.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use theia_core::messages::EVENTS_CHANNEL;
use theia_core::stepper::{DEFAULT_NUM_STEPS, DEFAULT_SPEED};

/// Top-level head daemon configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeadDaemonConfig {
    pub head: HeadSection,
    pub stepper: StepperSection,
    pub bus: BusSection,
    pub server: ServerSection,
}

/// Identity of this head within the installation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeadSection {
    /// Head name as it appears in telemetry (e.g. "head-01")
    pub name: String,
    /// Installation this head belongs to
    pub installation: String,
}

/// Stepper geometry and default motion parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StepperSection {
    /// Steps per full revolution
    pub num_steps: i64,
    /// Default seek speed in steps per second
    pub speed: f32,
}

/// Event bus connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusSection {
    /// Broker address (host:port)
    pub address: String,
    /// Channel telemetry is published on
    pub channel: String,
}

/// Command server binding
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    /// TCP bind address for the synchronous command surface
    pub bind_address: String,
}

impl HeadDaemonConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: HeadDaemonConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the seek loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.stepper.num_steps <= 0 {
            return Err(crate::error::HeadError::Config(format!(
                "num_steps must be positive: {}",
                self.stepper.num_steps
            )));
        }
        if !self.stepper.speed.is_finite() || self.stepper.speed <= 0.0 {
            return Err(crate::error::HeadError::Config(format!(
                "speed must be positive: {}",
                self.stepper.speed
            )));
        }
        Ok(())
    }
}

impl Default for HeadDaemonConfig {
    fn default() -> Self {
        Self {
            head: HeadSection {
                name: "head-00".to_string(),
                installation: "dev".to_string(),
            },
            stepper: StepperSection {
                num_steps: DEFAULT_NUM_STEPS,
                speed: DEFAULT_SPEED,
            },
            bus: BusSection {
                address: "127.0.0.1:5600".to_string(),
                channel: EVENTS_CHANNEL.to_string(),
            },
            server: ServerSection {
                bind_address: "0.0.0.0:5740".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = HeadDaemonConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stepper.num_steps, 200);
        assert_eq!(config.bus.channel, "theia-events");
    }

    #[test]
    fn toml_round_trip() {
        let config = HeadDaemonConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[stepper]"));
        assert!(text.contains("num_steps = 200"));

        let back: HeadDaemonConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.head.name, "head-00");
        assert_eq!(back.server.bind_address, "0.0.0.0:5740");
    }

    #[test]
    fn bad_speed_is_rejected() {
        let mut config = HeadDaemonConfig::default();
        config.stepper.speed = 0.0;
        assert!(config.validate().is_err());

        config.stepper.speed = -5.0;
        assert!(config.validate().is_err());
    }
}
