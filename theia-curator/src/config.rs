//! Configuration for the curator.
//!
//! One TOML file carries connection parameters, grid geometry, decay
//! tuning, and the resolved installation topology (stands with their
//! mounted cameras and heads). Discovery happens elsewhere; by the time
//! this file exists, every address in it is final.

use crate::error::{CuratorError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use theia_core::grid::{DecayMode, GridConfig};
use theia_core::installation::StandConfig;
use theia_core::messages::EVENTS_CHANNEL;

/// Top-level curator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CuratorConfig {
    pub bus: BusSection,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub decay: DecaySection,
    #[serde(default)]
    pub attention: AttentionSection,
    pub observers: ObserverSection,
    pub snapshot: SnapshotSection,
    /// Installation topology
    #[serde(default, rename = "stand")]
    pub stands: Vec<StandConfig>,
}

/// Event bus connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusSection {
    /// Broker address (host:port)
    pub address: String,
    /// Channel carrying installation events
    pub channel: String,
}

/// Decay sweep tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecaySection {
    /// Milliseconds between decay sweeps
    pub interval_ms: u64,
    #[serde(flatten)]
    pub mode: DecayMode,
}

impl Default for DecaySection {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            mode: DecayMode::default(),
        }
    }
}

/// Energy deposit tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttentionSection {
    /// Energy added per covered cell of a motion ray
    pub deposit_energy: f32,
    /// Length of a motion ray in world units
    pub ray_length: f32,
}

impl Default for AttentionSection {
    fn default() -> Self {
        Self {
            deposit_energy: 0.025,
            ray_length: 5.0,
        }
    }
}

/// Observer fan-out binding
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObserverSection {
    /// TCP bind address for live observers (dashboards)
    pub bind_address: String,
}

/// Diagnostic snapshot binding
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotSection {
    /// TCP bind address for grid snapshots
    pub bind_address: String,
}

impl CuratorConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: CuratorConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.decay.mode.validate()?;

        if self.decay.interval_ms == 0 {
            return Err(CuratorError::Config(
                "decay interval must be nonzero".to_string(),
            ));
        }
        if self.attention.deposit_energy <= 0.0 || !self.attention.deposit_energy.is_finite() {
            return Err(CuratorError::Config(format!(
                "deposit energy must be positive: {}",
                self.attention.deposit_energy
            )));
        }
        if self.attention.ray_length <= 0.0 || !self.attention.ray_length.is_finite() {
            return Err(CuratorError::Config(format!(
                "ray length must be positive: {}",
                self.attention.ray_length
            )));
        }
        Ok(())
    }
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            bus: BusSection {
                address: "127.0.0.1:5600".to_string(),
                channel: EVENTS_CHANNEL.to_string(),
            },
            grid: GridConfig::default(),
            decay: DecaySection::default(),
            attention: AttentionSection::default(),
            observers: ObserverSection {
                bind_address: "0.0.0.0:5610".to_string(),
            },
            snapshot: SnapshotSection {
                bind_address: "0.0.0.0:5611".to_string(),
            },
            stands: Vec::new(),
        }
    }
}
