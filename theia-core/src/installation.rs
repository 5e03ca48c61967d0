//! Installation topology: stands, cameras, and heads.
//!
//! Topology arrives as already-resolved configuration (discovery is a
//! separate service's job). Cameras and heads mount on *stands*; a unit's
//! world transform is the stand's placement composed with the unit's
//! placement on the stand.

use crate::error::{Error, Result};
use crate::geom::Mount;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A 2D placement position in configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// One stand and the units mounted on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandConfig {
    pub name: String,
    pub pos: Position,
    /// Rotation in degrees
    pub rot: f32,
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
    #[serde(default)]
    pub heads: Vec<HeadConfig>,
}

/// Camera placement relative to its stand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub name: String,
    pub pos: Position,
    pub rot: f32,
}

/// Head placement relative to its stand, plus where to send it commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadConfig {
    pub name: String,
    pub pos: Position,
    pub rot: f32,
    /// Address of this head's command server
    pub command_addr: String,
}

/// A camera resolved into the world frame.
#[derive(Debug, Clone)]
pub struct Camera {
    pub name: String,
    pub mount: Mount,
}

/// A head resolved into the world frame.
#[derive(Debug, Clone)]
pub struct Head {
    pub name: String,
    pub mount: Mount,
    pub command_addr: String,
}

/// Resolved installation topology.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    cameras: HashMap<String, Camera>,
    heads: HashMap<String, Head>,
}

impl Topology {
    /// Resolve stand-relative placements into world mounts.
    ///
    /// Unit names must be unique across the whole installation.
    pub fn build(stands: &[StandConfig]) -> Result<Self> {
        let mut topology = Topology::default();

        for stand in stands {
            let stand_mount = Mount::from_placement(stand.pos.x, stand.pos.y, stand.rot);

            for camera in &stand.cameras {
                let mount = stand_mount.compose(&Mount::from_placement(
                    camera.pos.x,
                    camera.pos.y,
                    camera.rot,
                ));
                let previous = topology.cameras.insert(
                    camera.name.clone(),
                    Camera {
                        name: camera.name.clone(),
                        mount,
                    },
                );
                if previous.is_some() {
                    return Err(Error::Config(format!(
                        "duplicate camera name: {}",
                        camera.name
                    )));
                }
            }

            for head in &stand.heads {
                let mount = stand_mount.compose(&Mount::from_placement(
                    head.pos.x,
                    head.pos.y,
                    head.rot,
                ));
                let previous = topology.heads.insert(
                    head.name.clone(),
                    Head {
                        name: head.name.clone(),
                        mount,
                        command_addr: head.command_addr.clone(),
                    },
                );
                if previous.is_some() {
                    return Err(Error::Config(format!("duplicate head name: {}", head.name)));
                }
            }
        }

        Ok(topology)
    }

    pub fn camera(&self, name: &str) -> Option<&Camera> {
        self.cameras.get(name)
    }

    pub fn head(&self, name: &str) -> Option<&Head> {
        self.heads.get(name)
    }

    pub fn heads(&self) -> impl Iterator<Item = &Head> {
        self.heads.values()
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    pub fn head_count(&self) -> usize {
        self.heads.len()
    }
}
