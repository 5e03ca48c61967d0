//! Orchestrator: turns the grid's focus into head actuation intents.
//!
//! The mapping from a focus point to per-head target angles is an
//! installation policy, injected as a trait so it can be swapped and
//! tested apart from the relay. The default policy points every head
//! straight at the focus.

use std::collections::HashMap;
use theia_core::command::{HeadCommand, HeadCommandClient, HeadReply};
use theia_core::geom::Vec2;
use theia_core::grid::Focus;
use theia_core::installation::Topology;

/// One head's commanded rotation, in degrees [0, 360).
#[derive(Debug, Clone, PartialEq)]
pub struct HeadTarget {
    pub head_name: String,
    pub degrees: f32,
}

/// Installation policy: where should each head look, given the focus?
pub trait FocusPolicy: Send {
    fn compute_targets(&self, focus: Vec2, topology: &Topology) -> Vec<HeadTarget>;
}

/// Point every head directly at the focus.
///
/// The focus is mapped into each head's local frame through the inverse
/// of its mount; the target angle is the bearing of that local point.
pub struct PointAtFocus;

impl FocusPolicy for PointAtFocus {
    fn compute_targets(&self, focus: Vec2, topology: &Topology) -> Vec<HeadTarget> {
        topology
            .heads()
            .map(|head| {
                let local = head.mount.inverse().apply(focus);
                let degrees = local.y.atan2(local.x).to_degrees().rem_euclid(360.0);
                HeadTarget {
                    head_name: head.name.clone(),
                    degrees,
                }
            })
            .collect()
    }
}

/// Delivery seam for actuation intents; the real implementation talks to
/// a head's command server.
pub trait HeadActuator: Send {
    fn point_to(&self, degrees: f32) -> theia_core::Result<()>;
}

/// Actuator backed by a head's synchronous command surface.
pub struct CommandActuator {
    client: HeadCommandClient,
}

impl CommandActuator {
    pub fn new(command_addr: &str) -> Self {
        Self {
            client: HeadCommandClient::new(command_addr),
        }
    }
}

impl HeadActuator for CommandActuator {
    fn point_to(&self, degrees: f32) -> theia_core::Result<()> {
        match self.client.send(&HeadCommand::Rotation {
            degrees,
            speed: None,
        })? {
            HeadReply::Ok { .. } => Ok(()),
            HeadReply::Error { message } => Err(theia_core::Error::Protocol(message)),
        }
    }
}

/// Consumes the grid's focus and issues actuation intents.
pub struct Orchestrator {
    policy: Box<dyn FocusPolicy>,
    actuators: HashMap<String, Box<dyn HeadActuator>>,
    topology: Topology,
}

impl Orchestrator {
    /// Orchestrator wired to every head's command server.
    pub fn new(policy: Box<dyn FocusPolicy>, topology: Topology) -> Self {
        let actuators = topology
            .heads()
            .map(|head| {
                (
                    head.name.clone(),
                    Box::new(CommandActuator::new(&head.command_addr)) as Box<dyn HeadActuator>,
                )
            })
            .collect();
        Self {
            policy,
            actuators,
            topology,
        }
    }

    /// Orchestrator with injected actuators (testing and dry runs).
    #[allow(dead_code)]
    pub fn with_actuators(
        policy: Box<dyn FocusPolicy>,
        topology: Topology,
        actuators: HashMap<String, Box<dyn HeadActuator>>,
    ) -> Self {
        Self {
            policy,
            actuators,
            topology,
        }
    }

    /// Act on the current focus: at most one call per motion event, always
    /// with the focus produced by that event's own grid update.
    ///
    /// No focus (an empty grid) and per-head delivery failures are both
    /// no-ops for this cycle, never fatal.
    pub fn act(&self, focus: Option<Focus>) {
        let Some(focus) = focus else {
            tracing::trace!("No focus, nothing to act on");
            return;
        };

        for target in self.policy.compute_targets(focus.point, &self.topology) {
            match self.actuators.get(&target.head_name) {
                Some(actuator) => {
                    if let Err(e) = actuator.point_to(target.degrees) {
                        tracing::warn!(
                            "Failed to point {} to {:.1}°: {}",
                            target.head_name,
                            target.degrees,
                            e
                        );
                    }
                }
                None => {
                    tracing::warn!("No actuator for head {}", target.head_name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use theia_core::installation::{CameraConfig, HeadConfig, Position, StandConfig};

    fn topology_with_head(x: f32, y: f32, rot: f32) -> Topology {
        Topology::build(&[StandConfig {
            name: "stand".to_string(),
            pos: Position { x: 0.0, y: 0.0 },
            rot: 0.0,
            cameras: Vec::<CameraConfig>::new(),
            heads: vec![HeadConfig {
                name: "head-01".to_string(),
                pos: Position { x, y },
                rot,
                command_addr: "127.0.0.1:1".to_string(),
            }],
        }])
        .unwrap()
    }

    #[test]
    fn head_at_origin_points_along_bearing() {
        let topology = topology_with_head(0.0, 0.0, 0.0);
        let targets = PointAtFocus.compute_targets(Vec2::new(0.0, 3.0), &topology);

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].head_name, "head-01");
        assert!((targets[0].degrees - 90.0).abs() < 1e-3);
    }

    #[test]
    fn mount_rotation_offsets_the_target_angle() {
        // Head rotated 90° CCW: a focus on world +y sits straight ahead.
        let topology = topology_with_head(0.0, 0.0, 90.0);
        let targets = PointAtFocus.compute_targets(Vec2::new(0.0, 3.0), &topology);
        assert!(targets[0].degrees.abs() < 1e-3 || (targets[0].degrees - 360.0).abs() < 1e-3);

        // And a focus on world +x requires looking 270° around.
        let targets = PointAtFocus.compute_targets(Vec2::new(3.0, 0.0), &topology);
        assert!((targets[0].degrees - 270.0).abs() < 1e-3);
    }

    #[test]
    fn angles_are_normalized_to_positive_degrees() {
        let topology = topology_with_head(0.0, 0.0, 0.0);
        // Focus below the head: bearing -90° must come out as 270°.
        let targets = PointAtFocus.compute_targets(Vec2::new(0.0, -3.0), &topology);
        assert!((targets[0].degrees - 270.0).abs() < 1e-3);
    }
}
