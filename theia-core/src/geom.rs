//! 2D points and rigid mount transforms.
//!
//! Every sensor and actuator in an installation is described by a *mount*:
//! a rigid placement (translation + rotation) in the shared world frame.
//! Motion detections arrive in a camera-local frame and are mapped into
//! world space by the camera's mount; head pointing angles are computed by
//! mapping a world point back through the inverse of the head's mount.

use serde::{Deserialize, Serialize};

/// A 2D point or displacement in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Scale by a scalar factor.
    #[inline]
    pub fn scale(&self, s: f32) -> Vec2 {
        Vec2::new(self.x * s, self.y * s)
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: &Vec2) -> f32 {
        (*other - *self).length()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;

    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Normalize an angle to [-π, π].
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let two_pi = 2.0 * std::f32::consts::PI;
    let mut a = angle % two_pi;
    if a > std::f32::consts::PI {
        a -= two_pi;
    } else if a < -std::f32::consts::PI {
        a += two_pi;
    }
    a
}

/// A rigid 2D transform: rotation by `theta` followed by translation.
///
/// Equivalent to the matrix `translate(x, y) · rotz(theta)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mount {
    /// Translation X in world units
    pub x: f32,
    /// Translation Y in world units
    pub y: f32,
    /// Rotation in radians, normalized to [-π, π]
    pub theta: f32,
}

impl Mount {
    /// Create a new mount with theta normalized to [-π, π].
    #[inline]
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// Identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        }
    }

    /// Mount from a placement given in degrees (the configuration form).
    #[inline]
    pub fn from_placement(x: f32, y: f32, rot_degrees: f32) -> Self {
        Self::new(x, y, rot_degrees.to_radians())
    }

    /// Compose two mounts: apply `other` in this mount's frame.
    ///
    /// Used to resolve a unit mounted on a stand into a single world
    /// transform: `stand.compose(&unit)`.
    #[inline]
    pub fn compose(&self, other: &Mount) -> Mount {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Mount::new(
            self.x + other.x * cos_t - other.y * sin_t,
            self.y + other.x * sin_t + other.y * cos_t,
            self.theta + other.theta,
        )
    }

    /// Inverse transform (world frame back into this mount's local frame).
    #[inline]
    pub fn inverse(&self) -> Mount {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Mount::new(
            -self.x * cos_t - self.y * sin_t,
            self.x * sin_t - self.y * cos_t,
            -self.theta,
        )
    }

    /// Map a point from this mount's local frame into the parent frame.
    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Vec2::new(
            self.x + p.x * cos_t - p.y * sin_t,
            self.y + p.x * sin_t + p.y * cos_t,
        )
    }

    /// World position of the mount origin.
    #[inline]
    pub fn origin(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}
