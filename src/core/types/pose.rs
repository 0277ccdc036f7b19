//! Planar and spatial pose types.

use serde::{Deserialize, Serialize};

use crate::core::math::{self, mat3_apply, mat3_mul, rotation_from_ypr, ypr_from_rotation};

/// Robot pose in 2D space: position in meters, heading in radians.
///
/// `theta` is normalized to [-π, π] by the constructor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f32,
    pub y: f32,
    pub theta: f32,
}

impl Pose2D {
    /// Create a new pose with theta normalized to [-π, π].
    #[inline]
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self {
            x,
            y,
            theta: math::normalize_angle(theta),
        }
    }

    /// Identity pose at the origin.
    #[inline]
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        }
    }

    /// Pose composition `self ⊕ other`: apply `other` in the frame of `self`.
    #[inline]
    pub fn compose(&self, other: &Pose2D) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            self.x + other.x * cos_t - other.y * sin_t,
            self.y + other.x * sin_t + other.y * cos_t,
            self.theta + other.theta,
        )
    }

    /// The transform that undoes this pose.
    #[inline]
    pub fn inverse(&self) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            -self.x * cos_t - self.y * sin_t,
            self.x * sin_t - self.y * cos_t,
            -self.theta,
        )
    }

    /// Euclidean distance between the positions of two poses.
    #[inline]
    pub fn distance_to(&self, other: &Pose2D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Default for Pose2D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Rigid-body pose in 3D space: position in meters plus ZYX Euler angles
/// (yaw, pitch, roll) in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Pose3D {
    pub fn new(x: f32, y: f32, z: f32, yaw: f32, pitch: f32, roll: f32) -> Self {
        Self {
            x,
            y,
            z,
            yaw: math::normalize_angle(yaw),
            pitch: math::normalize_angle(pitch),
            roll: math::normalize_angle(roll),
        }
    }

    /// Identity pose at the origin.
    #[inline]
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
        }
    }

    /// Pose composition `self ⊕ other` over the full SE(3) group.
    pub fn compose(&self, other: &Pose3D) -> Pose3D {
        let ra = rotation_from_ypr(self.yaw, self.pitch, self.roll);
        let rb = rotation_from_ypr(other.yaw, other.pitch, other.roll);
        let rc = mat3_mul(&ra, &rb);
        let t = mat3_apply(&ra, [other.x, other.y, other.z]);
        let (yaw, pitch, roll) = ypr_from_rotation(&rc);

        Pose3D {
            x: self.x + t[0],
            y: self.y + t[1],
            z: self.z + t[2],
            yaw,
            pitch,
            roll,
        }
    }

    /// Project onto the ground plane, dropping z and tilt.
    #[inline]
    pub fn to_2d(&self) -> Pose2D {
        Pose2D::new(self.x, self.y, self.yaw)
    }

    /// Euclidean distance between the positions of two poses.
    #[inline]
    pub fn distance_to(&self, other: &Pose3D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Same pose with the height replaced.
    #[inline]
    pub fn with_z(mut self, z: f32) -> Self {
        self.z = z;
        self
    }
}

impl Default for Pose3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Pose2D> for Pose3D {
    fn from(p: Pose2D) -> Self {
        Pose3D {
            x: p.x,
            y: p.y,
            z: 0.0,
            yaw: p.theta,
            pitch: 0.0,
            roll: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_pose2d_compose_identity() {
        let p = Pose2D::new(1.0, 2.0, 0.5);
        let result = p.compose(&Pose2D::identity());
        assert_relative_eq!(result.x, p.x);
        assert_relative_eq!(result.y, p.y);
        assert_relative_eq!(result.theta, p.theta);
    }

    #[test]
    fn test_pose2d_inverse_roundtrip() {
        let p = Pose2D::new(1.0, 2.0, 0.5);
        let result = p.compose(&p.inverse());
        assert_relative_eq!(result.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(result.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(result.theta, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pose2d_compose_rotated() {
        let a = Pose2D::new(0.0, 0.0, FRAC_PI_2);
        let b = Pose2D::new(1.0, 0.0, 0.0);
        let c = a.compose(&b);
        assert_relative_eq!(c.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(c.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pose3d_compose_matches_2d_on_plane() {
        let a2 = Pose2D::new(1.0, -2.0, 0.7);
        let b2 = Pose2D::new(0.5, 0.25, -0.3);
        let c2 = a2.compose(&b2);

        let c3 = Pose3D::from(a2).compose(&Pose3D::from(b2));
        assert_relative_eq!(c3.x, c2.x, epsilon = 1e-5);
        assert_relative_eq!(c3.y, c2.y, epsilon = 1e-5);
        assert_relative_eq!(c3.z, 0.0, epsilon = 1e-6);
        assert_relative_eq!(c3.yaw, c2.theta, epsilon = 1e-5);
        assert_relative_eq!(c3.pitch, 0.0, epsilon = 1e-6);
        assert_relative_eq!(c3.roll, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pose3d_compose_translates_along_z() {
        let tilt = Pose3D::new(0.0, 0.0, 0.0, 0.0, FRAC_PI_2, 0.0);
        let forward = Pose3D::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let c = tilt.compose(&forward);
        // Pitched down by 90°, "forward" points along -z
        assert_relative_eq!(c.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(c.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pose3d_projection() {
        let p = Pose3D::new(1.0, 2.0, 3.0, 0.5, 0.2, -0.1);
        let flat = p.to_2d();
        assert_relative_eq!(flat.x, 1.0);
        assert_relative_eq!(flat.y, 2.0);
        assert_relative_eq!(flat.theta, 0.5);
    }

    #[test]
    fn test_distance_between_poses() {
        let a = Pose3D::new(0.0, 0.0, 0.0, 0.4, 0.0, 0.0);
        let b = Pose3D::new(3.0, 4.0, 0.0, -1.0, 0.0, 0.0);
        assert_relative_eq!(a.distance_to(&b), 5.0);
    }
}
