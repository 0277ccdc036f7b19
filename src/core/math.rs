//! Scalar and rotation math shared across the crate.

use std::f32::consts::PI;

/// Normalize an angle to [-π, π].
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    // rem_euclid can land exactly on -π for inputs that wrap to +π
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

/// Shortest signed angular difference `to - from`, in [-π, π].
#[inline]
pub fn angle_diff(from: f32, to: f32) -> f32 {
    normalize_angle(to - from)
}

/// Degrees to radians.
#[inline]
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees * PI / 180.0
}

/// Row-major 3×3 rotation matrix.
pub(crate) type Mat3 = [[f32; 3]; 3];

/// Rotation matrix for a ZYX (yaw, pitch, roll) Euler triplet.
pub(crate) fn rotation_from_ypr(yaw: f32, pitch: f32, roll: f32) -> Mat3 {
    let (sy, cy) = yaw.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sr, cr) = roll.sin_cos();

    [
        [cy * cp, cy * sp * sr - sy * cr, cy * sp * cr + sy * sr],
        [sy * cp, sy * sp * sr + cy * cr, sy * sp * cr - cy * sr],
        [-sp, cp * sr, cp * cr],
    ]
}

pub(crate) fn mat3_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0f32; 3]; 3];
    for (r, row) in out.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = a[r][0] * b[0][c] + a[r][1] * b[1][c] + a[r][2] * b[2][c];
        }
    }
    out
}

pub(crate) fn mat3_apply(m: &Mat3, v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Recover (yaw, pitch, roll) from a ZYX rotation matrix.
///
/// Near the pitch singularity (|r20| ≈ 1) roll is folded into yaw.
pub(crate) fn ypr_from_rotation(m: &Mat3) -> (f32, f32, f32) {
    let r20 = m[2][0].clamp(-1.0, 1.0);
    let pitch = (-r20).asin();

    if r20.abs() < 1.0 - 1e-6 {
        let yaw = m[1][0].atan2(m[0][0]);
        let roll = m[2][1].atan2(m[2][2]);
        (yaw, pitch, roll)
    } else {
        // Gimbal lock: only yaw+roll (or yaw-roll) is observable
        let yaw = (-m[0][1]).atan2(m[1][1]);
        (yaw, pitch, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    #[test]
    fn test_normalize_angle_range() {
        assert_relative_eq!(normalize_angle(0.0), 0.0);
        assert_relative_eq!(normalize_angle(3.0 * PI), PI, epsilon = 1e-5);
        assert_relative_eq!(normalize_angle(-3.0 * PI), PI, epsilon = 1e-5);
        assert_relative_eq!(normalize_angle(2.0 * PI + 0.1), 0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_angle_diff_wraps() {
        assert_relative_eq!(angle_diff(PI - 0.1, -PI + 0.1), 0.2, epsilon = 1e-5);
        assert_relative_eq!(angle_diff(0.0, FRAC_PI_2), FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn test_ypr_roundtrip() {
        let cases = [
            (0.3, 0.2, -0.4),
            (FRAC_PI_4, -FRAC_PI_4, FRAC_PI_4),
            (-1.2, 0.0, 0.0),
            (0.0, 0.0, 1.1),
        ];
        for (yaw, pitch, roll) in cases {
            let m = rotation_from_ypr(yaw, pitch, roll);
            let (y, p, r) = ypr_from_rotation(&m);
            assert_relative_eq!(y, yaw, epsilon = 1e-5);
            assert_relative_eq!(p, pitch, epsilon = 1e-5);
            assert_relative_eq!(r, roll, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_rotation_applies_yaw() {
        let m = rotation_from_ypr(FRAC_PI_2, 0.0, 0.0);
        let v = mat3_apply(&m, [1.0, 0.0, 0.0]);
        assert_relative_eq!(v[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(v[1], 1.0, epsilon = 1e-6);
        assert_relative_eq!(v[2], 0.0, epsilon = 1e-6);
    }
}
