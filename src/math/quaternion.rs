//! Unit quaternion rotations.

use super::vector::{Vector3, Vector4};
use super::{MACHINE_EPSILON_1, MACHINE_EPSILON_10};

/// A rotation stored as (x, y, z, w), w real.
///
/// Constructors produce unit quaternions; operations assume unit length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    pub vector: Vector4,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    /// The no-rotation quaternion.
    pub const IDENTITY: Self = Self {
        vector: Vector4::new(0.0, 0.0, 0.0, 1.0),
    };

    /// Build from an axis and an angle in radians. The axis need not be
    /// normalized.
    pub fn from_axis_angle(axis: Vector3, angle_radians: f32) -> Self {
        let axis = axis.normalized();
        let half = angle_radians * 0.5;
        let s = half.sin();
        Self {
            vector: Vector4::new(axis.x * s, axis.y * s, axis.z * s, half.cos()),
        }
    }

    /// Build from three orthonormal rotation axes (the columns of a pure
    /// rotation matrix), using the largest-component branch to stay
    /// numerically stable.
    pub fn from_axes(x_axis: Vector3, y_axis: Vector3, z_axis: Vector3) -> Self {
        let t = x_axis.x + y_axis.y + z_axis.z;
        let mut q = if t > 0.0 {
            // w is largest
            let root = (t + 1.0).sqrt();
            let one_over_4w = 0.5 / root;
            Self {
                vector: Vector4::new(
                    (y_axis.z - z_axis.y) * one_over_4w,
                    (z_axis.x - x_axis.z) * one_over_4w,
                    (x_axis.y - y_axis.x) * one_over_4w,
                    root * 0.5,
                ),
            }
        } else if z_axis.z > x_axis.x && z_axis.z > y_axis.y {
            // z is largest
            let root = (z_axis.z - x_axis.x - y_axis.y + 1.0).sqrt();
            let one_over_4w = 0.5 / root;
            Self {
                vector: Vector4::new(
                    (x_axis.z + z_axis.x) * one_over_4w,
                    (y_axis.z + z_axis.y) * one_over_4w,
                    root * 0.5,
                    (x_axis.y - y_axis.x) * one_over_4w,
                ),
            }
        } else if y_axis.y > x_axis.x {
            // y is largest
            let root = (y_axis.y - z_axis.z - x_axis.x + 1.0).sqrt();
            let one_over_4w = 0.5 / root;
            Self {
                vector: Vector4::new(
                    (x_axis.y + y_axis.x) * one_over_4w,
                    root * 0.5,
                    (z_axis.y + y_axis.z) * one_over_4w,
                    (z_axis.x - x_axis.z) * one_over_4w,
                ),
            }
        } else {
            // x is largest
            let root = (x_axis.x - y_axis.y - z_axis.z + 1.0).sqrt();
            let one_over_4w = 0.5 / root;
            Self {
                vector: Vector4::new(
                    root * 0.5,
                    (y_axis.x + x_axis.y) * one_over_4w,
                    (z_axis.x + x_axis.z) * one_over_4w,
                    (y_axis.z - z_axis.y) * one_over_4w,
                ),
            }
        };
        q.normalize();
        q
    }

    /// Whether this is (within a relaxed epsilon) the identity rotation.
    /// Composition of rotations accumulates error, hence the slack.
    pub fn is_identity(&self) -> bool {
        // start from w, as it is unlikely that a real rotation has w == 1
        (self.vector.w - 1.0).abs() < MACHINE_EPSILON_10
            && self.vector.x.abs() < MACHINE_EPSILON_10
            && self.vector.y.abs() < MACHINE_EPSILON_10
            && self.vector.z.abs() < MACHINE_EPSILON_10
    }

    pub fn length(&self) -> f32 {
        (self.vector.x * self.vector.x
            + self.vector.y * self.vector.y
            + self.vector.z * self.vector.z
            + self.vector.w * self.vector.w)
            .sqrt()
    }

    pub fn normalize(&mut self) {
        let len = self.length();
        if len > f32::EPSILON {
            self.vector.x /= len;
            self.vector.y /= len;
            self.vector.z /= len;
            self.vector.w /= len;
        }
    }

    pub fn dot(&self, rhs: &Quaternion) -> f32 {
        self.vector.x * rhs.vector.x
            + self.vector.y * rhs.vector.y
            + self.vector.z * rhs.vector.z
            + self.vector.w * rhs.vector.w
    }

    /// Convert back to an axis/angle pair. Returns `None` for the identity
    /// rotation, where the axis is undefined.
    pub fn to_axis_angle(&self) -> Option<(Vector3, f32)> {
        let half = self.vector.w.clamp(-1.0, 1.0).acos();
        let sine = half.sin();
        if sine.abs() <= f32::EPSILON {
            return None;
        }
        let inv = 1.0 / sine;
        Some((
            Vector3::new(
                self.vector.x * inv,
                self.vector.y * inv,
                self.vector.z * inv,
            ),
            half * 2.0,
        ))
    }

    /// Rotations q and -q are the same; compare up to sign.
    pub fn same_rotation(&self, rhs: &Quaternion) -> bool {
        self.dot(rhs).abs() > 1.0 - MACHINE_EPSILON_1 * 10.0
    }
}
