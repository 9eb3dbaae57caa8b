//! Math value types used throughout the scene graph.
//!
//! Matrices follow the GL convention: column-major storage, column
//! vectors, translation in the last column. A "transform matrix" is one
//! whose bottom row is (0, 0, 0, 1), i.e. an affine transform with no
//! projective component.

pub mod matrix;
pub mod quaternion;
pub mod vector;

pub use matrix::Matrix;
pub use quaternion::Quaternion;
pub use vector::{Vector2, Vector3, Vector4};

/// Machine epsilon for values in (-0.1, 0.1).
pub const MACHINE_EPSILON_0: f32 = f32::EPSILON;
/// Machine epsilon for values with magnitude below 2.
pub const MACHINE_EPSILON_1: f32 = f32::EPSILON;
/// Machine epsilon for values with magnitude below 20.
pub const MACHINE_EPSILON_10: f32 = 10.0 * f32::EPSILON;
/// Machine epsilon for values with magnitude below 200.
pub const MACHINE_EPSILON_100: f32 = 100.0 * f32::EPSILON;
/// Machine epsilon for values with magnitude below 2000.
pub const MACHINE_EPSILON_1000: f32 = 1000.0 * f32::EPSILON;
/// Machine epsilon for everything larger.
pub const MACHINE_EPSILON_10000: f32 = 10000.0 * f32::EPSILON;

/// Pick a comparison tolerance appropriate for the magnitude of the two
/// values. Floating point resolution degrades with magnitude, so a fixed
/// epsilon either rejects valid large values or accepts garbage small ones.
pub fn ranged_epsilon(a: f32, b: f32) -> f32 {
    let max = a.abs().max(b.abs());
    if max < 0.1 {
        MACHINE_EPSILON_0
    } else if max < 2.0 {
        MACHINE_EPSILON_1
    } else if max < 20.0 {
        MACHINE_EPSILON_10
    } else if max < 200.0 {
        MACHINE_EPSILON_100
    } else if max < 2000.0 {
        MACHINE_EPSILON_1000
    } else {
        MACHINE_EPSILON_10000
    }
}

/// Tolerance-based equality using the ranged epsilon.
pub fn equals(a: f32, b: f32) -> bool {
    (a - b).abs() <= ranged_epsilon(a, b)
}

/// Whether the value is within one machine epsilon of zero.
pub fn equals_zero(v: f32) -> bool {
    v.abs() <= f32::EPSILON
}

/// Wrap a value into the half-open domain [start, end).
pub fn wrap_in_domain(value: f32, start: f32, end: f32) -> f32 {
    let range = end - start;
    if range <= 0.0 {
        return start;
    }
    let mut wrapped = (value - start) % range;
    if wrapped < 0.0 {
        wrapped += range;
    }
    start + wrapped
}

/// Shortest distance between two angles in radians, in [0, pi].
pub fn shortest_angle_distance(a: f32, b: f32) -> f32 {
    let diff = wrap_in_domain(b - a, -std::f32::consts::PI, std::f32::consts::PI);
    diff.abs()
}
