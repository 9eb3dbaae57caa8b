//! 4x4 matrices for scene-graph transforms.
//!
//! Storage is column-major (GL layout): element (row, col) lives at
//! `data[col * 4 + row]`, the rotation axes are the first three columns
//! and the translation is column 3. The mathematical bottom row of a
//! valid transform matrix is therefore `data[3]`, `data[7]`, `data[11]`,
//! `data[15]` and must be (0, 0, 0, 1).

use std::ops::Mul;

use bytemuck::{Pod, Zeroable};

use super::quaternion::Quaternion;
use super::vector::{Vector3, Vector4};
use super::{equals, equals_zero, ranged_epsilon};

// Deliberately large: scale/rotation decomposition tolerates drift from
// repeated composition.
const ROTATION_EPSILON: f32 = 0.003;

/// A 4x4 transformation matrix.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct Matrix {
    /// Column-major components.
    pub data: [f32; 16],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Self = Self {
        data: [
            1.0, 0.0, 0.0, 0.0, // column 0
            0.0, 1.0, 0.0, 0.0, // column 1
            0.0, 0.0, 1.0, 0.0, // column 2
            0.0, 0.0, 0.0, 1.0, // column 3
        ],
    };

    pub const fn from_columns(data: [f32; 16]) -> Self {
        Self { data }
    }

    /// Build a pure translation matrix.
    pub fn translation(t: Vector3) -> Self {
        let mut m = Self::IDENTITY;
        m.set_translation(t);
        m
    }

    pub fn x_axis(&self) -> Vector3 {
        Vector3::new(self.data[0], self.data[1], self.data[2])
    }

    pub fn y_axis(&self) -> Vector3 {
        Vector3::new(self.data[4], self.data[5], self.data[6])
    }

    pub fn z_axis(&self) -> Vector3 {
        Vector3::new(self.data[8], self.data[9], self.data[10])
    }

    pub fn set_x_axis(&mut self, axis: Vector3) {
        self.data[0] = axis.x;
        self.data[1] = axis.y;
        self.data[2] = axis.z;
    }

    pub fn set_y_axis(&mut self, axis: Vector3) {
        self.data[4] = axis.x;
        self.data[5] = axis.y;
        self.data[6] = axis.z;
    }

    pub fn set_z_axis(&mut self, axis: Vector3) {
        self.data[8] = axis.x;
        self.data[9] = axis.y;
        self.data[10] = axis.z;
    }

    pub fn translation3(&self) -> Vector3 {
        Vector3::new(self.data[12], self.data[13], self.data[14])
    }

    pub fn set_translation(&mut self, t: Vector3) {
        self.data[12] = t.x;
        self.data[13] = t.y;
        self.data[14] = t.z;
    }

    /// Whether the bottom row is (0, 0, 0, 1), i.e. the matrix is a valid
    /// affine transform.
    pub fn is_transform(&self) -> bool {
        equals_zero(self.data[3])
            && equals_zero(self.data[7])
            && equals_zero(self.data[11])
            && equals(self.data[15], 1.0)
    }

    /// Transform a point (w = 1) by this matrix, dropping the resulting w.
    pub fn transform_point(&self, p: Vector3) -> Vector3 {
        let v = self.transform(Vector4::new(p.x, p.y, p.z, 1.0));
        v.xyz()
    }

    pub fn transform(&self, v: Vector4) -> Vector4 {
        let m = &self.data;
        Vector4::new(
            m[0] * v.x + m[4] * v.y + m[8] * v.z + m[12] * v.w,
            m[1] * v.x + m[5] * v.y + m[9] * v.z + m[13] * v.w,
            m[2] * v.x + m[6] * v.y + m[10] * v.z + m[14] * v.w,
            m[3] * v.x + m[7] * v.y + m[11] * v.z + m[15] * v.w,
        )
    }

    /// General 4x4 inverse via cofactor expansion.
    ///
    /// Returns `false` and leaves the matrix untouched when the determinant
    /// is exactly zero. The caller decides whether a singular transform is
    /// recoverable; typically the frame's use of it is skipped.
    pub fn invert(&mut self) -> bool {
        let m = self.data;
        let mut inv = [0.0f32; 16];

        inv[0] = m[5] * m[10] * m[15] - m[5] * m[11] * m[14] - m[9] * m[6] * m[15]
            + m[9] * m[7] * m[14]
            + m[13] * m[6] * m[11]
            - m[13] * m[7] * m[10];
        inv[4] = -m[4] * m[10] * m[15] + m[4] * m[11] * m[14] + m[8] * m[6] * m[15]
            - m[8] * m[7] * m[14]
            - m[12] * m[6] * m[11]
            + m[12] * m[7] * m[10];
        inv[8] = m[4] * m[9] * m[15] - m[4] * m[11] * m[13] - m[8] * m[5] * m[15]
            + m[8] * m[7] * m[13]
            + m[12] * m[5] * m[11]
            - m[12] * m[7] * m[9];
        inv[12] = -m[4] * m[9] * m[14] + m[4] * m[10] * m[13] + m[8] * m[5] * m[14]
            - m[8] * m[6] * m[13]
            - m[12] * m[5] * m[10]
            + m[12] * m[6] * m[9];
        inv[1] = -m[1] * m[10] * m[15] + m[1] * m[11] * m[14] + m[9] * m[2] * m[15]
            - m[9] * m[3] * m[14]
            - m[13] * m[2] * m[11]
            + m[13] * m[3] * m[10];
        inv[5] = m[0] * m[10] * m[15] - m[0] * m[11] * m[14] - m[8] * m[2] * m[15]
            + m[8] * m[3] * m[14]
            + m[12] * m[2] * m[11]
            - m[12] * m[3] * m[10];
        inv[9] = -m[0] * m[9] * m[15] + m[0] * m[11] * m[13] + m[8] * m[1] * m[15]
            - m[8] * m[3] * m[13]
            - m[12] * m[1] * m[11]
            + m[12] * m[3] * m[9];
        inv[13] = m[0] * m[9] * m[14] - m[0] * m[10] * m[13] - m[8] * m[1] * m[14]
            + m[8] * m[2] * m[13]
            + m[12] * m[1] * m[10]
            - m[12] * m[2] * m[9];
        inv[2] = m[1] * m[6] * m[15] - m[1] * m[7] * m[14] - m[5] * m[2] * m[15]
            + m[5] * m[3] * m[14]
            + m[13] * m[2] * m[7]
            - m[13] * m[3] * m[6];
        inv[6] = -m[0] * m[6] * m[15] + m[0] * m[7] * m[14] + m[4] * m[2] * m[15]
            - m[4] * m[3] * m[14]
            - m[12] * m[2] * m[7]
            + m[12] * m[3] * m[6];
        inv[10] = m[0] * m[5] * m[15] - m[0] * m[7] * m[13] - m[4] * m[1] * m[15]
            + m[4] * m[3] * m[13]
            + m[12] * m[1] * m[7]
            - m[12] * m[3] * m[5];
        inv[14] = -m[0] * m[5] * m[14] + m[0] * m[6] * m[13] + m[4] * m[1] * m[14]
            - m[4] * m[2] * m[13]
            - m[12] * m[1] * m[6]
            + m[12] * m[2] * m[5];
        inv[3] = -m[1] * m[6] * m[11] + m[1] * m[7] * m[10] + m[5] * m[2] * m[11]
            - m[5] * m[3] * m[10]
            - m[9] * m[2] * m[7]
            + m[9] * m[3] * m[6];
        inv[7] = m[0] * m[6] * m[11] - m[0] * m[7] * m[10] - m[4] * m[2] * m[11]
            + m[4] * m[3] * m[10]
            + m[8] * m[2] * m[7]
            - m[8] * m[3] * m[6];
        inv[11] = -m[0] * m[5] * m[11] + m[0] * m[7] * m[9] + m[4] * m[1] * m[11]
            - m[4] * m[3] * m[9]
            - m[8] * m[1] * m[7]
            + m[8] * m[3] * m[5];
        inv[15] = m[0] * m[5] * m[10] - m[0] * m[6] * m[9] - m[4] * m[1] * m[10]
            + m[4] * m[2] * m[9]
            + m[8] * m[1] * m[6]
            - m[8] * m[2] * m[5];

        let det = m[0] * inv[0] + m[1] * inv[4] + m[2] * inv[8] + m[3] * inv[12];
        if equals_zero(det) {
            return false;
        }

        let det = 1.0 / det;
        for (slot, value) in self.data.iter_mut().zip(inv.iter()) {
            *slot = value * det;
        }
        true
    }

    /// Fast inverse for rigid transform matrices (orthonormal rotation part
    /// plus translation): transpose the rotation block and back-rotate the
    /// negated translation.
    ///
    /// # Panics
    ///
    /// Panics when the bottom row is not (0, 0, 0, 1). That is a programmer
    /// error contract: callers must hand in a valid transform matrix.
    pub fn invert_transform(&self) -> Matrix {
        assert!(self.is_transform(), "Must be a transform matrix");

        let m = &self.data;
        let mut r = [0.0f32; 16];

        r[0] = m[0];
        r[1] = m[4];
        r[2] = m[8];

        r[4] = m[1];
        r[5] = m[5];
        r[6] = m[9];

        r[8] = m[2];
        r[9] = m[6];
        r[10] = m[10];

        r[12] = -(m[0] * m[12] + m[1] * m[13] + m[2] * m[14] + m[3] * m[15]);
        r[13] = -(m[4] * m[12] + m[5] * m[13] + m[6] * m[14] + m[7] * m[15]);
        r[14] = -(m[8] * m[12] + m[9] * m[13] + m[10] * m[14] + m[11] * m[15]);
        r[15] = 1.0;

        Matrix { data: r }
    }

    /// Re-derive three mutually perpendicular, unit-length axes from the
    /// current X and Y axes, correcting drift accumulated by repeated
    /// multiplication. The translation column is left untouched.
    pub fn orthonormalize(&mut self) {
        let mut x = self.x_axis();
        let mut y = self.y_axis();

        x.normalize();
        y.normalize();
        let z = x.cross(y);
        let y = z.cross(x);

        self.set_x_axis(x);
        self.set_y_axis(y);
        self.set_z_axis(z);
    }

    /// Compose scale, then rotation, then translation into this matrix.
    pub fn set_transform_components(
        &mut self,
        scale: Vector3,
        rotation: Quaternion,
        translation: Vector3,
    ) {
        let m = &mut self.data;

        if rotation.is_identity() {
            m[0] = scale.x;
            m[1] = 0.0;
            m[2] = 0.0;

            m[4] = 0.0;
            m[5] = scale.y;
            m[6] = 0.0;

            m[8] = 0.0;
            m[9] = 0.0;
            m[10] = scale.z;
        } else {
            let q = rotation.vector;
            let xx = q.x * q.x;
            let yy = q.y * q.y;
            let zz = q.z * q.z;
            let xy = q.x * q.y;
            let xz = q.x * q.z;
            let wx = q.w * q.x;
            let wy = q.w * q.y;
            let wz = q.w * q.z;
            let yz = q.y * q.z;

            m[0] = scale.x * (1.0 - 2.0 * (yy + zz));
            m[1] = scale.x * (2.0 * (xy + wz));
            m[2] = scale.x * (2.0 * (xz - wy));

            m[4] = scale.y * (2.0 * (xy - wz));
            m[5] = scale.y * (1.0 - 2.0 * (xx + zz));
            m[6] = scale.y * (2.0 * (yz + wx));

            m[8] = scale.z * (2.0 * (xz + wy));
            m[9] = scale.z * (2.0 * (yz - wx));
            m[10] = scale.z * (1.0 - 2.0 * (xx + yy));
        }

        m[3] = 0.0;
        m[7] = 0.0;
        m[11] = 0.0;
        m[12] = translation.x;
        m[13] = translation.y;
        m[14] = translation.z;
        m[15] = 1.0;
    }

    /// Decompose into (translation, rotation, scale): the algebraic inverse
    /// of [`set_transform_components`](Self::set_transform_components) for
    /// any non-degenerate scale.
    pub fn get_transform_components(&self) -> (Vector3, Quaternion, Vector3) {
        let translation = self.translation3();

        // Scale is the length of each rotation axis.
        let scale = Vector3::new(
            self.x_axis().length(),
            self.y_axis().length(),
            self.z_axis().length(),
        );

        let near_unit = (scale.x - 1.0).abs() < ROTATION_EPSILON
            && (scale.y - 1.0).abs() < ROTATION_EPSILON
            && (scale.z - 1.0).abs() < ROTATION_EPSILON;

        let (x_axis, y_axis, z_axis) = if near_unit {
            (self.x_axis(), self.y_axis(), self.z_axis())
        } else {
            // Non-identity scale is embedded in the axes; remove it first.
            (
                self.x_axis() / scale.x,
                self.y_axis() / scale.y,
                self.z_axis() / scale.z,
            )
        };

        let mut rotation = Quaternion::from_axes(x_axis, y_axis, z_axis);

        // If the imaginary components are close to zero, snap to identity.
        if rotation.vector.x.abs() < ROTATION_EPSILON
            && rotation.vector.y.abs() < ROTATION_EPSILON
            && rotation.vector.z.abs() < ROTATION_EPSILON
        {
            rotation = Quaternion::IDENTITY;
        }

        (translation, rotation, scale)
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    /// Standard mathematical product: `self * rhs` applies `rhs` first.
    fn mul(self, rhs: Matrix) -> Matrix {
        let a = &self.data;
        let b = &rhs.data;
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += a[k * 4 + row] * b[col * 4 + k];
                }
                out[col * 4 + row] = sum;
            }
        }
        Matrix { data: out }
    }
}

/// Tolerance-based comparison: two matrices are equal when every component
/// pair is within its magnitude-ranged epsilon. Never bitwise.
impl PartialEq for Matrix {
    fn eq(&self, other: &Self) -> bool {
        self.data
            .iter()
            .zip(other.data.iter())
            .all(|(a, b)| (a - b).abs() <= ranged_epsilon(*a, *b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn vec3_approx_eq(a: Vector3, b: Vector3) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    // Component-wise comparison for accumulated-arithmetic results; the
    // ranged-epsilon PartialEq is reserved for single-operation drift.
    fn mat_approx_eq(a: &Matrix, b: &Matrix) -> bool {
        a.data.iter().zip(b.data.iter()).all(|(x, y)| approx_eq(*x, *y))
    }

    #[test]
    fn test_transform_components_round_trip() {
        let scale = Vector3::new(2.0, 0.5, 3.0);
        let rotation = Quaternion::from_axis_angle(Vector3::new(0.0, 1.0, 0.0), PI / 5.0);
        let translation = Vector3::new(10.0, -4.0, 2.5);

        let mut m = Matrix::IDENTITY;
        m.set_transform_components(scale, rotation, translation);
        let (t, r, s) = m.get_transform_components();

        assert!(vec3_approx_eq(t, translation));
        assert!(vec3_approx_eq(s, scale));
        assert!(r.same_rotation(&rotation));
    }

    #[test]
    fn test_round_trip_identity_rotation() {
        let mut m = Matrix::IDENTITY;
        m.set_transform_components(
            Vector3::new(4.0, 4.0, 4.0),
            Quaternion::IDENTITY,
            Vector3::new(1.0, 2.0, 3.0),
        );
        let (t, r, s) = m.get_transform_components();
        assert!(vec3_approx_eq(t, Vector3::new(1.0, 2.0, 3.0)));
        assert!(vec3_approx_eq(s, Vector3::new(4.0, 4.0, 4.0)));
        assert!(r.is_identity());
    }

    #[test]
    fn test_double_invert_identity() {
        let mut m = Matrix::IDENTITY;
        m.set_transform_components(
            Vector3::new(1.5, 2.0, 1.0),
            Quaternion::from_axis_angle(Vector3::new(1.0, 1.0, 0.0), 0.7),
            Vector3::new(5.0, -2.0, 8.0),
        );

        let original = m;
        let mut inv = m;
        assert!(inv.invert());

        // M * Invert(M) == IDENTITY
        assert!(mat_approx_eq(&(original * inv), &Matrix::IDENTITY));

        // Invert(Invert(M)) == M
        let mut twice = inv;
        assert!(twice.invert());
        assert!(mat_approx_eq(&twice, &original));
    }

    #[test]
    fn test_invert_singular_returns_false() {
        let mut m = Matrix::from_columns([0.0; 16]);
        let before = m.data;
        assert!(!m.invert());
        assert_eq!(m.data, before);
    }

    #[test]
    fn test_invert_transform_matches_general_inverse() {
        let mut m = Matrix::IDENTITY;
        m.set_transform_components(
            Vector3::ONE,
            Quaternion::from_axis_angle(Vector3::new(0.0, 0.0, 1.0), 1.1),
            Vector3::new(3.0, 4.0, 5.0),
        );

        let fast = m.invert_transform();
        let mut general = m;
        assert!(general.invert());
        assert_eq!(fast, general);
    }

    #[test]
    #[should_panic(expected = "Must be a transform matrix")]
    fn test_invert_transform_rejects_projective_matrix() {
        let mut m = Matrix::IDENTITY;
        m.data[3] = 0.5; // projective component
        let _ = m.invert_transform();
    }

    #[test]
    fn test_orthonormalize_properties() {
        let mut m = Matrix::IDENTITY;
        m.set_transform_components(
            Vector3::ONE,
            Quaternion::from_axis_angle(Vector3::new(0.3, 0.9, 0.1), 0.4),
            Vector3::new(7.0, 8.0, 9.0),
        );
        // Inject drift.
        for i in [0usize, 1, 5, 6, 9] {
            m.data[i] += 2e-3;
        }

        m.orthonormalize();

        let (x, y, z) = (m.x_axis(), m.y_axis(), m.z_axis());
        assert!(approx_eq(x.length(), 1.0));
        assert!(approx_eq(y.length(), 1.0));
        assert!(approx_eq(z.length(), 1.0));
        assert!(approx_eq(x.dot(y), 0.0));
        assert!(approx_eq(y.dot(z), 0.0));
        assert!(approx_eq(z.dot(x), 0.0));

        // Translation untouched.
        assert!(vec3_approx_eq(m.translation3(), Vector3::new(7.0, 8.0, 9.0)));

        // Idempotent on an already-orthonormal matrix.
        let before = m;
        m.orthonormalize();
        assert!(mat_approx_eq(&m, &before));
    }

    #[test]
    fn test_equality_is_tolerance_based() {
        let m = Matrix::IDENTITY;
        let mut nudged = m;
        // Perturb by less than the ranged epsilon for values near 1.
        nudged.data[5] += f32::EPSILON * 0.5;
        assert_eq!(m, nudged);

        let mut off = m;
        off.data[5] += 1e-4;
        assert_ne!(m, off);
    }

    #[test]
    fn test_multiply_applies_rhs_first() {
        let t = Matrix::translation(Vector3::new(1.0, 0.0, 0.0));
        let mut s = Matrix::IDENTITY;
        s.set_transform_components(
            Vector3::new(2.0, 2.0, 2.0),
            Quaternion::IDENTITY,
            Vector3::ZERO,
        );

        // scale then translate
        let m = t * s;
        let p = m.transform_point(Vector3::new(1.0, 0.0, 0.0));
        assert!(vec3_approx_eq(p, Vector3::new(3.0, 0.0, 0.0)));
    }
}
