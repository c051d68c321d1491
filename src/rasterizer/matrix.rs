//! 3x3 and 4x4 matrices
//!
//! Row-major storage (`m[row][col]`), column vectors: a transform applies as
//! `M * v`, translation lives in the 4th column and `A * B` applies `B` first.

use std::ops::Mul;
use super::math::{Vec3, Vec4};

/// Below this absolute determinant a matrix is treated as singular
pub const SINGULAR_EPSILON: f32 = 1e-5;

/// 3x3 matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub m: [[f32; 3]; 3],
}

impl Mat3 {
    pub const IDENTITY: Mat3 = Mat3 {
        m: [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ],
    };

    pub const fn new(m: [[f32; 3]; 3]) -> Self {
        Self { m }
    }

    /// Build from three column vectors
    pub fn from_columns(c0: Vec3, c1: Vec3, c2: Vec3) -> Self {
        Self {
            m: [
                [c0.x, c1.x, c2.x],
                [c0.y, c1.y, c2.y],
                [c0.z, c1.z, c2.z],
            ],
        }
    }

    /// Rule of Sarrus
    pub fn determinant(&self) -> f32 {
        let m = &self.m;
        (m[0][0] * m[1][1] * m[2][2])
            + (m[0][1] * m[1][2] * m[2][0])
            + (m[0][2] * m[1][0] * m[2][1])
            - (m[0][2] * m[1][1] * m[2][0])
            - (m[1][2] * m[2][1] * m[0][0])
            - (m[2][2] * m[0][1] * m[1][0])
    }

    pub fn transform(&self, v: Vec3) -> Vec3 {
        let m = &self.m;
        Vec3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Mat3::IDENTITY
    }
}

impl Mul for Mat3 {
    type Output = Mat3;

    fn mul(self, rhs: Mat3) -> Mat3 {
        let mut result = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                for k in 0..3 {
                    result[i][j] += self.m[i][k] * rhs.m[k][j];
                }
            }
        }
        Mat3 { m: result }
    }
}

impl Mul<Vec3> for Mat3 {
    type Output = Vec3;

    fn mul(self, v: Vec3) -> Vec3 {
        self.transform(v)
    }
}

/// 4x4 matrix for affine and projective transforms in homogeneous coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    pub m: [[f32; 4]; 4],
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub const fn new(m: [[f32; 4]; 4]) -> Self {
        Self { m }
    }

    pub fn translation(t: Vec3) -> Self {
        let mut result = Mat4::IDENTITY;
        result.m[0][3] = t.x;
        result.m[1][3] = t.y;
        result.m[2][3] = t.z;
        result
    }

    pub fn scale_uniform(s: f32) -> Self {
        Mat4::scale(Vec3::splat(s))
    }

    pub fn scale(s: Vec3) -> Self {
        let mut result = Mat4::IDENTITY;
        result.m[0][0] = s.x;
        result.m[1][1] = s.y;
        result.m[2][2] = s.z;
        result
    }

    /// Rotation around the X axis, angle in degrees
    pub fn rotation_x(degrees: f32) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        let mut result = Mat4::IDENTITY;
        result.m[1][1] = c;
        result.m[1][2] = -s;
        result.m[2][1] = s;
        result.m[2][2] = c;
        result
    }

    /// Rotation around the Y axis, angle in degrees
    pub fn rotation_y(degrees: f32) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        let mut result = Mat4::IDENTITY;
        result.m[0][0] = c;
        result.m[0][2] = s;
        result.m[2][0] = -s;
        result.m[2][2] = c;
        result
    }

    /// Rotation around the Z axis, angle in degrees
    pub fn rotation_z(degrees: f32) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        let mut result = Mat4::IDENTITY;
        result.m[0][0] = c;
        result.m[0][1] = -s;
        result.m[1][0] = s;
        result.m[1][1] = c;
        result
    }

    /// Asymmetric frustum projection. The camera looks down -z; near and far are
    /// given as positive distances and negated internally. Visible geometry lands
    /// in [-1, 1] on every axis after the perspective divide.
    ///
    /// Degenerate bounds (`r == l`, `t == b` or `f == n`) yield the identity.
    pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        if right == left || top == bottom || far == near {
            return Mat4::IDENTITY;
        }

        let n = -near;
        let f = -far;

        let mut result = Mat4::IDENTITY;
        result.m[0][0] = 2.0 * n / (right - left);
        result.m[1][1] = 2.0 * n / (top - bottom);
        result.m[2][2] = (f + n) / (f - n);
        result.m[3][3] = 0.0;

        result.m[0][2] = -(right + left) / (right - left);
        result.m[1][2] = -(top + bottom) / (top - bottom);
        result.m[3][2] = 1.0;

        result.m[2][3] = -2.0 * f * n / (f - n);
        result
    }

    /// Symmetric perspective projection from a vertical-agnostic field of view:
    /// the horizontal half-extent at the near plane is `near * tan(fov / 2)`.
    pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let right = near * (fov_degrees * 0.5).to_radians().tan();
        let top = if aspect != 0.0 { right / aspect } else { right };
        Mat4::frustum(-right, right, -top, top, near, far)
    }

    pub fn transpose(&self) -> Mat4 {
        let mut result = [[0.0; 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                result[j][i] = self.m[i][j];
            }
        }
        Mat4 { m: result }
    }

    pub fn scaled(&self, s: f32) -> Mat4 {
        let mut result = self.m;
        for row in result.iter_mut() {
            for value in row.iter_mut() {
                *value *= s;
            }
        }
        Mat4 { m: result }
    }

    /// 3x3 minor obtained by deleting `row` and `col`
    fn minor(&self, row: usize, col: usize) -> Mat3 {
        let mut result = [[0.0; 3]; 3];
        let mut k = 0;
        for i in (0..4).filter(|&i| i != row) {
            let mut l = 0;
            for j in (0..4).filter(|&j| j != col) {
                result[k][l] = self.m[i][j];
                l += 1;
            }
            k += 1;
        }
        Mat3 { m: result }
    }

    pub fn cofactor(&self, row: usize, col: usize) -> f32 {
        let sign = if (row + col) % 2 == 0 { 1.0 } else { -1.0 };
        sign * self.minor(row, col).determinant()
    }

    pub fn cofactor_matrix(&self) -> Mat4 {
        let mut result = [[0.0; 4]; 4];
        for (i, row) in result.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = self.cofactor(i, j);
            }
        }
        Mat4 { m: result }
    }

    /// Laplace expansion along the first row
    pub fn determinant(&self) -> f32 {
        (0..4).map(|j| self.m[0][j] * self.cofactor(0, j)).sum()
    }

    /// Inverse via the adjugate (transposed cofactor matrix) over the determinant.
    /// A singular matrix (|det| < 1e-5) returns the identity instead of failing.
    pub fn inverse(&self) -> Mat4 {
        let det = self.determinant();
        if det.abs() < SINGULAR_EPSILON {
            return Mat4::IDENTITY;
        }
        self.cofactor_matrix().transpose().scaled(1.0 / det)
    }

    pub fn transform(&self, v: Vec4) -> Vec4 {
        let m = &self.m;
        Vec4::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z + m[0][3] * v.w,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z + m[1][3] * v.w,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z + m[2][3] * v.w,
            m[3][0] * v.x + m[3][1] * v.y + m[3][2] * v.z + m[3][3] * v.w,
        )
    }

    /// Transform a point (w = 1) and return cartesian coordinates
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        Vec3::from4(self.transform(Vec4::from3(p, 1.0)))
    }

    /// Transform a direction (w = 0); translation is ignored
    pub fn transform_direction(&self, d: Vec3) -> Vec3 {
        Vec3::from4(self.transform(Vec4::from3(d, 0.0)))
    }

    /// Upper-left 3x3 block (the linear part of an affine transform)
    pub fn upper_left(&self) -> Mat3 {
        let m = &self.m;
        Mat3::new([
            [m[0][0], m[0][1], m[0][2]],
            [m[1][0], m[1][1], m[1][2]],
            [m[2][0], m[2][1], m[2][2]],
        ])
    }

    /// Translation part (4th column)
    pub fn translation_part(&self) -> Vec3 {
        Vec3::new(self.m[0][3], self.m[1][3], self.m[2][3])
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Mat4::IDENTITY
    }
}

impl Mul for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut result = [[0.0; 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                for k in 0..4 {
                    result[i][j] += self.m[i][k] * rhs.m[k][j];
                }
            }
        }
        Mat4 { m: result }
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;

    fn mul(self, v: Vec4) -> Vec4 {
        self.transform(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mat_near(a: &Mat4, b: &Mat4, eps: f32) {
        for i in 0..4 {
            for j in 0..4 {
                assert!(
                    (a.m[i][j] - b.m[i][j]).abs() < eps,
                    "entry [{}][{}]: {} vs {}",
                    i,
                    j,
                    a.m[i][j],
                    b.m[i][j]
                );
            }
        }
    }

    fn sample_transform() -> Mat4 {
        Mat4::translation(Vec3::new(1.0, -2.0, 3.0))
            * Mat4::rotation_y(30.0)
            * Mat4::rotation_x(-45.0)
            * Mat4::scale(Vec3::new(2.0, 0.5, 1.5))
    }

    #[test]
    fn test_inverse_of_transform() {
        let m = sample_transform();
        assert!(m.determinant().abs() >= SINGULAR_EPSILON);
        assert_mat_near(&(m * m.inverse()), &Mat4::IDENTITY, 1e-4);
        assert_mat_near(&(m.inverse() * m), &Mat4::IDENTITY, 1e-4);
    }

    #[test]
    fn test_inverse_of_projection() {
        let m = Mat4::perspective(60.0, 16.0 / 9.0, 1.0, 50.0);
        assert_mat_near(&(m * m.inverse()), &Mat4::IDENTITY, 1e-4);
    }

    #[test]
    fn test_inverse_of_singular_is_identity() {
        let zero = Mat4::new([[0.0; 4]; 4]);
        assert_eq!(zero.inverse(), Mat4::IDENTITY);

        let flat = Mat4::scale(Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(flat.inverse(), Mat4::IDENTITY);

        let tiny = Mat4::scale_uniform(0.01);
        assert!(tiny.determinant().abs() < SINGULAR_EPSILON);
        assert_eq!(tiny.inverse(), Mat4::IDENTITY);
    }

    #[test]
    fn test_determinant() {
        assert!((Mat4::IDENTITY.determinant() - 1.0).abs() < 1e-6);
        assert!((Mat4::scale(Vec3::new(2.0, 3.0, 4.0)).determinant() - 24.0).abs() < 1e-4);
        assert!((Mat4::rotation_z(37.0).determinant() - 1.0).abs() < 1e-5);
        let m3 = Mat3::new([[2.0, 0.0, 1.0], [1.0, 3.0, 2.0], [1.0, 1.0, 2.0]]);
        assert!((m3.determinant() - 6.0).abs() < 1e-6);
        let singular = Mat3::new([[2.0, 0.0, 1.0], [1.0, 3.0, 2.0], [1.0, 1.0, 1.0]]);
        assert!(singular.determinant().abs() < 1e-6);
    }

    #[test]
    fn test_multiply_is_not_commutative() {
        let t = Mat4::translation(Vec3::new(1.0, 0.0, 0.0));
        let r = Mat4::rotation_z(90.0);
        let p = Vec3::ZERO;
        // Rotate then translate
        let a = (t * r).transform_point(p);
        // Translate then rotate
        let b = (r * t).transform_point(p);
        assert!((a - Vec3::new(1.0, 0.0, 0.0)).len() < 1e-5);
        assert!((b - Vec3::new(0.0, 1.0, 0.0)).len() < 1e-5);
    }

    #[test]
    fn test_rotation_uses_degrees() {
        let p = Mat4::rotation_y(90.0).transform_point(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(0.0, 0.0, -1.0)).len() < 1e-5);
        let q = Mat4::rotation_x(90.0).transform_point(Vec3::new(0.0, 1.0, 0.0));
        assert!((q - Vec3::new(0.0, 0.0, 1.0)).len() < 1e-5);
    }

    #[test]
    fn test_direction_ignores_translation() {
        let t = Mat4::translation(Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(t.transform_direction(Vec3::UP), Vec3::UP);
        assert_eq!(t.transform_point(Vec3::ZERO), Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_frustum_maps_near_and_far_planes() {
        let near = 1.0;
        let far = 50.0;
        let proj = Mat4::perspective(60.0, 16.0 / 9.0, near, far);

        let on_near = proj.transform_point(Vec3::new(0.0, 0.0, -near));
        let on_far = proj.transform_point(Vec3::new(0.0, 0.0, -far));
        assert!((on_near.z + 1.0).abs() < 1e-4);
        assert!((on_far.z - 1.0).abs() < 1e-4);

        // Right edge of the near plane maps to x = 1
        let right = near * (30.0f32).to_radians().tan();
        let edge = proj.transform_point(Vec3::new(right, 0.0, -near));
        assert!((edge.x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_frustum_degenerate_is_identity() {
        assert_eq!(Mat4::frustum(1.0, 1.0, -1.0, 1.0, 1.0, 10.0), Mat4::IDENTITY);
        assert_eq!(Mat4::frustum(-1.0, 1.0, -1.0, 1.0, 5.0, 5.0), Mat4::IDENTITY);
    }

    #[test]
    fn test_mat3_from_columns() {
        let m = Mat3::from_columns(Vec3::RIGHT, Vec3::UP, Vec3::FRONT);
        assert_eq!(m, Mat3::IDENTITY);
        let v = Mat3::from_columns(Vec3::UP, Vec3::RIGHT, Vec3::FRONT) * Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(v, Vec3::UP);
    }
}
