//! Vector math for the rendering pipeline
//!
//! Value types used both as geometry (points, directions) and as colors
//! (Vec3/Vec4 with channels in [0, 1]).

use std::ops::{Add, AddAssign, Mul, Neg, Sub};
use serde::{Serialize, Deserialize};

/// Tolerance used by [`eps_eq`]
pub const FLOAT_EPSILON: f32 = 1e-5;

// ============================================================================
// Scalar helpers
// ============================================================================

pub fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (1.0 - t) * a + t * b
}

pub fn lerp_clamped(a: f32, b: f32, t: f32) -> f32 {
    lerp(a, b, clamp01(t))
}

/// Fractional part, always in [0, 1) (also for negative values)
pub fn frac(value: f32) -> f32 {
    value - value.floor()
}

/// -1.0 for negative values, 1.0 otherwise (zero counts as positive)
pub fn sign(value: f32) -> f32 {
    if value < 0.0 { -1.0 } else { 1.0 }
}

pub fn eps_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < FLOAT_EPSILON
}

/// Critically damped spring towards `target` (Game Programming Gems 4, 1.10).
/// Returns the new value and updates `velocity` in place.
pub fn smooth_damp(
    current: f32,
    target: f32,
    velocity: &mut f32,
    smooth_time: f32,
    max_speed: f32,
    delta_time: f32,
) -> f32 {
    let smooth_time = smooth_time.max(0.0001);
    let omega = 2.0 / smooth_time;
    let x = omega * delta_time;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let max_change = max_speed * smooth_time;
    let change = (current - target).clamp(-max_change, max_change);
    let clamped_target = current - change;

    let temp = (*velocity + omega * change) * delta_time;
    *velocity = (*velocity - omega * temp) * exp;
    let mut result = clamped_target + (change + temp) * exp;

    // Prevent overshooting the original target
    if (target - current > 0.0) == (result > target) {
        result = target;
        *velocity = 0.0;
    }
    result
}

// ============================================================================
// Vec2
// ============================================================================

/// 2D Vector (texture coordinates, raster-space points)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const ONE: Vec2 = Vec2 { x: 1.0, y: 1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn min(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x.min(other.x), self.y.min(other.y))
    }

    pub fn max(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x.max(other.x), self.y.max(other.y))
    }

    pub fn scale(self, s: f32) -> Vec2 {
        Vec2::new(self.x * s, self.y * s)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, s: f32) -> Vec2 {
        self.scale(s)
    }
}

/// Twice the signed area of triangle ABC (area of the parallelogram AB x AC).
/// Positive for counter-clockwise winding in a y-up frame.
pub fn signed_area(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)
}

/// Barycentric weights of `p` relative to `vertices`, computed as ratios of
/// twice-signed areas. Weights sum to 1 for non-degenerate triangles.
pub fn barycentric_weights(vertices: &[Vec2; 3], p: Vec2) -> [f32; 3] {
    let bmp = vertices[1] - p;
    let cmp = vertices[2] - p;
    let bma = vertices[1] - vertices[0];
    let cma = vertices[2] - vertices[0];
    let amp = vertices[0] - p;

    let det = bma.x * cma.y - cma.x * bma.y;
    let det0 = bmp.x * cmp.y - cmp.x * bmp.y;
    let det1 = cmp.x * amp.y - amp.x * cmp.y;
    let det2 = amp.x * bmp.y - bmp.x * amp.y;

    [det0 / det, det1 / det, det2 / det]
}

/// Barycentric weights of `p` if it lies strictly inside the triangle.
/// Points on an edge (any weight == 0) and degenerate triangles are rejected.
pub fn barycentric(vertices: &[Vec2; 3], p: Vec2) -> Option<[f32; 3]> {
    let w = barycentric_weights(vertices, p);
    if w[0] > 0.0 && w[1] > 0.0 && w[2] > 0.0 {
        Some(w)
    } else {
        None
    }
}

// ============================================================================
// Vec3
// ============================================================================

/// 3D Vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };
    pub const RIGHT: Vec3 = Vec3 { x: 1.0, y: 0.0, z: 0.0 };
    pub const UP: Vec3 = Vec3 { x: 0.0, y: 1.0, z: 0.0 };
    pub const FRONT: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(value: f32) -> Self {
        Self { x: value, y: value, z: value }
    }

    pub fn from2(v: Vec2, z: f32) -> Self {
        Self { x: v.x, y: v.y, z }
    }

    /// Homogeneous to cartesian: divides by w for points, passes directions (w == 0) through
    pub fn from4(v: Vec4) -> Self {
        if v.w == 0.0 {
            Vec3::new(v.x, v.y, v.z)
        } else {
            Vec3::new(v.x / v.w, v.y / v.w, v.z / v.w)
        }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn len(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector with the same direction; the zero vector stays zero
    pub fn normalize(self) -> Vec3 {
        let l = self.len();
        if l == 0.0 {
            return Vec3::ZERO;
        }
        Vec3 {
            x: self.x / l,
            y: self.y / l,
            z: self.z / l,
        }
    }

    pub fn scale(self, s: f32) -> Vec3 {
        Vec3 {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    /// Component-wise product (color modulation)
    pub fn mul_elem(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    pub fn min(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    pub fn clamp01(self) -> Vec3 {
        Vec3::new(clamp01(self.x), clamp01(self.y), clamp01(self.z))
    }

    pub fn frac(self) -> Vec3 {
        Vec3::new(frac(self.x), frac(self.y), frac(self.z))
    }

    pub fn abs(self) -> Vec3 {
        Vec3::new(self.x.abs(), self.y.abs(), self.z.abs())
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, other: Vec3) {
        *self = *self + other;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f32) -> Vec3 {
        self.scale(s)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        self.scale(-1.0)
    }
}

// ============================================================================
// Vec4
// ============================================================================

/// 4D Vector: homogeneous coordinates or RGBA color
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    pub const ZERO: Vec4 = Vec4 { x: 0.0, y: 0.0, z: 0.0, w: 0.0 };
    pub const ONE: Vec4 = Vec4 { x: 1.0, y: 1.0, z: 1.0, w: 1.0 };
    /// The origin as a homogeneous point
    pub const ZERO_H: Vec4 = Vec4 { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };
    pub const RIGHT_H: Vec4 = Vec4 { x: 1.0, y: 0.0, z: 0.0, w: 1.0 };
    pub const UP_H: Vec4 = Vec4 { x: 0.0, y: 1.0, z: 0.0, w: 1.0 };
    pub const FRONT_H: Vec4 = Vec4 { x: 0.0, y: 0.0, z: 1.0, w: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn from2(v: Vec2, z: f32, w: f32) -> Self {
        Self { x: v.x, y: v.y, z, w }
    }

    pub fn from3(v: Vec3, w: f32) -> Self {
        Self { x: v.x, y: v.y, z: v.z, w }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn from_array(a: [f32; 4]) -> Self {
        Self { x: a[0], y: a[1], z: a[2], w: a[3] }
    }

    pub fn dot(self, other: Vec4) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_dot() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert!((a.dot(b) - 32.0).abs() < 0.001);
    }

    #[test]
    fn test_vec3_cross() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 1.0, 0.0);
        let c = a.cross(b);
        assert!((c.z - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_normalize_zero_stays_zero() {
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);
        let n = Vec3::new(3.0, 0.0, 4.0).normalize();
        assert!((n.len() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_homogeneous_point_round_trip() {
        for v in [
            Vec3::new(1.0, -2.0, 3.5),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(-1e3, 42.0, 1e-3),
        ] {
            let back = Vec3::from4(Vec4::from3(v, 1.0));
            assert!((back - v).len() < 1e-5);
        }
    }

    #[test]
    fn test_from4_direction_passes_through() {
        let d = Vec3::from4(Vec4::new(2.0, 4.0, 6.0, 0.0));
        assert_eq!(d, Vec3::new(2.0, 4.0, 6.0));
        let p = Vec3::from4(Vec4::new(2.0, 4.0, 6.0, 2.0));
        assert_eq!(p, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_signed_area_winding() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);
        let c = Vec2::new(0.0, 10.0);
        assert!(signed_area(a, b, c) > 0.0);
        assert!(signed_area(a, c, b) < 0.0);
        assert_eq!(signed_area(a, b, b), 0.0);
    }

    #[test]
    fn test_barycentric_at_vertices() {
        let tri = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(5.0, 10.0)];
        let expected = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        for (vertex, want) in tri.iter().zip(expected.iter()) {
            let w = barycentric_weights(&tri, *vertex);
            for i in 0..3 {
                assert!((w[i] - want[i]).abs() < 1e-6);
            }
            // Vertices themselves are not strictly inside
            assert!(barycentric(&tri, *vertex).is_none());
        }
    }

    #[test]
    fn test_barycentric_inside_sums_to_one() {
        let tri = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(5.0, 10.0)];
        for p in [Vec2::new(5.0, 3.0), Vec2::new(2.5, 1.0), Vec2::new(6.0, 7.0)] {
            let w = barycentric(&tri, p).expect("point should be inside");
            assert!((w[0] + w[1] + w[2] - 1.0).abs() < 1e-6);
        }
        assert!(barycentric(&tri, Vec2::new(-1.0, 5.0)).is_none());
    }

    #[test]
    fn test_barycentric_degenerate_rejects() {
        let tri = [Vec2::new(0.0, 0.0), Vec2::new(5.0, 5.0), Vec2::new(10.0, 10.0)];
        assert!(barycentric(&tri, Vec2::new(5.0, 5.0)).is_none());
        assert!(barycentric(&tri, Vec2::new(2.0, 3.0)).is_none());
    }

    #[test]
    fn test_frac_wraps_negative() {
        assert!((frac(1.25) - 0.25).abs() < 1e-6);
        assert!((frac(-0.25) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_smooth_damp_converges() {
        let mut value = 0.0;
        let mut velocity = 0.0;
        for _ in 0..200 {
            value = smooth_damp(value, 10.0, &mut velocity, 0.3, f32::INFINITY, 1.0 / 60.0);
        }
        assert!((value - 10.0).abs() < 0.01);
        assert!(value <= 10.0);
    }
}
