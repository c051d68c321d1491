//! Bounding volumes

use serde::{Serialize, Deserialize};
use crate::rasterizer::Vec3;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tightest box around `points`, or `None` if there are none
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Aabb::new(*first, *first);
        for &p in rest {
            bounds.expand(p);
        }
        Some(bounds)
    }

    /// Check if a point is inside the box
    pub fn contains(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x
            && point.y >= self.min.y && point.y <= self.max.y
            && point.z >= self.min.z && point.z <= self.max.z
    }

    /// Expand bounds to include a point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Get center of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        (self.max - self.min).abs()
    }

    /// Length of the longest side
    pub fn largest_extent(&self) -> f32 {
        let s = self.size();
        s.x.max(s.y).max(s.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        assert_eq!(Aabb::from_points(&[]), None);

        let bounds = Aabb::from_points(&[
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 4.0, 0.0),
            Vec3::new(0.0, 0.0, 3.0),
        ])
        .expect("non-empty");
        assert_eq!(bounds.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 4.0, 3.0));
        assert_eq!(bounds.center(), Vec3::new(0.0, 1.0, 1.5));
        assert_eq!(bounds.largest_extent(), 6.0);
        assert!(bounds.contains(Vec3::new(0.0, 0.0, 1.0)));
        assert!(!bounds.contains(Vec3::new(0.0, 5.0, 1.0)));
    }
}
