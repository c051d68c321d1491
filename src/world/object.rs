//! Scene graph nodes

use std::fmt;
use std::sync::Arc;

use crate::rasterizer::Mat4;
use super::mesh::Mesh;

/// Handle to an object stored in a [`Scene`](super::Scene). Handles are never
/// reused, so a handle to a removed object stays invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub(crate) usize);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Perspective camera parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Horizontal field of view in degrees
    pub fov: f32,
    /// Width / height
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    projection: Mat4,
}

impl Camera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov,
            aspect,
            near,
            far,
            projection: Mat4::perspective(fov, aspect, near, far),
        }
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Replace the projection with an arbitrary matrix
    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    /// Rebuild the projection for a new aspect ratio
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.projection = Mat4::perspective(self.fov, aspect, self.near, self.far);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(60.0, 16.0 / 9.0, 1.0, 50.0)
    }
}

#[derive(Debug, Clone)]
pub enum ObjectKind {
    Node,
    Camera(Camera),
}

/// A node in the scene tree. Parent and child links are maintained by the scene.
#[derive(Debug, Clone)]
pub struct Object {
    pub(crate) local: Mat4,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) children: Vec<ObjectId>,
    pub(crate) mesh: Option<Arc<Mesh>>,
    pub(crate) kind: ObjectKind,
}

impl Object {
    pub(crate) fn new(local: Mat4, kind: ObjectKind) -> Self {
        Self {
            local,
            parent: None,
            children: Vec::new(),
            mesh: None,
            kind,
        }
    }

    /// Transform relative to the parent
    pub fn local_transform(&self) -> Mat4 {
        self.local
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    pub fn mesh(&self) -> Option<&Arc<Mesh>> {
        self.mesh.as_ref()
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn camera(&self) -> Option<&Camera> {
        match &self.kind {
            ObjectKind::Camera(camera) => Some(camera),
            ObjectKind::Node => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::Vec3;

    #[test]
    fn test_camera_projection_follows_aspect() {
        let mut camera = Camera::default();
        let wide = camera.projection();
        camera.set_aspect(1.0);
        let square = camera.projection();
        assert_eq!(wide.m[0][0], square.m[0][0]);
        assert!(square.m[1][1].abs() < wide.m[1][1].abs());
    }

    #[test]
    fn test_camera_projection_can_be_replaced() {
        let mut camera = Camera::default();
        camera.set_projection(Mat4::IDENTITY);
        assert_eq!(camera.projection(), Mat4::IDENTITY);
        assert_eq!(camera.projection().transform_point(Vec3::ONE), Vec3::ONE);
    }

    #[test]
    fn test_object_kind() {
        let node = Object::new(Mat4::IDENTITY, ObjectKind::Node);
        assert!(node.camera().is_none());
        let cam = Object::new(Mat4::IDENTITY, ObjectKind::Camera(Camera::default()));
        assert_eq!(cam.camera().map(|c| c.fov), Some(60.0));
    }
}
