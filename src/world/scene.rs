//! Scene graph and transform resolution
//!
//! Objects live in an arena owned by the scene and are addressed by
//! [`ObjectId`]. The tree has a single root; the camera is created as a child
//! of the root and cannot be removed. Structural violations are reported as
//! [`SceneError`] and leave the tree untouched.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::rasterizer::{
    base_fragment, base_vertex, FragmentShader, Mat4, ShadingModel, Vec3, Vec4, VertexShader,
};
use super::mesh::Mesh;
use super::obj::{load_obj, LoadError};
use super::object::{Camera, Object, ObjectId, ObjectKind};

/// Camera distance from the origin in a new scene
pub const DEFAULT_CAMERA_DISTANCE: f32 = 5.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("object {0} cannot be its own parent")]
    SelfParent(ObjectId),
    #[error("object {object} is already a child of {parent}")]
    AlreadyParent { object: ObjectId, parent: ObjectId },
    #[error("object {child} is already in the child list of {parent}")]
    DuplicateChild { parent: ObjectId, child: ObjectId },
    #[error("object {child} is not a child of {parent}")]
    ChildNotFound { parent: ObjectId, child: ObjectId },
    #[error("unknown or removed object {0}")]
    UnknownObject(ObjectId),
    #[error("parenting {object} under {parent} would create a cycle")]
    Cycle { object: ObjectId, parent: ObjectId },
    #[error("the root object cannot be removed or re-parented")]
    RootRemoval,
    #[error("the scene camera cannot be removed")]
    CameraRemoval,
}

pub struct Scene {
    objects: Vec<Option<Object>>,
    root: ObjectId,
    camera: ObjectId,
    meshes: Vec<Arc<Mesh>>,
    light_direction: Vec3,
    light_color: Vec3,
    ambient: Vec3,
    pub wireframe: bool,
    pub normal_mapping: bool,
    pub vertex_shader: VertexShader,
    pub fragment_shader: FragmentShader,
}

impl Scene {
    /// Scene with a default camera (60 degree field of view, near 1, far 50)
    pub fn new(aspect: f32) -> Self {
        let mut camera = Camera::default();
        camera.set_aspect(aspect);
        Self::with_camera(camera)
    }

    /// Scene with a root node and the given camera placed at
    /// [`DEFAULT_CAMERA_DISTANCE`] on +z, looking down -z
    pub fn with_camera(camera: Camera) -> Self {
        let mut root = Object::new(Mat4::IDENTITY, ObjectKind::Node);
        root.children.push(ObjectId(1));
        let mut cam = Object::new(
            Mat4::translation(Vec3::new(0.0, 0.0, DEFAULT_CAMERA_DISTANCE)),
            ObjectKind::Camera(camera),
        );
        cam.parent = Some(ObjectId(0));

        let mut scene = Self {
            objects: vec![Some(root), Some(cam)],
            root: ObjectId(0),
            camera: ObjectId(1),
            meshes: Vec::new(),
            light_direction: Vec3::UP,
            light_color: Vec3::ONE,
            ambient: Vec3::ZERO,
            wireframe: false,
            normal_mapping: true,
            vertex_shader: base_vertex,
            fragment_shader: base_fragment,
        };
        scene.set_light_direction(Vec3::new(0.5, 1.0, 0.5));
        scene.set_light_color(Vec3::new(1.7, 1.6, 1.5));
        scene.set_ambient(Vec3::new(0.12, 0.14, 0.24));
        scene
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn camera(&self) -> ObjectId {
        self.camera
    }

    pub fn camera_settings(&self) -> Camera {
        self.object(self.camera)
            .ok()
            .and_then(Object::camera)
            .copied()
            .unwrap_or_default()
    }

    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        match self.object_mut(self.camera).ok().map(|o| &mut o.kind) {
            Some(ObjectKind::Camera(camera)) => Some(camera),
            _ => None,
        }
    }

    /// Projection matrix of the scene camera
    pub fn projection(&self) -> Mat4 {
        self.camera_settings().projection()
    }

    pub fn object(&self, id: ObjectId) -> Result<&Object, SceneError> {
        self.objects
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(SceneError::UnknownObject(id))
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object, SceneError> {
        self.objects
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(SceneError::UnknownObject(id))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.object(id).is_ok()
    }

    /// Number of live objects, root and camera included
    pub fn object_count(&self) -> usize {
        self.objects.iter().flatten().count()
    }

    // ========================================================================
    // Tree structure
    // ========================================================================

    /// Create a node under `parent` with the given local transform
    pub fn create_object(&mut self, parent: ObjectId, local: Mat4) -> Result<ObjectId, SceneError> {
        self.object(parent)?;
        let id = ObjectId(self.objects.len());
        let mut object = Object::new(local, ObjectKind::Node);
        object.parent = Some(parent);
        self.objects.push(Some(object));
        self.attach_child(parent, id)?;
        Ok(id)
    }

    /// Remove an object and, recursively, all of its descendants (children first)
    pub fn remove_object(&mut self, id: ObjectId) -> Result<(), SceneError> {
        if id == self.root {
            return Err(SceneError::RootRemoval);
        }
        let subtree = self.post_order_from(id)?;
        if subtree.contains(&self.camera) {
            return Err(SceneError::CameraRemoval);
        }

        if let Some(parent) = self.object(id)?.parent {
            self.detach_child(parent, id)?;
        }
        for removed in subtree {
            self.objects[removed.0] = None;
        }
        Ok(())
    }

    /// Move `id` under `parent`, keeping its world transform
    pub fn set_parent(&mut self, id: ObjectId, parent: ObjectId) -> Result<(), SceneError> {
        if id == parent {
            return Err(SceneError::SelfParent(id));
        }
        if id == self.root {
            return Err(SceneError::RootRemoval);
        }
        let old_parent = self.object(id)?.parent;
        self.object(parent)?;
        if old_parent == Some(parent) {
            return Err(SceneError::AlreadyParent { object: id, parent });
        }
        if self.ancestors(parent)?.contains(&id) {
            return Err(SceneError::Cycle { object: id, parent });
        }

        // Re-express the world transform relative to the new parent before relinking
        let local = self.transform_relative_to(id, parent)?;

        if let Some(old) = old_parent {
            self.detach_child(old, id)?;
        }
        self.attach_child(parent, id)?;
        let object = self.object_mut(id)?;
        object.parent = Some(parent);
        object.local = local;
        Ok(())
    }

    fn attach_child(&mut self, parent: ObjectId, child: ObjectId) -> Result<(), SceneError> {
        let p = self.object_mut(parent)?;
        if p.children.contains(&child) {
            return Err(SceneError::DuplicateChild { parent, child });
        }
        p.children.push(child);
        Ok(())
    }

    fn detach_child(&mut self, parent: ObjectId, child: ObjectId) -> Result<(), SceneError> {
        let p = self.object_mut(parent)?;
        let index = p
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(SceneError::ChildNotFound { parent, child })?;
        p.children.remove(index);
        Ok(())
    }

    /// `id` followed by its parent, grandparent, ... up to the root
    fn ancestors(&self, id: ObjectId) -> Result<Vec<ObjectId>, SceneError> {
        let mut chain = vec![id];
        let mut current = self.object(id)?.parent;
        while let Some(p) = current {
            if chain.len() > self.objects.len() {
                return Err(SceneError::Cycle { object: id, parent: p });
            }
            chain.push(p);
            current = self.object(p)?.parent;
        }
        Ok(chain)
    }

    /// Every live object, children before their parent, siblings in order
    pub fn post_order(&self) -> Vec<ObjectId> {
        self.post_order_from(self.root).unwrap_or_default()
    }

    /// Subtree rooted at `id`, children before their parent
    pub fn post_order_from(&self, id: ObjectId) -> Result<Vec<ObjectId>, SceneError> {
        let mut order = Vec::new();
        // (node, children already pushed)
        let mut stack = vec![(id, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
                continue;
            }
            stack.push((node, true));
            for &child in self.object(node)?.children.iter().rev() {
                stack.push((child, false));
            }
        }
        Ok(order)
    }

    pub fn children(&self, id: ObjectId) -> Result<&[ObjectId], SceneError> {
        Ok(self.object(id)?.children())
    }

    pub fn parent(&self, id: ObjectId) -> Result<Option<ObjectId>, SceneError> {
        Ok(self.object(id)?.parent)
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    pub fn local_transform(&self, id: ObjectId) -> Result<Mat4, SceneError> {
        Ok(self.object(id)?.local)
    }

    pub fn set_local_transform(&mut self, id: ObjectId, local: Mat4) -> Result<(), SceneError> {
        self.object_mut(id)?.local = local;
        Ok(())
    }

    /// Object-to-world matrix
    pub fn world_transform(&self, id: ObjectId) -> Result<Mat4, SceneError> {
        self.resolve(id, None)
    }

    pub fn inverse_world_transform(&self, id: ObjectId) -> Result<Mat4, SceneError> {
        Ok(self.world_transform(id)?.inverse())
    }

    /// Transform from `id`'s space into `reference`'s space. Composes local
    /// transforms up the parent chain and stops at `reference`; if `reference`
    /// is not an ancestor, the world result is brought into its space with its
    /// inverse world transform.
    pub fn transform_relative_to(&self, id: ObjectId, reference: ObjectId) -> Result<Mat4, SceneError> {
        self.object(reference)?;
        self.resolve(id, Some(reference))
    }

    fn resolve(&self, id: ObjectId, reference: Option<ObjectId>) -> Result<Mat4, SceneError> {
        if Some(id) == reference {
            return Ok(Mat4::IDENTITY);
        }

        let object = self.object(id)?;
        let mut matrix = object.local;
        let mut current = object.parent;
        while let Some(p) = current {
            if Some(p) == reference {
                return Ok(matrix);
            }
            let parent = self.object(p)?;
            matrix = parent.local * matrix;
            current = parent.parent;
        }

        match reference {
            Some(r) => Ok(self.inverse_world_transform(r)? * matrix),
            None => Ok(matrix),
        }
    }

    /// Set `id`'s transform as expressed in `reference`'s space
    pub fn set_transform(&mut self, id: ObjectId, reference: ObjectId, transform: Mat4) -> Result<(), SceneError> {
        let parent = self.object(id)?.parent;
        let local = if parent == Some(reference) {
            transform
        } else {
            let parent_inverse = match parent {
                Some(p) => self.inverse_world_transform(p)?,
                None => Mat4::IDENTITY,
            };
            parent_inverse * self.world_transform(reference)? * transform
        };
        self.object_mut(id)?.local = local;
        Ok(())
    }

    /// World-space position of the object's origin
    pub fn position(&self, id: ObjectId) -> Result<Vec3, SceneError> {
        Ok(Vec3::from4(self.world_transform(id)? * Vec4::ZERO_H))
    }

    // ========================================================================
    // Meshes
    // ========================================================================

    pub fn set_mesh(&mut self, id: ObjectId, mesh: Option<Arc<Mesh>>) -> Result<(), SceneError> {
        self.object_mut(id)?.mesh = mesh;
        Ok(())
    }

    /// Register a mesh with the scene and return a shared handle to it
    pub fn add_mesh(&mut self, mesh: Mesh) -> Arc<Mesh> {
        let mesh = Arc::new(mesh);
        self.meshes.push(Arc::clone(&mesh));
        mesh
    }

    /// Load an OBJ file (and its material library) into the scene
    pub fn load_mesh<P: AsRef<Path>>(&mut self, path: P) -> Result<Arc<Mesh>, LoadError> {
        let mesh = load_obj(path.as_ref())?;
        Ok(self.add_mesh(mesh))
    }

    pub fn meshes(&self) -> &[Arc<Mesh>] {
        &self.meshes
    }

    /// Drop meshes no object or caller refers to any more. Returns how many
    /// were released.
    pub fn prune_meshes(&mut self) -> usize {
        let before = self.meshes.len();
        self.meshes.retain(|mesh| Arc::strong_count(mesh) > 1);
        before - self.meshes.len()
    }

    // ========================================================================
    // Lighting and shading
    // ========================================================================

    pub fn light_direction(&self) -> Vec3 {
        self.light_direction
    }

    /// Direction towards the light; normalized on assignment
    pub fn set_light_direction(&mut self, direction: Vec3) {
        self.light_direction = direction.normalize();
    }

    pub fn light_color(&self) -> Vec3 {
        self.light_color
    }

    /// Clamped to [0, 1] per channel
    pub fn set_light_color(&mut self, color: Vec3) {
        self.light_color = color.clamp01();
    }

    /// Shift every light channel by `delta`, without clamping
    pub fn adjust_light_intensity(&mut self, delta: f32) {
        self.light_color = self.light_color + Vec3::splat(delta);
    }

    pub fn ambient(&self) -> Vec3 {
        self.ambient
    }

    /// Clamped to [0, 1] per channel
    pub fn set_ambient(&mut self, color: Vec3) {
        self.ambient = color.clamp01();
    }

    pub fn set_shading(&mut self, model: ShadingModel) {
        let (vertex, fragment) = model.shaders();
        self.vertex_shader = vertex;
        self.fragment_shader = fragment;
    }
}
