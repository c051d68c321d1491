//! Viewer state
//!
//! Orbit camera around a single model, with the interactive toggles of the
//! viewer. Input is translated into [`Control`]s by the window layer so the
//! state machine here stays independent of the windowing backend.

use std::sync::Arc;

use log::{debug, info};
use rand::Rng;

use crate::rasterizer::{Mat4, ShadingModel, Vec3, Vec4};
use crate::world::{Mesh, ObjectId, Scene, SceneError};

/// Degrees of camera rotation per pixel of mouse motion
pub const ORBIT_SENSITIVITY: f32 = 0.25;
/// Lateral camera step per key press
pub const OFFSET_STEP: f32 = 0.2;
/// Light color change per key press, applied to every channel
pub const LIGHT_STEP: f32 = 1.0;
/// Automatic rotation speed in degrees per second
pub const AUTO_ROTATE_SPEED: f32 = 360.0 / 40.0 * 3.0;
/// Spin mode rotation per frame at full color intensity, in degrees
pub const SPIN_SPEED: f32 = 15.0;

/// A single user action
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    /// Move the camera away (positive) or closer (negative)
    Zoom(f32),
    /// Mouse motion in pixels
    Orbit { dx: f32, dy: f32 },
    ShiftLeft,
    ShiftRight,
    LightUp,
    LightDown,
    ToggleNormalMap,
    ToggleWireframe,
    ToggleAutoRotate,
    ReverseRotation,
    ResetOrientation,
    ToggleSpin,
    CycleShading,
}

/// Frames-per-second accumulator, reporting once per elapsed second
#[derive(Debug, Clone, Copy, Default)]
pub struct FpsCounter {
    elapsed: f32,
    frames: u32,
}

impl FpsCounter {
    /// Count one frame. Returns the average FPS when more than a second has
    /// accumulated, and starts a new period.
    pub fn tick(&mut self, dt: f32) -> Option<f32> {
        self.elapsed += dt;
        self.frames += 1;
        if self.elapsed > 1.0 {
            let fps = self.frames as f32 / self.elapsed;
            self.elapsed = 0.0;
            self.frames = 0;
            Some(fps)
        } else {
            None
        }
    }
}

pub struct Viewer {
    pub camera_distance: f32,
    /// Lateral camera offset along the camera's x axis
    pub camera_offset: f32,
    /// Orbit angles in degrees, around x, y and z
    pub angles: Vec3,
    pub auto_rotate: bool,
    pub reverse_rotation: bool,
    pub spin: bool,
    pub shading: ShadingModel,
    /// Redrawn once per second; drives spin mode and tints the background
    pub random_color: Vec4,
    /// Object holding the displayed model
    pub model: Option<ObjectId>,
    fps: FpsCounter,
}

impl Viewer {
    pub fn new(camera_distance: f32, shading: ShadingModel) -> Self {
        Self {
            camera_distance,
            camera_offset: 0.0,
            angles: Vec3::ZERO,
            auto_rotate: false,
            reverse_rotation: false,
            spin: false,
            shading,
            random_color: Vec4::ZERO,
            model: None,
            fps: FpsCounter::default(),
        }
    }

    /// Apply a control to the viewer and the scene it drives
    pub fn apply(&mut self, control: Control, scene: &mut Scene) {
        match control {
            Control::Zoom(amount) => self.camera_distance += amount,
            Control::Orbit { dx, dy } => {
                // The spin animation owns the angles while it runs
                if !self.spin {
                    self.angles.y -= dx * ORBIT_SENSITIVITY;
                    self.angles.x -= dy * ORBIT_SENSITIVITY;
                }
            }
            Control::ShiftLeft => self.camera_offset -= OFFSET_STEP,
            Control::ShiftRight => self.camera_offset += OFFSET_STEP,
            Control::LightUp => scene.adjust_light_intensity(LIGHT_STEP),
            Control::LightDown => scene.adjust_light_intensity(-LIGHT_STEP),
            Control::ToggleNormalMap => scene.normal_mapping = !scene.normal_mapping,
            Control::ToggleWireframe => scene.wireframe = !scene.wireframe,
            Control::ToggleAutoRotate => self.auto_rotate = !self.auto_rotate,
            Control::ReverseRotation => self.reverse_rotation = !self.reverse_rotation,
            Control::ResetOrientation => self.angles = Vec3::ZERO,
            Control::ToggleSpin => self.spin = !self.spin,
            Control::CycleShading => {
                self.shading = self.shading.next();
                scene.set_shading(self.shading);
                info!("shading: {}", self.shading);
            }
        }
    }

    /// Advance animations by `dt` seconds. Returns the FPS once per second.
    pub fn update<R: Rng>(&mut self, dt: f32, rng: &mut R) -> Option<f32> {
        if self.spin {
            self.angles.x -= self.random_color.z * SPIN_SPEED;
            self.angles.y -= self.random_color.y * SPIN_SPEED;
            self.angles.z -= self.random_color.x * SPIN_SPEED;
        }

        if self.auto_rotate {
            let step = AUTO_ROTATE_SPEED * dt;
            if self.reverse_rotation {
                self.angles.y += step;
            } else {
                self.angles.y -= step;
            }
        }

        let fps = self.fps.tick(dt)?;
        self.random_color = Vec4::new(rng.random(), rng.random(), rng.random(), rng.random());
        Some(fps)
    }

    /// Camera transform relative to the root: orbit rotations applied to a
    /// point at the camera distance
    pub fn camera_transform(&self) -> Mat4 {
        Mat4::rotation_z(self.angles.z)
            * Mat4::rotation_x(self.angles.x)
            * Mat4::rotation_y(self.angles.y)
            * Mat4::translation(Vec3::new(self.camera_offset, 0.0, self.camera_distance))
    }

    pub fn place_camera(&self, scene: &mut Scene) -> Result<(), SceneError> {
        scene.set_transform(scene.camera(), scene.root(), self.camera_transform())
    }

    pub fn background(&self) -> Vec4 {
        self.random_color
    }

    /// Show `mesh` centered at the origin with its largest side scaled to
    /// `size`, replacing the previous model. The previous mesh is released
    /// once nothing else refers to it.
    pub fn show_model(&mut self, scene: &mut Scene, mesh: Arc<Mesh>, size: f32) -> Result<ObjectId, SceneError> {
        if let Some(previous) = self.model.take() {
            scene.remove_object(previous)?;
        }
        let object = scene.create_object(scene.root(), mesh.normalizing_transform(size))?;
        scene.set_mesh(object, Some(mesh))?;
        self.model = Some(object);

        let released = scene.prune_meshes();
        if released > 0 {
            debug!("released {} unused meshes", released);
        }
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn viewer() -> (Viewer, Scene) {
        (Viewer::new(7.3, ShadingModel::Base), Scene::new(16.0 / 9.0))
    }

    #[test]
    fn test_fps_counter() {
        let mut fps = FpsCounter::default();
        // Exactly one second is not enough
        for _ in 0..4 {
            assert_eq!(fps.tick(0.25), None);
        }
        let reported = fps.tick(0.25).expect("past one second");
        assert!((reported - 4.0).abs() < 1e-5);
        assert_eq!(fps.tick(0.5), None);
    }

    #[test]
    fn test_orbit_and_reset() {
        let (mut v, mut scene) = viewer();
        v.apply(Control::Orbit { dx: 4.0, dy: -8.0 }, &mut scene);
        assert_eq!(v.angles, Vec3::new(2.0, -1.0, 0.0));

        v.apply(Control::ToggleSpin, &mut scene);
        v.apply(Control::Orbit { dx: 4.0, dy: 4.0 }, &mut scene);
        assert_eq!(v.angles, Vec3::new(2.0, -1.0, 0.0));

        v.apply(Control::ResetOrientation, &mut scene);
        assert_eq!(v.angles, Vec3::ZERO);
    }

    #[test]
    fn test_scene_toggles() {
        let (mut v, mut scene) = viewer();
        let normal_mapping = scene.normal_mapping;
        v.apply(Control::ToggleNormalMap, &mut scene);
        v.apply(Control::ToggleWireframe, &mut scene);
        assert_eq!(scene.normal_mapping, !normal_mapping);
        assert!(scene.wireframe);

        v.apply(Control::LightUp, &mut scene);
        assert_eq!(scene.light_color(), Vec3::splat(2.0));
        v.apply(Control::LightDown, &mut scene);
        v.apply(Control::LightDown, &mut scene);
        assert_eq!(scene.light_color(), Vec3::ZERO);

        v.apply(Control::CycleShading, &mut scene);
        assert_eq!(v.shading, ShadingModel::Lit);
    }

    #[test]
    fn test_auto_rotation_direction() {
        let (mut v, mut scene) = viewer();
        let mut rng = StdRng::seed_from_u64(7);
        v.apply(Control::ToggleAutoRotate, &mut scene);
        v.update(0.5, &mut rng);
        assert!((v.angles.y + AUTO_ROTATE_SPEED * 0.5).abs() < 1e-4);

        v.apply(Control::ReverseRotation, &mut scene);
        v.update(0.5, &mut rng);
        assert!(v.angles.y.abs() < 1e-4);
    }

    #[test]
    fn test_random_color_once_per_second() {
        let (mut v, _) = viewer();
        let mut rng = StdRng::seed_from_u64(42);
        assert!(v.update(0.6, &mut rng).is_none());
        assert_eq!(v.background(), Vec4::ZERO);

        assert!(v.update(0.6, &mut rng).is_some());
        let c = v.background();
        for channel in c.to_array() {
            assert!((0.0..1.0).contains(&channel));
        }
        assert_ne!(c, Vec4::ZERO);
    }

    #[test]
    fn test_spin_uses_random_color() {
        let (mut v, mut scene) = viewer();
        let mut rng = StdRng::seed_from_u64(1);
        v.random_color = Vec4::new(0.2, 0.4, 1.0, 1.0);
        v.apply(Control::ToggleSpin, &mut scene);
        v.update(0.01, &mut rng);
        assert!((v.angles.x + 15.0).abs() < 1e-4);
        assert!((v.angles.y + 6.0).abs() < 1e-4);
        assert!((v.angles.z + 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_camera_placement() {
        let (mut v, mut scene) = viewer();
        v.apply(Control::ShiftRight, &mut scene);
        v.apply(Control::Zoom(-1.0), &mut scene);
        v.place_camera(&mut scene).expect("camera");
        let p = scene.position(scene.camera()).expect("camera");
        assert!((p - Vec3::new(0.2, 0.0, 6.3)).len() < 1e-5);

        // Orbiting keeps the distance to the origin
        v.camera_offset = 0.0;
        v.angles = Vec3::new(30.0, 75.0, 10.0);
        v.place_camera(&mut scene).expect("camera");
        let p = scene.position(scene.camera()).expect("camera");
        assert!((p.len() - 6.3).abs() < 1e-4);
    }

    #[test]
    fn test_show_model_replaces_previous() {
        let (mut v, mut scene) = viewer();
        let cube = scene.add_mesh(Mesh::cube(2.0));

        let first = v.show_model(&mut scene, Arc::clone(&cube), 3.0).expect("first");
        let second = v.show_model(&mut scene, Arc::clone(&cube), 3.0).expect("second");
        assert!(!scene.contains(first));
        assert_eq!(v.model, Some(second));

        // A cube of side 2 scaled to side 3
        let world = scene.world_transform(second).expect("model");
        let corner = world.transform_point(Vec3::splat(1.0));
        assert!((corner - Vec3::splat(1.5)).len() < 1e-5);
    }

    #[test]
    fn test_show_model_releases_replaced_mesh() {
        let (mut v, mut scene) = viewer();
        let first = scene.add_mesh(Mesh::cube(1.0));
        v.show_model(&mut scene, first, 3.0).expect("first");
        assert_eq!(scene.meshes().len(), 1);

        let second = scene.add_mesh(Mesh::cube(2.0));
        v.show_model(&mut scene, Arc::clone(&second), 3.0).expect("second");
        assert_eq!(scene.meshes().len(), 1);
        assert!(Arc::ptr_eq(&scene.meshes()[0], &second));
    }
}
