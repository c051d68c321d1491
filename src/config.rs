//! Renderer configuration
//!
//! Uses RON (Rusty Object Notation) for human-readable settings files. Every
//! field has a default, so a file only needs the values it changes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rasterizer::{RasterSettings, ShadingModel, Vec3};
use crate::world::{Camera, Scene};
use crate::{DEFAULT_HEIGHT, DEFAULT_WIDTH};

/// Largest render target side the window layer can upload as a texture
pub const MAX_DIMENSION: usize = u16::MAX as usize;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("Serialize error: {0}")]
    Serialize(#[from] ron::Error),
    #[error("Render size {width}x{height} exceeds {max} pixels per side")]
    Dimension { width: usize, height: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Render target size in pixels
    pub width: usize,
    pub height: usize,

    /// Horizontal field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Initial distance between the orbit camera and the model
    pub camera_distance: f32,

    /// Direction towards the light
    pub light_direction: Vec3,
    pub light_color: Vec3,
    pub ambient: Vec3,

    pub shading: ShadingModel,
    pub normal_mapping: bool,
    pub wireframe: bool,
    pub backface_cull: bool,

    /// Rows per rasterizer band
    pub tile_rows: usize,
    /// Worker threads; rayon's default when unset
    pub threads: Option<usize>,

    /// OBJ file shown at startup; a procedural cube when unset
    pub model: Option<PathBuf>,
    /// Size of the model's largest side after normalization
    pub model_size: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fov: 60.0,
            near: 1.0,
            far: 50.0,
            camera_distance: 7.3,
            light_direction: Vec3::new(0.5, 1.0, 0.5),
            light_color: Vec3::ONE,
            ambient: Vec3::new(0.12, 0.14, 0.24),
            shading: ShadingModel::Base,
            normal_mapping: true,
            wireframe: false,
            backface_cull: true,
            tile_rows: 16,
            threads: None,
            model: None,
            model_size: 3.0,
        }
    }
}

impl RenderConfig {
    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    pub fn camera(&self) -> Camera {
        Camera::new(self.fov, self.aspect(), self.near, self.far)
    }

    pub fn raster_settings(&self) -> RasterSettings {
        RasterSettings {
            tile_rows: self.tile_rows.max(1),
            backface_cull: self.backface_cull,
        }
    }

    /// Fresh scene with this configuration's camera, lighting and shading
    /// Reject values the renderer cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(ConfigError::Dimension {
                width: self.width,
                height: self.height,
                max: MAX_DIMENSION,
            });
        }
        Ok(())
    }

    pub fn build_scene(&self) -> Scene {
        let mut scene = Scene::with_camera(self.camera());
        scene.set_light_direction(self.light_direction);
        scene.set_light_color(self.light_color);
        scene.set_ambient(self.ambient);
        scene.set_shading(self.shading);
        scene.normal_mapping = self.normal_mapping;
        scene.wireframe = self.wireframe;
        scene
    }
}

/// Load a configuration from a RON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RenderConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    load_config_from_str(&contents)
}

/// Load a configuration from a RON string
pub fn load_config_from_str(s: &str) -> Result<RenderConfig, ConfigError> {
    let config: RenderConfig = ron::from_str(s)?;
    config.validate()?;
    Ok(config)
}

/// Save a configuration to a RON file
pub fn save_config<P: AsRef<Path>>(config: &RenderConfig, path: P) -> Result<(), ConfigError> {
    let pretty = ron::ser::PrettyConfig::new()
        .depth_limit(3)
        .indentor("  ".to_string());

    let contents = ron::ser::to_string_pretty(config, pretty)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = load_config_from_str("()").expect("valid config");
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
    }

    #[test]
    fn test_partial_config() {
        let config = load_config_from_str(
            "(width: 320, height: 240, shading: Lit, wireframe: true, threads: Some(2), model: Some(\"assets/bob.obj\"))",
        )
        .expect("valid config");
        assert_eq!(config.width, 320);
        assert_eq!(config.shading, ShadingModel::Lit);
        assert!(config.wireframe);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.model, Some(PathBuf::from("assets/bob.obj")));
        assert_eq!(config.fov, 60.0);
        assert!((config.aspect() - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_config() {
        let err = load_config_from_str("(width: \"wide\")").expect_err("wrong type");
        assert!(matches!(err, ConfigError::Parse(_)));
        let err = load_config("does/not/exist.ron").expect_err("missing file");
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        let err = load_config_from_str("(width: 70000)").expect_err("too wide");
        assert!(matches!(err, ConfigError::Dimension { width: 70000, height: 720, .. }));
        let err = load_config_from_str("(height: 65536)").expect_err("too tall");
        assert!(matches!(err, ConfigError::Dimension { height: 65536, .. }));

        let config = load_config_from_str("(width: 65535, height: 1)").expect("largest size");
        assert_eq!(config.width, MAX_DIMENSION);
    }

    #[test]
    fn test_save_and_reload() {
        let mut config = RenderConfig::default();
        config.camera_distance = 12.5;
        config.shading = ShadingModel::Normals;
        config.light_color = Vec3::new(0.5, 0.25, 1.0);

        let path = std::env::temp_dir().join(format!("taquin-config-{}.ron", std::process::id()));
        save_config(&config, &path).expect("save");
        let loaded = load_config(&path).expect("load");
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_build_scene() {
        let config = RenderConfig {
            light_color: Vec3::new(3.0, 0.5, -1.0),
            wireframe: true,
            normal_mapping: false,
            ..RenderConfig::default()
        };
        let scene = config.build_scene();
        assert!(scene.wireframe);
        assert!(!scene.normal_mapping);
        assert_eq!(scene.light_color(), Vec3::new(1.0, 0.5, 0.0));
        assert!((scene.light_direction().len() - 1.0).abs() < 1e-6);
        assert_eq!(scene.camera_settings().fov, 60.0);
        assert!((scene.camera_settings().aspect - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_raster_settings_never_zero_rows() {
        let config = RenderConfig { tile_rows: 0, ..RenderConfig::default() };
        assert_eq!(config.raster_settings().tile_rows, 1);
    }
}
