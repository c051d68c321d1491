//! Vertex and fragment stages
//!
//! Shaders are plain function pointers held by the scene. The vertex stage runs
//! once per triangle corner and must write the clip-space position through the
//! object-to-clip matrix; the fragment stage runs once per covered pixel that
//! passed the depth test and returns an RGBA color in [0, 1].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::math::{clamp01, frac, Vec2, Vec3, Vec4};
use super::matrix::{Mat3, Mat4};
use super::types::Material;
use crate::world::Scene;

/// Blinn-Phong exponent
pub const SPECULAR_POWER: f32 = 4.0;

/// Object-space attributes of one triangle corner
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexIn {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec3,
}

/// Per-object constants for the vertex stage
#[derive(Debug, Clone, Copy)]
pub struct VertexGlobals {
    pub object_to_world: Mat4,
    pub object_to_view: Mat4,
    pub object_to_clip: Mat4,
    /// Inverse-transpose of the linear part of `object_to_world`, for normals
    pub normal_to_world: Mat3,
    pub camera_position: Vec3,
}

impl VertexGlobals {
    pub fn new(object_to_world: Mat4, world_to_view: Mat4, projection: Mat4, camera_position: Vec3) -> Self {
        let object_to_view = world_to_view * object_to_world;
        Self {
            object_to_world,
            object_to_view,
            object_to_clip: projection * object_to_view,
            normal_to_world: object_to_world.inverse().transpose().upper_left(),
            camera_position,
        }
    }
}

/// Vertex stage output. `inv_depth` is the reciprocal view-space depth used
/// for perspective-correct interpolation of the remaining attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexOut {
    pub clip_position: Vec3,
    pub inv_depth: f32,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub uv: Vec2,
    pub world_position: Vec3,
}

/// Interpolated attributes at one pixel
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentIn {
    pub normal: Vec3,
    pub tangent: Vec3,
    pub uv: Vec2,
    pub world_position: Vec3,
}

/// Per-triangle constants for the fragment stage
#[derive(Clone, Copy)]
pub struct FragmentGlobals<'a> {
    pub scene: &'a Scene,
    pub material: Option<&'a Material>,
    pub camera_position: Vec3,
}

pub type VertexShader = fn(&VertexIn, &VertexGlobals) -> VertexOut;
pub type FragmentShader = fn(&FragmentIn, &FragmentGlobals<'_>) -> Vec4;

/// Position through the full object-to-clip chain plus the reciprocal depth.
/// Every vertex shader starts from this.
fn project(input: &VertexIn, globals: &VertexGlobals) -> (Vec3, f32) {
    let p = Vec4::from3(input.position, 1.0);
    let clip = Vec3::from4(globals.object_to_clip * p);
    let view = globals.object_to_view * p;
    (clip, view.w / view.z)
}

fn albedo(material: Option<&Material>, uv: Vec2) -> Vec3 {
    material
        .and_then(|m| m.albedo.as_ref())
        .map(|tex| tex.sample(uv.x, uv.y))
        .unwrap_or(Vec3::ONE)
}

/// Normal map texel for this fragment, when the scene has normal mapping enabled
fn normal_map_texel(input: &FragmentIn, globals: &FragmentGlobals<'_>) -> Option<Vec3> {
    if !globals.scene.normal_mapping {
        return None;
    }
    globals
        .material
        .and_then(|m| m.normal_map.as_ref())
        .map(|tex| tex.sample(input.uv.x, input.uv.y))
}

/// Rotate a tangent-space vector into the (tangent, normal x tangent, normal) frame
fn to_tangent_frame(normal: Vec3, tangent: Vec3, v: Vec3) -> Vec3 {
    let t = tangent.normalize();
    let b = normal.cross(t).normalize();
    (t * v.x + b * v.y + normal * v.z).normalize()
}

// ============================================================================
// Base pair
// ============================================================================

/// Normals and tangents are renormalized but stay in object space, and the
/// world position is left at the origin.
pub fn base_vertex(input: &VertexIn, globals: &VertexGlobals) -> VertexOut {
    let (clip_position, inv_depth) = project(input, globals);
    VertexOut {
        clip_position,
        inv_depth,
        normal: input.normal.normalize(),
        tangent: input.tangent.normalize(),
        uv: input.uv,
        world_position: Vec3::ZERO,
    }
}

/// Albedo times (ambient + light color x specular). The normal map texel is
/// used as-is, without remapping from [0, 1].
pub fn base_fragment(input: &FragmentIn, globals: &FragmentGlobals<'_>) -> Vec4 {
    let scene = globals.scene;
    let albedo = albedo(globals.material, input.uv);

    let mut normal = input.normal.normalize();
    if let Some(texel) = normal_map_texel(input, globals) {
        normal = to_tangent_frame(normal, input.tangent, texel);
    }

    let light = scene.light_direction();
    let lambert = clamp01(normal.dot(light));

    let view = (input.world_position - globals.camera_position).normalize();
    let half = (light + view).normalize();
    let gate = if lambert > 0.0 { 1.0 } else { 0.0 };
    let specular = clamp01(normal.dot(half) * gate).powf(SPECULAR_POWER);

    let light_term = scene.ambient() + scene.light_color() * specular;
    Vec4::from3(albedo.mul_elem(light_term), 1.0)
}

// ============================================================================
// Lit pair
// ============================================================================

/// World-space normal, tangent and position
pub fn lit_vertex(input: &VertexIn, globals: &VertexGlobals) -> VertexOut {
    let (clip_position, inv_depth) = project(input, globals);
    VertexOut {
        clip_position,
        inv_depth,
        normal: (globals.normal_to_world * input.normal).normalize(),
        tangent: globals.object_to_world.transform_direction(input.tangent).normalize(),
        uv: input.uv,
        world_position: globals.object_to_world.transform_point(input.position),
    }
}

/// Lambert diffuse plus Blinn-Phong specular with a [0, 1] -> [-1, 1] normal map decode
pub fn lit_fragment(input: &FragmentIn, globals: &FragmentGlobals<'_>) -> Vec4 {
    let scene = globals.scene;
    let albedo = albedo(globals.material, input.uv);

    let mut normal = input.normal.normalize();
    if let Some(texel) = normal_map_texel(input, globals) {
        let decoded = texel * 2.0 - Vec3::ONE;
        normal = to_tangent_frame(normal, input.tangent, decoded);
    }

    let light = scene.light_direction();
    let lambert = clamp01(normal.dot(light));

    let to_eye = (globals.camera_position - input.world_position).normalize();
    let half = (light + to_eye).normalize();
    let specular = if lambert > 0.0 {
        clamp01(normal.dot(half)).powf(SPECULAR_POWER)
    } else {
        0.0
    };

    let light_term = scene.ambient() + scene.light_color() * (lambert + specular);
    Vec4::from3(albedo.mul_elem(light_term).clamp01(), 1.0)
}

// ============================================================================
// Debug views
// ============================================================================

/// Interpolated normal mapped from [-1, 1] to [0, 1]
pub fn normals_fragment(input: &FragmentIn, _globals: &FragmentGlobals<'_>) -> Vec4 {
    let n = input.normal.normalize();
    Vec4::from3(n * 0.5 + Vec3::splat(0.5), 1.0)
}

/// Wrapped UVs in the red and green channels
pub fn tex_coords_fragment(input: &FragmentIn, _globals: &FragmentGlobals<'_>) -> Vec4 {
    Vec4::new(frac(input.uv.x), frac(input.uv.y), 0.0, 1.0)
}

/// Shader pair selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ShadingModel {
    /// Specular-only lighting with object-space normals
    #[default]
    Base,
    /// World-space normals, diffuse and specular
    Lit,
    /// Visualize world-space normals
    Normals,
    /// Visualize texture coordinates
    TexCoords,
}

impl ShadingModel {
    pub const ALL: [ShadingModel; 4] = [
        ShadingModel::Base,
        ShadingModel::Lit,
        ShadingModel::Normals,
        ShadingModel::TexCoords,
    ];

    pub fn shaders(self) -> (VertexShader, FragmentShader) {
        match self {
            ShadingModel::Base => (base_vertex, base_fragment),
            ShadingModel::Lit => (lit_vertex, lit_fragment),
            ShadingModel::Normals => (lit_vertex, normals_fragment),
            ShadingModel::TexCoords => (base_vertex, tex_coords_fragment),
        }
    }

    /// Cycle to the next model
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|&m| m == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ShadingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShadingModel::Base => "base",
            ShadingModel::Lit => "lit",
            ShadingModel::Normals => "normals",
            ShadingModel::TexCoords => "tex-coords",
        };
        f.write_str(name)
    }
}
