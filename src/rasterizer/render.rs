//! Core rendering functions
//! Clip test, back-face culling, perspective-correct triangle rasterization
//! with a depth buffer, and wireframe lines.

use std::ops::AddAssign;

use rayon::prelude::*;

use super::math::{barycentric, signed_area, Vec2, Vec3, Vec4};
use super::shader::{FragmentGlobals, FragmentIn, FragmentShader, VertexGlobals, VertexOut};
use super::types::{Color, RasterSettings};
use crate::world::{Mesh, Scene, SceneError};

/// Depth buffer reset value, behind every visible NDC depth in [-1, 1]
pub const DEPTH_CLEAR: f32 = 2.0;

/// Depth used for wireframe lines so they always win the depth test
pub const LINE_DEPTH: f32 = -2.0;

/// Color and depth buffers for software rendering.
///
/// Public coordinates are raster coordinates with y pointing up; rows are
/// stored top first, so raster row `y` lives in buffer row `height - 1 - y`.
pub struct Framebuffer {
    pub pixels: Vec<u8>, // RGBA, 4 bytes per pixel
    pub depth: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            pixels: vec![0; width * height * 4],
            depth: vec![DEPTH_CLEAR; width * height],
            width,
            height,
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if width != self.width || height != self.height {
            *self = Self::new(width, height);
        }
    }

    pub fn reset_depth(&mut self) {
        self.depth.fill(DEPTH_CLEAR);
    }

    /// Fill the color buffer; depth is left untouched
    pub fn fill(&mut self, color: Vec4) {
        let bytes = Color::from_vec4(color).to_bytes();
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&bytes);
        }
    }

    /// Depth-tested write at raster coordinates. Returns true if the pixel was written.
    pub fn set_pixel(&mut self, x: i32, y: i32, z: f32, color: Color) -> bool {
        self.as_tile().set_pixel(x, y, z, color)
    }

    /// Color at raster coordinates
    pub fn pixel(&self, x: usize, y: usize) -> Option<Color> {
        let idx = self.index(x, y)? * 4;
        let p = &self.pixels[idx..idx + 4];
        Some(Color::with_alpha(p[0], p[1], p[2], p[3]))
    }

    /// Depth at raster coordinates
    pub fn depth_at(&self, x: usize, y: usize) -> Option<f32> {
        self.index(x, y).map(|idx| self.depth[idx])
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.width && y < self.height {
            Some((self.height - 1 - y) * self.width + x)
        } else {
            None
        }
    }

    /// The whole framebuffer as a single tile
    pub fn as_tile(&mut self) -> Tile<'_> {
        Tile {
            rows: self.height,
            first_row: 0,
            width: self.width,
            height: self.height,
            pixels: &mut self.pixels,
            depth: &mut self.depth,
        }
    }

    /// Split into disjoint horizontal bands of `rows` buffer rows, one per rayon task
    pub fn bands(&mut self, rows: usize) -> impl IndexedParallelIterator<Item = Tile<'_>> {
        let rows = rows.max(1);
        let width = self.width;
        let height = self.height;
        self.pixels
            .par_chunks_mut(rows * width * 4)
            .zip(self.depth.par_chunks_mut(rows * width))
            .enumerate()
            .map(move |(i, (pixels, depth))| Tile {
                rows: depth.len() / width,
                first_row: i * rows,
                width,
                height,
                pixels,
                depth,
            })
    }

    /// Draw a line between raster coordinates using Bresenham's algorithm.
    /// Lines are written at [`LINE_DEPTH`] and so always pass the depth test.
    /// Endpoints outside the framebuffer are clipped to it first.
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) {
        let a = (x0 as f64, y0 as f64);
        let b = (x1 as f64, y1 as f64);
        if let Some((a, b)) = self.clip_segment(a, b) {
            self.bresenham(a, b, color);
        }
    }

    /// Draw a line between two clip-space positions
    pub fn draw_line_clip(&mut self, p0: Vec3, p1: Vec3, color: Color) {
        let w = self.width as f64;
        let h = self.height as f64;
        let to_raster = |p: Vec3| (w * (p.x as f64 + 1.0) / 2.0, h * (p.y as f64 + 1.0) / 2.0);
        if let Some((a, b)) = self.clip_segment(to_raster(p0), to_raster(p1)) {
            self.bresenham(a, b, color);
        }
    }

    /// Liang-Barsky clip of a raster-space segment against
    /// `[0, width - 1] x [0, height - 1]`. Endpoints already inside are
    /// returned unchanged. `None` when nothing is left or a coordinate is
    /// not finite.
    fn clip_segment(&self, a: (f64, f64), b: (f64, f64)) -> Option<((f64, f64), (f64, f64))> {
        if ![a.0, a.1, b.0, b.1].iter().all(|v| v.is_finite()) {
            return None;
        }
        let x_max = (self.width - 1) as f64;
        let y_max = (self.height - 1) as f64;
        let dx = b.0 - a.0;
        let dy = b.1 - a.1;

        // Clipped ends are snapped onto the edge that clipped them
        let mut t0 = (0.0, None);
        let mut t1 = (1.0, None);
        let edges = [
            (-dx, a.0, (0, 0.0)),
            (dx, x_max - a.0, (0, x_max)),
            (-dy, a.1, (1, 0.0)),
            (dy, y_max - a.1, (1, y_max)),
        ];
        for (p, q, edge) in edges {
            if p == 0.0 {
                // Parallel to this edge
                if q < 0.0 {
                    return None;
                }
            } else {
                let r = q / p;
                if p < 0.0 {
                    if r > t1.0 {
                        return None;
                    }
                    if r > t0.0 {
                        t0 = (r, Some(edge));
                    }
                } else {
                    if r < t0.0 {
                        return None;
                    }
                    if r < t1.0 {
                        t1 = (r, Some(edge));
                    }
                }
            }
        }

        let clipped = |(t, edge): (f64, Option<(usize, f64)>), end: (f64, f64)| match edge {
            None => end,
            Some((axis, bound)) => {
                let mut p = (a.0 + t * dx, a.1 + t * dy);
                if axis == 0 {
                    p.0 = bound;
                } else {
                    p.1 = bound;
                }
                (p.0.clamp(0.0, x_max), p.1.clamp(0.0, y_max))
            }
        };
        Some((clipped(t0, a), clipped(t1, b)))
    }

    /// Bresenham walk between two points already inside the framebuffer
    fn bresenham(&mut self, a: (f64, f64), b: (f64, f64), color: Color) {
        let (x0, y0) = (a.0 as i32, a.1 as i32);
        let (x1, y1) = (b.0 as i32, b.1 as i32);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let mut x = x0;
        let mut y = y0;

        let mut tile = self.as_tile();
        loop {
            tile.set_pixel(x, y, LINE_DEPTH, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

/// Mutable view over a contiguous range of framebuffer rows
pub struct Tile<'a> {
    pixels: &'a mut [u8],
    depth: &'a mut [f32],
    width: usize,
    /// Height of the whole framebuffer
    height: usize,
    /// First buffer row covered by this tile
    first_row: usize,
    rows: usize,
}

impl Tile<'_> {
    /// Inclusive range of raster y covered by this tile
    pub fn raster_rows(&self) -> (i32, i32) {
        let top = self.height as i32 - 1 - self.first_row as i32;
        let bottom = top - self.rows as i32 + 1;
        (bottom, top)
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let (bottom, top) = self.raster_rows();
        if x < 0 || x >= self.width as i32 || y < bottom || y > top {
            return None;
        }
        let row = (top - y) as usize;
        Some(row * self.width + x as usize)
    }

    /// Depth-tested write (`z <= stored`, new fragment wins ties)
    pub fn set_pixel(&mut self, x: i32, y: i32, z: f32, color: Color) -> bool {
        match self.index(x, y) {
            Some(idx) if z <= self.depth[idx] => {
                self.write(idx, z, color);
                true
            }
            _ => false,
        }
    }

    fn write(&mut self, idx: usize, z: f32, color: Color) {
        self.depth[idx] = z;
        self.pixels[idx * 4..idx * 4 + 4].copy_from_slice(&color.to_bytes());
    }
}

/// True if the clip-space position lies outside the [-1, 1] cube on any axis
pub fn is_clipped(clip: Vec3) -> bool {
    clip.x < -1.0 || clip.x > 1.0 || clip.y < -1.0 || clip.y > 1.0 || clip.z < -1.0 || clip.z > 1.0
}

/// Why a triangle never reached the rasterizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// All three vertices outside the view volume
    Clipped,
    /// Clockwise in raster space
    Culled,
}

/// Triangle in raster space with attributes pre-multiplied by inverse depth
#[derive(Debug, Clone)]
pub struct PreparedTriangle {
    pub raster: [Vec2; 3],
    pub clip_z: [f32; 3],
    pub inv_depth: [f32; 3],
    pub attributes: [FragmentIn; 3],
    pub material: Option<usize>,
    pub x_min: i32,
    pub x_max: i32,
    pub y_min: i32,
    pub y_max: i32,
}

impl PreparedTriangle {
    /// Clip test, raster conversion, culling and perspective setup.
    /// Only triangles with every vertex outside the view volume are clipped;
    /// the rest rely on the bounding-box clamp.
    pub fn new(
        out: &[VertexOut; 3],
        material: Option<usize>,
        width: usize,
        height: usize,
        backface_cull: bool,
    ) -> Result<Self, Discard> {
        if out.iter().all(|v| is_clipped(v.clip_position)) {
            return Err(Discard::Clipped);
        }

        let w = width as f32;
        let h = height as f32;
        let raster = out.map(|v| {
            Vec2::new(w * (v.clip_position.x + 1.0) / 2.0, h * (v.clip_position.y + 1.0) / 2.0)
        });

        if backface_cull && signed_area(raster[0], raster[1], raster[2]) < 0.0 {
            return Err(Discard::Culled);
        }

        let attributes = out.map(|v| {
            let k = v.inv_depth;
            FragmentIn {
                normal: v.normal * k,
                tangent: v.tangent * k,
                uv: v.uv * k,
                world_position: v.world_position * k,
            }
        });

        let lower = raster[0].min(raster[1]).min(raster[2]);
        let upper = raster[0].max(raster[1]).max(raster[2]);
        let max_x = width as i32 - 1;
        let max_y = height as i32 - 1;

        Ok(Self {
            raster,
            clip_z: out.map(|v| v.clip_position.z),
            inv_depth: out.map(|v| v.inv_depth),
            attributes,
            material,
            x_min: (lower.x as i32).clamp(0, max_x),
            x_max: (upper.x as i32).clamp(0, max_x),
            y_min: (lower.y as i32).clamp(0, max_y),
            y_max: (upper.y as i32).clamp(0, max_y),
        })
    }

    /// Depth for the z-buffer: screen-space blend of clip-space z
    pub fn depth(&self, w: [f32; 3]) -> f32 {
        w[0] * self.clip_z[0] + w[1] * self.clip_z[1] + w[2] * self.clip_z[2]
    }

    /// Perspective-correct attributes at screen-space weights `w`
    pub fn interpolate(&self, w: [f32; 3]) -> FragmentIn {
        let z = 1.0 / (w[0] * self.inv_depth[0] + w[1] * self.inv_depth[1] + w[2] * self.inv_depth[2]);
        let [a0, a1, a2] = &self.attributes;
        FragmentIn {
            normal: (a0.normal * w[0] + a1.normal * w[1] + a2.normal * w[2]) * z,
            tangent: (a0.tangent * w[0] + a1.tangent * w[1] + a2.tangent * w[2]) * z,
            uv: (a0.uv * w[0] + a1.uv * w[1] + a2.uv * w[2]) * z,
            world_position: (a0.world_position * w[0] + a1.world_position * w[1] + a2.world_position * w[2]) * z,
        }
    }
}

/// Rasterize the part of `tri` that falls inside `tile`. Returns fragments written.
pub fn rasterize_triangle(
    tile: &mut Tile<'_>,
    tri: &PreparedTriangle,
    shader: FragmentShader,
    globals: &FragmentGlobals<'_>,
) -> usize {
    let (bottom, top) = tile.raster_rows();
    let y_min = tri.y_min.max(bottom);
    let y_max = tri.y_max.min(top);

    let mut written = 0;
    for y in y_min..=y_max {
        for x in tri.x_min..=tri.x_max {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let Some(w) = barycentric(&tri.raster, p) else {
                continue;
            };
            let Some(idx) = tile.index(x, y) else {
                continue;
            };

            let z = tri.depth(w);
            if z <= tile.depth[idx] {
                let color = shader(&tri.interpolate(w), globals);
                tile.write(idx, z, Color::from_vec4(color));
                written += 1;
            }
        }
    }
    written
}

/// Per-frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub triangles: usize,
    pub clipped: usize,
    pub culled: usize,
    pub fragments: usize,
}

impl AddAssign for RenderStats {
    fn add_assign(&mut self, rhs: RenderStats) {
        self.triangles += rhs.triangles;
        self.clipped += rhs.clipped;
        self.culled += rhs.culled;
        self.fragments += rhs.fragments;
    }
}

/// Run the vertex stage over every triangle of `mesh` and rasterize the result.
///
/// Vertex shading runs in parallel per triangle. Filling runs in parallel per
/// framebuffer band; each band walks all triangles in submission order so the
/// image matches a sequential render exactly.
pub fn render_object(
    fb: &mut Framebuffer,
    scene: &Scene,
    mesh: &Mesh,
    globals: &VertexGlobals,
    settings: &RasterSettings,
) -> RenderStats {
    let vertex_shader = scene.vertex_shader;
    let fragment_shader = scene.fragment_shader;
    let mut stats = RenderStats {
        triangles: mesh.triangles.len(),
        ..Default::default()
    };

    let shaded: Vec<[VertexOut; 3]> = mesh
        .triangles
        .par_iter()
        .map(|tri| std::array::from_fn(|corner| vertex_shader(&mesh.vertex_in(tri, corner), globals)))
        .collect();

    if scene.wireframe {
        for out in &shaded {
            if out.iter().all(|v| is_clipped(v.clip_position)) {
                stats.clipped += 1;
                continue;
            }
            for (a, b) in [(0, 1), (1, 2), (2, 0)] {
                fb.draw_line_clip(out[a].clip_position, out[b].clip_position, Color::WHITE);
            }
        }
        return stats;
    }

    let mut prepared = Vec::with_capacity(shaded.len());
    for (tri, out) in mesh.triangles.iter().zip(&shaded) {
        match PreparedTriangle::new(out, tri.material, fb.width, fb.height, settings.backface_cull) {
            Ok(p) => prepared.push(p),
            Err(Discard::Clipped) => stats.clipped += 1,
            Err(Discard::Culled) => stats.culled += 1,
        }
    }

    let camera_position = globals.camera_position;
    stats.fragments = fb
        .bands(settings.tile_rows)
        .map(|mut tile| {
            prepared
                .iter()
                .map(|tri| {
                    let fragment_globals = FragmentGlobals {
                        scene,
                        material: tri.material.and_then(|m| mesh.materials.get(m)),
                        camera_position,
                    };
                    rasterize_triangle(&mut tile, tri, fragment_shader, &fragment_globals)
                })
                .sum::<usize>()
        })
        .sum();

    stats
}

/// Clear the buffers and render every object with a mesh, children before parents
pub fn render_scene(
    fb: &mut Framebuffer,
    scene: &Scene,
    background: Vec4,
    settings: &RasterSettings,
) -> Result<RenderStats, SceneError> {
    fb.reset_depth();
    fb.fill(background);

    let view_to_world = scene.world_transform(scene.camera())?;
    let world_to_view = view_to_world.inverse();
    let camera_position = Vec3::from4(view_to_world * Vec4::ZERO_H);
    let projection = scene.projection();

    let mut stats = RenderStats::default();
    for id in scene.post_order() {
        let Some(mesh) = scene.object(id)?.mesh() else {
            continue;
        };
        let object_to_world = scene.world_transform(id)?;
        let globals = VertexGlobals::new(object_to_world, world_to_view, projection, camera_position);
        stats += render_object(fb, scene, mesh, &globals, settings);
    }
    Ok(stats)
}
