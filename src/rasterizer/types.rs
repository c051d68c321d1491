//! Core types for the rasterizer

use std::path::Path;
use std::sync::Arc;

use super::math::{frac, Vec3, Vec4};

/// RGBA color (0-255 per channel)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Convert a [0,1] color to 8 bits per channel, truncating and clamping
    pub fn from_vec4(c: Vec4) -> Self {
        fn channel(v: f32) -> u8 {
            ((255.0 * v) as i32).clamp(0, 255) as u8
        }
        Self {
            r: channel(c.x),
            g: channel(c.y),
            b: channel(c.z),
            a: channel(c.w),
        }
    }

    /// Normalized [0,1] color channels
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        )
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::from4(Vec4 { w: 0.0, ..self.to_vec4() })
    }

    /// Convert to [u8; 4] for framebuffer
    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Immutable 2D grid of RGBA texels, row 0 at the top of the image
#[derive(Debug, Clone)]
pub struct Texture {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Color>,
    pub name: String,
}

impl Texture {
    /// Solid texture
    pub fn new(width: usize, height: usize, color: Color) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width * height],
            name: String::new(),
        }
    }

    /// Decode an image file (PNG, JPEG, BMP, TGA) into RGBA8
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, image::ImageError> {
        let path = path.as_ref();
        let img = image::open(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self::from_image(img, name))
    }

    /// Decode an in-memory image into RGBA8
    pub fn from_bytes(bytes: &[u8], name: String) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_image(img, name))
    }

    fn from_image(img: image::DynamicImage, name: String) -> Self {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels: Vec<Color> = rgba
            .pixels()
            .map(|p| Color::with_alpha(p[0], p[1], p[2], p[3]))
            .collect();

        Self {
            width: width as usize,
            height: height as usize,
            pixels,
            name,
        }
    }

    /// Create a checkerboard texture with `cell`-pixel squares
    pub fn checkerboard(width: usize, height: usize, cell: usize, color1: Color, color2: Color) -> Self {
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let checker = ((x / cell) + (y / cell)) % 2 == 0;
                pixels.push(if checker { color1 } else { color2 });
            }
        }
        Self { width, height, pixels, name: "checkerboard".to_string() }
    }

    /// Nearest-texel lookup. UVs wrap (tiling), v is flipped so that v = 1 is the
    /// top row, and the texel index is clamped to the image bounds.
    pub fn sample(&self, u: f32, v: f32) -> Vec3 {
        if self.width == 0 || self.height == 0 {
            return Vec3::ZERO;
        }
        let u = frac(u);
        let v = 1.0 - frac(v);

        let x = ((u * self.width as f32) as i64).clamp(0, self.width as i64 - 1) as usize;
        let y = ((v * self.height as f32) as i64).clamp(0, self.height as i64 - 1) as usize;
        self.pixels[y * self.width + x].to_vec3()
    }

    /// Get pixel at x,y coordinates
    pub fn get_pixel(&self, x: usize, y: usize) -> Color {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x]
        } else {
            Color::BLACK
        }
    }
}

/// Named surface description. Textures are shared so several materials (or
/// meshes) can point at the same decoded image.
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub name: String,
    pub albedo: Option<Arc<Texture>>,
    pub normal_map: Option<Arc<Texture>>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            albedo: None,
            normal_map: None,
        }
    }
}

/// Rasterizer settings
#[derive(Debug, Clone)]
pub struct RasterSettings {
    /// Height of each horizontal band rasterized by one worker
    pub tile_rows: usize,
    /// Discard triangles with negative raster-space area
    pub backface_cull: bool,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            tile_rows: 16,
            backface_cull: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_2x2() -> Texture {
        // Row 0 is the top of the image
        Texture {
            width: 2,
            height: 2,
            pixels: vec![
                Color::new(255, 0, 0),
                Color::new(0, 255, 0),
                Color::new(0, 0, 255),
                Color::new(255, 255, 255),
            ],
            name: "gradient".to_string(),
        }
    }

    #[test]
    fn test_from_vec4_clamps_and_truncates() {
        let c = Color::from_vec4(Vec4::new(-0.5, 0.5, 1.5, 1.0));
        assert_eq!(c, Color::with_alpha(0, 127, 255, 255));
    }

    #[test]
    fn test_sample_flips_v() {
        let tex = gradient_2x2();
        // v near 1 samples the top row
        assert_eq!(tex.sample(0.25, 0.9), Vec3::new(1.0, 0.0, 0.0));
        // v near 0 samples the bottom row
        assert_eq!(tex.sample(0.25, 0.1), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(tex.sample(0.75, 0.1), Vec3::ONE);
    }

    #[test]
    fn test_sample_wraps() {
        let tex = gradient_2x2();
        assert_eq!(tex.sample(1.25, 0.9), tex.sample(0.25, 0.9));
        assert_eq!(tex.sample(-0.75, 0.9), tex.sample(0.25, 0.9));
        assert_eq!(tex.sample(0.75, 2.1), tex.sample(0.75, 0.1));
    }

    #[test]
    fn test_sample_clamps_on_edge() {
        let tex = gradient_2x2();
        // u = 0, v = 0: v flips to 1, which would index row 2 without clamping
        assert_eq!(tex.sample(0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_checkerboard() {
        let tex = Texture::checkerboard(8, 8, 4, Color::WHITE, Color::BLACK);
        assert_eq!(tex.get_pixel(0, 0), Color::WHITE);
        assert_eq!(tex.get_pixel(4, 0), Color::BLACK);
        assert_eq!(tex.get_pixel(4, 4), Color::WHITE);
        assert_eq!(tex.get_pixel(9, 0), Color::BLACK);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(Texture::from_bytes(b"not an image", "x".to_string()).is_err());
    }
}
