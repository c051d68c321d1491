//! CPU software rasterizer
//!
//! Features:
//! - Homogeneous transforms with a cofactor-based 4x4 inverse
//! - Pluggable vertex/fragment shader function pairs
//! - Perspective-correct attribute interpolation
//! - Z-buffer with back-face culling
//! - Band-parallel filling with rayon (deterministic output)

mod math;
mod matrix;
mod types;
mod shader;
mod render;

pub use math::*;
pub use matrix::*;
pub use types::*;
pub use shader::*;
pub use render::*;
