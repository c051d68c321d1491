//! Taquin: CPU software rasterizer
//!
//! - Scene graph with parent-relative transforms
//! - Pluggable vertex/fragment shader pairs
//! - Perspective-correct, depth-buffered triangle rasterization
//! - OBJ/MTL model loading

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default render target resolution
pub const DEFAULT_WIDTH: usize = 1280;
pub const DEFAULT_HEIGHT: usize = 720;

pub mod rasterizer;
pub mod world;
pub mod config;
pub mod app;
