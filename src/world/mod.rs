//! World module - scene graph, meshes and model loading
//!
//! - Arena-backed object tree with on-demand world transforms
//! - Indexed triangle meshes with materials and computed tangents
//! - Wavefront OBJ/MTL loading

mod geometry;
mod mesh;
mod obj;
mod object;
mod scene;

pub use geometry::*;
pub use mesh::*;
pub use obj::*;
pub use object::*;
pub use scene::*;
