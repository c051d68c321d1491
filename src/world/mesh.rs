//! Indexed triangle meshes
//!
//! A [`Mesh`] is immutable geometry once built. [`MeshBuilder`] collects raw
//! polygons (from the OBJ loader or procedural code), fan-triangulates them,
//! fills in missing normals, validates every index and computes tangents.

use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use crate::rasterizer::{Color, Mat4, Material, Texture, Vec2, Vec3, VertexIn};
use super::geometry::Aabb;

/// Polygons with more points are truncated to this many
pub const MAX_POLYGON_POINTS: usize = 32;

/// UV determinants below this are replaced by 1 in the tangent solve
const UV_DET_EPSILON: f32 = 1e-10;

/// Accumulated tangents shorter than this become zero
const TANGENT_EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    #[error("triangle {triangle}: vertex index {index} out of range ({count} vertices)")]
    VertexIndex { triangle: usize, index: usize, count: usize },
    #[error("triangle {triangle}: normal index {index} out of range ({count} normals)")]
    NormalIndex { triangle: usize, index: usize, count: usize },
    #[error("triangle {triangle}: texture coordinate index {index} out of range ({count} coordinates)")]
    UvIndex { triangle: usize, index: usize, count: usize },
}

/// One polygon corner: 0-based indices into the builder's arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Corner {
    pub vertex: usize,
    pub uv: Option<usize>,
    pub normal: Option<usize>,
}

impl Corner {
    pub fn new(vertex: usize, uv: Option<usize>, normal: Option<usize>) -> Self {
        Self { vertex, uv, normal }
    }
}

/// Three index triples plus a material. Every normal index is resolved once
/// the mesh is built; texture coordinates stay optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Triangle {
    pub vertices: [usize; 3],
    pub normals: [usize; 3],
    pub uvs: [Option<usize>; 3],
    pub material: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// One tangent per vertex position
    pub tangents: Vec<Vec3>,
    pub triangles: Vec<Triangle>,
    pub materials: Vec<Material>,
    /// Normals computed for corners the source left without one
    pub auto_normals: usize,
    bounds: Aabb,
}

impl Mesh {
    /// Vertex-stage input for one corner of `tri`
    pub fn vertex_in(&self, tri: &Triangle, corner: usize) -> VertexIn {
        let v = tri.vertices[corner];
        VertexIn {
            position: self.vertices[v],
            normal: self.normals[tri.normals[corner]],
            uv: tri.uvs[corner].map_or(Vec2::ZERO, |i| self.uvs[i]),
            tangent: self.tangents.get(v).copied().unwrap_or(Vec3::ZERO),
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn center(&self) -> Vec3 {
        self.bounds.center()
    }

    /// Transform that centers the mesh on the origin and scales its largest
    /// extent to `target_size`
    pub fn normalizing_transform(&self, target_size: f32) -> Mat4 {
        let extent = self.bounds.largest_extent();
        let scale = if extent > f32::EPSILON { target_size / extent } else { 1.0 };
        Mat4::scale_uniform(scale) * Mat4::translation(-self.center())
    }

    pub fn reverse_normals(&mut self) {
        for n in &mut self.normals {
            *n = -*n;
        }
    }

    /// Flip the winding of every triangle
    pub fn reverse_orientation(&mut self) {
        for tri in &mut self.triangles {
            tri.vertices.swap(1, 2);
            tri.normals.swap(1, 2);
            tri.uvs.swap(1, 2);
        }
    }

    /// Per-vertex tangents from the UV gradients of every incident triangle
    pub fn compute_tangents(&mut self) {
        let mut tangents = vec![Vec3::ZERO; self.vertices.len()];

        for tri in &self.triangles {
            let [Some(t0), Some(t1), Some(t2)] = tri.uvs else {
                continue;
            };
            let [i0, i1, i2] = tri.vertices;
            let (v0, v1, v2) = (self.vertices[i0], self.vertices[i1], self.vertices[i2]);
            let (uv0, uv1, uv2) = (self.uvs[t0], self.uvs[t1], self.uvs[t2]);

            let delta_p1 = v1 - v0;
            let delta_p2 = v2 - v0;
            let delta_u1 = uv1.x - uv0.x;
            let delta_v1 = uv1.y - uv0.y;
            let delta_u2 = uv2.x - uv0.x;
            let delta_v2 = uv2.y - uv0.y;

            let mut det = delta_u1 * delta_v2 - delta_u2 * delta_v1;
            if det.abs() < UV_DET_EPSILON {
                det = 1.0;
            }

            let tangent = ((delta_p1 * delta_v2 + delta_p2 * -delta_v1) * (1.0 / det)).normalize();
            for &i in &tri.vertices {
                tangents[i] += tangent;
            }
        }

        for t in &mut tangents {
            let len = t.len();
            *t = if len < TANGENT_EPSILON { Vec3::ZERO } else { *t * (1.0 / len) };
        }
        self.tangents = tangents;
    }

    /// Textured cube of edge `size` centered on the origin, wound counter-clockwise
    /// seen from outside
    pub fn cube(size: f32) -> Mesh {
        let half = size * 0.5;
        // (normal, u axis, v axis) with u x v = normal
        let faces = [
            (Vec3::FRONT, Vec3::RIGHT, Vec3::UP),
            (-Vec3::FRONT, -Vec3::RIGHT, Vec3::UP),
            (Vec3::RIGHT, -Vec3::FRONT, Vec3::UP),
            (-Vec3::RIGHT, Vec3::FRONT, Vec3::UP),
            (Vec3::UP, Vec3::RIGHT, -Vec3::FRONT),
            (-Vec3::UP, Vec3::RIGHT, Vec3::FRONT),
        ];
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

        let mut builder = MeshBuilder::new();
        for (u, v) in corners {
            builder.push_uv(Vec2::new((u + 1.0) * 0.5, (v + 1.0) * 0.5));
        }

        let mut material = Material::new("checker");
        material.albedo = Some(Arc::new(Texture::checkerboard(
            64,
            64,
            16,
            Color::new(230, 230, 230),
            Color::new(200, 60, 40),
        )));
        let material = builder.add_material(material);
        builder.use_material(Some(material));

        for (normal, u_axis, v_axis) in faces {
            let n = builder.push_normal(normal);
            let first = builder.vertex_count();
            for (u, v) in corners {
                builder.push_vertex(normal * half + u_axis * (u * half) + v_axis * (v * half));
            }
            let polygon: Vec<Corner> = (0..4)
                .map(|k| Corner::new(first + k, Some(k), Some(n)))
                .collect();
            builder.add_polygon(&polygon);
        }

        // Indices are generated above and always in range
        builder.build().unwrap_or_default()
    }
}

/// Incremental mesh construction
#[derive(Debug, Default)]
pub struct MeshBuilder {
    vertices: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    corners: Vec<([Corner; 3], Option<usize>)>,
    materials: Vec<Material>,
    material: Option<usize>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_vertex(&mut self, v: Vec3) -> usize {
        self.vertices.push(v);
        self.vertices.len() - 1
    }

    pub fn push_normal(&mut self, n: Vec3) -> usize {
        self.normals.push(n);
        self.normals.len() - 1
    }

    pub fn push_uv(&mut self, uv: Vec2) -> usize {
        self.uvs.push(uv);
        self.uvs.len() - 1
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn normal_count(&self) -> usize {
        self.normals.len()
    }

    pub fn uv_count(&self) -> usize {
        self.uvs.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.corners.len()
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    /// Replace the material library
    pub fn set_materials(&mut self, materials: Vec<Material>) {
        self.materials = materials;
        self.material = None;
    }

    pub fn find_material(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name)
    }

    /// Material given to polygons added from now on
    pub fn use_material(&mut self, material: Option<usize>) {
        self.material = material;
    }

    /// Fan-triangulate a polygon around its first corner. Polygons with fewer
    /// than three corners add nothing; extra corners beyond
    /// [`MAX_POLYGON_POINTS`] are dropped.
    pub fn add_polygon(&mut self, corners: &[Corner]) {
        let corners = if corners.len() > MAX_POLYGON_POINTS {
            warn!(
                "polygon with {} points truncated to {}",
                corners.len(),
                MAX_POLYGON_POINTS
            );
            &corners[..MAX_POLYGON_POINTS]
        } else {
            corners
        };

        for i in 1..corners.len().saturating_sub(1) {
            self.corners.push(([corners[0], corners[i], corners[i + 1]], self.material));
        }
    }

    /// Resolve missing normals, validate indices and compute tangents
    pub fn build(self) -> Result<Mesh, MeshError> {
        let MeshBuilder { vertices, mut normals, uvs, corners, materials, .. } = self;

        for (t, (tri, _)) in corners.iter().enumerate() {
            for c in tri {
                if c.vertex >= vertices.len() {
                    return Err(MeshError::VertexIndex { triangle: t, index: c.vertex, count: vertices.len() });
                }
            }
        }

        let mut triangles = Vec::with_capacity(corners.len());
        let mut auto_normals = 0;
        for (tri, material) in &corners {
            let vertex_ids = tri.map(|c| c.vertex);

            // Corners without a normal share one face normal computed from the
            // first such corner: (v2 - v0) x (v1 - v0), walking from that corner
            let mut face_normal = None;
            let mut normal_ids = [0; 3];
            for (j, c) in tri.iter().enumerate() {
                normal_ids[j] = match c.normal {
                    Some(n) => n,
                    None => *face_normal.get_or_insert_with(|| {
                        let v0 = vertices[vertex_ids[j]];
                        let v1 = vertices[vertex_ids[(j + 1) % 3]];
                        let v2 = vertices[vertex_ids[(j + 2) % 3]];
                        normals.push((v2 - v0).cross(v1 - v0).normalize());
                        auto_normals += 1;
                        normals.len() - 1
                    }),
                };
            }

            triangles.push(Triangle {
                vertices: vertex_ids,
                normals: normal_ids,
                uvs: tri.map(|c| c.uv),
                material: *material,
            });
        }

        for (t, tri) in triangles.iter().enumerate() {
            for &index in &tri.normals {
                if index >= normals.len() {
                    return Err(MeshError::NormalIndex { triangle: t, index, count: normals.len() });
                }
            }
            for &index in tri.uvs.iter().flatten() {
                if index >= uvs.len() {
                    return Err(MeshError::UvIndex { triangle: t, index, count: uvs.len() });
                }
            }
        }

        if vertices.is_empty() {
            warn!("mesh has no vertex");
        }
        if normals.is_empty() {
            warn!("mesh has no normal");
        }
        if uvs.is_empty() {
            warn!("mesh has no texture coordinate");
        }
        if triangles.is_empty() {
            warn!("mesh has no triangle");
        }
        if auto_normals > 0 {
            debug!("computed {} missing normals", auto_normals);
        }

        let bounds = Aabb::from_points(&vertices).unwrap_or_default();
        let mut mesh = Mesh {
            vertices,
            normals,
            uvs,
            tangents: Vec::new(),
            triangles,
            materials,
            auto_normals,
            bounds,
        };
        mesh.compute_tangents();
        Ok(mesh)
    }
}
