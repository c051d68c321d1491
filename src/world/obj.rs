//! Wavefront OBJ / MTL loading
//!
//! Supports the subset needed for textured meshes: `v`, `vn`, `vt`, `f`
//! (`v`, `v/t`, `v/t/n`, `v//n` corners, 1-based or negative relative
//! indices), `mtllib`, `usemtl`; and in material libraries `newmtl`,
//! `map_Ka`/`map_Kd` (albedo) and `map_Nrm` (normal map). Other statements
//! are ignored.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

use crate::rasterizer::{Material, Texture, Vec2, Vec3};
use super::mesh::{Corner, Mesh, MeshBuilder, MeshError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

fn parse_error(line: usize, message: impl Into<String>) -> LoadError {
    LoadError::Parse { line, message: message.into() }
}

fn read_text(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })
}

fn folder_of(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Load an OBJ file. Material libraries and their textures are resolved
/// relative to the OBJ's folder.
pub fn load_obj(path: &Path) -> Result<Mesh, LoadError> {
    let text = read_text(path)?;
    let folder = folder_of(path);
    let mesh = parse_obj(&text, |name| load_mtl(&folder.join(name)))?;
    info!(
        "{}: {} vertices, {} normals ({} computed), {} uvs, {} triangles, {} materials",
        path.display(),
        mesh.vertices.len(),
        mesh.normals.len(),
        mesh.auto_normals,
        mesh.uvs.len(),
        mesh.triangles.len(),
        mesh.materials.len()
    );
    Ok(mesh)
}

/// Load an MTL file, decoding its textures relative to its folder
pub fn load_mtl(path: &Path) -> Result<Vec<Material>, LoadError> {
    let text = read_text(path)?;
    let folder = folder_of(path);
    parse_mtl(&text, |name| {
        let texture_path = folder.join(name);
        Texture::from_file(&texture_path)
            .map(Arc::new)
            .map_err(|source| LoadError::Image { path: texture_path, source })
    })
}

/// Parse OBJ text. `load_library` is called with the argument of every
/// `mtllib` statement and returns the materials it defines.
pub fn parse_obj<F>(text: &str, mut load_library: F) -> Result<Mesh, LoadError>
where
    F: FnMut(&str) -> Result<Vec<Material>, LoadError>,
{
    let mut builder = MeshBuilder::new();
    let mut corners = Vec::with_capacity(8);

    for (number, line) in text.lines().enumerate() {
        let line_no = number + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else { continue };

        match keyword {
            "v" => {
                let v = parse_floats::<3>(words, line_no)?;
                builder.push_vertex(Vec3::new(v[0], v[1], v[2]));
            }
            "vn" => {
                let n = parse_floats::<3>(words, line_no)?;
                builder.push_normal(Vec3::new(n[0], n[1], n[2]));
            }
            "vt" => {
                let t = parse_floats::<2>(words, line_no)?;
                builder.push_uv(Vec2::new(t[0], t[1]));
            }
            "f" => {
                corners.clear();
                for word in words {
                    corners.push(parse_corner(word, &builder, line_no)?);
                }
                if corners.len() < 3 {
                    warn!("line {}: face with {} points ignored", line_no, corners.len());
                    continue;
                }
                builder.add_polygon(&corners);
            }
            "mtllib" => {
                let Some(name) = rest_of_line(line, keyword) else { continue };
                builder.set_materials(load_library(name)?);
            }
            "usemtl" => {
                let Some(name) = rest_of_line(line, keyword) else { continue };
                let material = builder.find_material(name);
                if material.is_none() {
                    warn!("line {}: unknown material '{}'", line_no, name);
                }
                builder.use_material(material);
            }
            _ => {}
        }
    }

    Ok(builder.build()?)
}

/// Parse MTL text. `load_texture` is called with each texture path as written
/// in the file.
pub fn parse_mtl<F>(text: &str, mut load_texture: F) -> Result<Vec<Material>, LoadError>
where
    F: FnMut(&str) -> Result<Arc<Texture>, LoadError>,
{
    let mut materials: Vec<Material> = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let line_no = number + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(keyword) = line.split_whitespace().next() else { continue };
        let Some(argument) = rest_of_line(line, keyword) else { continue };

        match keyword {
            "newmtl" => {
                info!("new material {}", argument);
                materials.push(Material::new(argument));
            }
            "map_Ka" | "map_Kd" | "map_Nrm" => {
                let Some(material) = materials.last_mut() else {
                    warn!("line {}: {} before any newmtl", line_no, keyword);
                    continue;
                };
                let slot = if keyword == "map_Nrm" {
                    &mut material.normal_map
                } else {
                    &mut material.albedo
                };
                // First map statement wins
                if slot.is_some() {
                    debug!("line {}: {} ignored for {}", line_no, keyword, material.name);
                    continue;
                }
                *slot = Some(load_texture(argument)?);
            }
            _ => {}
        }
    }

    Ok(materials)
}

fn rest_of_line<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line[keyword.len()..].trim();
    (!rest.is_empty()).then_some(rest)
}

/// Up to N floats; missing components are 0, extra ones are ignored
fn parse_floats<const N: usize>(words: SplitWhitespace<'_>, line: usize) -> Result<[f32; N], LoadError> {
    let mut values = [0.0; N];
    for (value, word) in values.iter_mut().zip(words) {
        *value = word
            .parse()
            .map_err(|_| parse_error(line, format!("invalid number '{}'", word)))?;
    }
    Ok(values)
}

fn parse_corner(word: &str, builder: &MeshBuilder, line: usize) -> Result<Corner, LoadError> {
    let mut parts = word.split('/');
    let vertex = match parts.next() {
        Some(v) if !v.is_empty() => resolve_index(v, builder.vertex_count(), line)?,
        _ => return Err(parse_error(line, format!("missing vertex index in '{}'", word))),
    };
    let uv = match parts.next() {
        Some(t) if !t.is_empty() => Some(resolve_index(t, builder.uv_count(), line)?),
        _ => None,
    };
    let normal = match parts.next() {
        Some(n) if !n.is_empty() => Some(resolve_index(n, builder.normal_count(), line)?),
        _ => None,
    };
    Ok(Corner::new(vertex, uv, normal))
}

/// 1-based index, or negative index relative to the `count` elements read so far
fn resolve_index(word: &str, count: usize, line: usize) -> Result<usize, LoadError> {
    let index: i64 = word
        .parse()
        .map_err(|_| parse_error(line, format!("invalid index '{}'", word)))?;
    if index > 0 {
        return Ok((index - 1) as usize);
    }
    if index < 0 {
        let resolved = count as i64 + index;
        if resolved >= 0 {
            return Ok(resolved as usize);
        }
    }
    Err(parse_error(line, format!("index {} out of range", index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::Color;

    fn no_library(name: &str) -> Result<Vec<Material>, LoadError> {
        panic!("unexpected mtllib {}", name)
    }

    fn solid(name: &str) -> Result<Arc<Texture>, LoadError> {
        let mut texture = Texture::new(1, 1, Color::WHITE);
        texture.name = name.to_string();
        Ok(Arc::new(texture))
    }

    #[test]
    fn test_single_triangle_gets_one_normal() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj(text, no_library).expect("valid obj");

        assert_eq!(mesh.triangles.len(), 1);
        assert_eq!(mesh.normals.len(), 1);
        assert!((mesh.normals[0].len() - 1.0).abs() < 1e-6);
        assert_eq!(mesh.triangles[0].normals, [0, 0, 0]);
        assert_eq!(mesh.triangles[0].uvs, [None; 3]);
        assert_eq!(mesh.triangles[0].material, None);
        assert_eq!(mesh.auto_normals, 1);
    }

    #[test]
    fn test_corner_forms() {
        let text = "\
# comment
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
f 1//1 3//1 4//1
f 1/1 3/3 4/2
";
        let mesh = parse_obj(text, no_library).expect("valid obj");
        assert_eq!(mesh.triangles.len(), 3);

        assert_eq!(mesh.triangles[0].vertices, [0, 1, 2]);
        assert_eq!(mesh.triangles[0].uvs, [Some(0), Some(1), Some(2)]);
        assert_eq!(mesh.triangles[0].normals, [0, 0, 0]);

        assert_eq!(mesh.triangles[1].vertices, [0, 2, 3]);
        assert_eq!(mesh.triangles[1].uvs, [None; 3]);
        assert_eq!(mesh.triangles[1].normals, [0, 0, 0]);

        assert_eq!(mesh.triangles[2].uvs, [Some(0), Some(2), Some(1)]);
        // Third triangle had no normals, so one was appended
        assert_eq!(mesh.normals.len(), 2);
        assert_eq!(mesh.triangles[2].normals, [1, 1, 1]);
    }

    #[test]
    fn test_negative_indices() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\nv 5 5 5\nf -4 -3 -1\n";
        let mesh = parse_obj(text, no_library).expect("valid obj");
        assert_eq!(mesh.triangles[0].vertices, [0, 1, 2]);
        assert_eq!(mesh.triangles[1].vertices, [0, 1, 3]);
    }

    #[test]
    fn test_missing_components_default_to_zero() {
        let text = "v 1 2\nv 3\nv 0 0 0 1\nvt 0.5\nf 1/1 2/1 3/1\n";
        let mesh = parse_obj(text, no_library).expect("valid obj");
        assert_eq!(mesh.vertices[0], Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(mesh.vertices[1], Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(mesh.vertices[2], Vec3::ZERO);
        assert_eq!(mesh.uvs[0], Vec2::new(0.5, 0.0));
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_obj("v 0 0 0\nv 1 x 0\n", no_library).expect_err("bad number");
        assert!(matches!(err, LoadError::Parse { line: 2, .. }));

        let err = parse_obj("v 0 0 0\nf 1 2 -5\n", no_library).expect_err("bad relative index");
        assert!(matches!(err, LoadError::Parse { line: 2, .. }));

        let err = parse_obj("v 0 0 0\nf 0 1 1\n", no_library).expect_err("zero index");
        assert!(matches!(err, LoadError::Parse { line: 2, .. }));

        let err = parse_obj("v 0 0 0\nv 1 0 0\nf 1 2 7\n", no_library).expect_err("out of range");
        assert!(matches!(err, LoadError::Mesh(MeshError::VertexIndex { index: 6, .. })));
    }

    #[test]
    fn test_short_faces_are_ignored() {
        let text = "v 0 0 0\nv 1 0 0\nf 1 2\n";
        let mesh = parse_obj(text, no_library).expect("valid obj");
        assert!(mesh.triangles.is_empty());
    }

    #[test]
    fn test_polygon_is_fanned_and_truncated() {
        let mut text = String::new();
        for i in 0..40 {
            let a = i as f32 * 0.15;
            text.push_str(&format!("v {} {} 0\n", a.cos(), a.sin()));
        }
        text.push('f');
        for i in 1..=40 {
            text.push_str(&format!(" {}", i));
        }
        text.push('\n');

        let mesh = parse_obj(&text, no_library).expect("valid obj");
        assert_eq!(mesh.triangles.len(), 30);
        assert_eq!(mesh.triangles[29].vertices, [0, 30, 31]);
    }

    #[test]
    fn test_materials() {
        let mtl = "\
newmtl wood
map_Kd wood.png
map_Ka other.png
newmtl stone
map_Nrm stone_n.png
map_Ka stone.png
";
        let mut requested = Vec::new();
        let materials = parse_mtl(mtl, |name| {
            requested.push(name.to_string());
            solid(name)
        })
        .expect("valid mtl");

        // Second albedo map of "wood" is never loaded
        assert_eq!(requested, ["wood.png", "stone_n.png", "stone.png"]);
        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].name, "wood");
        assert_eq!(materials[0].albedo.as_ref().map(|t| t.name.as_str()), Some("wood.png"));
        assert!(materials[0].normal_map.is_none());
        assert_eq!(materials[1].normal_map.as_ref().map(|t| t.name.as_str()), Some("stone_n.png"));
        assert_eq!(materials[1].albedo.as_ref().map(|t| t.name.as_str()), Some("stone.png"));
    }

    #[test]
    fn test_map_before_newmtl_is_skipped() {
        let materials = parse_mtl("map_Kd lost.png\nnewmtl a\n", solid).expect("valid mtl");
        assert_eq!(materials.len(), 1);
        assert!(materials[0].albedo.is_none());
    }

    #[test]
    fn test_usemtl_selects_material() {
        let text = "\
mtllib scene.mtl
v 0 0 0
v 1 0 0
v 0 1 0
usemtl stone
f 1 2 3
usemtl missing
f 1 2 3
usemtl wood
f 1 2 3
";
        let mesh = parse_obj(text, |name| {
            assert_eq!(name, "scene.mtl");
            Ok(vec![Material::new("wood"), Material::new("stone")])
        })
        .expect("valid obj");

        let materials: Vec<_> = mesh.triangles.iter().map(|t| t.material).collect();
        assert_eq!(materials, [Some(1), None, Some(0)]);
        assert_eq!(mesh.materials.len(), 2);
    }

    #[test]
    fn test_library_errors_propagate() {
        let err = parse_obj("mtllib gone.mtl\n", |_| {
            Err(LoadError::Io {
                path: PathBuf::from("gone.mtl"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            })
        })
        .expect_err("missing library");
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_obj(Path::new("does/not/exist.obj")).expect_err("missing file");
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
