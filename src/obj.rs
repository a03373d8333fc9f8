use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Interleaved vertex as uploaded to the GPU. The layout declared here is
/// the one the render pipelines describe; keep the two in sync.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Indexed triangle mesh ready for buffer upload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Failures the frame orchestrator aborts startup on.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("mesh file {path} could not be read: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("mesh file {path} is malformed: {reason}")]
    Malformed { path: String, reason: String },
}

/// Loads and parses one OBJ file from the assets directory.
pub fn load_mesh_file(assets_dir: &Path, file_name: &str) -> Result<Mesh, AssetError> {
    let path = assets_dir.join(file_name);
    let display = path.display().to_string();
    let contents = std::fs::read_to_string(&path).map_err(|source| AssetError::Io {
        path: display.clone(),
        source,
    })?;
    parse_obj(&contents).map_err(|err| AssetError::Malformed {
        path: display,
        reason: format!("{err:#}"),
    })
}

/// Parses OBJ text into an indexed mesh.
///
/// Supports `v`, `vn` and `f` records (texture coordinates in face
/// references are tolerated and ignored), triangulates polygons as a fan,
/// resolves negative indices, and generates area-weighted vertex normals
/// when the file supplies none.
pub fn parse_obj(data: &str) -> Result<Mesh> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    let mut corners: Vec<FaceRef> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let tag = fields.next().unwrap_or_default();
        let located = |err: anyhow::Error| err.context(format!("line {}", line_no + 1));
        match tag {
            "v" => positions.push(read_vec3(&mut fields).map_err(located)?),
            "vn" => normals.push(read_vec3(&mut fields).map_err(located)?),
            "f" => {
                let polygon: Vec<FaceRef> = fields
                    .map(FaceRef::parse)
                    .collect::<Result<_>>()
                    .map_err(located)?;
                if polygon.len() < 3 {
                    return Err(anyhow!("face on line {} has fewer than 3 vertices", line_no + 1));
                }
                // Fan triangulation around the first corner.
                for i in 1..polygon.len() - 1 {
                    corners.extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ data defines no vertices"));
    }

    let mut mesh = assemble(&positions, &normals, &corners)?;
    if mesh.vertices.iter().any(|v| v.normal == [0.0; 3]) {
        generate_normals(&mut mesh);
    }
    Ok(mesh)
}

fn read_vec3<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut next = || -> Result<f32> {
        fields
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()
            .context("bad float")
    };
    Ok(Vec3::new(next()?, next()?, next()?))
}

/// One corner of a face: a position index and an optional normal index,
/// both still in OBJ's one-based (possibly negative) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FaceRef {
    position: i32,
    normal: Option<i32>,
}

impl FaceRef {
    fn parse(field: &str) -> Result<Self> {
        let mut parts = field.split('/');
        let position = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("face corner {field:?} has no vertex index"))?
            .parse::<i32>()
            .with_context(|| format!("face corner {field:?}"))?;
        let _texcoord = parts.next();
        let normal = match parts.next() {
            Some("") | None => None,
            Some(raw) => Some(
                raw.parse::<i32>()
                    .with_context(|| format!("face corner {field:?}"))?,
            ),
        };
        Ok(Self { position, normal })
    }
}

fn resolve(index: i32, len: usize) -> Result<usize> {
    let resolved = if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let back = (-index) as usize;
        (back <= len).then(|| len - back)
    } else {
        None
    };
    resolved.ok_or_else(|| anyhow!("index {index} out of range for {len} entries"))
}

fn assemble(positions: &[Vec3], normals: &[Vec3], corners: &[FaceRef]) -> Result<Mesh> {
    let mut dedup: HashMap<FaceRef, u32> = HashMap::new();
    let mut mesh = Mesh::default();

    for corner in corners {
        if let Some(&index) = dedup.get(corner) {
            mesh.indices.push(index);
            continue;
        }
        let position = positions[resolve(corner.position, positions.len())?];
        let normal = match corner.normal {
            Some(n) => normals[resolve(n, normals.len())?],
            None => Vec3::ZERO,
        };
        let index = mesh.vertices.len() as u32;
        mesh.vertices.push(Vertex {
            position: position.to_array(),
            normal: normal.to_array(),
        });
        dedup.insert(*corner, index);
        mesh.indices.push(index);
    }
    Ok(mesh)
}

/// Area-weighted normal generation for meshes that ship without normals.
fn generate_normals(mesh: &mut Mesh) {
    let mut accumulated = vec![Vec3::ZERO; mesh.vertices.len()];
    for triangle in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];
        let pa = Vec3::from_array(mesh.vertices[a].position);
        let pb = Vec3::from_array(mesh.vertices[b].position);
        let pc = Vec3::from_array(mesh.vertices[c].position);
        // Cross-product magnitude carries the triangle area weighting.
        let face_normal = (pb - pa).cross(pc - pa);
        if face_normal.length_squared() > f32::EPSILON {
            accumulated[a] += face_normal;
            accumulated[b] += face_normal;
            accumulated[c] += face_normal;
        }
    }
    for (vertex, normal) in mesh.vertices.iter_mut().zip(accumulated) {
        vertex.normal = normal.normalize_or_zero().to_array();
    }
}

/// The built-in unit cube used for light markers and placeholders.
pub fn unit_cube() -> Mesh {
    let face_normals = [
        Vec3::Z,
        Vec3::NEG_Z,
        Vec3::X,
        Vec3::NEG_X,
        Vec3::Y,
        Vec3::NEG_Y,
    ];
    let mut mesh = Mesh::default();
    for normal in face_normals {
        // Any axis not parallel to the face normal works as the tangent seed.
        let seed = if normal.x.abs() > 0.5 { Vec3::Y } else { Vec3::X };
        let tangent = seed.cross(normal).normalize();
        let bitangent = normal.cross(tangent);
        let base = mesh.vertices.len() as u32;
        for (u, v) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let position = normal * 0.5 + tangent * u + bitangent * v;
            mesh.vertices.push(Vertex {
                position: position.to_array(),
                normal: normal.to_array(),
            });
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_triangle() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn generates_unit_normals_when_missing() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        for vertex in &mesh.vertices {
            let normal = Vec3::from_array(vertex.normal);
            assert!((normal.length() - 1.0).abs() < 1e-5);
            // The triangle lies in the XY plane.
            assert!((normal.z.abs() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn keeps_supplied_normals() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 1 0\nf 1//1 2//1 3//1\n";
        let mesh = parse_obj(obj).unwrap();
        for vertex in &mesh.vertices {
            assert_eq!(vertex.normal, [0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn triangulates_quads_as_a_fan() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn resolves_negative_indices_from_the_end() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn tolerates_texcoord_references() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1/9/1 2/9/1 3/9/1\n";
        assert!(parse_obj(obj).is_ok());
    }

    #[test]
    fn rejects_empty_and_degenerate_input() {
        assert!(parse_obj("").is_err());
        assert!(parse_obj("v 0 0 0\nf 1 1\n").is_err());
        assert!(parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n").is_err());
    }

    #[test]
    fn missing_file_surfaces_as_an_io_asset_error() {
        let err = load_mesh_file(Path::new("/nonexistent"), "nope.obj").unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }

    #[test]
    fn unit_cube_is_well_formed() {
        let cube = unit_cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        for vertex in &cube.vertices {
            assert!((Vec3::from_array(vertex.normal).length() - 1.0).abs() < 1e-6);
            // Normals point away from the cube center.
            let p = Vec3::from_array(vertex.position);
            assert!(p.dot(Vec3::from_array(vertex.normal)) > 0.0);
        }
    }
}
