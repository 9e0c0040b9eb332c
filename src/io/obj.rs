//! Wavefront `.obj` reading and writing.
//!
//! Vertices are written in ID order of a compacted copy and faces keep their
//! corner order, so a compact mesh survives a write/read round trip with the
//! same vertex order and winding.

use crate::float_types::Real;
use crate::io::{ImportOptions, IoError, MeshImporter};
use crate::mesh::{CompactOptions, DynamicMesh, ElementId, NormalsMode, TriangleId, VertexId};
use nalgebra::{Point3, Vector2, Vector3, Vector4};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Export to `.obj` text.
///
/// Positions, then `vt` and `vn` lines when the mesh carries a fully set
/// primary UV or normal overlay, then faces with 1-based indices.
pub fn to_obj(mesh: &DynamicMesh) -> String {
    let (mesh, _) = DynamicMesh::compact_copy(mesh, CompactOptions::default());
    let mut out = String::new();

    for vid in mesh.vertex_ids() {
        if let Some(p) = mesh.vertex(vid) {
            let _ = writeln!(out, "v {} {} {}", p.x, p.y, p.z);
        }
    }

    let attributes = mesh.attributes();
    let fully_set = |set: &dyn Fn(TriangleId) -> bool| mesh.triangle_ids().all(set);
    let uvs = attributes
        .map(|a| a.primary_uv())
        .filter(|o| o.element_count() > 0 && fully_set(&|t| o.is_set_triangle(t)));
    let normals = attributes
        .map(|a| a.normals())
        .filter(|o| o.element_count() > 0 && fully_set(&|t| o.is_set_triangle(t)));

    if let Some(uvs) = uvs {
        for (_, uv) in uvs.elements() {
            let _ = writeln!(out, "vt {} {}", uv.x, uv.y);
        }
    }
    if let Some(normals) = normals {
        for (_, n) in normals.elements() {
            let _ = writeln!(out, "vn {} {} {}", n.x, n.y, n.z);
        }
    }

    // element IDs can have holes, so map them to their 1-based line index
    let line_of = |ids: Vec<ElementId>| {
        let mut map = vec![0usize; ids.iter().map(|e| e.0 + 1).max().unwrap_or(0)];
        ids.iter().enumerate().for_each(|(line, e)| map[e.0] = line + 1);
        map
    };
    let uv_lines = uvs.map(|o| line_of(o.elements().map(|(e, _)| e).collect()));
    let normal_lines = normals.map(|o| line_of(o.elements().map(|(e, _)| e).collect()));

    for tid in mesh.triangle_ids() {
        let Some(tri) = mesh.triangle(tid) else { continue };
        let uv = uvs.zip(uv_lines.as_ref()).and_then(|(o, l)| o.tri_elements(tid).map(|e| e.map(|e| l[e.0])));
        let nm = normals
            .zip(normal_lines.as_ref())
            .and_then(|(o, l)| o.tri_elements(tid).map(|e| e.map(|e| l[e.0])));
        out.push('f');
        for k in 0..3 {
            let v = tri[k].0 + 1;
            let _ = match (uv, nm) {
                (Some(uv), Some(nm)) => write!(out, " {v}/{}/{}", uv[k], nm[k]),
                (Some(uv), None) => write!(out, " {v}/{}", uv[k]),
                (None, Some(nm)) => write!(out, " {v}//{}", nm[k]),
                (None, None) => write!(out, " {v}"),
            };
        }
        out.push('\n');
    }
    out
}

/// Write `.obj` text for `mesh` to `writer`.
pub fn write_obj<W: Write>(mesh: &DynamicMesh, writer: &mut W) -> std::io::Result<()> {
    writer.write_all(to_obj(mesh).as_bytes())
}

#[derive(Debug, Clone, Copy)]
struct Corner {
    vertex: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

/// Resolve a 1-based, possibly negative (relative) `.obj` index.
fn resolve_index(token: &str, count: usize, line: usize) -> Result<usize, IoError> {
    let index: i64 = token.parse()?;
    let resolved = match index {
        0 => None,
        i if i > 0 => Some(i as usize - 1),
        i => count.checked_sub(i.unsigned_abs() as usize),
    };
    resolved
        .filter(|&i| i < count)
        .ok_or_else(|| IoError::MalformedInput(format!("line {line}: index {index} out of range")))
}

fn parse_floats<const N: usize>(parts: &[&str], line: usize) -> Result<[Real; N], IoError> {
    if parts.len() < N {
        return Err(IoError::MalformedInput(format!("line {line}: expected {N} numbers")));
    }
    let mut out = [0.0; N];
    for (slot, token) in out.iter_mut().zip(parts) {
        *slot = token.parse()?;
    }
    Ok(out)
}

/// Read `.obj` text. Polygons are fanned into triangles; triangles the mesh
/// store rejects (degenerate, duplicate or non-manifold) are skipped with a
/// warning.
pub fn read_obj<R: BufRead>(reader: R, options: ImportOptions) -> Result<DynamicMesh, IoError> {
    let mut positions: Vec<Point3<Real>> = Vec::new();
    let mut colors: Vec<Option<Vector4<Real>>> = Vec::new();
    let mut uvs: Vec<Vector2<Real>> = Vec::new();
    let mut normals: Vec<Vector3<Real>> = Vec::new();
    let mut faces: Vec<[Corner; 3]> = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let number = number + 1;
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&keyword, rest)) = parts.split_first() else { continue };
        match keyword {
            "v" => {
                let [x, y, z] = parse_floats::<3>(rest, number)?;
                positions.push(Point3::new(x, y, z));
                let color = if rest.len() >= 6 {
                    let [r, g, b] = parse_floats::<3>(&rest[3..], number)?;
                    Some(Vector4::new(r, g, b, 1.0))
                } else {
                    None
                };
                colors.push(color);
            },
            "vt" => {
                let [u, v] = parse_floats::<2>(rest, number)?;
                uvs.push(Vector2::new(u, v));
            },
            "vn" => {
                let [x, y, z] = parse_floats::<3>(rest, number)?;
                normals.push(Vector3::new(x, y, z));
            },
            "f" => {
                if rest.len() < 3 {
                    return Err(IoError::MalformedInput(format!("line {number}: face needs three corners")));
                }
                let corners = rest
                    .iter()
                    .map(|token| {
                        let mut fields = token.split('/');
                        let vertex = resolve_index(fields.next().unwrap_or(""), positions.len(), number)?;
                        let uv = match fields.next() {
                            Some(t) if !t.is_empty() => Some(resolve_index(t, uvs.len(), number)?),
                            _ => None,
                        };
                        let normal = match fields.next() {
                            Some(t) if !t.is_empty() => Some(resolve_index(t, normals.len(), number)?),
                            _ => None,
                        };
                        Ok(Corner { vertex, uv, normal })
                    })
                    .collect::<Result<Vec<_>, IoError>>()?;
                faces.extend((1..corners.len() - 1).map(|i| [corners[0], corners[i], corners[i + 1]]));
            },
            _ => debug!(keyword, line = number, "ignoring obj statement"),
        }
    }

    let mut mesh = DynamicMesh::new();
    mesh.enable_attributes();
    let vertices: Vec<VertexId> = positions.iter().map(|p| mesh.append_vertex(*p)).collect();

    let file_normals = options.want_normals && !normals.is_empty() && faces.iter().flatten().all(|c| c.normal.is_some());
    let file_uvs = options.want_uvs && !uvs.is_empty() && faces.iter().flatten().all(|c| c.uv.is_some());
    let file_colors = options.want_colors && !colors.is_empty() && colors.iter().all(Option::is_some);

    let mut rejected = 0usize;
    let mut kept: Vec<(TriangleId, [Corner; 3])> = Vec::with_capacity(faces.len());
    for face in faces {
        match mesh.append_triangle(face.map(|c| vertices[c.vertex]), 0) {
            Ok(tid) => kept.push((tid, face)),
            Err(err) => {
                debug!(%err, "skipping obj face");
                rejected += 1;
            },
        }
    }
    if rejected > 0 {
        warn!(rejected, "obj import skipped faces the mesh store rejected");
    }

    if let Some(attributes) = mesh.attributes_mut() {
        if file_uvs {
            let overlay = attributes.primary_uv_mut();
            let elements: Vec<ElementId> = uvs.iter().map(|uv| overlay.append_element(*uv)).collect();
            for (tid, face) in &kept {
                overlay.set_triangle(*tid, face.map(|c| elements[c.uv.unwrap_or(0)]))?;
            }
        }
        if file_normals {
            let overlay = attributes.normals_mut();
            let elements: Vec<ElementId> = normals.iter().map(|n| overlay.append_element(*n)).collect();
            for (tid, face) in &kept {
                overlay.set_triangle(*tid, face.map(|c| elements[c.normal.unwrap_or(0)]))?;
            }
        }
        if file_colors {
            attributes.enable_colors();
            if let Some(overlay) = attributes.colors_mut() {
                let elements: Vec<ElementId> = colors
                    .iter()
                    .map(|c| overlay.append_element(c.unwrap_or_else(|| Vector4::new(1.0, 1.0, 1.0, 1.0))))
                    .collect();
                for (tid, face) in &kept {
                    overlay.set_triangle(*tid, face.map(|c| elements[c.vertex]))?;
                }
            }
        }
    }

    if options.want_normals && !file_normals {
        mesh.recompute_normals(NormalsMode::PerVertex);
    }
    if options.reverse_orientation {
        mesh.reverse_orientation();
    }
    debug!(
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "read obj"
    );
    Ok(mesh)
}

/// File-backed importer for `.obj`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjImporter;

impl MeshImporter for ObjImporter {
    fn read_mesh(&self, path: &Path, options: ImportOptions) -> Result<DynamicMesh, IoError> {
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        if extension.as_deref() != Some("obj") {
            return Err(IoError::Unsupported(path.display().to_string()));
        }
        let file = File::open(path)?;
        read_obj(BufReader::new(file), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{BoxGenerator, MeshGenerator};

    const SQUARE: &str = "\
# unit square
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

    #[test]
    fn quad_is_fanned_with_uvs() {
        let mesh = read_obj(SQUARE.as_bytes(), ImportOptions::default()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.triangle(TriangleId(1)), Some([VertexId(0), VertexId(2), VertexId(3)]));
        let uv = mesh.attributes().unwrap().primary_uv().tri_values(TriangleId(0)).unwrap();
        assert_eq!(uv[1], Vector2::new(1.0, 0.0));
        // no vn lines, so normals were computed
        let n = mesh.attributes().unwrap().normals().tri_values(TriangleId(0)).unwrap();
        assert!((n[0] - Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn negative_indices_are_relative() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = read_obj(text.as_bytes(), ImportOptions::default()).unwrap();
        assert_eq!(mesh.triangle(TriangleId(0)), Some([VertexId(0), VertexId(1), VertexId(2)]));
    }

    #[test]
    fn out_of_range_index_is_malformed() {
        let text = "v 0 0 0\nv 1 0 0\nf 1 2 3\n";
        assert!(matches!(
            read_obj(text.as_bytes(), ImportOptions::default()),
            Err(IoError::MalformedInput(_))
        ));
    }

    #[test]
    fn reverse_orientation_flips_winding() {
        let options = ImportOptions {
            reverse_orientation: true,
            ..Default::default()
        };
        let mesh = read_obj(SQUARE.as_bytes(), options).unwrap();
        assert!(mesh.triangle_normal(TriangleId(0)).unwrap().z < 0.0);
    }

    #[test]
    fn box_round_trip_keeps_order_and_winding() {
        let original = BoxGenerator::new(Vector3::new(1.0, 2.0, 3.0)).generate().unwrap();
        let text = to_obj(&original);
        let read = read_obj(text.as_bytes(), ImportOptions::default()).unwrap();
        assert_eq!(read.vertex_count(), original.vertex_count());
        assert_eq!(read.triangle_count(), original.triangle_count());
        for (a, b) in original.triangle_ids().zip(read.triangle_ids()) {
            assert_eq!(original.triangle(a), read.triangle(b));
        }
        for v in original.vertex_ids() {
            assert_eq!(original.vertex(v), read.vertex(v));
        }
        assert!((read.volume() - original.volume()).abs() < 1e-12);
    }

    #[test]
    fn importer_rejects_unknown_extension() {
        let result = ObjImporter.read_mesh(Path::new("mesh.fbx"), ImportOptions::default());
        assert!(matches!(result, Err(IoError::Unsupported(_))));
    }
}
