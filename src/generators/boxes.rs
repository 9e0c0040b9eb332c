//! Axis-aligned box with hard edges and a regular grid on every face.

use crate::errors::MeshResult;
use crate::float_types::Real;
use crate::generators::{MAX_TESSELLATION, MeshGenerator};
use crate::mesh::{DynamicMesh, VertexId};
use hashbrown::HashMap;
use nalgebra::{Point3, Vector2, Vector3};

/// `(normal axis, outward sign, u axis, v axis)` per face; `u × v` points
/// along the outward normal.
const FACES: [(usize, Real, usize, usize); 6] = [
    (0, 1.0, 1, 2),
    (0, -1.0, 2, 1),
    (1, 1.0, 2, 0),
    (1, -1.0, 0, 2),
    (2, 1.0, 0, 1),
    (2, -1.0, 1, 0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGenerator {
    center: Point3<Real>,
    half_extents: Vector3<Real>,
    /// Vertices along each edge of the box, per axis
    edge_vertices: [usize; 3],
}

impl BoxGenerator {
    pub fn new(half_extents: Vector3<Real>) -> Self {
        Self {
            center: Point3::origin(),
            half_extents: half_extents.abs(),
            edge_vertices: [2; 3],
        }
    }

    pub fn with_center(mut self, center: Point3<Real>) -> Self {
        self.center = center;
        self
    }

    /// Same count along every axis, clamped to `2..=50`.
    pub fn with_edge_vertices(self, count: usize) -> Self {
        self.with_edge_vertices_per_axis([count; 3])
    }

    pub fn with_edge_vertices_per_axis(mut self, counts: [usize; 3]) -> Self {
        self.edge_vertices = counts.map(|n| n.clamp(2, MAX_TESSELLATION));
        self
    }
}

impl MeshGenerator for BoxGenerator {
    /// Corner and edge vertices are shared between faces so the result is
    /// closed. Each face gets its own normal element and polygroup.
    fn generate(self) -> MeshResult<DynamicMesh> {
        let n = self.edge_vertices;
        let mins = self.center - self.half_extents;
        let size = self.half_extents * 2.0;

        let mut mesh = DynamicMesh::new();
        mesh.enable_triangle_groups();
        mesh.enable_attributes();

        let mut lattice: HashMap<[usize; 3], VertexId> = HashMap::new();
        let mut lattice_vertex = |mesh: &mut DynamicMesh, idx: [usize; 3]| {
            *lattice.entry(idx).or_insert_with(|| {
                let t = Vector3::from_fn(|i, _| idx[i] as Real / (n[i] - 1) as Real);
                mesh.append_vertex(mins + size.component_mul(&t))
            })
        };

        for (face, &(axis, sign, u, v)) in FACES.iter().enumerate() {
            let group = face as i32;
            let mut normal = Vector3::zeros();
            normal[axis] = sign;

            let Some(attributes) = mesh.attributes_mut() else {
                continue;
            };
            let normal_element = attributes.normals_mut().append_element(normal);
            let uvs = attributes.primary_uv_mut();
            let face_uvs: Vec<Vec<_>> = (0..n[v])
                .map(|b| {
                    (0..n[u])
                        .map(|a| {
                            uvs.append_element(Vector2::new(
                                a as Real / (n[u] - 1) as Real,
                                b as Real / (n[v] - 1) as Real,
                            ))
                        })
                        .collect()
                })
                .collect();

            let mut grid = vec![vec![VertexId(0); n[u]]; n[v]];
            for (b, row) in grid.iter_mut().enumerate() {
                for (a, slot) in row.iter_mut().enumerate() {
                    let mut idx = [0; 3];
                    idx[axis] = if sign > 0.0 { n[axis] - 1 } else { 0 };
                    idx[u] = a;
                    idx[v] = b;
                    *slot = lattice_vertex(&mut mesh, idx);
                }
            }

            for b in 0..n[v] - 1 {
                for a in 0..n[u] - 1 {
                    let p00 = (grid[b][a], face_uvs[b][a]);
                    let p10 = (grid[b][a + 1], face_uvs[b][a + 1]);
                    let p11 = (grid[b + 1][a + 1], face_uvs[b + 1][a + 1]);
                    let p01 = (grid[b + 1][a], face_uvs[b + 1][a]);
                    for corners in [[p00, p10, p11], [p00, p11, p01]] {
                        let tid = mesh.append_triangle(corners.map(|(vid, _)| vid), group)?;
                        if let Some(attributes) = mesh.attributes_mut() {
                            attributes.normals_mut().set_triangle(tid, [normal_element; 3])?;
                            attributes
                                .primary_uv_mut()
                                .set_triangle(tid, corners.map(|(_, e)| e))?;
                        }
                    }
                }
            }
        }
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_box_counts_and_volume() {
        let mesh = BoxGenerator::new(Vector3::new(0.5, 0.5, 0.5)).generate().unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.is_closed());
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-12);
        assert_eq!(mesh.attributes().unwrap().normals().element_count(), 6);
    }

    #[test]
    fn subdivided_box_shares_edge_vertices() {
        let mesh = BoxGenerator::new(Vector3::new(1.0, 2.0, 3.0))
            .with_center(Point3::new(1.0, 0.0, 0.0))
            .with_edge_vertices(3)
            .generate()
            .unwrap();
        // 3x3x3 lattice minus the single interior point
        assert_eq!(mesh.vertex_count(), 26);
        assert_eq!(mesh.triangle_count(), 6 * 8);
        assert!(mesh.is_closed());
        assert!((mesh.volume() - 48.0).abs() < 1e-9);

        let bounds = mesh.bounds();
        assert!((bounds.mins - Point3::new(0.0, -2.0, -3.0)).norm() < 1e-12);
    }

    #[test]
    fn faces_have_outward_normals_and_groups() {
        let mesh = BoxGenerator::new(Vector3::new(0.5, 0.5, 0.5)).generate().unwrap();
        let attributes = mesh.attributes().unwrap();
        for tid in mesh.triangle_ids() {
            let geometric = mesh.triangle_normal(tid).unwrap();
            let [n0, ..] = attributes.normals().tri_values(tid).unwrap();
            assert!((geometric - n0).norm() < 1e-12);
            let group = mesh.triangle_group(tid).unwrap();
            assert!((0..6).contains(&group));
        }
    }

    #[test]
    fn edge_vertices_are_clamped() {
        let mesh = BoxGenerator::new(Vector3::new(0.5, 0.5, 0.5))
            .with_edge_vertices(0)
            .generate()
            .unwrap();
        assert_eq!(mesh.triangle_count(), 12);
    }
}
