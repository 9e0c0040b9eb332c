//! Normal recomputation for the primary normal overlay.

use crate::float_types::Real;
use crate::mesh::{DynamicMesh, ElementId, TriangleId};
use nalgebra::Vector3;

/// How normals are laid out in the overlay after recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalsMode {
    /// One shared element per vertex, area-weighted average of its faces
    #[default]
    PerVertex,
    /// One element per triangle, every corner gets the face normal
    Face,
    /// Keep the current overlay topology (seams and hard edges) and only
    /// recompute the value of each element from the triangles using it
    Split,
}

impl DynamicMesh {
    /// Recompute the primary normal overlay, enabling attributes if needed.
    pub fn recompute_normals(&mut self, mode: NormalsMode) {
        self.enable_attributes();
        let face_normals: Vec<(TriangleId, Vector3<Real>)> = self
            .triangle_ids()
            .filter_map(|t| self.triangle_cross(t).map(|n| (t, n)))
            .collect();

        match mode {
            NormalsMode::PerVertex => {
                let mut sums = vec![Vector3::zeros(); self.max_vertex_id()];
                for (tid, n) in &face_normals {
                    if let Some(tri) = self.triangle(*tid) {
                        tri.iter().for_each(|v| sums[v.0] += n);
                    }
                }
                let triangles: Vec<_> = face_normals
                    .iter()
                    .filter_map(|(t, _)| self.triangle(*t).map(|tri| (*t, tri)))
                    .collect();
                let Some(attributes) = self.attributes_mut() else {
                    return;
                };
                let overlay = attributes.normals_mut();
                overlay.clear();
                let mut element_of = vec![None; sums.len()];
                for (tid, tri) in triangles {
                    let elements = tri.map(|v| {
                        *element_of[v.0].get_or_insert_with(|| overlay.append_element(unit_or_z(sums[v.0])))
                    });
                    let set = overlay.set_triangle(tid, elements);
                    debug_assert!(set.is_ok(), "live triangle with fresh elements");
                }
            },
            NormalsMode::Face => {
                let Some(attributes) = self.attributes_mut() else {
                    return;
                };
                let overlay = attributes.normals_mut();
                overlay.clear();
                for (tid, n) in face_normals {
                    let e = overlay.append_element(unit_or_z(n));
                    let set = overlay.set_triangle(tid, [e, e, e]);
                    debug_assert!(set.is_ok(), "live triangle with a fresh element");
                }
            },
            NormalsMode::Split => {
                let unset: Vec<TriangleId> = {
                    let overlay = self.attributes().map(|a| a.normals());
                    face_normals
                        .iter()
                        .map(|(t, _)| *t)
                        .filter(|t| !overlay.is_some_and(|o| o.is_set_triangle(*t)))
                        .collect()
                };
                if !unset.is_empty() {
                    self.share_vertex_normal_elements(&unset);
                }

                let Some(attributes) = self.attributes_mut() else {
                    return;
                };
                let overlay = attributes.normals_mut();
                let mut sums = vec![Vector3::zeros(); overlay.element_count()];
                for (tid, n) in &face_normals {
                    if let Some(elements) = overlay.tri_elements(*tid) {
                        elements.iter().for_each(|e| sums[e.0] += n);
                    }
                }
                for (i, sum) in sums.into_iter().enumerate() {
                    let set = overlay.set_element(ElementId(i), unit_or_z(sum));
                    debug_assert!(set.is_ok(), "element index below element count");
                }
            },
        }
    }

    /// Give `triangles` per-vertex elements so a split recompute can fill them.
    fn share_vertex_normal_elements(&mut self, triangles: &[TriangleId]) {
        let tris: Vec<_> = triangles
            .iter()
            .filter_map(|t| self.triangle(*t).map(|tri| (*t, tri)))
            .collect();
        let slots = self.max_vertex_id();
        let Some(attributes) = self.attributes_mut() else {
            return;
        };
        let overlay = attributes.normals_mut();
        let mut element_of: Vec<Option<ElementId>> = vec![None; slots];
        for (tid, tri) in tris {
            let elements =
                tri.map(|v| *element_of[v.0].get_or_insert_with(|| overlay.append_element(Vector3::z())));
            let set = overlay.set_triangle(tid, elements);
            debug_assert!(set.is_ok(), "live triangle with fresh elements");
        }
    }
}

fn unit_or_z(n: Vector3<Real>) -> Vector3<Real> {
    n.try_normalize(Real::EPSILON).unwrap_or_else(Vector3::z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{BoxGenerator, MeshGenerator};

    #[test]
    fn modes_produce_expected_element_counts() {
        let mut mesh = BoxGenerator::new(Vector3::new(0.5, 0.5, 0.5)).generate().unwrap();

        mesh.recompute_normals(NormalsMode::Split);
        assert_eq!(mesh.attributes().unwrap().normals().element_count(), 6);

        mesh.recompute_normals(NormalsMode::PerVertex);
        assert_eq!(mesh.attributes().unwrap().normals().element_count(), mesh.vertex_count());
        let corner = mesh.attributes().unwrap().normals().element(ElementId(0)).unwrap();
        assert!((corner.norm() - 1.0).abs() < 1e-12);
        assert!(corner.x.abs() > 0.1 && corner.y.abs() > 0.1 && corner.z.abs() > 0.1);

        mesh.recompute_normals(NormalsMode::Face);
        assert_eq!(mesh.attributes().unwrap().normals().element_count(), mesh.triangle_count());
    }
}
