//! UV sphere with a texture seam.

use crate::errors::MeshResult;
use crate::float_types::{PI, Real, TAU};
use crate::generators::{MAX_TESSELLATION, MeshGenerator};
use crate::mesh::{DynamicMesh, ElementId, VertexId};
use nalgebra::{Point3, Vector2};

/// Smallest number of latitude or longitude divisions for a sphere.
pub const MIN_SPHERE_TESSELLATION: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereGenerator {
    radius: Real,
    num_phi: usize,
    num_theta: usize,
}

impl SphereGenerator {
    pub fn new(radius: Real) -> Self {
        Self {
            radius: radius.abs(),
            num_phi: 16,
            num_theta: 16,
        }
    }

    /// Latitude (`num_phi`) and longitude (`num_theta`) divisions, each
    /// clamped to `3..=50`.
    pub fn with_tessellation(mut self, num_phi: usize, num_theta: usize) -> Self {
        self.num_phi = num_phi.clamp(MIN_SPHERE_TESSELLATION, MAX_TESSELLATION);
        self.num_theta = num_theta.clamp(MIN_SPHERE_TESSELLATION, MAX_TESSELLATION);
        self
    }

    pub fn with_uniform_tessellation(self, level: usize) -> Self {
        self.with_tessellation(level, level)
    }

    pub fn tessellation(&self) -> (usize, usize) {
        (self.num_phi, self.num_theta)
    }
}

impl MeshGenerator for SphereGenerator {
    /// Poles on ±Z. Every vertex has its own normal element; UV elements are
    /// duplicated along the `u = 0 / u = 1` seam and at each pole segment.
    fn generate(self) -> MeshResult<DynamicMesh> {
        let (num_phi, num_theta, r) = (self.num_phi, self.num_theta, self.radius);
        let mut mesh = DynamicMesh::new();
        mesh.enable_attributes();

        let north = mesh.append_vertex(Point3::new(0.0, 0.0, r));
        let mut rings: Vec<Vec<VertexId>> = Vec::with_capacity(num_phi - 1);
        for i in 1..num_phi {
            let phi = PI * i as Real / num_phi as Real;
            let ring = (0..num_theta)
                .map(|j| {
                    let theta = TAU * j as Real / num_theta as Real;
                    mesh.append_vertex(Point3::new(
                        r * phi.sin() * theta.cos(),
                        r * phi.sin() * theta.sin(),
                        r * phi.cos(),
                    ))
                })
                .collect();
            rings.push(ring);
        }
        let south = mesh.append_vertex(Point3::new(0.0, 0.0, -r));

        let positions: Vec<_> = mesh.vertex_ids().filter_map(|v| mesh.vertex(v)).collect();
        let Some(attributes) = mesh.attributes_mut() else {
            return Ok(mesh);
        };
        let normal_of: Vec<ElementId> = positions
            .iter()
            .map(|p| {
                let n = p.coords.try_normalize(Real::EPSILON).unwrap_or_else(nalgebra::Vector3::z);
                attributes.normals_mut().append_element(n)
            })
            .collect();

        let uvs = attributes.primary_uv_mut();
        let ring_uvs: Vec<Vec<ElementId>> = (1..num_phi)
            .map(|i| {
                (0..=num_theta)
                    .map(|j| uvs.append_element(Vector2::new(j as Real / num_theta as Real, i as Real / num_phi as Real)))
                    .collect()
            })
            .collect();
        let pole_uv = |uvs: &mut crate::mesh::overlay::UvOverlay, j: usize, v: Real| {
            uvs.append_element(Vector2::new((j as Real + 0.5) / num_theta as Real, v))
        };

        // (vertex, uv) corners, appended below
        let mut triangles: Vec<[(VertexId, ElementId); 3]> = Vec::new();
        for j in 0..num_theta {
            let next = (j + 1) % num_theta;
            let top = pole_uv(uvs, j, 0.0);
            triangles.push([
                (north, top),
                (rings[0][j], ring_uvs[0][j]),
                (rings[0][next], ring_uvs[0][j + 1]),
            ]);
        }
        for i in 0..rings.len() - 1 {
            for j in 0..num_theta {
                let next = (j + 1) % num_theta;
                let a = (rings[i][j], ring_uvs[i][j]);
                let b = (rings[i][next], ring_uvs[i][j + 1]);
                let c = (rings[i + 1][j], ring_uvs[i + 1][j]);
                let d = (rings[i + 1][next], ring_uvs[i + 1][j + 1]);
                triangles.push([a, c, d]);
                triangles.push([a, d, b]);
            }
        }
        let last = rings.len() - 1;
        for j in 0..num_theta {
            let next = (j + 1) % num_theta;
            let bottom = pole_uv(uvs, j, 1.0);
            triangles.push([
                (south, bottom),
                (rings[last][next], ring_uvs[last][j + 1]),
                (rings[last][j], ring_uvs[last][j]),
            ]);
        }

        for corners in triangles {
            let tid = mesh.append_triangle(corners.map(|(v, _)| v), 0)?;
            if let Some(attributes) = mesh.attributes_mut() {
                attributes
                    .normals_mut()
                    .set_triangle(tid, corners.map(|(v, _)| normal_of[v.0]))?;
                attributes
                    .primary_uv_mut()
                    .set_triangle(tid, corners.map(|(_, e)| e))?;
            }
        }
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_is_closed_and_outward() {
        let mesh = SphereGenerator::new(2.0).with_tessellation(8, 10).generate().unwrap();
        assert_eq!(mesh.vertex_count(), 2 + 7 * 10);
        assert_eq!(mesh.triangle_count(), 2 * 10 + 2 * 10 * 6);
        assert!(mesh.is_closed());
        assert!(mesh.signed_volume() > 0.0);

        let exact = 4.0 / 3.0 * PI * 8.0;
        assert!(mesh.volume() < exact && mesh.volume() > 0.8 * exact);
    }

    #[test]
    fn tessellation_is_clamped() {
        assert_eq!(SphereGenerator::new(1.0).with_tessellation(1, 500).tessellation(), (3, 50));
    }

    #[test]
    fn uv_seam_duplicates_elements() {
        let mesh = SphereGenerator::new(1.0).with_tessellation(4, 4).generate().unwrap();
        let uvs = mesh.attributes().unwrap().primary_uv();
        assert_eq!(uvs.element_count(), 3 * 5 + 2 * 4);
        assert!(mesh.triangle_ids().all(|t| uvs.is_set_triangle(t)));
    }
}
