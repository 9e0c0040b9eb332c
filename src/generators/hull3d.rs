//! Closed 3D convex hull of a point set, backed by `chull`.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::Real;
use crate::generators::MeshGenerator;
use crate::mesh::{DynamicMesh, NormalsMode, VertexId};
use chull::ConvexHullWrapper;
use nalgebra::{Point3, Vector3};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHull3Generator {
    points: Vec<Point3<Real>>,
}

impl ConvexHull3Generator {
    pub fn new(points: Vec<Point3<Real>>) -> Self {
        Self { points }
    }
}

impl MeshGenerator for ConvexHull3Generator {
    /// Hull faces are wound outward and carry face normals.
    fn generate(self) -> MeshResult<DynamicMesh> {
        if self.points.len() < 4 {
            return Err(MeshError::TooFewPoints {
                required: 4,
                found: self.points.len(),
            });
        }
        let input: Vec<Vec<Real>> = self.points.iter().map(|p| vec![p.x, p.y, p.z]).collect();
        let hull = ConvexHullWrapper::try_new(&input, None)
            .map_err(|e| MeshError::Triangulation(format!("convex hull failed: {e:?}")))?;
        let (hull_vertices, hull_indices) = hull.vertices_indices();

        let mut mesh = DynamicMesh::new();
        let vertices: Vec<VertexId> = hull_vertices
            .iter()
            .map(|v| mesh.append_vertex(Point3::new(v[0], v[1], v[2])))
            .collect();
        let center = hull_vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + Vector3::new(v[0], v[1], v[2]))
            / hull_vertices.len().max(1) as Real;

        for tri in hull_indices.chunks_exact(3) {
            let mut corners = [vertices[tri[0]], vertices[tri[1]], vertices[tri[2]]];
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vector3::new(hull_vertices[i][0], hull_vertices[i][1], hull_vertices[i][2]));
            if (b - a).cross(&(c - a)).dot(&(a - center)) < 0.0 {
                corners.swap(1, 2);
            }
            mesh.append_triangle(corners, 0)?;
        }
        mesh.remove_unused_vertices();
        mesh.enable_attributes();
        mesh.recompute_normals(NormalsMode::Face);
        debug!(points = self.points.len(), faces = mesh.triangle_count(), "generated 3d convex hull");
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hull_of_cube_corners_and_interior() {
        let mut points: Vec<Point3<Real>> = (0..8)
            .map(|i| Point3::new((i & 1) as Real, ((i >> 1) & 1) as Real, ((i >> 2) & 1) as Real))
            .collect();
        points.push(Point3::new(0.5, 0.5, 0.5));
        let mesh = ConvexHull3Generator::new(points).generate().unwrap();
        assert!(mesh.is_closed());
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn needs_four_points() {
        let points = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)];
        assert!(matches!(
            ConvexHull3Generator::new(points).generate(),
            Err(MeshError::TooFewPoints { required: 4, found: 3 })
        ));
    }
}
