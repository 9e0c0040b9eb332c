//! Delaunay triangulation of a planar point set, backed by `spade`.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::Real;
use crate::generators::MeshGenerator;
use crate::generators::planar::lift_triangulation;
use crate::mesh::DynamicMesh;
use hashbrown::HashMap;
use nalgebra::Point2;
use spade::{DelaunayTriangulation, Triangulation};
use tracing::debug;

pub const DELAUNAY_ELEVATION: Real = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct DelaunayGenerator {
    points: Vec<Point2<Real>>,
    elevation: Real,
}

impl DelaunayGenerator {
    pub fn new(points: Vec<Point2<Real>>) -> Self {
        Self {
            points,
            elevation: DELAUNAY_ELEVATION,
        }
    }

    pub fn with_elevation(mut self, elevation: Real) -> Self {
        self.elevation = elevation;
        self
    }
}

/// Delaunay faces over `points` as input indices, wound clockwise seen
/// from +Z. Repeated points map to their first occurrence.
pub fn delaunay_triangles(points: &[Point2<Real>]) -> MeshResult<Vec<[usize; 3]>> {
    if points.len() < 3 {
        return Err(MeshError::TooFewPoints {
            required: 3,
            found: points.len(),
        });
    }
    let mut triangulation: DelaunayTriangulation<spade::Point2<Real>> = DelaunayTriangulation::new();
    let mut input_of: HashMap<usize, usize> = HashMap::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        let handle = triangulation
            .insert(spade::Point2::new(p.x, p.y))
            .map_err(|e| MeshError::Triangulation(format!("{e:?}")))?;
        input_of.entry(handle.index()).or_insert(i);
    }

    let mut triangles = Vec::with_capacity(triangulation.num_inner_faces());
    for face in triangulation.inner_faces() {
        let [a, b, c] = face.vertices().map(|v| input_of.get(&v.fix().index()).copied());
        if let (Some(a), Some(b), Some(c)) = (a, b, c) {
            triangles.push([c, b, a]);
        }
    }
    if triangles.is_empty() {
        return Err(MeshError::Triangulation("input points have no area".into()));
    }
    Ok(triangles)
}

impl MeshGenerator for DelaunayGenerator {
    fn generate(self) -> MeshResult<DynamicMesh> {
        let triangles = delaunay_triangles(&self.points)?;
        let (mesh, rejected) = lift_triangulation(&self.points, &triangles, self.elevation)?;
        debug!(
            points = self.points.len(),
            triangles = mesh.triangle_count(),
            rejected,
            "generated delaunay triangulation"
        );
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_with_center_gives_four_reversed_triangles() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
            Point2::new(1.0, 1.0),
        ];
        let mesh = DelaunayGenerator::new(points).generate().unwrap();
        assert_eq!(mesh.vertex_count(), 5);
        assert_eq!(mesh.triangle_count(), 4);
        assert!((mesh.surface_area() - 4.0).abs() < 1e-12);
        for tid in mesh.triangle_ids() {
            assert!(mesh.triangle_normal(tid).unwrap().z < -0.99);
            assert_eq!(mesh.triangle_positions(tid).unwrap()[0].z, DELAUNAY_ELEVATION);
        }
    }

    #[test]
    fn collinear_input_fails() {
        let points = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(2.0, 0.0)];
        assert!(matches!(
            DelaunayGenerator::new(points).generate(),
            Err(MeshError::Triangulation(_))
        ));
    }
}
