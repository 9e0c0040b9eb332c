//! Incremental refinement of the hull fan by the remaining points.
//!
//! Each interior point splits the first triangle that strictly contains it.
//! Points on an existing edge or vertex are contained by no triangle and are
//! left out of the mesh. This is a cheap O(n·t) fill, not a Delaunay
//! triangulation; use [`DelaunayGenerator`](super::DelaunayGenerator) for
//! well-shaped triangles.

use crate::errors::MeshResult;
use crate::float_types::Real;
use crate::generators::MeshGenerator;
use crate::generators::convex_hull::{HULL_ELEVATION, hull_fan};
use crate::generators::planar::lift_triangulation;
use crate::generators::point_triangle::point_in_triangle_2d;
use crate::mesh::DynamicMesh;
use nalgebra::Point2;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct RandomPointsGenerator {
    points: Vec<Point2<Real>>,
    elevation: Real,
}

impl RandomPointsGenerator {
    pub fn new(points: Vec<Point2<Real>>) -> Self {
        Self {
            points,
            elevation: HULL_ELEVATION,
        }
    }

    pub fn with_elevation(mut self, elevation: Real) -> Self {
        self.elevation = elevation;
        self
    }
}

/// Index triangulation of `points`: hull fan, then one three-way split per
/// point that falls strictly inside a triangle. Returns the triangles and
/// the number of points that could not be placed.
pub fn refine_by_points(points: &[Point2<Real>]) -> MeshResult<(Vec<[usize; 3]>, usize)> {
    let mut triangles = hull_fan(points)?;
    let mut on_hull = vec![false; points.len()];
    for t in &triangles {
        for &i in t {
            on_hull[i] = true;
        }
    }

    let mut unassigned = 0;
    for (i, p) in points.iter().enumerate().filter(|(i, _)| !on_hull[*i]) {
        let found = triangles
            .iter()
            .position(|&[a, b, c]| point_in_triangle_2d(p, &points[a], &points[b], &points[c]));
        match found {
            Some(k) => {
                let [a, b, c] = triangles.remove(k);
                triangles.extend([[a, b, i], [b, c, i], [c, a, i]]);
            },
            None => unassigned += 1,
        }
    }
    Ok((triangles, unassigned))
}

impl MeshGenerator for RandomPointsGenerator {
    fn generate(self) -> MeshResult<DynamicMesh> {
        let (triangles, unassigned) = refine_by_points(&self.points)?;
        let (mesh, rejected) = lift_triangulation(&self.points, &triangles, self.elevation)?;
        debug!(
            points = self.points.len(),
            triangles = mesh.triangle_count(),
            unassigned,
            rejected,
            "generated random-point triangulation"
        );
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with(extra: &[(Real, Real)]) -> Vec<Point2<Real>> {
        let mut points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        points.extend(extra.iter().map(|&(x, y)| Point2::new(x, y)));
        points
    }

    #[test]
    fn interior_points_split_triangles() {
        let points = square_with(&[(1.5, 0.5), (0.5, 1.5)]);
        let mesh = RandomPointsGenerator::new(points).generate().unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangle_count(), 6);
        assert!((mesh.surface_area() - 4.0).abs() < 1e-12);
        assert!(mesh.triangle_ids().all(|t| mesh.triangle_normal(t).unwrap().z > 0.99));
    }

    #[test]
    fn points_on_an_edge_are_omitted() {
        // (1, 1) lies on the fan diagonal from (0, 0) to (2, 2)
        let points = square_with(&[(1.0, 1.0)]);
        let (triangles, unassigned) = refine_by_points(&points).unwrap();
        assert_eq!(unassigned, 1);
        assert_eq!(triangles.len(), 2);

        let mesh = RandomPointsGenerator::new(points).generate().unwrap();
        assert_eq!(mesh.vertex_count(), 4);
    }
}
