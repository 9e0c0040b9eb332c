//! Flat fan over the 2D convex hull of a point set.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::Real;
use crate::generators::MeshGenerator;
use crate::generators::planar::{convex_hull_2d, lift_triangulation};
use crate::mesh::DynamicMesh;
use nalgebra::Point2;
use tracing::debug;

/// Default height of the generated plane.
pub const HULL_ELEVATION: Real = 10.0;

/// Hull indices fanned from the first hull point, counter-clockwise seen from +Z.
pub(crate) fn hull_fan(points: &[Point2<Real>]) -> MeshResult<Vec<[usize; 3]>> {
    if points.len() < 3 {
        return Err(MeshError::TooFewPoints {
            required: 3,
            found: points.len(),
        });
    }
    let hull = convex_hull_2d(points);
    if hull.len() < 3 {
        return Err(MeshError::Triangulation("input points have no area".into()));
    }
    Ok((1..hull.len() - 1)
        .map(|i| [hull[0], hull[i], hull[i + 1]])
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHullGenerator {
    points: Vec<Point2<Real>>,
    elevation: Real,
}

impl ConvexHullGenerator {
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

impl MeshGenerator for ConvexHullGenerator {
    fn generate(self) -> MeshResult<DynamicMesh> {
        let fan = hull_fan(&self.points)?;
        let (mesh, _) = lift_triangulation(&self.points, &fan, self.elevation)?;
        debug!(
            points = self.points.len(),
            hull_vertices = mesh.vertex_count(),
            "generated convex hull"
        );
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hull_fan_is_lifted_and_faces_up() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(4.0, 3.0),
            Point2::new(0.0, 3.0),
        ];
        let mesh = ConvexHullGenerator::new(points).generate().unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!((mesh.surface_area() - 12.0).abs() < 1e-12);
        for tid in mesh.triangle_ids() {
            assert!(mesh.triangle_normal(tid).unwrap().z > 0.99);
            let [a, ..] = mesh.triangle_positions(tid).unwrap();
            assert_eq!(a.z, HULL_ELEVATION);
        }
        let uvs = mesh.attributes().unwrap().primary_uv();
        assert!(uvs.elements().any(|(_, uv)| (uv.x - 0.004).abs() < 1e-12 && (uv.y - 0.003).abs() < 1e-12));
    }

    #[test]
    fn too_few_points_is_an_error() {
        let err = ConvexHullGenerator::new(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)])
            .generate()
            .unwrap_err();
        assert_eq!(err, MeshError::TooFewPoints { required: 3, found: 2 });
    }
}
