//! Inverse-distance field over a point cloud, meshed with marching cubes.

use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::{Aabb, BoundingVolume};
use crate::generators::MarchingCubes;
use nalgebra::Point3;

/// `strength / distance-to-nearest-point`. Large near the samples, so the
/// iso-surface at `iso_value` wraps every point in a blob of radius
/// `strength / iso_value`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloudField {
    points: Vec<Point3<Real>>,
    strength: Real,
}

impl PointCloudField {
    pub fn new(points: Vec<Point3<Real>>) -> Self {
        Self { points, strength: 100.0 }
    }

    pub fn with_strength(mut self, strength: Real) -> Self {
        self.strength = strength;
        self
    }

    pub fn points(&self) -> &[Point3<Real>] {
        &self.points
    }

    pub fn value(&self, p: &Point3<Real>) -> Real {
        let nearest = self
            .points
            .iter()
            .map(|q| (q - p).norm())
            .fold(Real::MAX, Real::min);
        if nearest <= Real::EPSILON {
            Real::MAX
        } else {
            self.strength / nearest
        }
    }

    /// Bounds of the cloud grown by the blob radius for `iso_value` and one
    /// extra cell, so the surface never touches the grid boundary.
    pub fn bounds(&self, iso_value: Real, cube_size: Real) -> Aabb {
        let mut aabb = Aabb::new_invalid();
        self.points.iter().for_each(|p| aabb.take_point(*p));
        let radius = if iso_value > 0.0 { self.strength / iso_value } else { 0.0 };
        aabb.loosened(radius + cube_size)
    }

    /// Marching cubes over this field at `iso_value`.
    pub fn into_generator(self, cube_size: Real, iso_value: Real) -> MarchingCubes<impl Fn(&Point3<Real>) -> Real + Sync> {
        let bounds = self.bounds(iso_value, cube_size);
        MarchingCubes::new(move |p: &Point3<Real>| self.value(p), bounds, cube_size).with_iso_value(iso_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::MeshGenerator;

    #[test]
    fn two_far_points_make_two_blobs() {
        let field = PointCloudField::new(vec![Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0)]);
        assert_eq!(field.value(&Point3::new(2.0, 0.0, 0.0)), 50.0);

        let mesh = field.into_generator(0.25, 100.0).generate().unwrap();
        assert!(mesh.is_closed());
        let near_origin = mesh.vertex_ids().filter(|v| mesh.vertex(*v).unwrap().x < 5.0).count();
        assert!(near_origin > 0 && near_origin < mesh.vertex_count());
        let exact = 2.0 * 4.0 / 3.0 * crate::float_types::PI;
        assert!((mesh.volume() - exact).abs() < 0.1 * exact);
        for v in mesh.vertex_ids() {
            let p = mesh.vertex(v).unwrap();
            let r = p.coords.norm().min((p - Point3::new(10.0, 0.0, 0.0)).norm());
            assert!((r - 1.0).abs() < 0.05, "radius {r}");
        }
    }
}
