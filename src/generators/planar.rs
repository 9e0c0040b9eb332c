//! Shared pieces of the planar point-set generators: the 2D convex hull and
//! lifting an index triangulation to a flat 3D mesh.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::Real;
use crate::mesh::{DynamicMesh, ElementId, VertexId};
use geo::{Area, ConvexHull, Coord, MultiPoint, Point as GeoPoint};
use nalgebra::{Point2, Point3, Vector2, Vector3};

/// Planar UVs are the xy coordinates scaled by this factor.
pub const PLANAR_UV_SCALE: Real = 1.0 / 1000.0;

/// Indices of the convex hull of `points` in counter-clockwise order,
/// starting from the lowest `(x, y)` corner. Collinear, repeated and
/// non-finite points are dropped; a repeated point maps to its first index.
/// Fewer than three indices means the input is degenerate.
pub fn convex_hull_2d(points: &[Point2<Real>]) -> Vec<usize> {
    let finite: Vec<usize> = (0..points.len())
        .filter(|&i| points[i].x.is_finite() && points[i].y.is_finite())
        .collect();
    if finite.len() < 3 {
        return finite;
    }
    let cloud: MultiPoint<Real> = finite.iter().map(|&i| GeoPoint::new(points[i].x, points[i].y)).collect();
    let hull = cloud.convex_hull();
    if hull.unsigned_area() <= 0.0 {
        return Vec::new();
    }

    let index_of = |c: &Coord<Real>| finite.iter().copied().find(|&i| points[i].x == c.x && points[i].y == c.y);
    let mut ring: Vec<usize> = hull.exterior().coords().filter_map(index_of).collect();
    // the ring repeats its first point
    ring.pop();
    ring.dedup();
    let Some(start) = (0..ring.len()).min_by(|&a, &b| {
        let (p, q) = (&points[ring[a]], &points[ring[b]]);
        p.x.total_cmp(&q.x).then(p.y.total_cmp(&q.y))
    }) else {
        return ring;
    };
    ring.rotate_left(start);
    ring
}

/// Lift `triangles` over `points` to the plane `z = elevation`.
///
/// Only referenced points become vertices, in index order. Each vertex gets
/// a `+Z` normal element and a UV element of `xy * PLANAR_UV_SCALE`.
/// Triangles the store rejects are skipped; the count is returned with the
/// mesh.
pub(crate) fn lift_triangulation(
    points: &[Point2<Real>],
    triangles: &[[usize; 3]],
    elevation: Real,
) -> MeshResult<(DynamicMesh, usize)> {
    let mut used = vec![false; points.len()];
    for t in triangles {
        for &i in t {
            let slot = used
                .get_mut(i)
                .ok_or_else(|| MeshError::Triangulation(format!("point index {i} out of range")))?;
            *slot = true;
        }
    }

    let mut mesh = DynamicMesh::new();
    mesh.enable_attributes();
    let mut corners: Vec<Option<(VertexId, ElementId, ElementId)>> = vec![None; points.len()];
    for (i, p) in points.iter().enumerate().filter(|(i, _)| used[*i]) {
        let vid = mesh.append_vertex(Point3::new(p.x, p.y, elevation));
        let Some(attributes) = mesh.attributes_mut() else {
            continue;
        };
        let normal = attributes.normals_mut().append_element(Vector3::z());
        let uv = attributes
            .primary_uv_mut()
            .append_element(Vector2::new(p.x, p.y) * PLANAR_UV_SCALE);
        corners[i] = Some((vid, normal, uv));
    }

    let mut rejected = 0;
    for t in triangles {
        let [Some(a), Some(b), Some(c)] = t.map(|i| corners[i]) else {
            rejected += 1;
            continue;
        };
        let Ok(tid) = mesh.append_triangle([a.0, b.0, c.0], 0) else {
            rejected += 1;
            continue;
        };
        if let Some(attributes) = mesh.attributes_mut() {
            attributes.normals_mut().set_triangle(tid, [a.1, b.1, c.1])?;
            attributes.primary_uv_mut().set_triangle(tid, [a.2, b.2, c.2])?;
        }
    }
    Ok((mesh, rejected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hull_of_square_with_interior_points() {
        let points = [
            Point2::new(0.0, 0.0),
            Point2::new(0.5, 0.5),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.5, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0),
        ];
        let hull = convex_hull_2d(&points);
        assert_eq!(hull, vec![0, 2, 3, 5]);
    }

    #[test]
    fn collinear_points_have_no_hull() {
        let points = [Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), Point2::new(2.0, 2.0)];
        assert!(convex_hull_2d(&points).len() < 3);
    }

    #[test]
    fn hull_drops_points_on_edges_and_is_counter_clockwise() {
        let points = [
            Point2::new(2.0, 2.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.0, 2.0),
            Point2::new(Real::NAN, 1.0),
        ];
        let hull = convex_hull_2d(&points);
        assert_eq!(hull, vec![2, 3, 0, 4]);
    }
}
