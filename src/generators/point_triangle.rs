//! Strict 2D point-in-triangle test.

use crate::float_types::Real;
use nalgebra::Point2;

/// Barycentric coordinates `(a, b, c)` of `p` in triangle `(va, vb, vc)`.
///
/// Degenerate triangles produce non-finite coordinates.
pub fn barycentric_2d(p: &Point2<Real>, va: &Point2<Real>, vb: &Point2<Real>, vc: &Point2<Real>) -> (Real, Real, Real) {
    let a = ((p.x - vb.x) * (vc.y - vb.y) - (p.y - vb.y) * (vc.x - vb.x))
        / ((va.x - vb.x) * (vc.y - vb.y) - (va.y - vb.y) * (vc.x - vb.x));
    let b = ((p.x - vc.x) * (va.y - vc.y) - (p.y - vc.y) * (va.x - vc.x))
        / ((vb.x - vc.x) * (va.y - vc.y) - (vb.y - vc.y) * (va.x - vc.x));
    (a, b, 1.0 - a - b)
}

/// `true` only if all three barycentric coordinates lie in the open
/// interval (0, 1). Points on an edge or a corner are outside, as is
/// everything when the triangle is degenerate.
pub fn point_in_triangle_2d(p: &Point2<Real>, va: &Point2<Real>, vb: &Point2<Real>, vc: &Point2<Real>) -> bool {
    let (a, b, c) = barycentric_2d(p, va, vb, vc);
    let open = |x: Real| x > 0.0 && x < 1.0;
    open(a) && open(b) && open(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_points_are_outside() {
        let (a, b, c) = (Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0));
        assert!(point_in_triangle_2d(&Point2::new(0.25, 0.25), &a, &b, &c));
        assert!(!point_in_triangle_2d(&Point2::new(0.0, 0.0), &a, &b, &c));
        assert!(!point_in_triangle_2d(&Point2::new(0.5, 0.5), &a, &b, &c));
        assert!(!point_in_triangle_2d(&Point2::new(0.5, 0.0), &a, &b, &c));
        assert!(!point_in_triangle_2d(&Point2::new(2.0, 2.0), &a, &b, &c));
    }

    #[test]
    fn winding_of_triangle_does_not_matter() {
        let (a, b, c) = (Point2::new(0.0, 0.0), Point2::new(0.0, 1.0), Point2::new(1.0, 0.0));
        assert!(point_in_triangle_2d(&Point2::new(0.2, 0.3), &a, &b, &c));
    }

    #[test]
    fn degenerate_triangle_contains_nothing() {
        let (a, b, c) = (Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), Point2::new(2.0, 2.0));
        assert!(!point_in_triangle_2d(&Point2::new(1.0, 1.0), &a, &b, &c));
    }
}
