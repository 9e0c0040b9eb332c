//! Oriented planes and polygon splitting for the BSP tree.

use crate::float_types::{EPSILON, Real};
use crate::ops::bsp::polygon::{BspPolygon, BspVertex};
use nalgebra::{Point3, Vector3};

pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

/// Plane `normal · p = w` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<Real>,
    pub w: Real,
}

impl Plane {
    /// `None` if `normal` has no direction.
    pub fn from_normal(normal: Vector3<Real>, w: Real) -> Option<Self> {
        let normal = normal.try_normalize(Real::EPSILON)?;
        Some(Self { normal, w })
    }

    pub fn from_origin_normal(origin: &Point3<Real>, normal: &Vector3<Real>) -> Option<Self> {
        let normal = normal.try_normalize(Real::EPSILON)?;
        Some(Self {
            normal,
            w: normal.dot(&origin.coords),
        })
    }

    /// Right-handed plane through three points, `None` when they are collinear.
    pub fn from_points(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a)).try_normalize(Real::EPSILON)?;
        Some(Self {
            normal,
            w: normal.dot(&a.coords),
        })
    }

    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    pub fn signed_distance(&self, p: &Point3<Real>) -> Real {
        self.normal.dot(&p.coords) - self.w
    }

    /// Classify `point` with the exact `orient3d` predicate against three
    /// points spanning the plane.
    pub fn orient_point(&self, point: &Point3<Real>) -> i8 {
        let origin = Point3::from(self.normal * self.w);
        let helper = if self.normal.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
        let u = helper.cross(&self.normal).normalize();
        let v = self.normal.cross(&u);
        let coord = |p: Point3<Real>| robust::Coord3D { x: p.x, y: p.y, z: p.z };

        // positive when the point lies below the plane spanned by the CCW triple
        let sign = robust::orient3d(coord(origin), coord(origin + u), coord(origin + v), coord(*point));
        if sign > EPSILON {
            BACK
        } else if sign < -EPSILON {
            FRONT
        } else {
            COPLANAR
        }
    }

    pub fn classify_polygon(&self, polygon: &BspPolygon) -> i8 {
        polygon
            .vertices
            .iter()
            .fold(COPLANAR, |acc, v| acc | self.orient_point(&v.pos))
    }

    /// Split `polygon` into `(coplanar_front, coplanar_back, front, back)`.
    /// Coplanar polygons go to the front bucket when they face the same way
    /// as the plane.
    pub fn split_polygon(&self, polygon: &BspPolygon) -> [Vec<BspPolygon>; 4] {
        let mut out: [Vec<BspPolygon>; 4] = Default::default();
        let types: Vec<i8> = polygon.vertices.iter().map(|v| self.orient_point(&v.pos)).collect();
        match types.iter().fold(COPLANAR, |acc, t| acc | t) {
            COPLANAR => {
                let bucket = if self.normal.dot(&polygon.plane.normal) > 0.0 { 0 } else { 1 };
                out[bucket].push(polygon.clone());
            },
            FRONT => out[2].push(polygon.clone()),
            BACK => out[3].push(polygon.clone()),
            _ => {
                let n = polygon.vertices.len();
                let mut front: Vec<BspVertex> = Vec::with_capacity(n + 1);
                let mut back: Vec<BspVertex> = Vec::with_capacity(n + 1);
                for i in 0..n {
                    let j = (i + 1) % n;
                    let (ti, tj) = (types[i], types[j]);
                    let (vi, vj) = (&polygon.vertices[i], &polygon.vertices[j]);
                    if ti != BACK {
                        front.push(*vi);
                    }
                    if ti != FRONT {
                        back.push(*vi);
                    }
                    if ti | tj == SPANNING {
                        let denom = self.normal.dot(&(vj.pos - vi.pos));
                        if denom.abs() > Real::EPSILON {
                            let t = (self.w - self.normal.dot(&vi.pos.coords)) / denom;
                            let crossing = vi.interpolate(vj, t.clamp(0.0, 1.0));
                            front.push(crossing);
                            back.push(crossing);
                        }
                    }
                }
                // split pieces keep the parent plane
                if front.len() >= 3 {
                    out[2].push(polygon.with_vertices(front));
                }
                if back.len() >= 3 {
                    out[3].push(polygon.with_vertices(back));
                }
            },
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orient_point_matches_signed_distance() {
        let plane = Plane::from_origin_normal(&Point3::new(0.0, 0.0, 1.0), &Vector3::new(0.0, 0.0, 2.0)).unwrap();
        assert_eq!(plane.orient_point(&Point3::new(3.0, -1.0, 2.0)), FRONT);
        assert_eq!(plane.orient_point(&Point3::new(3.0, -1.0, 0.0)), BACK);
        assert_eq!(plane.orient_point(&Point3::new(3.0, -1.0, 1.0)), COPLANAR);
        assert!((plane.signed_distance(&Point3::new(0.0, 0.0, 4.0)) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn spanning_triangle_is_split_in_two() {
        let tri = BspPolygon::from_triangle(
            [
                BspVertex::new(Point3::new(-1.0, 0.0, 0.0)),
                BspVertex::new(Point3::new(1.0, 0.0, 0.0)),
                BspVertex::new(Point3::new(1.0, 1.0, 0.0)),
            ],
            Default::default(),
        )
        .unwrap();
        let plane = Plane::from_origin_normal(&Point3::origin(), &Vector3::x()).unwrap();
        let [cf, cb, front, back] = plane.split_polygon(&tri);
        assert!(cf.is_empty() && cb.is_empty());
        assert_eq!(front.len(), 1);
        assert_eq!(back.len(), 1);
        assert_eq!(front[0].vertices.len(), 4);
        assert_eq!(back[0].vertices.len(), 3);
    }
}
