//! Fast generalized winding number evaluation on top of a [`MeshBvh`].

use crate::float_types::{PI, Real};
use crate::float_types::parry3d::shape::Triangle;
use crate::spatial::bvh::{BvhNodeKind, MeshBvh};
use nalgebra::{Point3, Vector3};

/// Far-field acceptance ratio: a node is approximated once the query point is
/// farther than `BETA` times the node radius from its expansion center.
const BETA: Real = 3.0;

#[derive(Debug, Clone)]
struct NodeMoments {
    /// Area-weighted centroid of the triangles below the node
    center: Point3<Real>,
    /// Σ area · normal
    normal_sum: Vector3<Real>,
    area: Real,
    /// Largest distance from `center` to any corner below the node
    radius: Real,
}

/// **Mathematical Foundation: Generalized Winding Number**
///
/// The winding number of a surface `S` at `q` is `w(q) = Ω(q) / 4π`, where
/// `Ω` is the signed solid angle `S` subtends at `q`. For a closed,
/// outward-oriented mesh it is 1 inside and 0 outside; open or non-manifold
/// meshes give fractional values that still threshold well.
///
/// ## **Evaluation**
/// - **Near field**: exact triangle solid angles (Van Oosterom–Strackee)
/// - **Far field**: first-order dipole term `(c - q) · N / |c - q|³` per BVH
///   node, with `N` the area-weighted normal sum and `c` its center
#[derive(Debug, Clone)]
pub struct FastWindingTree {
    moments: Vec<NodeMoments>,
    stamp: u64,
}

impl FastWindingTree {
    pub fn build(bvh: &MeshBvh) -> Self {
        let mut moments = vec![
            NodeMoments {
                center: Point3::origin(),
                normal_sum: Vector3::zeros(),
                area: 0.0,
                radius: 0.0,
            };
            bvh.nodes.len()
        ];
        if !bvh.nodes.is_empty() {
            compute_moments(bvh, 0, &mut moments);
        }
        Self {
            moments,
            stamp: bvh.stamp(),
        }
    }

    /// `true` if this tree was built from `bvh` as it is now.
    pub fn is_valid(&self, bvh: &MeshBvh) -> bool {
        self.stamp == bvh.stamp() && self.moments.len() == bvh.nodes.len()
    }

    pub fn winding_number(&self, bvh: &MeshBvh, point: &Point3<Real>) -> Real {
        if bvh.nodes.is_empty() || !self.is_valid(bvh) {
            return 0.0;
        }
        let mut total = 0.0;
        let mut stack = vec![0usize];
        while let Some(node) = stack.pop() {
            let m = &self.moments[node];
            let offset = m.center - point;
            let dist = offset.norm();
            if dist > BETA * m.radius && dist > Real::EPSILON {
                total += offset.dot(&m.normal_sum) / (dist * dist * dist);
                continue;
            }
            match bvh.nodes[node].kind {
                BvhNodeKind::Leaf { start, count } => {
                    total += bvh.triangles[start..start + count]
                        .iter()
                        .map(|(_, t)| solid_angle(t, point))
                        .sum::<Real>();
                },
                BvhNodeKind::Internal { left, right } => {
                    stack.push(left);
                    stack.push(right);
                },
            }
        }
        total / (4.0 * PI)
    }

    /// Winding number above `threshold` (typically 0.5).
    pub fn is_inside(&self, bvh: &MeshBvh, point: &Point3<Real>, threshold: Real) -> bool {
        self.winding_number(bvh, point) > threshold
    }
}

fn compute_moments(bvh: &MeshBvh, node: usize, out: &mut [NodeMoments]) {
    let (triangles, children): (&[(_, Triangle)], Option<(usize, usize)>) = match bvh.nodes[node].kind {
        BvhNodeKind::Leaf { start, count } => (&bvh.triangles[start..start + count], None),
        BvhNodeKind::Internal { left, right } => (&[], Some((left, right))),
    };

    let (center, normal_sum, area) = if let Some((left, right)) = children {
        compute_moments(bvh, left, out);
        compute_moments(bvh, right, out);
        let (l, r) = (&out[left], &out[right]);
        let area = l.area + r.area;
        let center = if area > Real::EPSILON {
            Point3::from((l.center.coords * l.area + r.center.coords * r.area) / area)
        } else {
            Point3::from((l.center.coords + r.center.coords) * 0.5)
        };
        (center, l.normal_sum + r.normal_sum, area)
    } else {
        let mut area_sum = 0.0;
        let mut weighted = Vector3::zeros();
        let mut normal_sum = Vector3::zeros();
        for (_, t) in triangles {
            let n = 0.5 * (t.b - t.a).cross(&(t.c - t.a));
            let area = n.norm();
            area_sum += area;
            weighted += (t.a.coords + t.b.coords + t.c.coords) / 3.0 * area;
            normal_sum += n;
        }
        let center = if area_sum > Real::EPSILON {
            Point3::from(weighted / area_sum)
        } else {
            bvh.nodes[node].aabb.center()
        };
        (center, normal_sum, area_sum)
    };

    let aabb = &bvh.nodes[node].aabb;
    let radius = (aabb.maxs - center).abs().sup(&(center - aabb.mins).abs()).norm();
    out[node] = NodeMoments {
        center,
        normal_sum,
        area,
        radius,
    };
}

/// Signed solid angle of `t` seen from `q`.
fn solid_angle(t: &Triangle, q: &Point3<Real>) -> Real {
    let a = t.a - q;
    let b = t.b - q;
    let c = t.c - q;
    let (la, lb, lc) = (a.norm(), b.norm(), c.norm());
    let det = a.dot(&b.cross(&c));
    let denom = la * lb * lc + a.dot(&b) * lc + b.dot(&c) * la + c.dot(&a) * lb;
    2.0 * det.atan2(denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{BoxGenerator, MeshGenerator, SphereGenerator};

    #[test]
    fn closed_sphere_winds_once() {
        let mesh = SphereGenerator::new(1.0).with_tessellation(24, 24).generate().unwrap();
        let bvh = MeshBvh::build(&mesh);
        let tree = FastWindingTree::build(&bvh);

        let inside = tree.winding_number(&bvh, &Point3::new(0.1, -0.2, 0.3));
        let outside = tree.winding_number(&bvh, &Point3::new(3.0, 1.0, 0.0));
        assert!((inside - 1.0).abs() < 0.1, "inside winding {inside}");
        assert!(outside.abs() < 0.1, "outside winding {outside}");
    }

    #[test]
    fn open_box_gives_fractional_winding() {
        let mut mesh = BoxGenerator::new(Vector3::new(0.5, 0.5, 0.5)).generate().unwrap();
        let top: Vec<_> = mesh
            .triangle_ids()
            .filter(|t| mesh.triangle_normal(*t).unwrap().z > 0.5)
            .collect();
        for t in top {
            mesh.remove_triangle(t, false).unwrap();
        }
        let bvh = MeshBvh::build(&mesh);
        let tree = FastWindingTree::build(&bvh);
        let w = tree.winding_number(&bvh, &Point3::origin());
        assert!(w > 0.5 && w < 1.0, "winding {w}");
    }
}
