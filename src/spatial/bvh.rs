//! Bounding-volume hierarchy over the live triangles of a mesh.
//!
//! The tree keeps its own copy of the triangle corners, so it can be stored
//! next to the mesh it was built from. It remembers the mesh change stamp it
//! was built against and reports itself stale once the mesh moves on.

use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::{Aabb, BoundingVolume};
use crate::float_types::parry3d::query::{PointQuery, Ray, RayCast};
use crate::float_types::parry3d::shape::Triangle;
use crate::mesh::{DynamicMesh, TriangleId};
use nalgebra::Point3;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

const LEAF_SIZE: usize = 4;

/// Options for ray queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    /// Hits farther than this along the ray are ignored
    pub max_distance: Real,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_distance: Real::MAX,
        }
    }
}

/// First triangle hit along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub triangle: TriangleId,
    /// Distance from the ray origin, in the units of the mesh
    pub distance: Real,
    pub point: Point3<Real>,
}

#[derive(Debug, Clone)]
pub(crate) enum BvhNodeKind {
    Leaf { start: usize, count: usize },
    Internal { left: usize, right: usize },
}

#[derive(Debug, Clone)]
pub(crate) struct BvhNode {
    pub aabb: Aabb,
    pub kind: BvhNodeKind,
}

#[derive(Debug, Clone)]
pub struct MeshBvh {
    pub(crate) nodes: Vec<BvhNode>,
    pub(crate) triangles: Vec<(TriangleId, Triangle)>,
    stamp: u64,
}

struct BuildItem {
    id: TriangleId,
    triangle: Triangle,
    aabb: Aabb,
    centroid: Point3<Real>,
}

/// Heap entry ordered so the closest candidate pops first.
#[derive(Debug, PartialEq)]
struct Candidate {
    dist_sq: Real,
    node: usize,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other.dist_sq.total_cmp(&self.dist_sq)
    }
}

impl MeshBvh {
    /// Build over every live triangle of `mesh` by recursive median split on
    /// the longest centroid axis. O(n log n).
    pub fn build(mesh: &DynamicMesh) -> Self {
        let mut items: Vec<BuildItem> = mesh
            .triangle_ids()
            .filter_map(|id| {
                let [a, b, c] = mesh.triangle_positions(id)?;
                let triangle = Triangle::new(a, b, c);
                let mut aabb = Aabb::new_invalid();
                [a, b, c].iter().for_each(|p| aabb.take_point(*p));
                let centroid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
                Some(BuildItem {
                    id,
                    triangle,
                    aabb,
                    centroid,
                })
            })
            .collect();

        let mut nodes = Vec::with_capacity(2 * items.len() / LEAF_SIZE + 1);
        if !items.is_empty() {
            build_recursive(&mut nodes, &mut items, 0);
        }

        Self {
            nodes,
            triangles: items.into_iter().map(|i| (i.id, i.triangle)).collect(),
            stamp: mesh.change_stamp(),
        }
    }

    /// `true` while `mesh` has not changed since the tree was built.
    pub fn is_valid(&self, mesh: &DynamicMesh) -> bool {
        self.stamp == mesh.change_stamp()
    }

    /// Rebuild if stale. Returns whether the tree was already valid.
    pub fn ensure_valid(&mut self, mesh: &DynamicMesh) -> bool {
        if self.is_valid(mesh) {
            return true;
        }
        *self = Self::build(mesh);
        false
    }

    pub(crate) fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn bounds(&self) -> Aabb {
        self.nodes
            .first()
            .map_or_else(Aabb::new_invalid, |n| n.aabb)
    }

    /// Closest triangle to `point` with the squared distance to it.
    /// `None` only for an empty mesh.
    pub fn find_nearest_triangle(&self, point: &Point3<Real>) -> Option<(TriangleId, Real)> {
        self.nearest(point).map(|(i, d, _)| (self.triangles[i].0, d))
    }

    /// Closest point on the surface to `point`.
    pub fn find_nearest_point(&self, point: &Point3<Real>) -> Option<Point3<Real>> {
        self.nearest(point).map(|(_, _, p)| p)
    }

    fn nearest(&self, point: &Point3<Real>) -> Option<(usize, Real, Point3<Real>)> {
        let root = self.nodes.first()?;
        let mut best: Option<(usize, Real, Point3<Real>)> = None;
        let mut heap = BinaryHeap::new();
        heap.push(Candidate {
            dist_sq: root.aabb.distance_to_local_point(point, true).powi(2),
            node: 0,
        });

        while let Some(Candidate { dist_sq, node }) = heap.pop() {
            if best.is_some_and(|(_, d, _)| dist_sq > d) {
                break;
            }
            match self.nodes[node].kind {
                BvhNodeKind::Leaf { start, count } => {
                    for i in start..start + count {
                        let projection = self.triangles[i].1.project_local_point(point, true);
                        let d = (projection.point - point).norm_squared();
                        if best.is_none_or(|(_, bd, _)| d < bd) {
                            best = Some((i, d, projection.point));
                        }
                    }
                },
                BvhNodeKind::Internal { left, right } => {
                    for child in [left, right] {
                        let d = self.nodes[child].aabb.distance_to_local_point(point, true).powi(2);
                        if best.is_none_or(|(_, bd, _)| d <= bd) {
                            heap.push(Candidate { dist_sq: d, node: child });
                        }
                    }
                },
            }
        }
        best
    }

    /// First triangle hit by `ray` within `options.max_distance`.
    pub fn find_nearest_hit_triangle(&self, ray: &Ray, options: &QueryOptions) -> Option<TriangleId> {
        self.ray_hit(ray, options).map(|h| h.triangle)
    }

    /// Like [`find_nearest_hit_triangle`](Self::find_nearest_hit_triangle),
    /// with distance and hit point.
    pub fn ray_hit(&self, ray: &Ray, options: &QueryOptions) -> Option<RayHit> {
        let dir = ray.dir.try_normalize(Real::EPSILON)?;
        let ray = Ray::new(ray.origin, dir);
        self.nodes.first()?;

        let mut best: Option<(usize, Real)> = None;
        let mut limit = options.max_distance;
        let mut stack = vec![0usize];
        while let Some(node) = stack.pop() {
            let node = &self.nodes[node];
            if node.aabb.cast_local_ray(&ray, limit, true).is_none() {
                continue;
            }
            match node.kind {
                BvhNodeKind::Leaf { start, count } => {
                    for i in start..start + count {
                        if let Some(t) = self.triangles[i].1.cast_local_ray(&ray, limit, true) {
                            if best.is_none_or(|(_, bt)| t < bt) {
                                best = Some((i, t));
                                limit = t;
                            }
                        }
                    }
                },
                BvhNodeKind::Internal { left, right } => {
                    stack.push(left);
                    stack.push(right);
                },
            }
        }

        best.map(|(i, t)| RayHit {
            triangle: self.triangles[i].0,
            distance: t,
            point: ray.point_at(t),
        })
    }
}

fn build_recursive(nodes: &mut Vec<BvhNode>, items: &mut [BuildItem], offset: usize) -> usize {
    let aabb = items
        .iter()
        .fold(Aabb::new_invalid(), |acc, item| acc.merged(&item.aabb));
    let index = nodes.len();
    nodes.push(BvhNode {
        aabb,
        kind: BvhNodeKind::Leaf {
            start: offset,
            count: items.len(),
        },
    });
    if items.len() <= LEAF_SIZE {
        return index;
    }

    let mut centroid_bounds = Aabb::new_invalid();
    items.iter().for_each(|i| centroid_bounds.take_point(i.centroid));
    let extents = centroid_bounds.extents();
    let axis = extents.imax();

    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));
    let (left_items, right_items) = items.split_at_mut(mid);
    let left = build_recursive(nodes, left_items, offset);
    let right = build_recursive(nodes, right_items, offset + mid);
    nodes[index].kind = BvhNodeKind::Internal { left, right };
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{MeshGenerator, SphereGenerator};
    use nalgebra::Vector3;

    #[test]
    fn nearest_matches_brute_force() {
        let mesh = SphereGenerator::new(1.0).with_tessellation(12, 16).generate().unwrap();
        let bvh = MeshBvh::build(&mesh);
        assert_eq!(bvh.triangle_count(), mesh.triangle_count());

        for query in [
            Point3::new(2.0, 0.3, -0.1),
            Point3::new(0.1, 0.2, 0.05),
            Point3::new(-0.4, 3.0, 1.0),
        ] {
            let (_, d) = bvh.find_nearest_triangle(&query).unwrap();
            let brute = mesh
                .triangle_ids()
                .map(|t| {
                    let [a, b, c] = mesh.triangle_positions(t).unwrap();
                    let p = Triangle::new(a, b, c).project_local_point(&query, true).point;
                    (p - query).norm_squared()
                })
                .fold(Real::MAX, Real::min);
            assert!((d - brute).abs() < 1e-12, "bvh {d} vs brute force {brute}");
        }
    }

    #[test]
    fn ray_hit_respects_max_distance() {
        let mesh = SphereGenerator::new(1.0).generate().unwrap();
        let bvh = MeshBvh::build(&mesh);
        let ray = Ray::new(Point3::new(-5.0, 0.01, 0.02), Vector3::new(2.0, 0.0, 0.0));

        let hit = bvh.ray_hit(&ray, &QueryOptions::default()).unwrap();
        assert!(hit.distance > 3.9 && hit.distance < 4.1, "distance {}", hit.distance);
        assert!(hit.point.x < -0.9);

        let short = QueryOptions { max_distance: 2.0 };
        assert!(bvh.find_nearest_hit_triangle(&ray, &short).is_none());
    }

    #[test]
    fn edits_make_tree_stale() {
        let mut mesh = SphereGenerator::new(1.0).generate().unwrap();
        let mut bvh = MeshBvh::build(&mesh);
        assert!(bvh.is_valid(&mesh));
        mesh.translate(Vector3::new(1.0, 0.0, 0.0));
        assert!(!bvh.is_valid(&mesh));
        assert!(!bvh.ensure_valid(&mesh));
        assert!(bvh.is_valid(&mesh));
    }
}
