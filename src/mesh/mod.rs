//! `DynamicMesh`: an indexed triangle mesh with stable IDs, tombstones and
//! optional attribute overlays.

pub mod attributes;
pub mod compact;
pub mod ids;
pub mod mappings;
pub mod normals;
pub mod overlay;
pub mod split;
pub mod tags;

pub use attributes::AttributeSet;
pub use compact::{CompactInfo, CompactOptions};
pub use ids::{EdgeKey, ElementId, GroupId, TriangleId, VertexId};
pub use mappings::IndexMappings;
pub use normals::NormalsMode;
pub use tags::{IsShell, SubObjectId, TriangleTag};

use crate::errors::{MeshError, MeshResult};
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use hashbrown::HashMap;
use nalgebra::{Affine3, Point3, Vector3};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CHANGE_STAMP: AtomicU64 = AtomicU64::new(1);

/// Stamps are unique across all meshes, so a spatial index built for one
/// mesh is never mistaken as valid for another.
pub(crate) fn next_change_stamp() -> u64 {
    NEXT_CHANGE_STAMP.fetch_add(1, Ordering::Relaxed)
}

/// Triangles bounding one edge. A manifold edge has at most two.
#[derive(Debug, Clone, Copy, PartialEq)]
struct EdgeTriangles {
    first: TriangleId,
    second: Option<TriangleId>,
}

impl EdgeTriangles {
    fn remove(self, tid: TriangleId) -> Option<Self> {
        match (self.first == tid, self.second) {
            (true, Some(other)) => Some(Self { first: other, second: None }),
            (true, None) => None,
            (false, Some(s)) if s == tid => Some(Self { first: self.first, second: None }),
            _ => Some(self),
        }
    }

    fn iter(self) -> impl Iterator<Item = TriangleId> {
        std::iter::once(self.first).chain(self.second)
    }
}

#[derive(Debug, Clone)]
pub struct DynamicMesh {
    vertices: Vec<Option<Point3<Real>>>,
    vertex_triangles: Vec<Vec<TriangleId>>,
    vertex_count: usize,
    triangles: Vec<Option<[VertexId; 3]>>,
    triangle_count: usize,
    groups: Option<Vec<GroupId>>,
    next_group_id: GroupId,
    edges: HashMap<EdgeKey, EdgeTriangles>,
    attributes: Option<AttributeSet>,
    change_stamp: u64,
}

impl Default for DynamicMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicMesh {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            vertex_triangles: Vec::new(),
            vertex_count: 0,
            triangles: Vec::new(),
            triangle_count: 0,
            groups: None,
            next_group_id: 0,
            edges: HashMap::new(),
            attributes: None,
            change_stamp: next_change_stamp(),
        }
    }

    /// Build a mesh from positions and index triples. Triangles that the
    /// store rejects are skipped and counted in the returned value.
    pub fn from_triangles(positions: &[Point3<Real>], triangles: &[[usize; 3]]) -> (Self, usize) {
        let mut mesh = Self::new();
        for p in positions {
            mesh.append_vertex(*p);
        }
        let rejected = triangles
            .iter()
            .filter(|[a, b, c]| {
                mesh.append_triangle([VertexId(*a), VertexId(*b), VertexId(*c)], 0)
                    .is_err()
            })
            .count();
        (mesh, rejected)
    }

    /// Replace this mesh with a deep copy of `other`.
    pub fn copy(&mut self, other: &DynamicMesh) {
        *self = other.clone();
    }

    /// Drop all geometry and attributes.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    // Counts and iteration
    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// One past the largest vertex ID ever handed out.
    #[inline]
    pub fn max_vertex_id(&self) -> usize {
        self.vertices.len()
    }

    /// One past the largest triangle ID ever handed out.
    #[inline]
    pub fn max_triangle_id(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangle_count == 0
    }

    /// IDs are dense, with no tombstones.
    pub fn is_compact(&self) -> bool {
        self.vertex_count == self.vertices.len() && self.triangle_count == self.triangles.len()
    }

    pub fn change_stamp(&self) -> u64 {
        self.change_stamp
    }

    #[inline]
    fn touch(&mut self) {
        self.change_stamp = next_change_stamp();
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some())
            .map(|(i, _)| VertexId(i))
    }

    pub fn triangle_ids(&self) -> impl Iterator<Item = TriangleId> + '_ {
        self.triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_some())
            .map(|(i, _)| TriangleId(i))
    }

    #[inline]
    pub fn is_vertex(&self, vid: VertexId) -> bool {
        matches!(self.vertices.get(vid.0), Some(Some(_)))
    }

    #[inline]
    pub fn is_triangle(&self, tid: TriangleId) -> bool {
        matches!(self.triangles.get(tid.0), Some(Some(_)))
    }

    #[inline]
    pub fn vertex(&self, vid: VertexId) -> Option<Point3<Real>> {
        self.vertices.get(vid.0).copied().flatten()
    }

    #[inline]
    pub fn triangle(&self, tid: TriangleId) -> Option<[VertexId; 3]> {
        self.triangles.get(tid.0).copied().flatten()
    }

    /// Corner positions of a triangle.
    pub fn triangle_positions(&self, tid: TriangleId) -> Option<[Point3<Real>; 3]> {
        let [a, b, c] = self.triangle(tid)?;
        Some([self.vertex(a)?, self.vertex(b)?, self.vertex(c)?])
    }

    /// Triangles using vertex `vid`.
    pub fn vertex_triangles(&self, vid: VertexId) -> &[TriangleId] {
        self.vertex_triangles
            .get(vid.0)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Triangles bounding the undirected edge `a`-`b`.
    pub fn edge_triangles(&self, a: VertexId, b: VertexId) -> Vec<TriangleId> {
        self.edges
            .get(&EdgeKey::new(a, b))
            .map(|e| e.iter().collect())
            .unwrap_or_default()
    }

    pub fn is_boundary_edge(&self, a: VertexId, b: VertexId) -> bool {
        matches!(self.edges.get(&EdgeKey::new(a, b)), Some(EdgeTriangles { second: None, .. }))
    }

    /// Every edge is shared by exactly two triangles.
    pub fn is_closed(&self) -> bool {
        !self.is_empty() && self.edges.values().all(|e| e.second.is_some())
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Boundary edges, directed the way their single triangle traverses them.
    pub fn boundary_edges(&self) -> Vec<(VertexId, VertexId)> {
        let mut out: Vec<(VertexId, VertexId)> = self
            .edges
            .iter()
            .filter(|(_, e)| e.second.is_none())
            .filter_map(|(key, e)| {
                let [a, b, c] = self.triangle(e.first)?;
                [(a, b), (b, c), (c, a)]
                    .into_iter()
                    .find(|(u, v)| EdgeKey::new(*u, *v) == *key)
            })
            .collect();
        out.sort();
        out
    }

    /// Triangles sharing an edge with `tid`.
    pub fn triangle_neighbours(&self, tid: TriangleId) -> Vec<TriangleId> {
        let Some([a, b, c]) = self.triangle(tid) else {
            return Vec::new();
        };
        [(a, b), (b, c), (c, a)]
            .iter()
            .flat_map(|(u, v)| self.edge_triangles(*u, *v))
            .filter(|t| *t != tid)
            .collect()
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    // Construction
    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Always succeeds.
    pub fn append_vertex(&mut self, position: Point3<Real>) -> VertexId {
        self.vertices.push(Some(position));
        self.vertex_triangles.push(Vec::new());
        self.vertex_count += 1;
        self.touch();
        VertexId(self.vertices.len() - 1)
    }

    pub fn set_vertex(&mut self, vid: VertexId, position: Point3<Real>) -> MeshResult<()> {
        match self.vertices.get_mut(vid.0) {
            Some(Some(p)) => {
                *p = position;
                self.touch();
                Ok(())
            },
            _ => Err(MeshError::InvalidVertex(vid)),
        }
    }

    /// Append a triangle.
    ///
    /// Fails, leaving the mesh untouched, if a vertex is invalid or repeated,
    /// if a triangle on the same three vertices exists, or if one of the
    /// edges already bounds two triangles. `group` is ignored unless groups
    /// are enabled.
    pub fn append_triangle(&mut self, tri: [VertexId; 3], group: GroupId) -> MeshResult<TriangleId> {
        if let Some(bad) = tri.iter().find(|v| !self.is_vertex(**v)) {
            return Err(MeshError::InvalidVertex(*bad));
        }
        let [a, b, c] = tri;
        if a == b || b == c || c == a {
            return Err(MeshError::DegenerateTriangle(tri));
        }
        if let Some(existing) = self.edges.get(&EdgeKey::new(a, b)) {
            let duplicate = existing
                .iter()
                .filter_map(|t| self.triangle(t))
                .any(|t| t.contains(&c));
            if duplicate {
                return Err(MeshError::DuplicateTriangle(tri));
            }
        }
        for (u, v) in [(a, b), (b, c), (c, a)] {
            if let Some(EdgeTriangles { second: Some(_), .. }) = self.edges.get(&EdgeKey::new(u, v)) {
                return Err(MeshError::NonManifoldEdge(u, v));
            }
        }

        let tid = TriangleId(self.triangles.len());
        self.triangles.push(Some(tri));
        self.triangle_count += 1;
        for (u, v) in [(a, b), (b, c), (c, a)] {
            self.edges
                .entry(EdgeKey::new(u, v))
                .and_modify(|e| e.second = Some(tid))
                .or_insert(EdgeTriangles { first: tid, second: None });
        }
        for v in tri {
            self.vertex_triangles[v.0].push(tid);
        }
        if let Some(groups) = self.groups.as_mut() {
            groups.push(group);
            self.next_group_id = self.next_group_id.max(group + 1);
        }
        if let Some(attributes) = self.attributes.as_mut() {
            attributes.on_triangle_appended(tid);
        }
        self.touch();
        Ok(tid)
    }

    /// Remove a triangle, optionally dropping vertices it leaves unused.
    pub fn remove_triangle(&mut self, tid: TriangleId, remove_isolated_vertices: bool) -> MeshResult<()> {
        let tri = self.triangle(tid).ok_or(MeshError::InvalidTriangle(tid))?;
        let [a, b, c] = tri;
        for (u, v) in [(a, b), (b, c), (c, a)] {
            let key = EdgeKey::new(u, v);
            if let Some(entry) = self.edges.get(&key).copied() {
                match entry.remove(tid) {
                    Some(rest) => {
                        self.edges.insert(key, rest);
                    },
                    None => {
                        self.edges.remove(&key);
                    },
                }
            }
        }
        for v in tri {
            self.vertex_triangles[v.0].retain(|t| *t != tid);
            if remove_isolated_vertices && self.vertex_triangles[v.0].is_empty() {
                self.vertices[v.0] = None;
                self.vertex_count -= 1;
            }
        }
        self.triangles[tid.0] = None;
        self.triangle_count -= 1;
        if let Some(attributes) = self.attributes.as_mut() {
            attributes.on_triangle_removed(tid);
        }
        self.touch();
        Ok(())
    }

    /// Tombstone every vertex no triangle uses. Returns how many were removed.
    pub fn remove_unused_vertices(&mut self) -> usize {
        let mut removed = 0;
        for i in 0..self.vertices.len() {
            if self.vertices[i].is_some() && self.vertex_triangles[i].is_empty() {
                self.vertices[i] = None;
                self.vertex_count -= 1;
                removed += 1;
            }
        }
        if removed > 0 {
            self.touch();
        }
        removed
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    // Groups and attributes
    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    pub fn has_triangle_groups(&self) -> bool {
        self.groups.is_some()
    }

    /// Idempotent. Existing triangles start in group 0.
    pub fn enable_triangle_groups(&mut self) {
        if self.groups.is_none() {
            self.groups = Some(vec![0; self.triangles.len()]);
            self.next_group_id = self.next_group_id.max(1);
        }
    }

    pub fn disable_triangle_groups(&mut self) {
        self.groups = None;
    }

    pub fn triangle_group(&self, tid: TriangleId) -> Option<GroupId> {
        if !self.is_triangle(tid) {
            return None;
        }
        Some(self.groups.as_ref().map_or(0, |g| g[tid.0]))
    }

    pub fn set_triangle_group(&mut self, tid: TriangleId, group: GroupId) -> MeshResult<()> {
        if !self.is_triangle(tid) {
            return Err(MeshError::InvalidTriangle(tid));
        }
        if let Some(groups) = self.groups.as_mut() {
            groups[tid.0] = group;
            self.next_group_id = self.next_group_id.max(group + 1);
        }
        Ok(())
    }

    /// Reserve a group ID not used by any triangle.
    pub fn allocate_group(&mut self) -> GroupId {
        let id = self.next_group_id;
        self.next_group_id += 1;
        id
    }

    pub fn has_attributes(&self) -> bool {
        self.attributes.is_some()
    }

    /// Idempotent. A new set has a normal overlay and one UV layer.
    pub fn enable_attributes(&mut self) {
        if self.attributes.is_none() {
            self.attributes = Some(AttributeSet::new(self.triangles.len()));
        }
    }

    pub fn disable_attributes(&mut self) {
        self.attributes = None;
    }

    pub fn attributes(&self) -> Option<&AttributeSet> {
        self.attributes.as_ref()
    }

    pub fn attributes_mut(&mut self) -> Option<&mut AttributeSet> {
        self.attributes.as_mut()
    }

    /// Enable the same attribute facets `other` has (overlays, tags, layers).
    pub fn enable_matching_attributes(&mut self, other: &DynamicMesh) {
        if other.has_triangle_groups() {
            self.enable_triangle_groups();
        }
        if let Some(source) = other.attributes() {
            self.enable_attributes();
            if let Some(attributes) = self.attributes.as_mut() {
                attributes.enable_matching(source);
            }
        }
    }

    pub(crate) fn set_attributes(&mut self, attributes: Option<AttributeSet>) {
        self.attributes = attributes.map(|mut a| {
            a.ensure_triangle_slots(self.triangles.len());
            a
        });
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    // Whole-mesh edits
    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Flip the winding of every triangle and negate overlay normals.
    pub fn reverse_orientation(&mut self) {
        for (i, tri) in self.triangles.iter_mut().enumerate() {
            if let Some(t) = tri.as_mut() {
                t.swap(1, 2);
                if let Some(attributes) = self.attributes.as_mut() {
                    attributes.on_triangle_reversed(TriangleId(i));
                }
            }
        }
        if let Some(attributes) = self.attributes.as_mut() {
            attributes.normals_mut().map_elements(|n| -n);
        }
        self.touch();
    }

    pub fn translate(&mut self, offset: Vector3<Real>) {
        self.vertices.iter_mut().flatten().for_each(|p| *p += offset);
        self.touch();
    }

    /// Scale positions about the origin. Normals are renormalised for
    /// non-uniform scales.
    pub fn scale(&mut self, factors: Vector3<Real>) {
        let affine = Affine3::from_matrix_unchecked(nalgebra::Matrix4::new_nonuniform_scaling(&factors));
        self.transform(&affine);
    }

    /// Apply an affine transform to positions and overlay normals. A
    /// mirroring transform also flips triangle winding so faces stay outward.
    pub fn transform(&mut self, transform: &Affine3<Real>) {
        self.vertices
            .iter_mut()
            .flatten()
            .for_each(|p| *p = transform.transform_point(p));

        let linear = transform.matrix().fixed_view::<3, 3>(0, 0).into_owned();
        if let Some(attributes) = self.attributes.as_mut() {
            if let Some(normal_matrix) = linear.try_inverse().map(|m| m.transpose()) {
                attributes.normals_mut().map_elements(|n| {
                    let t = normal_matrix * n;
                    t.try_normalize(Real::EPSILON).unwrap_or(t)
                });
            }
        }
        if linear.determinant() < 0.0 {
            for (i, tri) in self.triangles.iter_mut().enumerate() {
                if let Some(t) = tri.as_mut() {
                    t.swap(1, 2);
                    if let Some(attributes) = self.attributes.as_mut() {
                        attributes.on_triangle_reversed(TriangleId(i));
                    }
                }
            }
        }
        self.touch();
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    // Geometry
    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Bounds of live vertices, or an invalid (inverted) box when empty.
    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::new_invalid();
        self.vertices.iter().flatten().for_each(|p| aabb.take_point(*p));
        aabb
    }

    /// Unnormalised normal `(b - a) × (c - a)`, twice the area in length.
    pub fn triangle_cross(&self, tid: TriangleId) -> Option<Vector3<Real>> {
        let [a, b, c] = self.triangle_positions(tid)?;
        Some((b - a).cross(&(c - a)))
    }

    /// Unit face normal, or zero for a degenerate triangle.
    pub fn triangle_normal(&self, tid: TriangleId) -> Option<Vector3<Real>> {
        let n = self.triangle_cross(tid)?;
        Some(n.try_normalize(Real::EPSILON).unwrap_or_else(Vector3::zeros))
    }

    pub fn triangle_area(&self, tid: TriangleId) -> Option<Real> {
        self.triangle_cross(tid).map(|n| 0.5 * n.norm())
    }

    pub fn triangle_centroid(&self, tid: TriangleId) -> Option<Point3<Real>> {
        let [a, b, c] = self.triangle_positions(tid)?;
        Some(Point3::from((a.coords + b.coords + c.coords) / 3.0))
    }

    pub fn surface_area(&self) -> Real {
        self.triangle_ids()
            .filter_map(|t| self.triangle_area(t))
            .sum()
    }

    /// **Mathematical Foundation: Divergence Theorem**
    ///
    /// For a closed, consistently oriented surface the enclosed volume is
    /// `V = (1/6) Σ a · (b × c)` over all triangles `(a, b, c)`. The signed
    /// value is positive for outward-facing triangles.
    pub fn signed_volume(&self) -> Real {
        self.triangle_ids()
            .filter_map(|t| self.triangle_positions(t))
            .map(|[a, b, c]| a.coords.dot(&b.coords.cross(&c.coords)))
            .sum::<Real>()
            / 6.0
    }

    pub fn volume(&self) -> Real {
        self.signed_volume().abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> DynamicMesh {
        let (mesh, rejected) = DynamicMesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [0, 2, 3]],
        );
        assert_eq!(rejected, 0);
        mesh
    }

    #[test]
    fn append_triangle_rejects_bad_input_without_side_effects() {
        let mut mesh = quad();
        let stamp = mesh.change_stamp();

        assert_eq!(
            mesh.append_triangle([VertexId(0), VertexId(1), VertexId(9)], 0),
            Err(MeshError::InvalidVertex(VertexId(9)))
        );
        assert_eq!(
            mesh.append_triangle([VertexId(2), VertexId(0), VertexId(1)], 0),
            Err(MeshError::DuplicateTriangle([VertexId(2), VertexId(0), VertexId(1)]))
        );
        assert!(matches!(
            mesh.append_triangle([VertexId(1), VertexId(1), VertexId(2)], 0),
            Err(MeshError::DegenerateTriangle(_))
        ));

        let apex = mesh.append_vertex(Point3::new(0.5, 0.5, 1.0));
        mesh.append_triangle([VertexId(0), VertexId(2), apex], 0)
            .expect_err("edge 0-2 already has two triangles");

        assert_eq!(mesh.triangle_count(), 2);
        assert_ne!(mesh.change_stamp(), stamp, "append_vertex still bumps the stamp");
    }

    #[test]
    fn remove_triangle_leaves_tombstone() {
        let mut mesh = quad();
        mesh.remove_triangle(TriangleId(0), true).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.max_triangle_id(), 2);
        assert!(!mesh.is_triangle(TriangleId(0)));
        assert!(!mesh.is_vertex(VertexId(1)));
        assert_eq!(mesh.vertex_count(), 3);
        assert!(!mesh.is_compact());
        assert!(mesh.is_boundary_edge(VertexId(0), VertexId(2)));
    }

    #[test]
    fn enable_attributes_is_idempotent() {
        let mut mesh = quad();
        mesh.enable_attributes();
        let up = mesh.attributes_mut().unwrap().normals_mut().append_element(Vector3::z());
        mesh.attributes_mut()
            .unwrap()
            .normals_mut()
            .set_triangle(TriangleId(0), [up, up, up])
            .unwrap();

        mesh.enable_attributes();
        let normals = mesh.attributes().unwrap().normals();
        assert_eq!(normals.element_count(), 1);
        assert!(normals.is_set_triangle(TriangleId(0)));
    }

    #[test]
    fn mirroring_transform_keeps_volume_positive() {
        use crate::generators::{BoxGenerator, MeshGenerator};

        let mut mesh = BoxGenerator::new(Vector3::new(0.5, 0.5, 0.5)).generate().unwrap();
        let before = mesh.signed_volume();
        mesh.scale(Vector3::new(-1.0, 1.0, 1.0));
        assert!(before > 0.0);
        assert!((mesh.signed_volume() - before).abs() < 1e-9);
    }
}
