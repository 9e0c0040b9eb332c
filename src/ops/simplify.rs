//! Quadric error metric simplification, and simplification through an
//! external [`MeshReduction`] over a flat [`MeshDescription`].

use crate::errors::{MeshError, MeshResult};
use crate::float_types::{EPSILON, Real};
use crate::mesh::split::copy_overlay_corners;
use crate::mesh::{DynamicMesh, GroupId, IndexMappings, NormalsMode, TriangleId, VertexId};
use crate::ops::boolean::copy_triangle_data;
use hashbrown::{HashMap, HashSet};
use nalgebra::{Matrix3, Point3, Vector2, Vector3};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, info};

/// Sum of squared distances to a set of planes, as a symmetric 4x4 matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quadric {
    // upper triangle, row major
    a: Real,
    b: Real,
    c: Real,
    d: Real,
    e: Real,
    f: Real,
    g: Real,
    h: Real,
    i: Real,
    j: Real,
}

impl Quadric {
    /// Quadric of the plane `n · p + d = 0`, with `n` unit length.
    pub fn from_plane(n: &Vector3<Real>, d: Real) -> Self {
        Self {
            a: n.x * n.x,
            b: n.x * n.y,
            c: n.x * n.z,
            d: n.x * d,
            e: n.y * n.y,
            f: n.y * n.z,
            g: n.y * d,
            h: n.z * n.z,
            i: n.z * d,
            j: d * d,
        }
    }

    pub fn add(&mut self, other: &Self) {
        self.a += other.a;
        self.b += other.b;
        self.c += other.c;
        self.d += other.d;
        self.e += other.e;
        self.f += other.f;
        self.g += other.g;
        self.h += other.h;
        self.i += other.i;
        self.j += other.j;
    }

    pub fn evaluate(&self, p: &Point3<Real>) -> Real {
        let (x, y, z) = (p.x, p.y, p.z);
        x * (self.a * x + 2.0 * (self.b * y + self.c * z + self.d))
            + y * (self.e * y + 2.0 * (self.f * z + self.g))
            + z * (self.h * z + 2.0 * self.i)
            + self.j
    }

    /// Point of minimal error, `None` when the system is singular.
    pub fn optimal_point(&self) -> Option<Point3<Real>> {
        let m = Matrix3::new(self.a, self.b, self.c, self.b, self.e, self.f, self.c, self.f, self.h);
        if m.determinant().abs() < 1e-10 {
            return None;
        }
        let inverse = m.try_inverse()?;
        Some(Point3::from(inverse * -Vector3::new(self.d, self.g, self.i)))
    }
}

/// Collapse candidate; ordered so the heap pops the cheapest first.
#[derive(Debug, Clone)]
struct EdgeCollapse {
    v1: usize,
    v2: usize,
    stamps: (u32, u32),
    cost: Real,
    position: Point3<Real>,
}

impl PartialEq for EdgeCollapse {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for EdgeCollapse {}

impl PartialOrd for EdgeCollapse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCollapse {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost)
    }
}

/// Working state of the edge-collapse loop over a compact mesh.
struct Collapser {
    positions: Vec<Option<Point3<Real>>>,
    faces: Vec<Option<[usize; 3]>>,
    vertex_faces: Vec<Vec<usize>>,
    quadrics: Vec<Quadric>,
    boundary: HashSet<usize>,
    stamps: Vec<u32>,
    active: usize,
}

impl Collapser {
    fn new(mesh: &DynamicMesh) -> Self {
        let positions: Vec<Option<Point3<Real>>> = (0..mesh.max_vertex_id()).map(|v| mesh.vertex(VertexId(v))).collect();
        let faces: Vec<Option<[usize; 3]>> = (0..mesh.max_triangle_id())
            .map(|t| mesh.triangle(TriangleId(t)).map(|tri| tri.map(|v| v.0)))
            .collect();
        let mut vertex_faces = vec![Vec::new(); positions.len()];
        let mut quadrics = vec![Quadric::default(); positions.len()];
        for (fi, face) in faces.iter().enumerate() {
            let Some(face) = face else { continue };
            face.iter().for_each(|v| vertex_faces[*v].push(fi));
            let Some(n) = mesh.triangle_normal(TriangleId(fi)) else { continue };
            let Some(p0) = positions[face[0]] else { continue };
            let q = Quadric::from_plane(&n, -n.dot(&p0.coords));
            face.iter().for_each(|v| quadrics[*v].add(&q));
        }
        let boundary = mesh.boundary_edges().into_iter().flat_map(|(a, b)| [a.0, b.0]).collect();
        Self {
            stamps: vec![0; positions.len()],
            active: mesh.triangle_count(),
            positions,
            faces,
            vertex_faces,
            quadrics,
            boundary,
        }
    }

    fn candidate(&self, v1: usize, v2: usize) -> Option<EdgeCollapse> {
        // boundary vertices stay put
        if self.boundary.contains(&v1) || self.boundary.contains(&v2) {
            return None;
        }
        let (p1, p2) = (self.positions[v1]?, self.positions[v2]?);
        let mut q = self.quadrics[v1];
        q.add(&self.quadrics[v2]);
        let midpoint = p1 + (p2 - p1) * 0.5;
        let position = q
            .optimal_point()
            .filter(|p| (p - midpoint).norm() <= (p2 - p1).norm() * 2.0)
            .unwrap_or_else(|| {
                [p1, p2, midpoint]
                    .into_iter()
                    .min_by(|a, b| q.evaluate(a).total_cmp(&q.evaluate(b)))
                    .unwrap_or(midpoint)
            });
        Some(EdgeCollapse {
            v1,
            v2,
            stamps: (self.stamps[v1], self.stamps[v2]),
            cost: q.evaluate(&position).max(0.0),
            position,
        })
    }

    fn neighbours(&self, v: usize) -> HashSet<usize> {
        self.vertex_faces[v]
            .iter()
            .filter_map(|f| self.faces[*f])
            .flat_map(|face| face.into_iter())
            .filter(|u| *u != v)
            .collect()
    }

    /// Link condition plus a check that no surviving face flips.
    fn is_valid(&self, c: &EdgeCollapse) -> bool {
        let shared: Vec<usize> = self.vertex_faces[c.v1]
            .iter()
            .copied()
            .filter(|f| self.faces[*f].is_some_and(|face| face.contains(&c.v2)))
            .collect();
        if shared.len() != 2 {
            return false;
        }
        let common = self.neighbours(c.v1).intersection(&self.neighbours(c.v2)).count();
        if common != 2 {
            return false;
        }
        for &v in &[c.v1, c.v2] {
            for &f in &self.vertex_faces[v] {
                if shared.contains(&f) {
                    continue;
                }
                let Some(face) = self.faces[f] else { continue };
                let Some(before) = self.face_normal(&face, None) else { continue };
                let Some(after) = self.face_normal(&face, Some((v, c.position))) else {
                    return false;
                };
                if before.dot(&after) < 0.2 {
                    return false;
                }
            }
        }
        true
    }

    fn face_normal(&self, face: &[usize; 3], moved: Option<(usize, Point3<Real>)>) -> Option<Vector3<Real>> {
        let p = |v: usize| match moved {
            Some((m, pos)) if m == v => Some(pos),
            _ => self.positions[v],
        };
        let (a, b, c) = (p(face[0])?, p(face[1])?, p(face[2])?);
        (b - a).cross(&(c - a)).try_normalize(EPSILON)
    }

    /// Merge `v2` into `v1`.
    fn collapse(&mut self, c: &EdgeCollapse) {
        self.positions[c.v1] = Some(c.position);
        self.positions[c.v2] = None;
        let q2 = self.quadrics[c.v2];
        self.quadrics[c.v1].add(&q2);
        for f in std::mem::take(&mut self.vertex_faces[c.v2]) {
            let Some(face) = self.faces[f].as_mut() else { continue };
            if face.contains(&c.v1) {
                self.faces[f] = None;
                self.active -= 1;
                continue;
            }
            face.iter_mut().filter(|v| **v == c.v2).for_each(|v| *v = c.v1);
            self.vertex_faces[c.v1].push(f);
        }
        let faces = &self.faces;
        self.vertex_faces[c.v1].retain(|f| faces[*f].is_some());
        for v in self.neighbours(c.v1) {
            self.vertex_faces[v].retain(|f| faces[*f].is_some());
        }
        self.stamps[c.v1] += 1;
        self.stamps[c.v2] += 1;
    }
}

/// Simplify `mesh` to at most `target` triangles with quadric error metric
/// edge collapses. Boundary vertices are not moved. The result is compact,
/// keeps triangle groups, tags and per-corner overlay elements of the
/// surviving triangles, and has recomputed normals.
pub fn simplify_to_triangle_count(mesh: &DynamicMesh, target: usize) -> MeshResult<DynamicMesh> {
    if mesh.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    let current = mesh.triangle_count();
    if target >= current {
        return Err(MeshError::TargetNotBelowCurrent { target, current });
    }
    let source = mesh.compacted();
    info!(current, target, "starting simplification");

    let mut state = Collapser::new(&source);
    let mut heap = BinaryHeap::new();
    let mut seen = HashSet::new();
    for face in state.faces.iter().flatten() {
        for k in 0..3 {
            let (a, b) = (face[k], face[(k + 1) % 3]);
            if seen.insert((a.min(b), a.max(b))) {
                heap.extend(state.candidate(a, b));
            }
        }
    }

    let (mut performed, mut rejected) = (0usize, 0usize);
    while state.active > target {
        let Some(c) = heap.pop() else { break };
        if state.positions[c.v1].is_none()
            || state.positions[c.v2].is_none()
            || c.stamps != (state.stamps[c.v1], state.stamps[c.v2])
        {
            continue;
        }
        if !state.is_valid(&c) {
            rejected += 1;
            continue;
        }
        state.collapse(&c);
        performed += 1;
        for v in state.neighbours(c.v1) {
            heap.extend(state.candidate(c.v1, v));
        }
    }

    let mut result = rebuild(&source, &state)?;
    result.recompute_normals(NormalsMode::PerVertex);
    info!(
        triangles = result.triangle_count(),
        collapses = performed,
        rejected,
        "simplification finished"
    );
    Ok(result)
}

/// Build a compact mesh from the surviving faces, copying the data of the
/// source triangle each face descends from.
fn rebuild(source: &DynamicMesh, state: &Collapser) -> MeshResult<DynamicMesh> {
    let mut out = DynamicMesh::new();
    out.enable_matching_attributes(source);
    let mut vertex_map: HashMap<usize, VertexId> = HashMap::new();
    let mut mappings = IndexMappings::new(source.attributes().map_or(1, |a| a.num_uv_layers()));

    for (fi, face) in state.faces.iter().enumerate() {
        let Some(face) = face else { continue };
        let mut tri = [VertexId(0); 3];
        for (slot, v) in tri.iter_mut().zip(face) {
            let position = state.positions[*v].ok_or(MeshError::InvalidVertex(VertexId(*v)))?;
            *slot = *vertex_map.entry(*v).or_insert_with(|| out.append_vertex(position));
        }
        let from = TriangleId(fi);
        let to = match out.append_triangle(tri, 0) {
            Ok(t) => t,
            Err(err) => {
                debug!(%err, triangle = fi, "dropping face after simplification");
                continue;
            },
        };
        copy_triangle_data(source, from, &mut out, to, 0)?;
        let (Some(src), Some(dst)) = (source.attributes(), out.attributes_mut()) else {
            continue;
        };
        copy_overlay_corners(src.normals(), dst.normals_mut(), &mut mappings.normals, from, to)?;
        for layer in 0..src.num_uv_layers().min(dst.num_uv_layers()) {
            if let (Some(s), Some(d)) = (src.uv_layer(layer), dst.uv_layer_mut(layer)) {
                copy_overlay_corners(s, d, mappings.uv_layer_mut(layer), from, to)?;
            }
        }
        if let (Some(s), Some(d)) = (src.colors(), dst.colors_mut()) {
            copy_overlay_corners(s, d, &mut mappings.colors, from, to)?;
        }
    }
    Ok(out)
}

/// How far a reduction should go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimplifyTarget {
    /// Percentage of the current triangle count to keep, `0..=100`
    Percentage(Real),
    TriangleCount(usize),
}

impl SimplifyTarget {
    /// Absolute triangle count for a mesh with `current` triangles.
    pub fn triangle_count(&self, current: usize) -> usize {
        match *self {
            SimplifyTarget::Percentage(p) => ((current as Real) * p.clamp(0.0, 100.0) / 100.0).ceil() as usize,
            SimplifyTarget::TriangleCount(n) => n,
        }
    }
}

/// Flat, index-based mesh exchanged with a [`MeshReduction`].
///
/// Normals and UVs are stored per triangle corner ("wedges").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshDescription {
    pub positions: Vec<Point3<Real>>,
    pub triangles: Vec<[usize; 3]>,
    pub groups: Vec<GroupId>,
    pub normals: Vec<[Vector3<Real>; 3]>,
    pub uvs: Vec<[Vector2<Real>; 3]>,
}

impl MeshDescription {
    pub fn from_mesh(mesh: &DynamicMesh) -> Self {
        let compact = mesh.compacted();
        let positions = compact.vertex_ids().filter_map(|v| compact.vertex(v)).collect();
        let mut description = Self {
            positions,
            ..Default::default()
        };
        let attributes = compact.attributes();
        for tid in compact.triangle_ids() {
            let Some(tri) = compact.triangle(tid) else { continue };
            let fallback = compact.triangle_normal(tid).unwrap_or_else(Vector3::z);
            description.triangles.push(tri.map(|v| v.0));
            description.groups.push(compact.triangle_group(tid).unwrap_or(0));
            description.normals.push(
                attributes
                    .and_then(|a| a.normals().tri_values(tid))
                    .unwrap_or([fallback; 3]),
            );
            description.uvs.push(
                attributes
                    .and_then(|a| a.primary_uv().tri_values(tid))
                    .unwrap_or([Vector2::zeros(); 3]),
            );
        }
        description
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Build a mesh, merging equal wedge values at a vertex into one element.
    pub fn to_mesh(&self) -> MeshResult<DynamicMesh> {
        let mut mesh = DynamicMesh::new();
        mesh.enable_attributes();
        mesh.enable_triangle_groups();
        let vertices: Vec<VertexId> = self.positions.iter().map(|p| mesh.append_vertex(*p)).collect();
        let mut normal_elements = HashMap::new();
        let mut uv_elements = HashMap::new();

        for (k, tri) in self.triangles.iter().enumerate() {
            let ids = tri
                .iter()
                .map(|i| vertices.get(*i).copied().ok_or(MeshError::InvalidVertex(VertexId(*i))))
                .collect::<MeshResult<Vec<_>>>()?;
            let group = self.groups.get(k).copied().unwrap_or(0);
            let tid = mesh.append_triangle([ids[0], ids[1], ids[2]], group)?;
            let Some(attributes) = mesh.attributes_mut() else { continue };
            if let Some(normals) = self.normals.get(k) {
                let overlay = attributes.normals_mut();
                let elements = [0, 1, 2].map(|c| {
                    let n = normals[c];
                    *normal_elements
                        .entry((tri[c], n.map(Real::to_bits)))
                        .or_insert_with(|| overlay.append_element(n))
                });
                overlay.set_triangle(tid, elements)?;
            }
            if let Some(uvs) = self.uvs.get(k) {
                let overlay = attributes.primary_uv_mut();
                let elements = [0, 1, 2].map(|c| {
                    let uv = uvs[c];
                    *uv_elements
                        .entry((tri[c], uv.map(Real::to_bits)))
                        .or_insert_with(|| overlay.append_element(uv))
                });
                overlay.set_triangle(tid, elements)?;
            }
        }
        Ok(mesh)
    }
}

/// External mesh reduction. Implementations return a reduced description;
/// the caller treats it as a black box.
pub trait MeshReduction {
    fn reduce(&self, description: &MeshDescription, target: SimplifyTarget) -> MeshResult<MeshDescription>;
}

/// [`MeshReduction`] backed by [`simplify_to_triangle_count`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QemReduction;

impl MeshReduction for QemReduction {
    fn reduce(&self, description: &MeshDescription, target: SimplifyTarget) -> MeshResult<MeshDescription> {
        let mesh = description.to_mesh()?;
        let count = target.triangle_count(mesh.triangle_count());
        let reduced = simplify_to_triangle_count(&mesh, count)?;
        Ok(MeshDescription::from_mesh(&reduced))
    }
}

/// Simplify through `reduction`. The result has recomputed normals.
pub fn simplify_with_reduction(
    mesh: &DynamicMesh,
    reduction: &dyn MeshReduction,
    target: SimplifyTarget,
) -> MeshResult<DynamicMesh> {
    if mesh.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    let current = mesh.triangle_count();
    let wanted = target.triangle_count(current);
    if wanted >= current {
        return Err(MeshError::TargetNotBelowCurrent { target: wanted, current });
    }
    let reduced = reduction.reduce(&MeshDescription::from_mesh(mesh), target)?;
    let mut result = reduced.to_mesh()?;
    result.recompute_normals(NormalsMode::PerVertex);
    debug!(before = current, after = result.triangle_count(), "reduction finished");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{MeshGenerator, SphereGenerator};

    fn sphere() -> DynamicMesh {
        SphereGenerator::new(1.0).with_uniform_tessellation(16).generate().unwrap()
    }

    #[test]
    fn quadric_of_three_planes_has_their_corner_as_optimum() {
        let mut q = Quadric::from_plane(&Vector3::x(), -1.0);
        q.add(&Quadric::from_plane(&Vector3::y(), -2.0));
        q.add(&Quadric::from_plane(&Vector3::z(), -3.0));
        let p = q.optimal_point().unwrap();
        assert!((p - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-9);
        assert!(q.evaluate(&p).abs() < 1e-9);
        assert!((q.evaluate(&Point3::new(1.0, 2.0, 4.0)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn simplified_sphere_stays_closed_and_round() {
        let mesh = sphere();
        let target = mesh.triangle_count() / 2;
        let result = simplify_to_triangle_count(&mesh, target).unwrap();
        assert!(result.triangle_count() <= target);
        assert!(result.triangle_count() > 0);
        assert!(result.is_closed());
        assert!(result.is_compact());
        assert!((result.volume() - mesh.volume()).abs() / mesh.volume() < 0.1);
    }

    #[test]
    fn target_not_below_current_is_rejected() {
        let mesh = sphere();
        let current = mesh.triangle_count();
        let result = simplify_to_triangle_count(&mesh, current);
        assert!(matches!(result, Err(MeshError::TargetNotBelowCurrent { target, .. }) if target == current));
    }

    #[test]
    fn reduction_by_percentage() {
        let mesh = sphere();
        let result = simplify_with_reduction(&mesh, &QemReduction, SimplifyTarget::Percentage(25.0)).unwrap();
        let expected = SimplifyTarget::Percentage(25.0).triangle_count(mesh.triangle_count());
        assert!(result.triangle_count() <= expected);
        assert!(result.is_closed());
    }

    #[test]
    fn description_keeps_uv_seams() {
        let mesh = sphere();
        let description = MeshDescription::from_mesh(&mesh);
        assert_eq!(description.triangle_count(), mesh.triangle_count());
        let rebuilt = description.to_mesh().unwrap();
        let uvs = rebuilt.attributes().unwrap().primary_uv();
        assert_eq!(uvs.element_count(), mesh.attributes().unwrap().primary_uv().element_count());
    }
}
