//! Plane cutting with cap filling and sub-object splitting.
//!
//! The cut rebuilds the mesh side by side: every triangle is clipped against
//! the plane, vertices on the plane are duplicated per side so the two halves
//! share no topology, and per-corner overlay values are interpolated along
//! split edges. Each side is labelled through the [`SubObjectId`] tag, the
//! cut boundary is capped with a constrained Delaunay triangulation, and the
//! result is split into one mesh per label.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::{EPSILON, Real, tolerance};
use crate::mesh::overlay::Overlay;
use crate::mesh::split::split_mesh_with_keys;
use crate::mesh::{DynamicMesh, EdgeKey, ElementId, IsShell, NormalsMode, SubObjectId, TriangleId, VertexId};
use crate::ops::boolean::copy_triangle_data;
use crate::ops::boundary::{BoundaryLoop, boundary_loops_where};
use geo::{Contains, Coord, LineString, Polygon as GeoPolygon, TriangulateSpade};
use hashbrown::HashMap;
use nalgebra::{Point3, Vector2, Vector3};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneCutOptions {
    /// Distance the two halves are pushed apart along the plane normal
    pub gap_width: Real,
    /// Cap closed cut loops
    pub fill_holes: bool,
    /// Also cap open spans, closing them between their end points
    pub fill_spans: bool,
    /// Keep the half the plane normal points into
    pub keep_both_halves: bool,
    /// Scale applied to cap UVs, which are plane coordinates
    pub uv_scale: Real,
    /// Tag the original surface with [`IsShell`] so caps can be told apart
    pub mark_shell: bool,
}

impl Default for PlaneCutOptions {
    fn default() -> Self {
        Self {
            gap_width: 0.0,
            fill_holes: true,
            fill_spans: false,
            keep_both_halves: false,
            uv_scale: 1.0,
            mark_shell: false,
        }
    }
}

/// Pieces of a cut, ordered by label. The first piece is the part behind
/// the plane whenever it is non-empty.
#[derive(Debug, Clone, Default)]
pub struct CutResult {
    pub pieces: Vec<DynamicMesh>,
    pub filled_loops: usize,
    pub failed_loops: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Side {
    Negative,
    Positive,
}

/// Where a corner of an output triangle came from in its source triangle.
#[derive(Debug, Clone, Copy)]
enum CornerSource {
    Original(usize),
    /// Point on the source edge between corners `lo` and `hi` (ordered as
    /// in the edge key), at parameter `t` from `lo`.
    Split { lo: usize, hi: usize, edge: EdgeKey, t: Real },
}

/// Cache key of an overlay element in the output mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ElementKey {
    Original(ElementId),
    Split(ElementId, ElementId, EdgeKey),
}

type ElementCache = HashMap<ElementKey, ElementId>;

/// Cuts meshes with one plane.
#[derive(Debug, Clone)]
pub struct PlaneCutter {
    origin: Point3<Real>,
    normal: Vector3<Real>,
    options: PlaneCutOptions,
    preserve_labels: bool,
}

impl PlaneCutter {
    /// Fails if `normal` has no length.
    pub fn new(origin: Point3<Real>, normal: Vector3<Real>) -> MeshResult<Self> {
        let normal = normal
            .try_normalize(EPSILON)
            .ok_or_else(|| MeshError::Other("cut plane normal has zero length".into()))?;
        Ok(Self {
            origin,
            normal,
            options: PlaneCutOptions::default(),
            preserve_labels: false,
        })
    }

    pub fn with_options(mut self, options: PlaneCutOptions) -> Self {
        self.options = options;
        self
    }

    /// Keep any [`SubObjectId`] labels the input already carries; the
    /// positive side of each piece is relabelled above the largest label.
    pub fn preserving_labels(mut self) -> Self {
        self.preserve_labels = true;
        self
    }

    pub fn normal(&self) -> Vector3<Real> {
        self.normal
    }

    pub fn signed_distance(&self, p: &Point3<Real>) -> Real {
        (p - self.origin).dot(&self.normal)
    }

    /// In-plane basis `(u, v)` with `u × v = normal`.
    fn basis(&self) -> (Vector3<Real>, Vector3<Real>) {
        let helper = if self.normal.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
        let u = helper.cross(&self.normal).normalize();
        (u, self.normal.cross(&u))
    }

    /// Cut `mesh`. The input is not modified.
    pub fn cut(&self, mesh: &DynamicMesh) -> MeshResult<CutResult> {
        if mesh.is_empty() {
            return Ok(CutResult::default());
        }

        let mut work = mesh.clone();
        work.enable_attributes();
        let offset = self.prepare_labels(&mut work);

        let mut cut = CutMesh::new(&work);
        for tid in work.triangle_ids() {
            self.cut_triangle(&work, tid, offset, &mut cut)?;
        }

        let (mut filled, mut failed) = (0, 0);
        if self.options.fill_holes {
            for side in [Side::Negative, Side::Positive] {
                if side == Side::Positive && !self.options.keep_both_halves {
                    continue;
                }
                let (f, x) = self.cap_side(&mut cut, side);
                filled += f;
                failed += x;
            }
        }

        let CutMesh { mut mesh, sides, .. } = cut;
        if !self.options.keep_both_halves {
            let positive: Vec<TriangleId> = sides
                .iter()
                .filter(|(_, s)| **s == Side::Positive)
                .map(|(t, _)| *t)
                .collect();
            for tid in positive {
                mesh.remove_triangle(tid, true)?;
            }
        }

        let label_of = |m: &DynamicMesh, t: TriangleId| {
            m.attributes()
                .and_then(|a| a.tag::<SubObjectId>())
                .map_or(0, |tag| tag.get(t))
        };
        let labelled: Vec<(i32, DynamicMesh)> = if mesh.is_empty() {
            Vec::new()
        } else {
            let split = split_mesh_with_keys(&mesh, |t| label_of(&mesh, t));
            match split {
                Some(pieces) => pieces,
                None => {
                    let label = mesh.triangle_ids().next().map_or(0, |t| label_of(&mesh, t));
                    vec![(label, mesh)]
                },
            }
        };

        let half_gap = self.normal * (self.options.gap_width * 0.5);
        let pieces: Vec<DynamicMesh> = labelled
            .into_iter()
            .map(|(label, mut piece)| {
                if let Some(attributes) = piece.attributes_mut() {
                    attributes.detach_tag::<SubObjectId>();
                }
                if self.options.keep_both_halves && self.options.gap_width > 0.0 {
                    piece.translate(if label >= offset { half_gap } else { -half_gap });
                }
                piece.recompute_normals(NormalsMode::Split);
                piece
            })
            .collect();

        info!(
            pieces = pieces.len(),
            filled_loops = filled,
            failed_loops = failed,
            "plane cut finished"
        );
        Ok(CutResult {
            pieces,
            filled_loops: filled,
            failed_loops: failed,
        })
    }

    /// Attach the label tag (and the shell tag if asked for) and return the
    /// label offset of the positive side.
    fn prepare_labels(&self, work: &mut DynamicMesh) -> i32 {
        if let Some(attributes) = work.attributes_mut() {
            if !self.preserve_labels {
                attributes.detach_tag::<SubObjectId>();
            }
            attributes.attach_tag::<SubObjectId>(0);
            if self.options.mark_shell {
                attributes.attach_tag::<IsShell>(true);
            }
        }
        let Some(labels) = work.attributes().and_then(|a| a.tag::<SubObjectId>()) else {
            return 1;
        };
        work.triangle_ids().map(|t| labels.get(t)).max().unwrap_or(0) + 1
    }

    fn cut_triangle(&self, work: &DynamicMesh, tid: TriangleId, offset: i32, cut: &mut CutMesh) -> MeshResult<()> {
        let tri = work.triangle(tid).ok_or(MeshError::InvalidTriangle(tid))?;
        let positions = work.triangle_positions(tid).ok_or(MeshError::InvalidTriangle(tid))?;
        let snap = tolerance();
        let d = positions.map(|p| {
            let s = self.signed_distance(&p);
            if s.abs() < snap { 0.0 } else { s }
        });

        let polygons: Vec<(Side, Vec<CornerSource>)> = if d.iter().all(|x| *x <= 0.0) {
            vec![(Side::Negative, (0..3).map(CornerSource::Original).collect())]
        } else if d.iter().all(|x| *x >= 0.0) {
            vec![(Side::Positive, (0..3).map(CornerSource::Original).collect())]
        } else {
            let clip = |keep: fn(Real) -> bool| {
                let mut corners = Vec::with_capacity(4);
                for i in 0..3 {
                    let j = (i + 1) % 3;
                    if keep(d[i]) {
                        corners.push(CornerSource::Original(i));
                    }
                    if d[i] * d[j] < 0.0 {
                        let edge = EdgeKey::new(tri[i], tri[j]);
                        let (lo, hi) = if tri[i] == edge.0 { (i, j) } else { (j, i) };
                        let t = d[lo] / (d[lo] - d[hi]);
                        corners.push(CornerSource::Split { lo, hi, edge, t });
                    }
                }
                corners
            };
            vec![
                (Side::Negative, clip(|x| x <= 0.0)),
                (Side::Positive, clip(|x| x >= 0.0)),
            ]
        };

        for (side, corners) in polygons {
            let resolved: Vec<(VertexId, CornerSource)> = corners
                .iter()
                .map(|c| (cut.vertex_for(side, &tri, &positions, &d, *c), *c))
                .collect();
            for k in 1..resolved.len().saturating_sub(1) {
                let fan = [resolved[0], resolved[k], resolved[k + 1]];
                let new_tid = cut.mesh.append_triangle(fan.map(|(v, _)| v), 0)?;
                copy_triangle_data(work, tid, &mut cut.mesh, new_tid, 0)?;
                cut.copy_overlays(work, tid, new_tid, fan.map(|(_, c)| c))?;
                if side == Side::Positive {
                    if let Some(tag) = cut.mesh.attributes_mut().and_then(|a| a.tag_mut::<SubObjectId>()) {
                        let label = tag.get(new_tid);
                        tag.set(new_tid, label + offset);
                    }
                }
                cut.sides.insert(new_tid, side);
            }
        }
        Ok(())
    }

    /// Cap every cut loop of one side. Returns `(filled, failed)`.
    fn cap_side(&self, cut: &mut CutMesh, side: Side) -> (usize, usize) {
        let on_plane = |v: VertexId| cut.on_plane.get(&v) == Some(&side);
        let loops: Vec<BoundaryLoop> = boundary_loops_where(&cut.mesh, |a, b| on_plane(a) && on_plane(b))
            .into_iter()
            .filter(|l| l.closed || (self.options.fill_spans && l.vertices.len() >= 3))
            .collect();
        if loops.is_empty() {
            return (0, 0);
        }

        let (u, v) = self.basis();
        let project = |p: Point3<Real>| {
            let r = p - self.origin;
            Coord { x: r.dot(&u), y: r.dot(&v) }
        };
        let rings: Vec<Vec<Coord<Real>>> = loops
            .iter()
            .map(|l| l.vertices.iter().filter_map(|v| cut.mesh.vertex(*v)).map(project).collect())
            .collect();

        let mut filled = 0;
        let mut failed = 0;
        for (outer, holes) in nest_rings(&rings) {
            let members: Vec<usize> = std::iter::once(outer).chain(holes.iter().copied()).collect();
            match self.cap_polygon(cut, side, &loops, &rings, outer, &holes, (u, v)) {
                Ok(count) => {
                    debug!(triangles = count, loops = members.len(), "capped cut loop");
                    filled += members.len();
                },
                Err(err) => {
                    warn!(%err, "failed to cap cut loop");
                    failed += members.len();
                },
            }
        }
        (filled, failed)
    }

    #[allow(clippy::too_many_arguments)]
    fn cap_polygon(
        &self,
        cut: &mut CutMesh,
        side: Side,
        loops: &[BoundaryLoop],
        rings: &[Vec<Coord<Real>>],
        outer: usize,
        holes: &[usize],
        (u, v): (Vector3<Real>, Vector3<Real>),
    ) -> MeshResult<usize> {
        let polygon = GeoPolygon::new(
            LineString::from(rings[outer].clone()),
            holes.iter().map(|h| LineString::from(rings[*h].clone())).collect(),
        );
        let triangles = polygon
            .constrained_triangulation(Default::default())
            .map_err(|e| MeshError::Triangulation(format!("{e:?}")))?;

        let mut lookup: HashMap<(i64, i64), VertexId> = HashMap::new();
        let quantum = tolerance().max(EPSILON);
        let key = |c: &Coord<Real>| ((c.x / quantum).round() as i64, (c.y / quantum).round() as i64);
        for &ring in std::iter::once(&outer).chain(holes) {
            for (vid, coord) in loops[ring].vertices.iter().zip(&rings[ring]) {
                lookup.insert(key(coord), *vid);
            }
        }

        // the cap faces out of its own side
        let cap_normal = match side {
            Side::Negative => self.normal,
            Side::Positive => -self.normal,
        };
        let label = loops[outer]
            .vertices
            .first()
            .zip(loops[outer].vertices.get(1))
            .and_then(|(a, b)| cut.mesh.edge_triangles(*a, *b).first().copied())
            .and_then(|t| cut.mesh.attributes()?.tag::<SubObjectId>().map(|tag| tag.get(t)));
        let group = cut.mesh.has_triangle_groups().then(|| cut.mesh.allocate_group()).unwrap_or(0);
        let normal_element = cut.mesh.attributes_mut().map(|a| a.normals_mut().append_element(cap_normal));

        let mut added: Vec<TriangleId> = Vec::with_capacity(triangles.len());
        let mut uv_elements: HashMap<VertexId, ElementId> = HashMap::new();
        let result = (|| -> MeshResult<()> {
            for triangle in &triangles {
                let mut coords = [triangle.v1(), triangle.v2(), triangle.v3()];
                let area = (coords[1].x - coords[0].x) * (coords[2].y - coords[0].y)
                    - (coords[1].y - coords[0].y) * (coords[2].x - coords[0].x);
                if area.abs() <= EPSILON * EPSILON {
                    continue;
                }
                // counter-clockwise in (u, v) faces +normal
                if (area > 0.0) != (side == Side::Negative) {
                    coords.swap(1, 2);
                }
                let vertices = coords.map(|c| {
                    *lookup.entry(key(&c)).or_insert_with(|| {
                        let vid = cut.mesh.append_vertex(self.origin + u * c.x + v * c.y);
                        cut.on_plane.insert(vid, side);
                        vid
                    })
                });
                let tid = cut.mesh.append_triangle(vertices, group)?;
                added.push(tid);
                cut.sides.insert(tid, side);

                let Some(attributes) = cut.mesh.attributes_mut() else {
                    continue;
                };
                if let Some(e) = normal_element {
                    attributes.normals_mut().set_triangle(tid, [e; 3])?;
                }
                let uvs = attributes.primary_uv_mut();
                let corners = [0, 1, 2].map(|i| {
                    *uv_elements.entry(vertices[i]).or_insert_with(|| {
                        uvs.append_element(Vector2::new(coords[i].x, coords[i].y) * self.options.uv_scale)
                    })
                });
                uvs.set_triangle(tid, corners)?;
                if let (Some(label), Some(tag)) = (label, attributes.tag_mut::<SubObjectId>()) {
                    tag.set(tid, label);
                }
            }
            Ok(())
        })();

        match result {
            Ok(()) if !added.is_empty() => Ok(added.len()),
            Ok(()) => Err(MeshError::Triangulation("cap has no area".into())),
            Err(err) => {
                for tid in added {
                    cut.sides.remove(&tid);
                    let removed = cut.mesh.remove_triangle(tid, false);
                    debug_assert!(removed.is_ok(), "rolled back cap triangle was live");
                }
                Err(err)
            },
        }
    }
}

/// Group rings into polygons: each even-depth ring becomes an outer
/// boundary with the odd-depth rings directly inside it as holes.
fn nest_rings(rings: &[Vec<Coord<Real>>]) -> Vec<(usize, Vec<usize>)> {
    let shapes: Vec<GeoPolygon<Real>> = rings
        .iter()
        .map(|r| GeoPolygon::new(LineString::from(r.clone()), Vec::new()))
        .collect();
    let containers: Vec<Vec<usize>> = rings
        .iter()
        .enumerate()
        .map(|(i, ring)| {
            (0..rings.len())
                .filter(|&j| j != i && ring.first().is_some_and(|c| shapes[j].contains(c)))
                .collect()
        })
        .collect();

    let depth = |i: usize| containers[i].len();
    let mut result: Vec<(usize, Vec<usize>)> = (0..rings.len())
        .filter(|&i| depth(i) % 2 == 0 && rings[i].len() >= 3)
        .map(|i| (i, Vec::new()))
        .collect();
    for hole in (0..rings.len()).filter(|&i| depth(i) % 2 == 1) {
        let parent = containers[hole].iter().copied().find(|&p| depth(p) + 1 == depth(hole));
        if let Some(entry) = result.iter_mut().find(|(outer, _)| Some(*outer) == parent) {
            entry.1.push(hole);
        }
    }
    result
}

/// Output mesh under construction.
struct CutMesh {
    mesh: DynamicMesh,
    originals: HashMap<(Side, VertexId), VertexId>,
    splits: HashMap<(Side, EdgeKey), VertexId>,
    /// Output vertices lying on the plane, with their side
    on_plane: HashMap<VertexId, Side>,
    sides: HashMap<TriangleId, Side>,
    /// One cache per overlay: normals, UV layers, then colors
    element_caches: Vec<ElementCache>,
}

impl CutMesh {
    fn new(source: &DynamicMesh) -> Self {
        let mut mesh = DynamicMesh::new();
        mesh.enable_matching_attributes(source);
        let overlays = 2 + source.attributes().map_or(1, |a| a.num_uv_layers());
        Self {
            mesh,
            originals: HashMap::new(),
            splits: HashMap::new(),
            on_plane: HashMap::new(),
            sides: HashMap::new(),
            element_caches: vec![ElementCache::new(); overlays],
        }
    }

    fn vertex_for(
        &mut self,
        side: Side,
        tri: &[VertexId; 3],
        positions: &[Point3<Real>; 3],
        d: &[Real; 3],
        corner: CornerSource,
    ) -> VertexId {
        match corner {
            CornerSource::Original(i) => {
                // off-plane vertices only ever appear on one side
                let key_side = if d[i] == 0.0 { side } else { Side::Negative };
                if let Some(v) = self.originals.get(&(key_side, tri[i])) {
                    return *v;
                }
                let vid = self.mesh.append_vertex(positions[i]);
                if d[i] == 0.0 {
                    self.on_plane.insert(vid, side);
                }
                self.originals.insert((key_side, tri[i]), vid);
                vid
            },
            CornerSource::Split { lo, hi, edge, t } => {
                if let Some(v) = self.splits.get(&(side, edge)) {
                    return *v;
                }
                let p = positions[lo] + (positions[hi] - positions[lo]) * t;
                let vid = self.mesh.append_vertex(p);
                self.on_plane.insert(vid, side);
                self.splits.insert((side, edge), vid);
                vid
            },
        }
    }

    fn copy_overlays(&mut self, source: &DynamicMesh, from: TriangleId, to: TriangleId, corners: [CornerSource; 3]) -> MeshResult<()> {
        let (Some(src), Some(dst)) = (source.attributes(), self.mesh.attributes_mut()) else {
            return Ok(());
        };
        let caches = &mut self.element_caches;
        let lerp3 = |a: Vector3<Real>, b: Vector3<Real>, t: Real| {
            let n = a + (b - a) * t;
            n.try_normalize(EPSILON).unwrap_or(a)
        };
        cut_overlay(src.normals(), dst.normals_mut(), &mut caches[0], from, to, &corners, lerp3)?;
        for layer in 0..src.num_uv_layers().min(dst.num_uv_layers()) {
            if let (Some(s), Some(d), Some(cache)) = (src.uv_layer(layer), dst.uv_layer_mut(layer), caches.get_mut(1 + layer)) {
                cut_overlay(s, d, cache, from, to, &corners, |a, b, t| a + (b - a) * t)?;
            }
        }
        if let (Some(s), Some(d), Some(cache)) = (src.colors(), dst.colors_mut(), caches.last_mut()) {
            cut_overlay(s, d, cache, from, to, &corners, |a, b, t| a + (b - a) * t)?;
        }
        Ok(())
    }
}

fn cut_overlay<T: Copy>(
    source: &Overlay<T>,
    dest: &mut Overlay<T>,
    cache: &mut ElementCache,
    from: TriangleId,
    to: TriangleId,
    corners: &[CornerSource; 3],
    lerp: impl Fn(T, T, Real) -> T,
) -> MeshResult<()> {
    let Some(elements) = source.tri_elements(from) else {
        return Ok(());
    };
    let value = |e: ElementId| source.element(e).ok_or(MeshError::InvalidElement(e));
    let mut mapped = [ElementId(0); 3];
    for (slot, corner) in mapped.iter_mut().zip(corners) {
        *slot = match *corner {
            CornerSource::Original(i) => {
                let e = elements[i];
                match cache.get(&ElementKey::Original(e)) {
                    Some(id) => *id,
                    None => {
                        let id = dest.append_element(value(e)?);
                        cache.insert(ElementKey::Original(e), id);
                        id
                    },
                }
            },
            CornerSource::Split { lo, hi, edge, t } => {
                let key = ElementKey::Split(elements[lo], elements[hi], edge);
                match cache.get(&key) {
                    Some(id) => *id,
                    None => {
                        let id = dest.append_element(lerp(value(elements[lo])?, value(elements[hi])?, t));
                        cache.insert(key, id);
                        id
                    },
                }
            },
        };
    }
    dest.set_triangle(to, mapped)
}

/// Cut `mesh` and keep the part behind the plane (plus the front part if
/// `options.keep_both_halves`). Labels are `0` behind and `1` in front.
pub fn simple_plane_cut(
    mesh: &DynamicMesh,
    origin: Point3<Real>,
    normal: Vector3<Real>,
    options: PlaneCutOptions,
) -> MeshResult<CutResult> {
    PlaneCutter::new(origin, normal)?.with_options(options).cut(mesh)
}

/// Cut that keeps both halves, preserves existing sub-object labels, caps the
/// cut with labels taken from the adjacent surface and tags the original
/// surface as shell, so caps can be told apart downstream.
pub fn advanced_plane_cut(
    mesh: &DynamicMesh,
    origin: Point3<Real>,
    normal: Vector3<Real>,
    uv_scale: Real,
) -> MeshResult<CutResult> {
    let options = PlaneCutOptions {
        fill_holes: true,
        keep_both_halves: true,
        mark_shell: true,
        uv_scale,
        ..Default::default()
    };
    PlaneCutter::new(origin, normal)?
        .with_options(options)
        .preserving_labels()
        .cut(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{BoxGenerator, MeshGenerator, SphereGenerator};

    fn unit_cube() -> DynamicMesh {
        BoxGenerator::new(Vector3::new(0.5, 0.5, 0.5)).generate().unwrap()
    }

    #[test]
    fn simple_cut_keeps_the_back_half_capped() {
        let cube = unit_cube();
        let result = simple_plane_cut(&cube, Point3::origin(), Vector3::z(), PlaneCutOptions::default()).unwrap();
        assert_eq!(result.pieces.len(), 1);
        assert_eq!(result.filled_loops, 1);
        let half = &result.pieces[0];
        assert!(half.is_closed());
        assert!((half.volume() - 0.5).abs() < 1e-9);
        assert!(half.bounds().maxs.z <= 1e-9);
        // the input is untouched
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.attributes().unwrap().is_clean());
    }

    #[test]
    fn keeping_both_halves_with_gap() {
        let options = PlaneCutOptions {
            keep_both_halves: true,
            gap_width: 0.2,
            ..Default::default()
        };
        let result = simple_plane_cut(&unit_cube(), Point3::new(0.0, 0.0, 0.25), Vector3::z(), options).unwrap();
        assert_eq!(result.pieces.len(), 2);
        let (back, front) = (&result.pieces[0], &result.pieces[1]);
        assert!((back.volume() - 0.75).abs() < 1e-9);
        assert!((front.volume() - 0.25).abs() < 1e-9);
        assert!((back.bounds().maxs.z - 0.15).abs() < 1e-9);
        assert!((front.bounds().mins.z - 0.35).abs() < 1e-9);
        for piece in &result.pieces {
            assert!(piece.is_closed());
            assert!(!piece.attributes().unwrap().has_tag::<SubObjectId>());
        }
    }

    #[test]
    fn advanced_cut_marks_caps_as_not_shell() {
        let sphere = SphereGenerator::new(1.0).with_uniform_tessellation(12).generate().unwrap();
        let result = advanced_plane_cut(&sphere, Point3::new(0.0, 0.0, 0.1), Vector3::new(0.0, 0.3, 1.0), 0.5).unwrap();
        assert_eq!(result.pieces.len(), 2);
        assert_eq!(result.failed_loops, 0);
        let total: Real = result.pieces.iter().map(DynamicMesh::volume).sum();
        assert!((total - sphere.volume()).abs() < 1e-6);
        for piece in &result.pieces {
            assert!(piece.is_closed());
            let shell = piece.attributes().unwrap().tag::<IsShell>().unwrap();
            let caps: Vec<_> = piece.triangle_ids().filter(|t| !shell.get(*t)).collect();
            assert!(!caps.is_empty());
            // every cap triangle lies on the plane
            let cutter = PlaneCutter::new(Point3::new(0.0, 0.0, 0.1), Vector3::new(0.0, 0.3, 1.0)).unwrap();
            for t in caps {
                for p in piece.triangle_positions(t).unwrap() {
                    assert!(cutter.signed_distance(&p).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn cut_missing_the_mesh_returns_it_whole() {
        let result = simple_plane_cut(&unit_cube(), Point3::new(0.0, 0.0, 5.0), Vector3::z(), PlaneCutOptions::default()).unwrap();
        assert_eq!(result.pieces.len(), 1);
        assert_eq!(result.pieces[0].triangle_count(), 12);
        assert_eq!(result.filled_loops, 0);
    }

    #[test]
    fn cut_removing_everything_yields_no_pieces() {
        let result = simple_plane_cut(&unit_cube(), Point3::new(0.0, 0.0, -5.0), Vector3::z(), PlaneCutOptions::default()).unwrap();
        assert!(result.pieces.is_empty());
    }

    #[test]
    fn uvs_are_interpolated_along_cut_edges() {
        let cube = unit_cube();
        let result = simple_plane_cut(&cube, Point3::origin(), Vector3::x(), PlaneCutOptions::default()).unwrap();
        let half = &result.pieces[0];
        let uvs = half.attributes().unwrap().primary_uv();
        for tid in half.triangle_ids() {
            let values = uvs.tri_values(tid).unwrap();
            assert!(values.iter().all(|uv| uv.iter().all(|c| c.is_finite())));
        }
    }

    #[test]
    fn zero_normal_is_rejected() {
        assert!(PlaneCutter::new(Point3::origin(), Vector3::zeros()).is_err());
    }
}
