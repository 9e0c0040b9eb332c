//! Boolean combination of two closed meshes.
//!
//! The polygons of both operands go through the classic BSP clip sequence.
//! Fragments are then welded back into an indexed mesh: coincident corners
//! are merged, T-junctions left by one-sided splits are closed by inserting
//! the stray vertex into the longer edge, and every fragment is fanned into
//! triangles. Per-triangle data (groups, material IDs, polygroup layers and
//! tags) is copied from the source triangle of each fragment, UVs are
//! interpolated.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::parry3d::bounding_volume::{Aabb, BoundingVolume};
use crate::float_types::{Real, tolerance};
use crate::mesh::tags::copy_tag_values;
use crate::mesh::{DynamicMesh, ElementId, GroupId, NormalsMode, TriangleId, VertexId};
use crate::ops::bsp::{BspPolygon, Node, PolygonOrigin, mesh_polygons};
use hashbrown::HashMap;
use nalgebra::{Affine3, Point3, Vector2};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Difference,
    Intersection,
}

/// Split polygons into those touching `bounds` and those that cannot
/// interact with the other operand.
fn partition_polygons(polygons: Vec<BspPolygon>, bounds: &Aabb) -> (Vec<BspPolygon>, Vec<BspPolygon>) {
    polygons.into_iter().partition(|p| {
        let mut aabb = Aabb::new_invalid();
        p.vertices.iter().for_each(|v| aabb.take_point(v.pos));
        aabb.intersects(&bounds.loosened(tolerance()))
    })
}

/// Combine `a` with `b`, where `b_to_a` maps `b`'s local frame into `a`'s.
///
/// `b` is copied before it is transformed; neither input is modified. Both
/// operands must be closed. The result carries the facets of both inputs
/// and per-vertex normals.
pub fn boolean(a: &DynamicMesh, b: &DynamicMesh, b_to_a: &Affine3<Real>, op: BooleanOp) -> MeshResult<DynamicMesh> {
    if a.is_empty() || b.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    if !a.is_closed() || !b.is_closed() {
        warn!(?op, "boolean input is not closed");
        return Err(MeshError::BooleanFailed("boolean inputs must be closed".into()));
    }
    let mut b_local = b.clone();
    b_local.transform(b_to_a);

    let (a_clip, a_passthru) = partition_polygons(mesh_polygons(a, 0), &b_local.bounds());
    let (b_clip, b_passthru) = partition_polygons(mesh_polygons(&b_local, 1), &a.bounds());
    let mut na = Node::from_polygons(&a_clip);
    let mut nb = Node::from_polygons(&b_clip);

    let polygons = match op {
        BooleanOp::Union => {
            na.clip_to(&nb);
            nb.clip_to(&na);
            nb.invert();
            nb.clip_to(&na);
            nb.invert();
            na.build(&nb.all_polygons());
            let mut out = na.all_polygons();
            out.extend(a_passthru);
            out.extend(b_passthru);
            out
        },
        BooleanOp::Difference => {
            na.invert();
            na.clip_to(&nb);
            nb.clip_to(&na);
            nb.invert();
            nb.clip_to(&na);
            nb.invert();
            na.build(&nb.all_polygons());
            na.invert();
            let mut out = na.all_polygons();
            out.extend(a_passthru);
            out
        },
        BooleanOp::Intersection => {
            na.invert();
            nb.clip_to(&na);
            nb.invert();
            na.clip_to(&nb);
            nb.clip_to(&na);
            na.build(&nb.all_polygons());
            na.invert();
            na.all_polygons()
        },
    };
    debug!(?op, fragments = polygons.len(), "bsp clipping finished");

    let mut result = polygons_to_mesh(&polygons, [a, &b_local])?;
    result.recompute_normals(NormalsMode::PerVertex);
    if !result.is_empty() && !result.is_closed() {
        warn!(?op, boundary_edges = result.boundary_edges().len(), "boolean result is not closed");
    }
    info!(
        ?op,
        triangles_a = a.triangle_count(),
        triangles_b = b.triangle_count(),
        triangles = result.triangle_count(),
        "boolean finished"
    );
    Ok(result)
}

/// Merges points closer than the weld distance.
struct Welder {
    cell: Real,
    grid: HashMap<[i64; 3], Vec<usize>>,
    points: Vec<Point3<Real>>,
}

impl Welder {
    fn new(cell: Real) -> Self {
        Self {
            cell,
            grid: HashMap::new(),
            points: Vec::new(),
        }
    }

    fn key(&self, p: &Point3<Real>) -> [i64; 3] {
        [p.x, p.y, p.z].map(|c| (c / self.cell).floor() as i64)
    }

    fn insert(&mut self, p: Point3<Real>) -> usize {
        let [x, y, z] = self.key(&p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = self.grid.get(&[x + dx, y + dy, z + dz]) else {
                        continue;
                    };
                    if let Some(&i) = bucket.iter().find(|&&i| (self.points[i] - p).norm() <= self.cell) {
                        return i;
                    }
                }
            }
        }
        let index = self.points.len();
        self.points.push(p);
        self.grid.entry([x, y, z]).or_default().push(index);
        index
    }
}

/// Welded fragment: corner indices with their UVs.
struct Fragment {
    corners: Vec<(usize, Vector2<Real>)>,
    origin: PolygonOrigin,
}

fn weld(polygons: &[BspPolygon], welder: &mut Welder) -> Vec<Fragment> {
    polygons
        .iter()
        .filter_map(|polygon| {
            let mut corners: Vec<(usize, Vector2<Real>)> = Vec::with_capacity(polygon.vertices.len());
            for v in &polygon.vertices {
                let index = welder.insert(v.pos);
                if corners.last().is_none_or(|(last, _)| *last != index) {
                    corners.push((index, v.uv));
                }
            }
            while corners.len() > 1 && corners.first().map(|c| c.0) == corners.last().map(|c| c.0) {
                corners.pop();
            }
            (corners.len() >= 3).then_some(Fragment {
                corners,
                origin: polygon.origin,
            })
        })
        .collect()
}

/// Insert vertices that sit on the interior of an unmatched edge into that
/// edge, so both sides of every seam use the same vertices.
fn resolve_t_junctions(fragments: &mut [Fragment], points: &[Point3<Real>], distance: Real) -> usize {
    let mut directed: HashMap<(usize, usize), usize> = HashMap::new();
    for f in fragments.iter() {
        let n = f.corners.len();
        for i in 0..n {
            *directed.entry((f.corners[i].0, f.corners[(i + 1) % n].0)).or_default() += 1;
        }
    }
    let unmatched = |a: usize, b: usize| !directed.contains_key(&(b, a));
    let mut candidates: Vec<usize> = directed
        .keys()
        .filter(|(a, b)| unmatched(*a, *b))
        .flat_map(|&(a, b)| [a, b])
        .collect();
    candidates.sort_unstable();
    candidates.dedup();
    if candidates.is_empty() {
        return 0;
    }

    let mut inserted = 0;
    for f in fragments.iter_mut() {
        let n = f.corners.len();
        let mut rebuilt = Vec::with_capacity(n);
        for i in 0..n {
            let (a, uv_a) = f.corners[i];
            let (b, uv_b) = f.corners[(i + 1) % n];
            rebuilt.push((a, uv_a));
            if !unmatched(a, b) {
                continue;
            }
            let (pa, pb) = (points[a], points[b]);
            let edge = pb - pa;
            let length_sq = edge.norm_squared();
            if length_sq <= distance * distance {
                continue;
            }
            let mut on_edge: Vec<(Real, usize)> = candidates
                .iter()
                .filter(|&&c| c != a && c != b)
                .filter_map(|&c| {
                    let t = (points[c] - pa).dot(&edge) / length_sq;
                    let off = (pa + edge * t - points[c]).norm();
                    let margin = distance / length_sq.sqrt();
                    (t > margin && t < 1.0 - margin && off <= distance).then_some((t, c))
                })
                .collect();
            on_edge.sort_by(|x, y| x.0.total_cmp(&y.0));
            inserted += on_edge.len();
            rebuilt.extend(on_edge.into_iter().map(|(t, c)| (c, uv_a + (uv_b - uv_a) * t)));
        }
        f.corners = rebuilt;
    }
    inserted
}

/// Fan a convex loop. Loops with collinear corners are fanned from their
/// centroid, which is appended to `points`.
fn triangulate_fragment(fragment: &Fragment, points: &mut Vec<Point3<Real>>) -> Vec<[(usize, Vector2<Real>); 3]> {
    let c = &fragment.corners;
    let n = c.len();
    if n == 3 {
        return vec![[c[0], c[1], c[2]]];
    }
    let collinear = (0..n).any(|i| {
        let (p, q, r) = (points[c[(i + n - 1) % n].0], points[c[i].0], points[(c[(i + 1) % n]).0]);
        let (u, v) = (q - p, r - q);
        u.cross(&v).norm() <= Real::EPSILON.sqrt() * u.norm() * v.norm()
    });
    if !collinear {
        return (1..n - 1).map(|i| [c[0], c[i], c[i + 1]]).collect();
    }

    let center = c.iter().fold(Point3::origin().coords, |acc, (i, _)| acc + points[*i].coords) / n as Real;
    let center_uv = c.iter().fold(Vector2::zeros(), |acc, (_, uv)| acc + uv) / n as Real;
    points.push(Point3::from(center));
    let hub = (points.len() - 1, center_uv);
    (0..n).map(|i| [hub, c[i], c[(i + 1) % n]]).collect()
}

fn max_group(mesh: &DynamicMesh) -> Option<GroupId> {
    mesh.triangle_ids().filter_map(|t| mesh.triangle_group(t)).max()
}

/// Copy groups, material IDs, polygroup layers and tags of `from` in
/// `source` onto `to` in `dest`.
pub(crate) fn copy_triangle_data(
    source: &DynamicMesh,
    from: TriangleId,
    dest: &mut DynamicMesh,
    to: TriangleId,
    group_offset: GroupId,
) -> MeshResult<()> {
    if dest.has_triangle_groups() {
        let group = source.triangle_group(from).map_or(0, |g| g + group_offset);
        dest.set_triangle_group(to, group)?;
    }
    let (Some(src), Some(dst)) = (source.attributes(), dest.attributes_mut()) else {
        return Ok(());
    };
    if let (Some(s), Some(d)) = (src.material_ids(), dst.material_ids_mut()) {
        d.set(to, s.get(from));
    }
    for layer in 0..src.num_polygroup_layers() {
        if let (Some(s), Some(d)) = (src.polygroup_layer(layer), dst.polygroup_layer_mut(layer)) {
            d.set(to, s.get(from));
        }
    }
    copy_tag_values(src.tags(), from, dst.tags_mut(), to);
    Ok(())
}

fn polygons_to_mesh(polygons: &[BspPolygon], sources: [&DynamicMesh; 2]) -> MeshResult<DynamicMesh> {
    let weld_distance = tolerance();
    let mut welder = Welder::new(weld_distance);
    let mut fragments = weld(polygons, &mut welder);
    let mut points = welder.points;
    let inserted = resolve_t_junctions(&mut fragments, &points, weld_distance);

    let mut mesh = DynamicMesh::new();
    if sources.iter().any(|s| s.has_triangle_groups()) {
        mesh.enable_triangle_groups();
    }
    mesh.enable_attributes();
    if let Some(attributes) = mesh.attributes_mut() {
        for source in sources {
            if let Some(other) = source.attributes() {
                attributes.enable_matching(other);
            }
        }
    }
    let group_offsets = [0, max_group(sources[0]).map_or(0, |g| g + 1)];

    let triangles: Vec<_> = fragments
        .iter()
        .flat_map(|f| {
            triangulate_fragment(f, &mut points)
                .into_iter()
                .map(|t| (t, f.origin))
                .collect::<Vec<_>>()
        })
        .collect();
    let vertices: Vec<VertexId> = points.iter().map(|p| mesh.append_vertex(*p)).collect();

    let mut uv_elements: HashMap<(usize, [i64; 2]), ElementId> = HashMap::new();
    let mut rejected = 0;
    for (corners, origin) in triangles {
        let tid = match mesh.append_triangle(corners.map(|(i, _)| vertices[i]), 0) {
            Ok(tid) => tid,
            Err(err) => {
                debug!(%err, "dropping boolean fragment triangle");
                rejected += 1;
                continue;
            },
        };
        if let Some(attributes) = mesh.attributes_mut() {
            let uvs = attributes.primary_uv_mut();
            let elements = corners.map(|(i, uv)| {
                let key = (i, [uv.x, uv.y].map(|c| (c / weld_distance).round() as i64));
                *uv_elements.entry(key).or_insert_with(|| uvs.append_element(uv))
            });
            uvs.set_triangle(tid, elements)?;
        }
        if let Some(from) = origin.triangle {
            copy_triangle_data(sources[origin.operand], from, &mut mesh, tid, group_offsets[origin.operand])?;
        }
    }
    mesh.remove_unused_vertices();

    if rejected > 0 {
        warn!(rejected, "boolean produced non-manifold fragments");
        return Err(MeshError::BooleanFailed(format!("{rejected} fragment triangles could not be stitched")));
    }
    debug!(inserted, vertices = mesh.vertex_count(), "welded boolean fragments");
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{BoxGenerator, MeshGenerator, SphereGenerator};
    use crate::mesh::IsShell;
    use nalgebra::{Translation3, Vector3};

    fn unit_cube() -> DynamicMesh {
        BoxGenerator::new(Vector3::new(0.5, 0.5, 0.5)).generate().unwrap()
    }

    fn offset(x: Real, y: Real, z: Real) -> Affine3<Real> {
        nalgebra::convert(Translation3::new(x, y, z))
    }

    #[test]
    fn union_of_overlapping_cubes() {
        let cube = unit_cube();
        let result = boolean(&cube, &cube, &offset(0.5, 0.5, 0.5), BooleanOp::Union).unwrap();
        assert!(result.is_closed());
        let volume = result.volume();
        assert!((volume - 1.875).abs() < 1e-6, "volume {volume}");
    }

    #[test]
    fn difference_and_intersection_volumes() {
        let cube = unit_cube();
        let shift = offset(0.5, 0.0, 0.0);
        let difference = boolean(&cube, &cube, &shift, BooleanOp::Difference).unwrap();
        assert!((difference.volume() - 0.5).abs() < 1e-6);
        assert!(difference.is_closed());

        let intersection = boolean(&cube, &cube, &shift, BooleanOp::Intersection).unwrap();
        assert!((intersection.volume() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn disjoint_union_keeps_both() {
        let cube = unit_cube();
        let result = boolean(&cube, &cube, &offset(3.0, 0.0, 0.0), BooleanOp::Union).unwrap();
        assert_eq!(result.triangle_count(), 24);
        assert!((result.volume() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn open_input_is_rejected_without_side_effects() {
        let cube = unit_cube();
        let mut open = unit_cube();
        open.remove_triangle(TriangleId(0), true).unwrap();
        let before = open.change_stamp();
        assert!(matches!(
            boolean(&open, &cube, &Affine3::identity(), BooleanOp::Union),
            Err(MeshError::BooleanFailed(_))
        ));
        assert_eq!(open.change_stamp(), before);
    }

    #[test]
    fn tags_follow_their_source_triangles() {
        let mut cube = unit_cube();
        if let Some(attributes) = cube.attributes_mut() {
            attributes.attach_tag::<IsShell>(true);
        }
        let sphere = SphereGenerator::new(0.4).with_tessellation(8, 8).generate().unwrap();
        let result = boolean(&cube, &sphere, &offset(0.5, 0.0, 0.0), BooleanOp::Difference).unwrap();
        let shell = result.attributes().unwrap().tag::<IsShell>().unwrap();
        let from_cube = result.triangle_ids().filter(|t| shell.get(*t)).count();
        let from_sphere = result.triangle_ids().filter(|t| !shell.get(*t)).count();
        assert!(from_cube > 0 && from_sphere > 0);
    }
}
