//! Hole detection and filling.
//!
//! Each closed boundary loop is projected onto its best-fit plane and ear
//! clipped. Loops that are degenerate, self-intersecting or cannot be
//! clipped are left open and counted as failed; the rest of the holes are
//! still filled.

use crate::errors::MeshResult;
use crate::float_types::Real;
use crate::generators::point_triangle::point_in_triangle_2d;
use crate::mesh::{DynamicMesh, ElementId, SubObjectId, TriangleId, VertexId};
use crate::ops::boundary::{BoundaryLoop, boundary_loops};
use nalgebra::{Point2, Point3, Vector3, Vector4};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoleFillOptions {
    /// Skip loops with more edges than this; 0 means no limit
    pub max_edges: usize,
    /// Remove triangles whose three edges are all boundary after filling
    pub remove_isolated_triangles: bool,
}

impl Default for HoleFillOptions {
    fn default() -> Self {
        Self {
            max_edges: 0,
            remove_isolated_triangles: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoleFillReport {
    pub filled: usize,
    pub failed: usize,
    pub new_triangles: usize,
    pub removed_isolated: usize,
}

/// Fill the holes of a copy of `mesh`.
pub fn fill_holes(mesh: &DynamicMesh, options: HoleFillOptions) -> MeshResult<(DynamicMesh, HoleFillReport)> {
    let mut result = mesh.clone();
    let mut report = HoleFillReport::default();

    let closed = boundary_loops(mesh).into_iter().filter(|l| l.closed);
    fill_boundary_loops(&mut result, closed, &options, &mut report);

    if options.remove_isolated_triangles {
        let isolated: Vec<TriangleId> = result
            .triangle_ids()
            .filter(|t| result.triangle_neighbours(*t).is_empty())
            .collect();
        for tid in isolated {
            result.remove_triangle(tid, true)?;
            report.removed_isolated += 1;
        }
    }

    info!(
        filled = report.filled,
        failed = report.failed,
        new_triangles = report.new_triangles,
        removed_isolated = report.removed_isolated,
        "hole filling finished"
    );
    Ok((result, report))
}

/// Fill each loop in turn. A loop that cannot be filled is counted as failed
/// and leaves the mesh as it was.
fn fill_boundary_loops(
    mesh: &mut DynamicMesh,
    loops: impl IntoIterator<Item = BoundaryLoop>,
    options: &HoleFillOptions,
    report: &mut HoleFillReport,
) {
    for boundary in loops {
        if options.max_edges > 0 && boundary.edge_count() > options.max_edges {
            debug!(edges = boundary.edge_count(), "skipping hole above edge limit");
            continue;
        }
        match fill_loop(mesh, &boundary) {
            Some(count) => {
                report.filled += 1;
                report.new_triangles += count;
            },
            None => {
                warn!(edges = boundary.edge_count(), "failed to fill hole");
                report.failed += 1;
            },
        }
    }
}

/// Newell normal of a closed polygon.
fn polygon_normal(points: &[Point3<Real>]) -> Vector3<Real> {
    let n = points.len();
    (0..n).fold(Vector3::zeros(), |acc, i| {
        let (p, q) = (points[i], points[(i + 1) % n]);
        acc + Vector3::new(
            (p.y - q.y) * (p.z + q.z),
            (p.z - q.z) * (p.x + q.x),
            (p.x - q.x) * (p.y + q.y),
        )
    })
}

/// Project onto the plane with normal `normal`, keeping handedness.
fn project(points: &[Point3<Real>], normal: &Vector3<Real>) -> Vec<Point2<Real>> {
    let helper = if normal.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    let u = helper.cross(normal).normalize();
    let v = normal.cross(&u);
    points.iter().map(|p| Point2::new(p.coords.dot(&u), p.coords.dot(&v))).collect()
}

fn segments_cross(a: &Point2<Real>, b: &Point2<Real>, c: &Point2<Real>, d: &Point2<Real>) -> bool {
    let orient = |p: &Point2<Real>, q: &Point2<Real>, r: &Point2<Real>| (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);
    let (d1, d2) = (orient(c, d, a), orient(c, d, b));
    let (d3, d4) = (orient(a, b, c), orient(a, b, d));
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

fn self_intersects(points: &[Point2<Real>]) -> bool {
    let n = points.len();
    (0..n).any(|i| {
        ((i + 2)..n)
            .filter(|&j| (j + 1) % n != i)
            .any(|j| segments_cross(&points[i], &points[(i + 1) % n], &points[j], &points[(j + 1) % n]))
    })
}

/// Ear clipping of a simple counter-clockwise polygon. `None` when no ear
/// can be found.
pub(crate) fn ear_clip(points: &[Point2<Real>]) -> Option<Vec<[usize; 3]>> {
    let mut remaining: Vec<usize> = (0..points.len()).collect();
    let mut triangles = Vec::with_capacity(points.len().saturating_sub(2));
    while remaining.len() > 3 {
        let m = remaining.len();
        let ear = (0..m).find(|&i| {
            let (prev, curr, next) = (remaining[(i + m - 1) % m], remaining[i], remaining[(i + 1) % m]);
            let (a, b, c) = (&points[prev], &points[curr], &points[next]);
            let convex = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x) > 0.0;
            convex
                && remaining
                    .iter()
                    .filter(|&&k| k != prev && k != curr && k != next)
                    .all(|&k| !point_in_triangle_2d(&points[k], a, b, c))
        })?;
        let (prev, curr, next) = (remaining[(ear + m - 1) % m], remaining[ear], remaining[(ear + 1) % m]);
        triangles.push([prev, curr, next]);
        remaining.remove(ear);
    }
    triangles.push([remaining[0], remaining[1], remaining[2]]);
    Some(triangles)
}

/// Fill one loop in place. Returns the number of new triangles.
fn fill_loop(mesh: &mut DynamicMesh, boundary: &BoundaryLoop) -> Option<usize> {
    if !boundary.is_fillable() {
        return None;
    }
    // the patch runs against the boundary direction
    let vertices: Vec<VertexId> = boundary.vertices.iter().rev().copied().collect();
    let positions: Vec<Point3<Real>> = vertices.iter().map(|v| mesh.vertex(*v)).collect::<Option<_>>()?;
    let normal = polygon_normal(&positions).try_normalize(Real::EPSILON)?;
    let flat = project(&positions, &normal);
    if self_intersects(&flat) {
        return None;
    }
    let triangles = ear_clip(&flat)?;

    let label = mesh
        .edge_triangles(boundary.vertices[0], boundary.vertices[1])
        .first()
        .copied()
        .and_then(|t| Some(mesh.attributes()?.tag::<SubObjectId>()?.get(t)));
    let group = mesh.has_triangle_groups().then(|| mesh.allocate_group()).unwrap_or(0);

    let mut added: Vec<TriangleId> = Vec::with_capacity(triangles.len());
    let result = (|| -> MeshResult<()> {
        for &[a, b, c] in &triangles {
            added.push(mesh.append_triangle([vertices[a], vertices[b], vertices[c]], group)?);
        }
        let Some(attributes) = mesh.attributes_mut() else {
            return Ok(());
        };
        let normal_element = attributes.normals_mut().append_element(normal);
        // planar projection onto the patch plane for every UV layer
        for layer in 0..attributes.num_uv_layers() {
            if let Some(uvs) = attributes.uv_layer_mut(layer) {
                let elements: Vec<ElementId> = flat.iter().map(|p| uvs.append_element(p.coords)).collect();
                for (&tid, &[a, b, c]) in added.iter().zip(&triangles) {
                    uvs.set_triangle(tid, [elements[a], elements[b], elements[c]])?;
                }
            }
        }
        if let Some(colors) = attributes.colors_mut() {
            let white = colors.append_element(Vector4::repeat(1.0));
            for &tid in &added {
                colors.set_triangle(tid, [white; 3])?;
            }
        }
        for &tid in &added {
            attributes.normals_mut().set_triangle(tid, [normal_element; 3])?;
            if let (Some(label), Some(tags)) = (label, attributes.tag_mut::<SubObjectId>()) {
                tags.set(tid, label);
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => Some(added.len()),
        Err(err) => {
            debug!(%err, "hole patch rejected, rolling back");
            for tid in added {
                let removed = mesh.remove_triangle(tid, false);
                debug_assert!(removed.is_ok(), "rolled back patch triangle was live");
            }
            None
        },
    }
}
