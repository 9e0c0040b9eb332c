//! Iso-surface extraction from an implicit scalar field.
//!
//! Every grid cell is split into six tetrahedra around its main diagonal and
//! each tetrahedron is polygonized on its own, so the output has no
//! ambiguous cases and neighbouring cells agree on shared faces. Crossing
//! points are refined by a fixed number of bisection steps on the field
//! itself.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::Aabb;
use crate::generators::MeshGenerator;
use crate::mesh::{DynamicMesh, NormalsMode, VertexId};
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Upper bound on cells along one axis.
pub const MAX_CELLS_PER_AXIS: usize = 512;

/// Field samples are clamped to this magnitude; NaN counts as outside.
const FIELD_LIMIT: Real = 1e10;

const CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// Six tetrahedra sharing the 0–6 diagonal.
const TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 5, 1, 6],
    [0, 1, 2, 6],
    [0, 2, 3, 6],
    [0, 3, 7, 6],
    [0, 7, 4, 6],
    [0, 4, 5, 6],
];

/// Grid edge between two lattice points, smaller index first.
type LatticeEdge = (usize, usize);

fn sanitize(value: Real) -> Real {
    if value.is_nan() {
        -FIELD_LIMIT
    } else {
        value.clamp(-FIELD_LIMIT, FIELD_LIMIT)
    }
}

pub struct MarchingCubes<F> {
    implicit: F,
    bounds: Aabb,
    cube_size: Real,
    iso_value: Real,
    root_steps: usize,
    parallel: bool,
}

impl<F> MarchingCubes<F>
where
    F: Fn(&Point3<Real>) -> Real + Sync,
{
    /// Points where `implicit(p) > iso_value` are inside.
    pub fn new(implicit: F, bounds: Aabb, cube_size: Real) -> Self {
        Self {
            implicit,
            bounds,
            cube_size,
            iso_value: 0.0,
            root_steps: 4,
            parallel: true,
        }
    }

    pub fn with_iso_value(mut self, iso_value: Real) -> Self {
        self.iso_value = iso_value;
        self
    }

    /// Bisection steps per crossing edge.
    pub fn with_root_steps(mut self, steps: usize) -> Self {
        self.root_steps = steps;
        self
    }

    /// Evaluate cells on the rayon pool. Has no effect without the
    /// `parallel` feature; results are identical either way.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn sample(&self, p: &Point3<Real>) -> Real {
        sanitize((self.implicit)(p))
    }

    /// Fixed-step bisection on `[a, b]`, finished by linear interpolation
    /// within the last bracket.
    fn find_root(&self, mut a: Point3<Real>, mut fa: Real, mut b: Point3<Real>, mut fb: Real) -> Point3<Real> {
        let iso = self.iso_value;
        for _ in 0..self.root_steps {
            let mid = Point3::from((a.coords + b.coords) * 0.5);
            let fm = self.sample(&mid);
            if (fm > iso) == (fa > iso) {
                a = mid;
                fa = fm;
            } else {
                b = mid;
                fb = fm;
            }
        }
        let t = if (fb - fa).abs() > Real::EPSILON {
            ((iso - fa) / (fb - fa)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        a + (b - a) * t
    }
}

struct Grid {
    origin: Point3<Real>,
    step: Vector3<Real>,
    cells: [usize; 3],
}

impl Grid {
    fn points(&self) -> [usize; 3] {
        self.cells.map(|c| c + 1)
    }

    fn point_count(&self) -> usize {
        self.points().iter().product()
    }

    fn cell_count(&self) -> usize {
        self.cells.iter().product()
    }

    fn linear(&self, [i, j, k]: [usize; 3]) -> usize {
        let [px, py, _] = self.points();
        i + px * (j + py * k)
    }

    fn lattice(&self, index: usize) -> [usize; 3] {
        let [px, py, _] = self.points();
        [index % px, (index / px) % py, index / (px * py)]
    }

    fn position(&self, index: usize) -> Point3<Real> {
        let [i, j, k] = self.lattice(index);
        self.origin + self.step.component_mul(&Vector3::new(i as Real, j as Real, k as Real))
    }
}

/// Triangles of one cell as lattice edges, oriented so each normal points
/// away from the inside corners of its tetrahedron.
fn polygonize_cell(grid: &Grid, values: &[Real], iso: Real, cell: usize) -> Vec<[LatticeEdge; 3]> {
    let [cx, cy, cz] = [
        cell % grid.cells[0],
        (cell / grid.cells[0]) % grid.cells[1],
        cell / (grid.cells[0] * grid.cells[1]),
    ];
    let corner = |c: usize| grid.linear([cx + CORNERS[c][0], cy + CORNERS[c][1], cz + CORNERS[c][2]]);
    let edge = |a: usize, b: usize| (a.min(b), a.max(b));
    let crossing = |(a, b): LatticeEdge| {
        let (fa, fb) = (values[a], values[b]);
        let t = if (fb - fa).abs() > Real::EPSILON {
            ((iso - fa) / (fb - fa)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let (pa, pb) = (grid.position(a), grid.position(b));
        pa + (pb - pa) * t
    };

    let mut out = Vec::new();
    for tet in TETRAHEDRA {
        let ids = tet.map(corner);
        let (inside, outside): (Vec<usize>, Vec<usize>) = ids.iter().partition(|&&v| values[v] > iso);
        let loops: Vec<[LatticeEdge; 3]> = match (inside.as_slice(), outside.as_slice()) {
            ([i], [o1, o2, o3]) => vec![[edge(*i, *o1), edge(*i, *o2), edge(*i, *o3)]],
            ([i1, i2, i3], [o]) => vec![[edge(*o, *i1), edge(*o, *i2), edge(*o, *i3)]],
            ([i1, i2], [o1, o2]) => {
                let quad = [edge(*i1, *o1), edge(*i1, *o2), edge(*i2, *o2), edge(*i2, *o1)];
                vec![[quad[0], quad[1], quad[2]], [quad[0], quad[2], quad[3]]]
            },
            _ => continue,
        };

        let inside_center = inside
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + grid.position(*v).coords)
            / inside.len() as Real;
        for mut tri in loops {
            let [a, b, c] = tri.map(crossing);
            let normal = (b - a).cross(&(c - a));
            let center = (a.coords + b.coords + c.coords) / 3.0;
            if normal.dot(&(center - inside_center)) < 0.0 {
                tri.swap(1, 2);
            }
            out.push(tri);
        }
    }
    out
}

impl<F> MeshGenerator for MarchingCubes<F>
where
    F: Fn(&Point3<Real>) -> Real + Sync,
{
    fn generate(self) -> MeshResult<DynamicMesh> {
        if !(self.cube_size.is_finite() && self.cube_size > 0.0) {
            return Err(MeshError::Other(format!("cube size must be positive, got {}", self.cube_size)));
        }
        let extents = self.bounds.extents();
        if !(extents.iter().all(|e| e.is_finite() && *e >= 0.0)) {
            return Err(MeshError::Other("marching cubes bounds are invalid".into()));
        }

        let cells = [0, 1, 2].map(|i| {
            let wanted = (extents[i] / self.cube_size).ceil().max(1.0) as usize;
            if wanted > MAX_CELLS_PER_AXIS {
                warn!(axis = i, wanted, limit = MAX_CELLS_PER_AXIS, "clamping marching cubes grid");
            }
            wanted.min(MAX_CELLS_PER_AXIS)
        });
        let grid = Grid {
            origin: self.bounds.mins,
            step: Vector3::new(
                extents.x / cells[0] as Real,
                extents.y / cells[1] as Real,
                extents.z / cells[2] as Real,
            ),
            cells,
        };
        let iso = self.iso_value;
        let use_pool = cfg!(feature = "parallel") && self.parallel;

        let sample_at = |index: usize| self.sample(&grid.position(index));

        #[cfg(feature = "parallel")]
        let values: Vec<Real> = if use_pool {
            (0..grid.point_count()).into_par_iter().map(sample_at).collect()
        } else {
            (0..grid.point_count()).map(sample_at).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let values: Vec<Real> = (0..grid.point_count()).map(sample_at).collect();

        let polygonize = |cell: usize| polygonize_cell(&grid, &values, iso, cell);
        #[cfg(feature = "parallel")]
        let per_cell: Vec<Vec<[LatticeEdge; 3]>> = if use_pool {
            (0..grid.cell_count()).into_par_iter().map(polygonize).collect()
        } else {
            (0..grid.cell_count()).map(polygonize).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let per_cell: Vec<Vec<[LatticeEdge; 3]>> = (0..grid.cell_count()).map(polygonize).collect();

        // Number crossing edges in cell order so the output does not depend
        // on scheduling.
        let mut edge_index: HashMap<LatticeEdge, usize> = HashMap::new();
        let mut edges: Vec<LatticeEdge> = Vec::new();
        let triangles: Vec<[usize; 3]> = per_cell
            .into_iter()
            .flatten()
            .map(|tri| {
                tri.map(|e| {
                    *edge_index.entry(e).or_insert_with(|| {
                        edges.push(e);
                        edges.len() - 1
                    })
                })
            })
            .collect();

        let refine = |&(a, b): &LatticeEdge| {
            let (fa, fb) = (values[a], values[b]);
            // bracket from the inside end
            if fa > iso {
                self.find_root(grid.position(a), fa, grid.position(b), fb)
            } else {
                self.find_root(grid.position(b), fb, grid.position(a), fa)
            }
        };
        #[cfg(feature = "parallel")]
        let positions: Vec<Point3<Real>> = if use_pool {
            edges.par_iter().map(refine).collect()
        } else {
            edges.iter().map(refine).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let positions: Vec<Point3<Real>> = edges.iter().map(refine).collect();

        let mut mesh = DynamicMesh::new();
        let vertices: Vec<VertexId> = positions.into_iter().map(|p| mesh.append_vertex(p)).collect();
        let mut rejected = 0usize;
        for [a, b, c] in triangles {
            if mesh.append_triangle([vertices[a], vertices[b], vertices[c]], 0).is_err() {
                rejected += 1;
            }
        }
        mesh.remove_unused_vertices();
        mesh.enable_attributes();
        mesh.recompute_normals(NormalsMode::PerVertex);

        debug!(
            cells = grid.cell_count(),
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            rejected,
            parallel = use_pool,
            "marching cubes finished"
        );
        Ok(mesh)
    }
}
