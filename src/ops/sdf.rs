//! Signed distance sampling and Surface Nets meshing shared by the implicit
//! operations.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::Aabb;
use crate::generators::marching_cubes::MAX_CELLS_PER_AXIS;
use crate::mesh::{DynamicMesh, VertexId};
use crate::spatial::{FastWindingTree, MeshBvh};
use fast_surface_nets::ndshape::Shape;
use fast_surface_nets::{SurfaceNetsBuffer, surface_nets};
use nalgebra::{Point3, Vector3};
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The shape describing our discrete grid for Surface Nets:
#[derive(Debug, Clone, Copy)]
pub struct GridShape {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
}

impl Shape<3> for GridShape {
    type Coord = u32;

    #[inline]
    fn as_array(&self) -> [Self::Coord; 3] {
        [self.nx, self.ny, self.nz]
    }

    fn size(&self) -> Self::Coord {
        self.nx * self.ny * self.nz
    }

    fn usize(&self) -> usize {
        (self.nx * self.ny * self.nz) as usize
    }

    fn linearize(&self, coords: [Self::Coord; 3]) -> u32 {
        let [x, y, z] = coords;
        (z * self.ny + y) * self.nx + x
    }

    fn delinearize(&self, i: u32) -> [Self::Coord; 3] {
        let x = i % self.nx;
        let yz = i / self.nx;
        let y = yz % self.ny;
        let z = yz / self.ny;
        [x, y, z]
    }
}

/// Number of lattice points per axis covering `bounds` at spacing `cell`.
fn lattice_points(bounds: &Aabb, cell: Real) -> MeshResult<[usize; 3]> {
    if !(cell.is_finite() && cell > 0.0) {
        return Err(MeshError::Other(format!("grid cell size must be positive, got {cell}")));
    }
    let extents = bounds.extents();
    if !extents.iter().all(|e| e.is_finite() && *e >= 0.0) {
        return Err(MeshError::Other("grid bounds are invalid".into()));
    }
    Ok([0, 1, 2].map(|i| {
        let wanted = (extents[i] / cell).ceil() as usize + 1;
        if wanted > MAX_CELLS_PER_AXIS + 1 {
            warn!(axis = i, wanted, limit = MAX_CELLS_PER_AXIS, "clamping sampling grid");
        }
        wanted.clamp(2, MAX_CELLS_PER_AXIS + 1)
    }))
}

fn lattice_position(origin: &Point3<Real>, step: &Vector3<Real>, dims: &[usize; 3], index: usize) -> Point3<Real> {
    let ix = index % dims[0];
    let iy = (index / dims[0]) % dims[1];
    let iz = index / (dims[0] * dims[1]);
    origin + Vector3::new(ix as Real * step.x, iy as Real * step.y, iz as Real * step.z)
}

/// Evaluate `field` at every lattice point, x fastest.
fn sample_lattice<F>(field: &F, origin: &Point3<Real>, step: &Vector3<Real>, dims: &[usize; 3], parallel: bool) -> Vec<Real>
where
    F: Fn(&Point3<Real>) -> Real + Sync,
{
    let count = dims[0] * dims[1] * dims[2];
    let at = |i: usize| field(&lattice_position(origin, step, dims, i));
    #[cfg(feature = "parallel")]
    if parallel {
        return (0..count).into_par_iter().map(at).collect();
    }
    let _ = parallel;
    (0..count).map(at).collect()
}

/// Scalar field sampled on a regular lattice, read back with trilinear
/// interpolation.
#[derive(Debug, Clone)]
pub struct SampledGrid {
    origin: Point3<Real>,
    step: Vector3<Real>,
    dims: [usize; 3],
    values: Vec<Real>,
}

impl SampledGrid {
    pub fn sample<F>(field: F, bounds: &Aabb, cell: Real, parallel: bool) -> MeshResult<Self>
    where
        F: Fn(&Point3<Real>) -> Real + Sync,
    {
        let dims = lattice_points(bounds, cell)?;
        let extents = bounds.extents();
        let step = Vector3::from_fn(|i, _| (extents[i] / (dims[i] - 1) as Real).max(Real::EPSILON));
        let values = sample_lattice(&field, &bounds.mins, &step, &dims, parallel);
        debug!(points = values.len(), "sampled grid");
        Ok(Self {
            origin: bounds.mins,
            step,
            dims,
            values,
        })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    fn at(&self, [x, y, z]: [usize; 3]) -> Real {
        self.values[(z * self.dims[1] + y) * self.dims[0] + x]
    }

    /// Trilinear interpolation, clamped to the lattice.
    pub fn value(&self, p: &Point3<Real>) -> Real {
        let local = p - self.origin;
        let mut base = [0usize; 3];
        let mut frac = [0.0; 3];
        for i in 0..3 {
            let g = (local[i] / self.step[i]).clamp(0.0, (self.dims[i] - 1) as Real);
            let b = (g.floor() as usize).min(self.dims[i] - 2);
            base[i] = b;
            frac[i] = g - b as Real;
        }
        let mut sum = 0.0;
        for corner in 0..8 {
            let offset = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1];
            let weight: Real = (0..3)
                .map(|i| if offset[i] == 1 { frac[i] } else { 1.0 - frac[i] })
                .product();
            if weight > 0.0 {
                sum += weight * self.at([base[0] + offset[0], base[1] + offset[1], base[2] + offset[2]]);
            }
        }
        sum
    }
}

/// Signed distance to a mesh: nearest-triangle distance, negative where
/// the winding number says the point is inside.
pub fn signed_distance(bvh: &MeshBvh, winding: &FastWindingTree, p: &Point3<Real>) -> Real {
    let Some((_, distance_squared)) = bvh.find_nearest_triangle(p) else {
        return Real::MAX;
    };
    let distance = distance_squared.sqrt();
    if winding.is_inside(bvh, p, 0.5) { -distance } else { distance }
}

/// Mesh the zero level set of `field` (negative inside) over `bounds` with
/// Surface Nets. `bounds` should leave the surface at least a cell away
/// from its sides. The result is oriented outward.
pub fn surface_nets_mesh<F>(field: F, bounds: &Aabb, cell: Real, parallel: bool) -> MeshResult<DynamicMesh>
where
    F: Fn(&Point3<Real>) -> Real + Sync,
{
    let dims = lattice_points(bounds, cell)?;
    let step = Vector3::repeat(cell);
    let field_values: Vec<f32> = sample_lattice(&field, &bounds.mins, &step, &dims, parallel)
        .into_iter()
        .map(|v| if v.is_finite() { v as f32 } else { 1e10_f32 })
        .collect();

    let shape = GridShape {
        nx: dims[0] as u32,
        ny: dims[1] as u32,
        nz: dims[2] as u32,
    };
    let mut buffer = SurfaceNetsBuffer::default();
    surface_nets(&field_values, &shape, [0; 3], shape.as_array().map(|x| x - 1), &mut buffer);

    let mut mesh = DynamicMesh::new();
    let vertices: Vec<VertexId> = buffer
        .positions
        .iter()
        .map(|&[x, y, z]| mesh.append_vertex(bounds.mins + Vector3::new(x as Real, y as Real, z as Real) * cell))
        .collect();
    let rejected = buffer
        .indices
        .chunks_exact(3)
        .filter(|tri| {
            let tri = [0, 1, 2].map(|k| vertices[tri[k] as usize]);
            mesh.append_triangle(tri, 0).is_err()
        })
        .count();
    if rejected > 0 {
        debug!(rejected, "surface nets produced non-manifold triangles");
    }
    mesh.remove_unused_vertices();
    if mesh.signed_volume() < 0.0 {
        mesh.reverse_orientation();
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float_types::PI;

    fn cube_bounds(h: Real) -> Aabb {
        Aabb::new(Point3::new(-h, -h, -h), Point3::new(h, h, h))
    }

    #[test]
    fn trilinear_is_exact_for_linear_fields() {
        let grid = SampledGrid::sample(|p: &Point3<Real>| 2.0 * p.x - p.y + 0.5 * p.z, &cube_bounds(1.0), 0.3, false).unwrap();
        let p = Point3::new(0.123, -0.456, 0.789);
        assert!((grid.value(&p) - (2.0 * p.x - p.y + 0.5 * p.z)).abs() < 1e-9);
    }

    #[test]
    fn surface_nets_sphere_is_outward() {
        let mesh = surface_nets_mesh(|p: &Point3<Real>| p.coords.norm() - 1.0, &cube_bounds(1.5), 0.1, false).unwrap();
        let expected = 4.0 / 3.0 * PI;
        assert!(mesh.signed_volume() > 0.0);
        assert!((mesh.volume() - expected).abs() / expected < 0.05);
    }

    #[test]
    fn invalid_cell_size_is_an_error() {
        assert!(surface_nets_mesh(|p: &Point3<Real>| p.x, &cube_bounds(1.0), 0.0, false).is_err());
    }
}
