//! Winding-number remeshing into a closed solid.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::BoundingVolume;
use crate::generators::{MarchingCubes, MeshGenerator};
use crate::mesh::{CompactOptions, DynamicMesh, NormalsMode};
use crate::spatial::{FastWindingTree, MeshBvh};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidifyParams {
    /// Cells along the longest side of the input bounds
    pub voxel_resolution: usize,
    /// Winding number above which a point counts as inside
    pub winding_threshold: Real,
    /// Margin around the input bounds, in cells
    pub extend_bounds: Real,
    /// Bisection steps used to place each surface vertex
    pub surface_search_steps: usize,
    pub parallel: bool,
}

impl Default for SolidifyParams {
    fn default() -> Self {
        Self {
            voxel_resolution: 64,
            winding_threshold: 0.5,
            extend_bounds: 2.0,
            surface_search_steps: 5,
            parallel: cfg!(feature = "parallel"),
        }
    }
}

/// Rebuild `mesh` as the iso-surface of its generalized winding number.
///
/// Holes, self intersections and inner shells of the input all resolve to
/// one closed, outward-facing surface. Attributes of the input are not
/// carried over; the result has fresh attributes and recomputed normals.
pub fn solidify(mesh: &DynamicMesh, params: SolidifyParams) -> MeshResult<DynamicMesh> {
    if mesh.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    if params.voxel_resolution == 0 {
        return Err(MeshError::Other("voxel resolution must be positive".into()));
    }

    let (source, _) = DynamicMesh::compact_copy(mesh, CompactOptions::GEOMETRY_ONLY);
    let bvh = MeshBvh::build(&source);
    let winding = FastWindingTree::build(&bvh);

    let bounds = source.bounds();
    let cell = bounds.extents().max() / params.voxel_resolution as Real;
    if !(cell.is_finite() && cell > 0.0) {
        return Err(MeshError::Other("input bounds are degenerate".into()));
    }
    let grid_bounds = bounds.loosened(params.extend_bounds.max(1.0) * cell);

    let mut result = MarchingCubes::new(|p| winding.winding_number(&bvh, p), grid_bounds, cell)
        .with_iso_value(params.winding_threshold)
        .with_root_steps(params.surface_search_steps)
        .with_parallel(params.parallel)
        .generate()?;

    result.enable_attributes();
    result.recompute_normals(NormalsMode::PerVertex);
    info!(
        input = mesh.triangle_count(),
        output = result.triangle_count(),
        cell,
        "solidified mesh"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::BoxGenerator;
    use nalgebra::Vector3;

    #[test]
    fn open_box_becomes_closed_solid() {
        let mut mesh = BoxGenerator::new(Vector3::new(0.5, 0.5, 0.5)).generate().unwrap();
        let top: Vec<_> = mesh
            .triangle_ids()
            .filter(|t| mesh.triangle_normal(*t).unwrap().z > 0.5)
            .collect();
        for t in top {
            mesh.remove_triangle(t, true).unwrap();
        }
        assert!(!mesh.is_closed());

        let params = SolidifyParams {
            voxel_resolution: 16,
            ..Default::default()
        };
        let solid = solidify(&mesh, params).unwrap();
        assert!(solid.is_closed());
        assert!(solid.signed_volume() > 0.0);
        assert!((solid.volume() - 1.0).abs() < 0.15);
        assert!(solid.attributes().is_some());
    }

    #[test]
    fn empty_mesh_is_rejected() {
        assert_eq!(
            solidify(&DynamicMesh::new(), SolidifyParams::default()).unwrap_err(),
            MeshError::EmptyMesh
        );
    }
}
