//! Offset-surface morphology: dilate, contract, open and close.
//!
//! The signed distance to the input is sampled on a grid of
//! `grid_cell_size`, shifted by the offset distance and re-meshed at
//! `mesh_cell_size`. Open and close run two such passes, the second on the
//! output of the first.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::BoundingVolume;
use crate::mesh::{CompactOptions, DynamicMesh, NormalsMode};
use crate::ops::sdf::{SampledGrid, signed_distance, surface_nets_mesh};
use crate::spatial::{FastWindingTree, MeshBvh};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MorphologyOp {
    /// Grow outward by the distance
    Dilate,
    /// Shrink inward by the distance
    Contract,
    /// Contract then dilate; removes thin features
    Open,
    /// Dilate then contract; fills small gaps
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphologyParams {
    pub op: MorphologyOp,
    pub distance: Real,
    pub grid_cell_size: Real,
    pub mesh_cell_size: Real,
    pub parallel: bool,
}

impl Default for MorphologyParams {
    fn default() -> Self {
        Self {
            op: MorphologyOp::Dilate,
            distance: 1.0,
            grid_cell_size: 0.25,
            mesh_cell_size: 0.25,
            parallel: cfg!(feature = "parallel"),
        }
    }
}

/// Apply `params.op` to a copy of `mesh`.
pub fn morphology(mesh: &DynamicMesh, params: MorphologyParams) -> MeshResult<DynamicMesh> {
    if mesh.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    if !(params.distance.is_finite() && params.distance >= 0.0) {
        return Err(MeshError::Other(format!("offset distance must be non-negative, got {}", params.distance)));
    }
    let d = params.distance;
    let mut result = match params.op {
        MorphologyOp::Dilate => offset(mesh, d, &params)?,
        MorphologyOp::Contract => offset(mesh, -d, &params)?,
        MorphologyOp::Open => offset(&offset(mesh, -d, &params)?, d, &params)?,
        MorphologyOp::Close => offset(&offset(mesh, d, &params)?, -d, &params)?,
    };
    result.enable_attributes();
    result.recompute_normals(NormalsMode::PerVertex);
    info!(
        op = ?params.op,
        distance = d,
        input = mesh.triangle_count(),
        output = result.triangle_count(),
        "morphology finished"
    );
    Ok(result)
}

/// Level set at signed distance `amount` from the surface, positive
/// outward.
fn offset(mesh: &DynamicMesh, amount: Real, params: &MorphologyParams) -> MeshResult<DynamicMesh> {
    if mesh.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    let (source, _) = DynamicMesh::compact_copy(mesh, CompactOptions::GEOMETRY_ONLY);
    let bvh = MeshBvh::build(&source);
    let winding = FastWindingTree::build(&bvh);

    let margin = amount.max(0.0) + 2.0 * params.grid_cell_size.max(params.mesh_cell_size);
    let bounds = source.bounds().loosened(margin);
    let grid = SampledGrid::sample(
        |p| signed_distance(&bvh, &winding, p),
        &bounds,
        params.grid_cell_size,
        params.parallel,
    )?;
    debug!(dims = ?grid.dims(), amount, "sampled distance field");

    surface_nets_mesh(|p| grid.value(p) - amount, &bounds, params.mesh_cell_size, params.parallel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float_types::PI;
    use crate::generators::{MeshGenerator, SphereGenerator};

    fn sphere() -> DynamicMesh {
        SphereGenerator::new(1.0).with_uniform_tessellation(16).generate().unwrap()
    }

    fn params(op: MorphologyOp, distance: Real) -> MorphologyParams {
        MorphologyParams {
            op,
            distance,
            grid_cell_size: 0.1,
            mesh_cell_size: 0.1,
            parallel: false,
        }
    }

    #[test]
    fn dilate_grows_sphere_volume() {
        let result = morphology(&sphere(), params(MorphologyOp::Dilate, 0.25)).unwrap();
        let expected = 4.0 / 3.0 * PI * 1.25_f64.powi(3);
        assert!((result.volume() - expected).abs() / expected < 0.1);
        let extent = result.bounds().extents();
        assert!((extent.x - 2.5).abs() < 0.2);
    }

    #[test]
    fn contract_shrinks_sphere_volume() {
        let result = morphology(&sphere(), params(MorphologyOp::Contract, 0.25)).unwrap();
        let expected = 4.0 / 3.0 * PI * 0.75_f64.powi(3);
        assert!((result.volume() - expected).abs() / expected < 0.15);
    }

    #[test]
    fn negative_distance_is_rejected() {
        assert!(morphology(&sphere(), params(MorphologyOp::Dilate, -1.0)).is_err());
    }
}
