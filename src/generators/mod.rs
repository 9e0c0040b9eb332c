//! Procedural mesh generators.
//!
//! Every generator is configured through builder methods and consumed by
//! [`MeshGenerator::generate`], so one generator produces exactly one mesh.

pub mod boxes;
pub mod convex_hull;
pub mod delaunay;
#[cfg(feature = "chull-io")]
pub mod hull3d;
pub mod marching_cubes;
pub mod planar;
pub mod point_cloud;
pub mod point_triangle;
pub mod random_points;
pub mod sphere;

pub use boxes::BoxGenerator;
pub use convex_hull::ConvexHullGenerator;
pub use delaunay::DelaunayGenerator;
#[cfg(feature = "chull-io")]
pub use hull3d::ConvexHull3Generator;
pub use marching_cubes::MarchingCubes;
pub use planar::convex_hull_2d;
pub use point_cloud::PointCloudField;
pub use point_triangle::point_in_triangle_2d;
pub use random_points::RandomPointsGenerator;
pub use sphere::SphereGenerator;

use crate::errors::MeshResult;
use crate::mesh::DynamicMesh;

/// Upper bound on parametric subdivision counts.
pub const MAX_TESSELLATION: usize = 50;

pub trait MeshGenerator {
    fn generate(self) -> MeshResult<DynamicMesh>;
}
