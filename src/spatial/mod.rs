//! Spatial acceleration structures built over a [`DynamicMesh`](crate::mesh::DynamicMesh).

pub mod bvh;
pub mod winding;

pub use bvh::{MeshBvh, QueryOptions, RayHit};
pub use winding::FastWindingTree;

/// Ray type accepted by the ray queries.
pub use crate::float_types::parry3d::query::Ray;
