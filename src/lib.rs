//! A runtime **procedural mesh** toolkit built around an indexed triangle
//! mesh with stable IDs, attribute overlays and per-triangle tags.
//!
//! * [`mesh`]: the [`DynamicMesh`] store, overlays, compaction and splitting
//! * [`spatial`]: BVH and fast winding-number queries
//! * [`generators`]: sphere, box, hulls, triangulations and marching cubes
//! * [`ops`]: booleans, plane cuts, simplification, solidify, morphology and
//!   hole filling
//! * [`object`]: scoped mutation with spatial rebuild and change
//!   notification
//! * [`io`] and [`render`]: `.obj` exchange and the render/collision hand-off
//!
//! # Features
//! #### Default
//! - **chull-io**: 3D convex hulls through `chull`
//!
//! #### Optional
//! - **parallel**: use rayon for implicit-field sampling and marching cubes

#![forbid(unsafe_code)]
#![warn(unused, clippy::approx_constant, clippy::all)]

pub mod errors;
pub mod float_types;
pub mod generators;
pub mod io;
pub mod mesh;
pub mod object;
pub mod ops;
pub mod render;
pub mod spatial;

pub use errors::{MeshError, MeshResult};
pub use mesh::DynamicMesh;
pub use object::MeshObject;
