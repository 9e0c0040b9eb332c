//! Editing operations on [`DynamicMesh`](crate::mesh::DynamicMesh).
//!
//! Every operation reads its input by reference and returns a new mesh, so
//! a failure never leaves the caller's mesh half edited.

pub mod boolean;
pub mod boundary;
pub mod bsp;
pub mod hole_fill;
pub mod morphology;
pub mod plane_cut;
pub mod sdf;
pub mod simplify;
pub mod solidify;

pub use boolean::{BooleanOp, boolean};
pub use boundary::{BoundaryLoop, boundary_loops};
pub use hole_fill::{HoleFillOptions, HoleFillReport, fill_holes};
pub use morphology::{MorphologyOp, MorphologyParams, morphology};
pub use plane_cut::{CutResult, PlaneCutOptions, PlaneCutter, advanced_plane_cut, simple_plane_cut};
pub use simplify::{
    MeshDescription, MeshReduction, QemReduction, SimplifyTarget, simplify_to_triangle_count, simplify_with_reduction,
};
pub use solidify::{SolidifyParams, solidify};
