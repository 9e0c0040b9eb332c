//! Binary space partitioning over convex polygons, used by the boolean
//! operations.

pub mod node;
pub mod plane;
pub mod polygon;

pub use node::{BalancedSplittingStrategy, Node, SplittingPlaneStrategy};
pub use plane::{BACK, COPLANAR, FRONT, Plane, SPANNING};
pub use polygon::{BspPolygon, BspVertex, PolygonOrigin, mesh_polygons};
