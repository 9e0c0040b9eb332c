//! Error types shared by the mesh store, generators and editing operations

use crate::mesh::{ElementId, TriangleId, VertexId};

/// Result alias used throughout the crate.
pub type MeshResult<T> = Result<T, MeshError>;

/// Everything that can go wrong while building or editing a mesh.
///
/// All of these are recoverable. An operation that returns one of them has
/// left its input mesh untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    /// A vertex ID does not name a live vertex
    #[error("invalid vertex id {0:?}")]
    InvalidVertex(VertexId),

    /// A triangle ID does not name a live triangle
    #[error("invalid triangle id {0:?}")]
    InvalidTriangle(TriangleId),

    /// An overlay element ID does not exist in its overlay
    #[error("invalid overlay element id {0:?}")]
    InvalidElement(ElementId),

    /// The same vertex appears twice in one triangle
    #[error("degenerate triangle {0:?}")]
    DegenerateTriangle([VertexId; 3]),

    /// A triangle on the same three vertices already exists
    #[error("duplicate triangle {0:?}")]
    DuplicateTriangle([VertexId; 3]),

    /// The edge is already shared by two triangles
    #[error("edge ({0:?}, {1:?}) is already bounded by two triangles")]
    NonManifoldEdge(VertexId, VertexId),

    /// A generator or triangulation received too few input points
    #[error("need at least {required} points, got {found}")]
    TooFewPoints { required: usize, found: usize },

    /// Simplification target is not below the current triangle count
    #[error("target triangle count {target} is not below current count {current}")]
    TargetNotBelowCurrent { target: usize, current: usize },

    /// The operation needs a non-empty mesh
    #[error("mesh is empty")]
    EmptyMesh,

    /// A boolean operation could not produce a valid result
    #[error("boolean operation failed: {0}")]
    BooleanFailed(String),

    /// A 2D triangulation step failed
    #[error("triangulation failed: {0}")]
    Triangulation(String),

    /// A transform could not be inverted
    #[error("transform is not invertible")]
    NotInvertible,

    /// Indicates an inconsistency while building a collision mesh
    #[error(transparent)]
    TriMesh(#[from] crate::float_types::parry3d::shape::TriMeshBuilderError),

    /// In general, anything else
    #[error("{0}")]
    Other(String),
}
