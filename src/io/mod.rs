//! Mesh import and export.
//!
//! The core only needs one round-trippable format: the plain-text indexed
//! `.obj` layout in [`obj`]. Other formats plug in through [`MeshImporter`].

pub mod obj;

use crate::mesh::DynamicMesh;
use std::path::Path;

pub use obj::{ObjImporter, read_obj, to_obj, write_obj};

/// Generic I/O and format-conversion errors.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("std::io::Error: {0}")]
    StdIo(#[from] std::io::Error),

    #[error("Could not parse float: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    #[error("Could not parse integer: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("Input is malformed: {0}")]
    MalformedInput(String),

    #[error("The path is malformed: {0}")]
    MalformedPath(String),

    #[error("Unsupported mesh format: {0}")]
    Unsupported(String),

    #[error("Mesh store rejected imported data: {0}")]
    Mesh(#[from] crate::errors::MeshError),
}

/// What an importer should produce besides positions and triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    pub want_normals: bool,
    pub want_uvs: bool,
    pub want_colors: bool,
    /// Flip the winding of every imported triangle
    pub reverse_orientation: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            want_normals: true,
            want_uvs: true,
            want_colors: false,
            reverse_orientation: false,
        }
    }
}

/// Reads a mesh file into a [`DynamicMesh`].
///
/// Implementations hold any library state they need for the duration of a
/// single call and release it before returning.
pub trait MeshImporter {
    fn read_mesh(&self, path: &Path, options: ImportOptions) -> Result<DynamicMesh, IoError>;
}
