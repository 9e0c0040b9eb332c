//! Strongly typed handles into a [`DynamicMesh`](super::DynamicMesh).
//!
//! IDs stay valid until the mesh is compacted. A removed vertex or triangle
//! leaves a tombstone so the IDs of everything else are unaffected.

macro_rules! mesh_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            /// Raw slot index of this ID.
            #[inline]
            pub const fn index(self) -> usize {
                self.0
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(index: usize) -> Self {
                Self(index)
            }
        }
    };
}

mesh_id!(
    /// Handle to a vertex of the mesh store.
    VertexId
);

mesh_id!(
    /// Handle to a triangle of the mesh store.
    TriangleId
);

mesh_id!(
    /// Handle to an element of one attribute overlay.
    ///
    /// Element IDs live in their own space per overlay, so the same number in
    /// the normal overlay and the UV overlay refers to unrelated values.
    ElementId
);

/// Triangle group (polygroup / material partition) tag.
pub type GroupId = i32;

/// Undirected edge key with the smaller vertex first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey(pub VertexId, pub VertexId);

impl EdgeKey {
    #[inline]
    pub fn new(a: VertexId, b: VertexId) -> Self {
        if a <= b { EdgeKey(a, b) } else { EdgeKey(b, a) }
    }
}
