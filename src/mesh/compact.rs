//! Compaction: copy a mesh into a dense ID range, dropping tombstones.

use crate::mesh::{DynamicMesh, TriangleId, VertexId, next_change_stamp};

/// Which optional facets survive a [`DynamicMesh::compact_copy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactOptions {
    pub keep_groups: bool,
    pub keep_attributes: bool,
    /// Only meaningful with `keep_attributes`.
    pub keep_colors: bool,
    /// Carry the source change stamp over when the copy is ID-identical to
    /// the source, so spatial indexes built for the source stay valid.
    pub keep_change_stamp: bool,
}

impl Default for CompactOptions {
    fn default() -> Self {
        Self {
            keep_groups: true,
            keep_attributes: true,
            keep_colors: true,
            keep_change_stamp: false,
        }
    }
}

impl CompactOptions {
    /// Positions and triangles only.
    pub const GEOMETRY_ONLY: Self = Self {
        keep_groups: false,
        keep_attributes: false,
        keep_colors: false,
        keep_change_stamp: false,
    };
}

/// Old-to-new ID maps produced by compaction.
#[derive(Debug, Clone, Default)]
pub struct CompactInfo {
    vertex_map: Vec<Option<VertexId>>,
    triangle_map: Vec<Option<TriangleId>>,
}

impl CompactInfo {
    pub fn map_vertex(&self, old: VertexId) -> Option<VertexId> {
        self.vertex_map.get(old.0).copied().flatten()
    }

    pub fn map_triangle(&self, old: TriangleId) -> Option<TriangleId> {
        self.triangle_map.get(old.0).copied().flatten()
    }
}

impl DynamicMesh {
    /// Copy `other` into a new mesh whose vertex and triangle IDs are
    /// `0..n-1`, preserving the relative order of live IDs.
    pub fn compact_copy(other: &DynamicMesh, options: CompactOptions) -> (DynamicMesh, CompactInfo) {
        let mut mesh = DynamicMesh::new();
        let mut info = CompactInfo {
            vertex_map: vec![None; other.max_vertex_id()],
            triangle_map: vec![None; other.max_triangle_id()],
        };

        for vid in other.vertex_ids() {
            if let Some(p) = other.vertex(vid) {
                info.vertex_map[vid.0] = Some(mesh.append_vertex(p));
            }
        }

        if options.keep_groups && other.has_triangle_groups() {
            mesh.enable_triangle_groups();
        }

        let mut old_ids = Vec::with_capacity(other.triangle_count());
        for tid in other.triangle_ids() {
            let Some(tri) = other.triangle(tid) else {
                continue;
            };
            let mapped = tri.map(|v| info.vertex_map[v.0]);
            let [Some(a), Some(b), Some(c)] = mapped else {
                continue;
            };
            let group = other.triangle_group(tid).unwrap_or(0);
            // the source already satisfied every store invariant
            if let Ok(new_tid) = mesh.append_triangle([a, b, c], group) {
                info.triangle_map[tid.0] = Some(new_tid);
                old_ids.push(tid);
            }
        }

        if options.keep_attributes {
            if let Some(attributes) = other.attributes() {
                mesh.set_attributes(Some(attributes.compacted(&old_ids, options.keep_colors)));
            }
        }

        mesh.change_stamp = if options.keep_change_stamp && other.is_compact() {
            other.change_stamp()
        } else {
            next_change_stamp()
        };

        (mesh, info)
    }

    /// Compact copy of `self` with every facet kept.
    pub fn compacted(&self) -> DynamicMesh {
        Self::compact_copy(self, CompactOptions::default()).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float_types::Real;
    use nalgebra::{Point3, Vector2};

    fn strip(n: usize) -> DynamicMesh {
        let mut mesh = DynamicMesh::new();
        let mut bottom = Vec::new();
        let mut top = Vec::new();
        for i in 0..=n {
            bottom.push(mesh.append_vertex(Point3::new(i as Real, 0.0, 0.0)));
            top.push(mesh.append_vertex(Point3::new(i as Real, 1.0, 0.0)));
        }
        mesh.enable_attributes();
        for i in 0..n {
            for tri in [[bottom[i], bottom[i + 1], top[i + 1]], [bottom[i], top[i + 1], top[i]]] {
                let tid = mesh.append_triangle(tri, i as i32).unwrap();
                let uvs = mesh.attributes_mut().unwrap().primary_uv_mut();
                let elements = tri.map(|v| uvs.append_element(Vector2::new(v.0 as Real, tid.0 as Real)));
                uvs.set_triangle(tid, elements).unwrap();
            }
        }
        mesh
    }

    #[test]
    fn compaction_preserves_geometry_and_overlays() {
        let mut mesh = strip(4);
        mesh.enable_triangle_groups();
        mesh.remove_triangle(TriangleId(1), false).unwrap();
        mesh.remove_triangle(TriangleId(4), true).unwrap();

        let (compact, info) = DynamicMesh::compact_copy(&mesh, CompactOptions::default());
        assert!(compact.is_compact());
        assert_eq!(compact.triangle_count(), mesh.triangle_count());
        assert_eq!(compact.vertex_count(), mesh.vertex_count());

        for tid in mesh.triangle_ids() {
            let new_tid = info.map_triangle(tid).unwrap();
            assert_eq!(compact.triangle_positions(new_tid), mesh.triangle_positions(tid));
            assert_eq!(
                compact.attributes().unwrap().primary_uv().tri_values(new_tid),
                mesh.attributes().unwrap().primary_uv().tri_values(tid)
            );
        }
        assert_eq!(
            compact.attributes().unwrap().primary_uv().element_count(),
            compact.triangle_count() * 3
        );
    }

    #[test]
    fn change_stamp_only_kept_for_identical_ids() {
        let mesh = strip(2);
        let options = CompactOptions {
            keep_change_stamp: true,
            ..Default::default()
        };
        let (copy, _) = DynamicMesh::compact_copy(&mesh, options);
        assert_eq!(copy.change_stamp(), mesh.change_stamp());

        let mut holed = strip(2);
        holed.remove_triangle(TriangleId(0), false).unwrap();
        let (copy, _) = DynamicMesh::compact_copy(&holed, options);
        assert_ne!(copy.change_stamp(), holed.change_stamp());
    }
}
