//! Copying triangles between meshes through [`IndexMappings`], and the
//! split-by-predicate primitive built on top of it.

use crate::errors::{MeshError, MeshResult};
use crate::mesh::mappings::IdMap;
use crate::mesh::overlay::Overlay;
use crate::mesh::tags::copy_tag_values;
use crate::mesh::{DynamicMesh, ElementId, IndexMappings, TriangleId};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Copy triangle `tid` of `source` into `dest`, with its group, overlay
/// corners, material ID, polygroup layers and tags.
///
/// Vertices and overlay elements already copied for this mapping are reused.
/// Non-zero triangle groups are given fresh IDs in `dest`, one per source
/// group. If `dest` rejects the triangle because an edge would become
/// non-manifold (or the triangle would be a duplicate), the corners that
/// were already mapped are duplicated and the duplicates are not recorded in
/// the mapping.
pub fn append_triangle_mapped(
    dest: &mut DynamicMesh,
    source: &DynamicMesh,
    tid: TriangleId,
    mappings: &mut IndexMappings,
) -> MeshResult<TriangleId> {
    let tri = source.triangle(tid).ok_or(MeshError::InvalidTriangle(tid))?;
    let positions = source
        .triangle_positions(tid)
        .ok_or(MeshError::InvalidTriangle(tid))?;
    let group = match source.triangle_group(tid) {
        Some(group) if group != 0 && dest.has_triangle_groups() => {
            mappings.groups.get_or_insert_with(group, || dest.allocate_group())
        },
        _ => 0,
    };

    let mut mapped = tri;
    let mut created = [false; 3];
    for i in 0..3 {
        mapped[i] = mappings.vertices.get_or_insert_with(tri[i], || {
            created[i] = true;
            dest.append_vertex(positions[i])
        });
    }

    let new_tid = match dest.append_triangle(mapped, group) {
        Ok(t) => t,
        Err(MeshError::NonManifoldEdge(..)) | Err(MeshError::DuplicateTriangle(_)) => {
            debug!(triangle = tid.0, "duplicating vertices for non-manifold triangle");
            // vertices made for this triangle have no edges yet, so only the
            // shared ones need duplicates
            let mut fresh = mapped;
            for i in (0..3).filter(|&i| !created[i]) {
                fresh[i] = dest.append_vertex(positions[i]);
            }
            dest.append_triangle(fresh, group)?
        },
        Err(e) => return Err(e),
    };
    mappings.triangles.insert(tid, new_tid);

    let (Some(src), Some(dst)) = (source.attributes(), dest.attributes_mut()) else {
        return Ok(new_tid);
    };

    copy_overlay_corners(src.normals(), dst.normals_mut(), &mut mappings.normals, tid, new_tid)?;
    for layer in 0..src.num_uv_layers().min(dst.num_uv_layers()) {
        if let (Some(s), Some(d)) = (src.uv_layer(layer), dst.uv_layer_mut(layer)) {
            copy_overlay_corners(s, d, mappings.uv_layer_mut(layer), tid, new_tid)?;
        }
    }
    if let (Some(s), Some(d)) = (src.colors(), dst.colors_mut()) {
        copy_overlay_corners(s, d, &mut mappings.colors, tid, new_tid)?;
    }
    if let (Some(s), Some(d)) = (src.material_ids(), dst.material_ids_mut()) {
        d.set(new_tid, s.get(tid));
    }
    for layer in 0..src.num_polygroup_layers() {
        if let (Some(s), Some(d)) = (src.polygroup_layer(layer), dst.polygroup_layer_mut(layer)) {
            d.set(new_tid, s.get(tid));
        }
    }
    copy_tag_values(src.tags(), tid, dst.tags_mut(), new_tid);

    Ok(new_tid)
}

pub(crate) fn copy_overlay_corners<T: Copy>(
    source: &Overlay<T>,
    dest: &mut Overlay<T>,
    map: &mut IdMap<ElementId, ElementId>,
    from: TriangleId,
    to: TriangleId,
) -> MeshResult<()> {
    let Some(elements) = source.tri_elements(from) else {
        return Ok(());
    };
    let mut mapped = elements;
    for (slot, element) in mapped.iter_mut().zip(elements) {
        let value = source
            .element(element)
            .ok_or(MeshError::InvalidElement(element))?;
        *slot = map.get_or_insert_with(element, || dest.append_element(value));
    }
    dest.set_triangle(to, mapped)
}

/// Append every triangle of `source` to `dest`. Returns the mappings used.
pub fn append_mesh(dest: &mut DynamicMesh, source: &DynamicMesh) -> MeshResult<IndexMappings> {
    dest.enable_matching_attributes(source);
    let mut mappings = IndexMappings::new(source.attributes().map_or(1, |a| a.num_uv_layers()));
    for tid in source.triangle_ids() {
        append_triangle_mapped(dest, source, tid, &mut mappings)?;
    }
    Ok(mappings)
}

/// Split `mesh` into one mesh per distinct key, in ascending key order.
///
/// Returns `None` without copying anything if fewer than two keys occur.
pub fn split_mesh_with_keys(
    mesh: &DynamicMesh,
    key_of: impl Fn(TriangleId) -> i32,
) -> Option<Vec<(i32, DynamicMesh)>> {
    let mut partitions: BTreeMap<i32, Vec<TriangleId>> = BTreeMap::new();
    for tid in mesh.triangle_ids() {
        partitions.entry(key_of(tid)).or_default().push(tid);
    }
    if partitions.len() < 2 {
        return None;
    }

    let num_uv_layers = mesh.attributes().map_or(1, |a| a.num_uv_layers());
    let pieces = partitions
        .into_iter()
        .map(|(key, triangles)| {
            let mut piece = DynamicMesh::new();
            piece.enable_matching_attributes(mesh);
            let mut mappings = IndexMappings::new(num_uv_layers);
            for tid in triangles {
                if let Err(e) = append_triangle_mapped(&mut piece, mesh, tid, &mut mappings) {
                    warn!(triangle = tid.0, error = %e, "triangle dropped while splitting");
                }
            }
            (key, piece)
        })
        .collect();
    Some(pieces)
}

/// [`split_mesh_with_keys`] without the keys.
pub fn split_mesh(mesh: &DynamicMesh, key_of: impl Fn(TriangleId) -> i32) -> Option<Vec<DynamicMesh>> {
    split_mesh_with_keys(mesh, key_of).map(|pieces| pieces.into_iter().map(|(_, m)| m).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{BoxGenerator, MeshGenerator};
    use crate::mesh::VertexId;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn split_conserves_triangles_and_attributes() {
        let mesh = BoxGenerator::new(Vector3::new(1.0, 1.0, 1.0))
            .with_edge_vertices(3)
            .generate()
            .unwrap();
        let key = |t: TriangleId| {
            let n = mesh.triangle_normal(t).unwrap();
            if n.x > 0.5 { 1 } else { 0 }
        };

        let pieces = split_mesh(&mesh, key).unwrap();
        assert_eq!(pieces.len(), 2);
        let total: usize = pieces.iter().map(DynamicMesh::triangle_count).sum();
        assert_eq!(total, mesh.triangle_count());

        // the +X face is a 2x2 grid of quads
        assert_eq!(pieces[1].triangle_count(), 8);
        let normals = pieces[1].attributes().unwrap().normals();
        assert_eq!(normals.element_count(), 1, "shared face normal copied once");
        for tid in pieces[1].triangle_ids() {
            let values = normals.tri_values(tid).unwrap();
            assert!(values.iter().all(|n| (n - Vector3::x()).norm() < 1e-12));
        }
    }

    #[test]
    fn split_with_single_key_is_refused() {
        let mesh = BoxGenerator::new(Vector3::new(1.0, 1.0, 1.0)).generate().unwrap();
        assert!(split_mesh(&mesh, |_| 3).is_none());
    }

    #[test]
    fn groups_are_remapped_per_piece() {
        let mut mesh = BoxGenerator::new(Vector3::new(1.0, 1.0, 1.0)).generate().unwrap();
        mesh.enable_triangle_groups();
        let tids: Vec<TriangleId> = mesh.triangle_ids().collect();
        for (i, tid) in tids.iter().enumerate() {
            mesh.set_triangle_group(*tid, 40 + (i % 2) as i32).unwrap();
        }
        let pieces = split_mesh(&mesh, |t| (t.0 >= 6) as i32).unwrap();
        for piece in &pieces {
            let mut groups: Vec<i32> = piece.triangle_ids().filter_map(|t| piece.triangle_group(t)).collect();
            groups.sort_unstable();
            groups.dedup();
            assert_eq!(groups, vec![1, 2]);
        }
    }

    #[test]
    fn non_manifold_fallback_leaves_no_orphan_vertices() {
        // three triangles on one edge, the third also brings a new apex
        let positions = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
            Point3::new(0.5, 0.0, 1.0),
        ];
        let mut source = DynamicMesh::new();
        let v: Vec<VertexId> = positions.iter().map(|p| source.append_vertex(*p)).collect();
        source.append_triangle([v[0], v[1], v[2]], 0).unwrap();
        source.append_triangle([v[1], v[0], v[3]], 0).unwrap();

        let mut other = DynamicMesh::new();
        let w: Vec<VertexId> = positions.iter().map(|p| other.append_vertex(*p)).collect();
        let third = other.append_triangle([w[0], w[1], w[4]], 0).unwrap();

        let mut dest = DynamicMesh::new();
        let mut mappings = append_mesh(&mut dest, &source).unwrap();
        // map the other mesh's shared edge onto the same destination vertices
        mappings.vertices.insert(w[0], mappings.vertices.get(v[0]).unwrap());
        mappings.vertices.insert(w[1], mappings.vertices.get(v[1]).unwrap());
        append_triangle_mapped(&mut dest, &other, third, &mut mappings).unwrap();

        assert_eq!(dest.triangle_count(), 3);
        // two duplicated edge corners plus one apex, nothing left unreferenced
        assert_eq!(dest.vertex_count(), 4 + 3);
        let before = dest.vertex_count();
        dest.remove_unused_vertices();
        assert_eq!(dest.vertex_count(), before);
    }
}
