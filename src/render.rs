//! Render and collision hand-off.
//!
//! The core never talks to a renderer directly. After every committed edit
//! a [`MeshObject`](crate::object::MeshObject) hands its mesh to each
//! registered [`MeshBackend`], which typically builds [`SectionBuffers`]
//! for drawing and a [`collision_shape`] for physics.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::Real;
use crate::float_types::parry3d::shape::TriMesh;
use crate::mesh::{DynamicMesh, IsShell, TriangleId};
use crate::object::ObjectId;
use nalgebra::{Point3, Vector2, Vector3, Vector4};
use tracing::debug;

/// Capability interface implemented once per rendering target.
pub trait MeshBackend {
    /// Rebuild any drawable representation of `mesh`.
    fn push_mesh_update(&mut self, object: ObjectId, mesh: &DynamicMesh);

    /// Rebuild collision data for `mesh`. Only called for objects with
    /// collision enabled.
    fn request_collision(&mut self, _object: ObjectId, _mesh: &DynamicMesh) {}
}

/// Unindexed vertex streams for one material slot. Every triangle owns its
/// three vertices, so overlay seams never need splitting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderSection {
    /// Material slot: 0 for the outer shell, 1 for faces exposed by cuts
    pub material: usize,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub colors: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
    /// Source triangle of each output triangle
    pub triangles: Vec<TriangleId>,
}

impl RenderSection {
    fn new(material: usize) -> Self {
        Self {
            material,
            ..Default::default()
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    fn push_triangle(&mut self, mesh: &DynamicMesh, tid: TriangleId) {
        let Some(corners) = mesh.triangle_positions(tid) else { return };
        let face = mesh.triangle_normal(tid).unwrap_or_else(Vector3::zeros);
        let attributes = mesh.attributes();
        let normals = attributes
            .and_then(|a| a.normals().tri_values(tid))
            .unwrap_or([face; 3]);
        let uvs = attributes
            .and_then(|a| a.primary_uv().tri_values(tid))
            .unwrap_or([Vector2::zeros(); 3]);
        let colors = attributes
            .and_then(|a| a.colors())
            .and_then(|c| c.tri_values(tid))
            .unwrap_or([Vector4::repeat(1.0); 3]);

        let base = self.positions.len() as u32;
        for k in 0..3 {
            self.positions.push(narrow3(&corners[k].coords));
            self.normals.push(narrow3(&normals[k]));
            self.uvs.push([uvs[k].x as f32, uvs[k].y as f32]);
            self.colors.push(colors[k].map(|c| c as f32).into());
        }
        self.indices.extend([base, base + 1, base + 2]);
        self.triangles.push(tid);
    }
}

fn narrow3(v: &Vector3<Real>) -> [f32; 3] {
    [v.x as f32, v.y as f32, v.z as f32]
}

/// Draw buffers for a mesh, partitioned by the [`IsShell`] tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionBuffers {
    /// At most two sections; empty ones are omitted
    pub sections: Vec<RenderSection>,
}

impl SectionBuffers {
    /// One section when the mesh has no [`IsShell`] tag, otherwise shell
    /// triangles in material 0 and cut faces in material 1.
    pub fn from_mesh(mesh: &DynamicMesh) -> Self {
        let shell = mesh.attributes().and_then(|a| a.tag::<IsShell>());
        let mut sections = [RenderSection::new(0), RenderSection::new(1)];
        for tid in mesh.triangle_ids() {
            let slot = match shell {
                Some(tag) if !tag.get(tid) => 1,
                _ => 0,
            };
            sections[slot].push_triangle(mesh, tid);
        }
        let sections: Vec<RenderSection> = sections
            .into_iter()
            .filter(|s| s.triangle_count() > 0)
            .collect();
        debug!(
            sections = sections.len(),
            triangles = mesh.triangle_count(),
            "built section buffers"
        );
        Self { sections }
    }

    pub fn triangle_count(&self) -> usize {
        self.sections.iter().map(RenderSection::triangle_count).sum()
    }
}

/// Indexed collision mesh over the live triangles of `mesh`.
pub fn collision_shape(mesh: &DynamicMesh) -> MeshResult<TriMesh> {
    if mesh.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    let (compact, _) = DynamicMesh::compact_copy(mesh, crate::mesh::CompactOptions::GEOMETRY_ONLY);
    let vertices: Vec<Point3<Real>> = compact.vertex_ids().filter_map(|v| compact.vertex(v)).collect();
    let indices: Vec<[u32; 3]> = compact
        .triangle_ids()
        .filter_map(|t| compact.triangle(t))
        .map(|tri| tri.map(|v| v.0 as u32))
        .collect();
    Ok(TriMesh::new(vertices, indices)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{BoxGenerator, MeshGenerator};

    #[test]
    fn untagged_mesh_has_one_section() {
        let mesh = BoxGenerator::new(Vector3::new(1.0, 1.0, 1.0)).generate().unwrap();
        let buffers = SectionBuffers::from_mesh(&mesh);
        assert_eq!(buffers.sections.len(), 1);
        let section = &buffers.sections[0];
        assert_eq!(section.positions.len(), 3 * mesh.triangle_count());
        assert_eq!(section.indices.len(), section.positions.len());
    }

    #[test]
    fn shell_tag_splits_sections() {
        let mut mesh = BoxGenerator::new(Vector3::new(1.0, 1.0, 1.0)).generate().unwrap();
        let attributes = mesh.attributes_mut().unwrap();
        attributes.attach_tag::<IsShell>(true);
        attributes.tag_mut::<IsShell>().unwrap().set(TriangleId(0), false);

        let buffers = SectionBuffers::from_mesh(&mesh);
        assert_eq!(buffers.sections.len(), 2);
        assert_eq!(buffers.sections[1].material, 1);
        assert_eq!(buffers.sections[1].triangles, vec![TriangleId(0)]);
        assert_eq!(buffers.triangle_count(), mesh.triangle_count());
    }

    #[test]
    fn collision_shape_matches_mesh() {
        let mesh = BoxGenerator::new(Vector3::new(1.0, 1.0, 1.0)).generate().unwrap();
        let shape = collision_shape(&mesh).unwrap();
        assert_eq!(shape.indices().len(), mesh.triangle_count());
        let aabb = shape.local_aabb();
        assert!((aabb.maxs.x - 1.0).abs() < 1e-12);
        assert_eq!(collision_shape(&DynamicMesh::new()).unwrap_err(), MeshError::EmptyMesh);
    }
}
