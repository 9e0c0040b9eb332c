//! Convex polygons carried through the BSP tree.

use crate::float_types::Real;
use crate::mesh::{DynamicMesh, TriangleId};
use crate::ops::bsp::plane::Plane;
use nalgebra::{Point3, Vector2};

/// Polygon corner with the attributes interpolated across splits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BspVertex {
    pub pos: Point3<Real>,
    pub uv: Vector2<Real>,
}

impl BspVertex {
    pub fn new(pos: Point3<Real>) -> Self {
        Self { pos, uv: Vector2::zeros() }
    }

    pub fn with_uv(mut self, uv: Vector2<Real>) -> Self {
        self.uv = uv;
        self
    }

    pub fn interpolate(&self, other: &BspVertex, t: Real) -> BspVertex {
        BspVertex {
            pos: self.pos + (other.pos - self.pos) * t,
            uv: self.uv + (other.uv - self.uv) * t,
        }
    }
}

/// Where a polygon came from: operand index and source triangle. Every
/// fragment of a split keeps the origin of its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolygonOrigin {
    pub operand: usize,
    pub triangle: Option<TriangleId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BspPolygon {
    pub vertices: Vec<BspVertex>,
    pub plane: Plane,
    pub origin: PolygonOrigin,
}

impl BspPolygon {
    /// `None` for a degenerate triangle.
    pub fn from_triangle(vertices: [BspVertex; 3], origin: PolygonOrigin) -> Option<Self> {
        let plane = Plane::from_points(&vertices[0].pos, &vertices[1].pos, &vertices[2].pos)?;
        Some(Self {
            vertices: vertices.to_vec(),
            plane,
            origin,
        })
    }

    pub(crate) fn with_vertices(&self, vertices: Vec<BspVertex>) -> Self {
        Self {
            vertices,
            plane: self.plane,
            origin: self.origin,
        }
    }

    pub fn flip(&mut self) {
        self.vertices.reverse();
        self.plane.flip();
    }
}

/// One polygon per live, non-degenerate triangle of `mesh`, tagged with
/// `operand`. UVs come from the primary UV layer when it is set.
pub fn mesh_polygons(mesh: &DynamicMesh, operand: usize) -> Vec<BspPolygon> {
    let uvs = mesh.attributes().map(|a| a.primary_uv());
    mesh.triangle_ids()
        .filter_map(|tid| {
            let positions = mesh.triangle_positions(tid)?;
            let corner_uvs = uvs
                .and_then(|overlay| overlay.tri_values(tid))
                .unwrap_or([Vector2::zeros(); 3]);
            let vertices = [0, 1, 2].map(|i| BspVertex::new(positions[i]).with_uv(corner_uvs[i]));
            BspPolygon::from_triangle(
                vertices,
                PolygonOrigin {
                    operand,
                    triangle: Some(tid),
                },
            )
        })
        .collect()
}
