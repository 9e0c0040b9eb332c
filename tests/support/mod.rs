//! Test support library
//! Provides various helper functions & utilities for tests.
#![allow(dead_code)]

use nalgebra::{Point3, Vector3};
use procmesh::{
    DynamicMesh,
    float_types::Real,
    generators::{BoxGenerator, MeshGenerator, SphereGenerator},
};

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

/// Axis-aligned cube with edge length 1 centered on `center`.
pub fn unit_cube_at(center: Point3<Real>) -> DynamicMesh {
    BoxGenerator::new(Vector3::new(0.5, 0.5, 0.5))
        .with_center(center)
        .generate()
        .expect("box generation cannot fail")
}

pub fn unit_cube() -> DynamicMesh {
    unit_cube_at(Point3::origin())
}

/// Sphere of radius 1 at the origin.
pub fn unit_sphere(tessellation: usize) -> DynamicMesh {
    SphereGenerator::new(1.0)
        .with_uniform_tessellation(tessellation)
        .generate()
        .expect("sphere generation cannot fail")
}

/// Every live triangle, in ID order, as corner positions.
pub fn triangle_soup(mesh: &DynamicMesh) -> Vec<[Point3<Real>; 3]> {
    mesh.triangle_ids()
        .filter_map(|t| mesh.triangle_positions(t))
        .collect()
}
