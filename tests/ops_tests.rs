mod support;

use nalgebra::{Point2, Point3, Vector3};
use procmesh::{
    DynamicMesh,
    generators::{ConvexHullGenerator, DelaunayGenerator, MarchingCubes, MeshGenerator, RandomPointsGenerator},
    io::{ImportOptions, read_obj, to_obj},
    mesh::{IsShell, NormalsMode},
    object::{MeshObject, MeshSource, ObjectSettings, PrimitiveShape},
    ops::{
        HoleFillOptions, MorphologyOp, MorphologyParams, PlaneCutOptions, QemReduction, SimplifyTarget, SolidifyParams,
        advanced_plane_cut, fill_holes, morphology, simple_plane_cut, simplify_to_triangle_count,
        simplify_with_reduction, solidify,
    },
    render::SectionBuffers,
};

use crate::support::{approx_eq, unit_cube, unit_sphere};

fn square_points() -> Vec<Point2<f64>> {
    vec![
        Point2::new(0.0, 0.0),
        Point2::new(4.0, 0.0),
        Point2::new(4.0, 4.0),
        Point2::new(0.0, 4.0),
        Point2::new(1.0, 1.5),
        Point2::new(2.5, 3.0),
    ]
}

#[test]
fn planar_generators_cover_the_hull() {
    let hull = ConvexHullGenerator::new(square_points()).generate().unwrap();
    let random = RandomPointsGenerator::new(square_points()).generate().unwrap();
    let delaunay = DelaunayGenerator::new(square_points()).generate().unwrap();

    for mesh in [&hull, &random, &delaunay] {
        assert!(approx_eq(mesh.surface_area(), 16.0, 1e-9));
    }
    assert!(random.triangle_count() > hull.triangle_count());
    assert_eq!(delaunay.triangle_count(), 6);
}

#[test]
fn planar_generators_need_three_points() {
    let two = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
    assert!(ConvexHullGenerator::new(two.clone()).generate().is_err());
    assert!(RandomPointsGenerator::new(two.clone()).generate().is_err());
    assert!(DelaunayGenerator::new(two).generate().is_err());
}

#[test]
fn marching_cubes_sphere_is_closed() {
    let bounds = procmesh::float_types::parry3d::bounding_volume::Aabb::new(
        Point3::new(-1.5, -1.5, -1.5),
        Point3::new(1.5, 1.5, 1.5),
    );
    let mesh = MarchingCubes::new(|p: &Point3<f64>| 1.0 - p.coords.norm(), bounds, 0.1)
        .with_parallel(false)
        .generate()
        .unwrap();
    assert!(mesh.is_closed());
    let expected = 4.0 / 3.0 * std::f64::consts::PI;
    assert!((mesh.volume() - expected).abs() / expected < 0.03);
}

#[test]
fn cut_then_fill_then_render() {
    let sphere = unit_sphere(16);
    let options = PlaneCutOptions {
        fill_holes: false,
        ..Default::default()
    };
    let open = simple_plane_cut(&sphere, Point3::new(0.0, 0.0, 0.1), Vector3::z(), options).unwrap();
    assert_eq!(open.pieces.len(), 1);
    let half = &open.pieces[0];
    assert!(!half.is_closed());

    let (filled, report) = fill_holes(half, HoleFillOptions::default()).unwrap();
    assert_eq!(report.filled, 1);
    assert_eq!(report.failed, 0);
    assert!(filled.is_closed());

    let buffers = SectionBuffers::from_mesh(&filled);
    assert_eq!(buffers.triangle_count(), filled.triangle_count());
}

#[test]
fn advanced_cut_tags_caps_for_a_second_section() {
    let result = advanced_plane_cut(&unit_cube(), Point3::origin(), Vector3::new(1.0, 0.25, 0.0), 1.0).unwrap();
    assert_eq!(result.pieces.len(), 2);
    let total: f64 = result.pieces.iter().map(DynamicMesh::volume).sum();
    assert!(approx_eq(total, 1.0, 1e-9));
    for piece in &result.pieces {
        assert!(piece.attributes().unwrap().has_tag::<IsShell>());
        let buffers = SectionBuffers::from_mesh(piece);
        assert_eq!(buffers.sections.len(), 2);
        assert_eq!(buffers.sections[1].material, 1);
    }
}

#[test]
fn simplification_paths_agree_on_count() {
    let sphere = unit_sphere(20);
    let target = sphere.triangle_count() / 2;
    let direct = simplify_to_triangle_count(&sphere, target).unwrap();
    let via_reduction = simplify_with_reduction(&sphere, &QemReduction, SimplifyTarget::TriangleCount(target)).unwrap();
    assert!(direct.triangle_count() <= target);
    assert!(via_reduction.triangle_count() <= target);
    assert!(direct.is_closed());
}

#[test]
fn solidify_and_dilate_grow_volume() {
    let cube = unit_cube();
    let solid = solidify(
        &cube,
        SolidifyParams {
            voxel_resolution: 16,
            parallel: false,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(solid.is_closed());
    assert!(approx_eq(solid.volume(), 1.0, 0.15));

    let dilated = morphology(
        &cube,
        MorphologyParams {
            op: MorphologyOp::Dilate,
            distance: 0.2,
            grid_cell_size: 0.1,
            mesh_cell_size: 0.1,
            parallel: false,
        },
    )
    .unwrap();
    // rounded box: 1.4^3 minus the corner and edge deficit
    assert!(dilated.volume() > 1.9 && dilated.volume() < 2.8);
}

#[test]
fn obj_round_trip_preserves_vertex_order_and_winding() {
    let mut mesh = unit_sphere(8);
    mesh.recompute_normals(NormalsMode::Face);
    let text = to_obj(&mesh);
    let back = read_obj(text.as_bytes(), ImportOptions::default()).unwrap();
    assert_eq!(back.vertex_count(), mesh.vertex_count());
    for (a, b) in mesh.triangle_ids().zip(back.triangle_ids()) {
        assert_eq!(mesh.triangle(a), back.triangle(b));
        assert_eq!(
            mesh.attributes().unwrap().normals().tri_values(a),
            back.attributes().unwrap().normals().tri_values(b)
        );
    }
}

#[test]
fn object_workflow_with_primitive_source() {
    let settings = ObjectSettings {
        source: MeshSource::Primitive(PrimitiveShape::Sphere {
            radius: 1.0,
            tessellation: 12,
        }),
        ..Default::default()
    };
    let mut object = MeshObject::from_source(settings).unwrap();
    let before = object.triangle_count();

    object.simplify_to_triangle_count(before / 2).unwrap();
    assert!(object.triangle_count() <= before / 2);
    assert!(object.contains_point(&Point3::origin(), 0.5));

    object.settings_mut().source = MeshSource::Primitive(PrimitiveShape::Box {
        radius: 1.0,
        depth_ratio: 0.5,
        tessellation: 2,
    });
    object.regenerate().unwrap();
    assert!(approx_eq(object.mesh_ref().volume(), 2.0 * 2.0 * 1.0, 1e-9));
}
