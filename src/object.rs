//! Mesh objects: a mesh with a placement, spatial indexes and observers.
//!
//! All mutation goes through [`MeshObject::edit_mesh`], which runs the
//! caller's closure with exclusive access, rebuilds the spatial indexes and
//! only then notifies listeners and backends. Observers therefore never see
//! a fresh mesh paired with a stale index.

use crate::errors::{MeshError, MeshResult};
use crate::float_types::Real;
use crate::generators::{
    BoxGenerator, ConvexHullGenerator, DelaunayGenerator, MeshGenerator, PointCloudField, RandomPointsGenerator,
    SphereGenerator,
};
use crate::io::{ImportOptions, IoError, MeshImporter, ObjImporter};
use crate::mesh::{DynamicMesh, NormalsMode};
use crate::ops::{
    BooleanOp, HoleFillOptions, HoleFillReport, MeshReduction, MorphologyOp, MorphologyParams, PlaneCutOptions,
    SimplifyTarget, SolidifyParams,
};
use crate::render::MeshBackend;
use crate::spatial::{FastWindingTree, MeshBvh, QueryOptions, Ray, RayHit};
use nalgebra::{Affine3, Point2, Point3, Vector3};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Tessellation of the sphere substituted for a mesh that failed to load.
pub const FALLBACK_SPHERE_TESSELLATION: usize = 8;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`MeshObject`], carried by change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Built-in shapes an object can regenerate itself from.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveShape {
    Sphere { radius: Real, tessellation: usize },
    /// Box with half extent `radius`, the Z extent scaled by `depth_ratio`
    Box { radius: Real, depth_ratio: Real, tessellation: usize },
    ConvexHull { points: Vec<Point2<Real>> },
    RandomPoints { points: Vec<Point2<Real>> },
    Delaunay { points: Vec<Point2<Real>> },
    /// Blobs around each point, meshed with marching cubes
    PointCloud { points: Vec<Point3<Real>>, cube_size: Real },
}

impl PrimitiveShape {
    pub fn generate(&self) -> MeshResult<DynamicMesh> {
        match self {
            PrimitiveShape::Sphere { radius, tessellation } => SphereGenerator::new(*radius)
                .with_uniform_tessellation(*tessellation)
                .generate(),
            PrimitiveShape::Box {
                radius,
                depth_ratio,
                tessellation,
            } => BoxGenerator::new(Vector3::new(*radius, *radius, radius * depth_ratio))
                .with_edge_vertices(*tessellation)
                .generate(),
            PrimitiveShape::ConvexHull { points } => ConvexHullGenerator::new(points.clone()).generate(),
            PrimitiveShape::RandomPoints { points } => RandomPointsGenerator::new(points.clone()).generate(),
            PrimitiveShape::Delaunay { points } => DelaunayGenerator::new(points.clone()).generate(),
            PrimitiveShape::PointCloud { points, cube_size } => {
                if points.len() < 3 {
                    return Err(MeshError::TooFewPoints {
                        required: 3,
                        found: points.len(),
                    });
                }
                PointCloudField::new(points.clone())
                    .into_generator(*cube_size, 0.5)
                    .generate()
            },
        }
    }
}

/// Where [`MeshObject::regenerate`] gets its mesh from.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshSource {
    /// Regeneration leaves the mesh alone
    None,
    Primitive(PrimitiveShape),
    Imported {
        path: PathBuf,
        options: ImportOptions,
        /// Move the bounds center to the origin
        center_pivot: bool,
        scale: Real,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSettings {
    pub normals_mode: NormalsMode,
    /// Keep a BVH for distance, nearest-point and ray queries
    pub enable_spatial_queries: bool,
    /// Keep a winding tree for containment queries
    pub enable_inside_queries: bool,
    /// Ask backends for collision data after every edit
    pub enable_collision: bool,
    pub source: MeshSource,
    /// Radius of the sphere used when an import fails
    pub fallback_radius: Real,
}

impl Default for ObjectSettings {
    fn default() -> Self {
        Self {
            normals_mode: NormalsMode::PerVertex,
            enable_spatial_queries: true,
            enable_inside_queries: true,
            enable_collision: false,
            source: MeshSource::Primitive(PrimitiveShape::Sphere {
                radius: 50.0,
                tessellation: 16,
            }),
            fallback_radius: 50.0,
        }
    }
}

/// Closest surface point to a query, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestHit {
    pub distance: Real,
    pub point: Point3<Real>,
    pub triangle: crate::mesh::TriangleId,
}

type Listener = Box<dyn FnMut(ObjectId)>;

pub struct MeshObject {
    id: ObjectId,
    mesh: DynamicMesh,
    transform: Affine3<Real>,
    inverse: Affine3<Real>,
    settings: ObjectSettings,
    bvh: Option<MeshBvh>,
    winding: Option<FastWindingTree>,
    importer: Box<dyn MeshImporter>,
    listeners: Vec<Listener>,
    backends: Vec<Box<dyn MeshBackend>>,
}

impl fmt::Debug for MeshObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshObject")
            .field("id", &self.id)
            .field("triangles", &self.mesh.triangle_count())
            .field("settings", &self.settings)
            .field("listeners", &self.listeners.len())
            .field("backends", &self.backends.len())
            .finish_non_exhaustive()
    }
}

impl Default for MeshObject {
    fn default() -> Self {
        Self::new(ObjectSettings::default())
    }
}

impl MeshObject {
    /// An object with an empty mesh. Call [`regenerate`](Self::regenerate)
    /// to build it from `settings.source`.
    pub fn new(settings: ObjectSettings) -> Self {
        Self {
            id: ObjectId::next(),
            mesh: DynamicMesh::new(),
            transform: Affine3::identity(),
            inverse: Affine3::identity(),
            settings,
            bvh: None,
            winding: None,
            importer: Box::new(ObjImporter),
            listeners: Vec::new(),
            backends: Vec::new(),
        }
    }

    /// Build an object and generate its mesh from `settings.source`.
    pub fn from_source(settings: ObjectSettings) -> MeshResult<Self> {
        let mut object = Self::new(settings);
        object.regenerate()?;
        Ok(object)
    }

    pub fn with_importer(mut self, importer: Box<dyn MeshImporter>) -> Self {
        self.importer = importer;
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn settings(&self) -> &ObjectSettings {
        &self.settings
    }

    /// Settings take effect at the next edit or regeneration.
    pub fn settings_mut(&mut self) -> &mut ObjectSettings {
        &mut self.settings
    }

    pub fn transform(&self) -> &Affine3<Real> {
        &self.transform
    }

    /// Place the object. Fails for a singular transform.
    pub fn set_transform(&mut self, transform: Affine3<Real>) -> MeshResult<()> {
        self.inverse = transform.try_inverse().ok_or(MeshError::NotInvertible)?;
        self.transform = transform;
        Ok(())
    }

    pub fn add_listener(&mut self, listener: impl FnMut(ObjectId) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn add_backend(&mut self, backend: Box<dyn MeshBackend>) {
        self.backends.push(backend);
    }

    pub fn mesh_ref(&self) -> &DynamicMesh {
        &self.mesh
    }

    pub fn mesh_copy(&self) -> DynamicMesh {
        self.mesh.clone()
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }

    /// Run `edit` with exclusive access to the mesh, then rebuild spatial
    /// indexes and notify backends and listeners.
    pub fn edit_mesh<R>(&mut self, edit: impl FnOnce(&mut DynamicMesh) -> R) -> R {
        let out = edit(&mut self.mesh);
        self.rebuild_spatial();
        self.notify();
        out
    }

    fn rebuild_spatial(&mut self) {
        let want_bvh = self.settings.enable_spatial_queries || self.settings.enable_inside_queries;
        self.bvh = want_bvh.then(|| MeshBvh::build(&self.mesh));
        self.winding = match (&self.bvh, self.settings.enable_inside_queries) {
            (Some(bvh), true) => Some(FastWindingTree::build(bvh)),
            _ => None,
        };
    }

    fn notify(&mut self) {
        for backend in &mut self.backends {
            backend.push_mesh_update(self.id, &self.mesh);
            if self.settings.enable_collision {
                backend.request_collision(self.id, &self.mesh);
            }
        }
        for listener in &mut self.listeners {
            listener(self.id);
        }
        debug!(object = self.id.0, triangles = self.mesh.triangle_count(), "mesh edited");
    }

    /// Replace the mesh with `mesh`, applying the object's normals mode.
    fn commit(&mut self, mut mesh: DynamicMesh) {
        mesh.recompute_normals(self.settings.normals_mode);
        self.edit_mesh(|m| *m = mesh);
    }

    /// Rebuild the mesh from `settings.source`.
    ///
    /// A failed import is replaced by a low-resolution sphere so the object
    /// never ends up empty; a primitive that cannot be generated leaves the
    /// mesh unchanged.
    pub fn regenerate(&mut self) -> MeshResult<()> {
        let mesh = match &self.settings.source {
            MeshSource::None => return Ok(()),
            MeshSource::Primitive(shape) => shape.generate()?,
            MeshSource::Imported {
                path,
                options,
                center_pivot,
                scale,
            } => {
                let mut mesh = match self.importer.read_mesh(path, *options) {
                    Ok(mesh) => mesh,
                    Err(err) => {
                        warn!(path = %path.display(), %err, "import failed, using fallback sphere");
                        SphereGenerator::new(self.settings.fallback_radius)
                            .with_uniform_tessellation(FALLBACK_SPHERE_TESSELLATION)
                            .generate()?
                    },
                };
                if *center_pivot && !mesh.is_empty() {
                    mesh.translate(-mesh.bounds().center().coords);
                }
                if *scale != 1.0 {
                    mesh.scale(Vector3::repeat(*scale));
                }
                mesh
            },
        };
        self.commit(mesh);
        Ok(())
    }

    /// Replace the mesh with the file at `path`. On failure the mesh is
    /// left unchanged.
    pub fn import_mesh(&mut self, path: &Path, reverse_orientation: bool, recompute_normals: bool) -> Result<(), IoError> {
        let options = ImportOptions {
            want_colors: true,
            reverse_orientation,
            ..Default::default()
        };
        let mut mesh = self.importer.read_mesh(path, options).inspect_err(|err| {
            warn!(path = %path.display(), %err, "error reading mesh file");
        })?;
        if recompute_normals {
            mesh.recompute_normals(self.settings.normals_mode);
        }
        self.edit_mesh(|m| *m = mesh);
        Ok(())
    }

    /// Take a copy of `other`'s mesh, in this object's local frame as is.
    pub fn copy_from(&mut self, other: &MeshObject, recompute_normals: bool) {
        let mut mesh = other.mesh_copy();
        if recompute_normals {
            mesh.recompute_normals(self.settings.normals_mode);
        }
        self.edit_mesh(|m| *m = mesh);
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    // World-space queries
    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    fn to_local(&self, world: &Point3<Real>) -> Point3<Real> {
        self.inverse.transform_point(world)
    }

    /// Distance from `world_point` to the surface. `None` when spatial
    /// queries are disabled or the mesh is empty.
    pub fn distance_to_point(&self, world_point: &Point3<Real>) -> Option<NearestHit> {
        if !self.settings.enable_spatial_queries {
            return None;
        }
        let bvh = self.bvh.as_ref()?;
        let local = self.to_local(world_point);
        let (triangle, _) = bvh.find_nearest_triangle(&local)?;
        let nearest = bvh.find_nearest_point(&local)?;
        let point = self.transform.transform_point(&nearest);
        Some(NearestHit {
            distance: (point - world_point).norm(),
            point,
            triangle,
        })
    }

    /// Closest surface point, or `world_point` itself when spatial queries
    /// are disabled.
    pub fn nearest_point(&self, world_point: &Point3<Real>) -> Point3<Real> {
        self.distance_to_point(world_point)
            .map_or(*world_point, |hit| hit.point)
    }

    /// Winding-number containment. Always `false` with inside queries
    /// disabled.
    pub fn contains_point(&self, world_point: &Point3<Real>, winding_threshold: Real) -> bool {
        if !self.settings.enable_inside_queries {
            return false;
        }
        match (&self.bvh, &self.winding) {
            (Some(bvh), Some(winding)) => winding.is_inside(bvh, &self.to_local(world_point), winding_threshold),
            _ => false,
        }
    }

    /// First surface hit along a world-space ray. Distance and point are in
    /// world space; `max_distance <= 0` means unlimited.
    pub fn intersect_ray(&self, origin: &Point3<Real>, direction: &Vector3<Real>, max_distance: Real) -> Option<RayHit> {
        if !self.settings.enable_spatial_queries {
            return None;
        }
        let bvh = self.bvh.as_ref()?;
        let world_dir = direction.try_normalize(Real::EPSILON)?;
        let local_origin = self.to_local(origin);
        let local_dir = self.inverse.transform_vector(&world_dir).try_normalize(Real::EPSILON)?;

        let mut options = QueryOptions::default();
        if max_distance > 0.0 {
            // bound in local units along the local ray
            let far = self.to_local(&(origin + world_dir * max_distance));
            options.max_distance = (far - local_origin).norm();
        }
        let hit = bvh.ray_hit(&Ray::new(local_origin, local_dir), &options)?;
        let point = self.transform.transform_point(&hit.point);
        Some(RayHit {
            triangle: hit.triangle,
            distance: (point - origin).norm(),
            point,
        })
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    // Operations
    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Combine with `other`, placed by both objects' transforms. On failure
    /// the mesh is unchanged.
    pub fn boolean_with(&mut self, other: &MeshObject, op: BooleanOp) -> MeshResult<()> {
        let other_to_self = self.inverse * other.transform;
        let result = crate::ops::boolean(&self.mesh, &other.mesh, &other_to_self, op).inspect_err(|err| {
            warn!(object = self.id.0, other = other.id.0, ?op, %err, "boolean failed, mesh unchanged");
        })?;
        self.commit(result);
        Ok(())
    }

    pub fn union_with(&mut self, other: &MeshObject) -> MeshResult<()> {
        self.boolean_with(other, BooleanOp::Union)
    }

    pub fn subtract(&mut self, other: &MeshObject) -> MeshResult<()> {
        self.boolean_with(other, BooleanOp::Difference)
    }

    pub fn intersect_with(&mut self, other: &MeshObject) -> MeshResult<()> {
        self.boolean_with(other, BooleanOp::Intersection)
    }

    pub fn solidify(&mut self, voxel_resolution: usize, winding_threshold: Real) -> MeshResult<()> {
        let params = SolidifyParams {
            voxel_resolution,
            winding_threshold,
            ..Default::default()
        };
        let result = crate::ops::solidify(&self.mesh, params)?;
        self.commit(result);
        Ok(())
    }

    /// QEM simplification. The target is clamped to at least one triangle
    /// and a target at or above the current count is a no-op.
    pub fn simplify_to_triangle_count(&mut self, target: usize) -> MeshResult<()> {
        let target = target.max(1);
        if target >= self.mesh.triangle_count() {
            debug!(target, current = self.mesh.triangle_count(), "simplification target not below current");
            return Ok(());
        }
        let result = crate::ops::simplify_to_triangle_count(&self.mesh, target)?;
        self.commit(result);
        Ok(())
    }

    /// Simplify through a reduction collaborator.
    pub fn simplify(&mut self, reduction: &dyn MeshReduction, target: SimplifyTarget) -> MeshResult<()> {
        let result = crate::ops::simplify_with_reduction(&self.mesh, reduction, target)?;
        self.edit_mesh(|m| *m = result);
        Ok(())
    }

    pub fn dilate(&mut self, distance: Real, grid_cell_size: Real, mesh_cell_size: Real) -> MeshResult<()> {
        let params = MorphologyParams {
            op: MorphologyOp::Dilate,
            distance,
            grid_cell_size,
            mesh_cell_size,
            ..Default::default()
        };
        let result = crate::ops::morphology(&self.mesh, params)?;
        self.commit(result);
        Ok(())
    }

    /// Fill every hole; partial success is reported, not treated as an
    /// error.
    pub fn fill_holes(&mut self) -> MeshResult<HoleFillReport> {
        let (result, report) = crate::ops::fill_holes(&self.mesh, HoleFillOptions::default())?;
        self.edit_mesh(|m| *m = result.compacted());
        Ok(report)
    }

    /// Plane in world space to the local frame.
    fn local_plane(&self, origin: &Point3<Real>, normal: &Vector3<Real>) -> (Point3<Real>, Vector3<Real>) {
        let linear = self.transform.matrix().fixed_view::<3, 3>(0, 0).into_owned();
        (self.to_local(origin), linear.transpose() * normal)
    }

    /// Cut with a world-space plane. This object keeps the first piece; the
    /// second goes to `other`, which takes over this object's placement.
    /// Returns the number of pieces produced.
    pub fn plane_cut(
        &mut self,
        other: Option<&mut MeshObject>,
        origin: &Point3<Real>,
        normal: &Vector3<Real>,
        options: PlaneCutOptions,
    ) -> MeshResult<usize> {
        let (local_origin, local_normal) = self.local_plane(origin, normal);
        let result = crate::ops::simple_plane_cut(&self.mesh, local_origin, local_normal, options)?;
        let count = result.pieces.len();
        let mut pieces = result.pieces.into_iter();
        let Some(first) = pieces.next() else {
            warn!(object = self.id.0, "plane cut left nothing behind the plane");
            return Ok(0);
        };
        self.settings.normals_mode = NormalsMode::Split;
        self.commit(first);
        if let (Some(other), Some(second)) = (other, pieces.next()) {
            other.settings.normals_mode = NormalsMode::Split;
            other.transform = self.transform;
            other.inverse = self.inverse;
            other.commit(second);
        }
        info!(object = self.id.0, pieces = count, "plane cut");
        Ok(count)
    }

    /// Cut into sub-objects, keeping both sides and tagging the original
    /// surface. This object keeps the first piece; every other piece is
    /// returned as a new object with the same placement and settings.
    pub fn advanced_plane_cut(
        &mut self,
        origin: &Point3<Real>,
        normal: &Vector3<Real>,
        uv_scale: Real,
    ) -> MeshResult<Vec<MeshObject>> {
        let (local_origin, local_normal) = self.local_plane(origin, normal);
        let result = crate::ops::advanced_plane_cut(&self.mesh, local_origin, local_normal, uv_scale)?;
        let mut pieces = result.pieces.into_iter();
        let Some(first) = pieces.next() else {
            return Ok(Vec::new());
        };
        self.settings.normals_mode = NormalsMode::Split;
        self.commit(first);

        let settings = ObjectSettings {
            source: MeshSource::None,
            ..self.settings.clone()
        };
        let spawned: Vec<MeshObject> = pieces
            .map(|piece| {
                let mut object = MeshObject::new(settings.clone());
                object.transform = self.transform;
                object.inverse = self.inverse;
                object.commit(piece);
                object
            })
            .collect();
        info!(object = self.id.0, spawned = spawned.len(), "advanced plane cut");
        Ok(spawned)
    }

    pub fn write_obj(&self, path: &Path) -> Result<(), IoError> {
        let mut writer = BufWriter::new(File::create(path)?);
        crate::io::write_obj(&self.mesh, &mut writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::IsShell;
    use nalgebra::Translation3;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn cube_settings() -> ObjectSettings {
        ObjectSettings {
            source: MeshSource::Primitive(PrimitiveShape::Box {
                radius: 0.5,
                depth_ratio: 1.0,
                tessellation: 2,
            }),
            ..Default::default()
        }
    }

    struct CountingBackend(Rc<RefCell<Vec<(ObjectId, usize)>>>);

    impl MeshBackend for CountingBackend {
        fn push_mesh_update(&mut self, object: ObjectId, mesh: &DynamicMesh) {
            self.0.borrow_mut().push((object, mesh.triangle_count()));
        }
    }

    #[test]
    fn edit_rebuilds_index_before_notifying() {
        let mut object = MeshObject::from_source(cube_settings()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        object.add_backend(Box::new(CountingBackend(seen.clone())));
        let notified = Rc::new(RefCell::new(0));
        let counter = notified.clone();
        object.add_listener(move |_| *counter.borrow_mut() += 1);

        object.edit_mesh(|m| m.translate(Vector3::new(10.0, 0.0, 0.0)));
        assert_eq!(*notified.borrow(), 1);
        assert_eq!(seen.borrow().as_slice(), &[(object.id(), 12)]);
        assert!(object.contains_point(&Point3::new(10.0, 0.0, 0.0), 0.5));
        assert!(!object.contains_point(&Point3::origin(), 0.5));
    }

    #[test]
    fn queries_respect_transform() {
        let mut object = MeshObject::from_source(cube_settings()).unwrap();
        object
            .set_transform(nalgebra::convert(Translation3::new(5.0, 0.0, 0.0)))
            .unwrap();
        assert!(object.contains_point(&Point3::new(5.0, 0.0, 0.0), 0.5));

        let hit = object.distance_to_point(&Point3::new(7.0, 0.0, 0.0)).unwrap();
        assert!((hit.distance - 1.5).abs() < 1e-9);
        assert!((hit.point.x - 5.5).abs() < 1e-9);

        let ray = object
            .intersect_ray(&Point3::new(0.0, 0.0, 0.0), &Vector3::x(), 0.0)
            .unwrap();
        assert!((ray.distance - 4.5).abs() < 1e-9);
        assert!(object.intersect_ray(&Point3::origin(), &Vector3::x(), 1.0).is_none());
    }

    #[test]
    fn disabled_queries_fall_back() {
        let settings = ObjectSettings {
            enable_spatial_queries: false,
            enable_inside_queries: false,
            ..cube_settings()
        };
        let object = MeshObject::from_source(settings).unwrap();
        let p = Point3::new(3.0, 0.0, 0.0);
        assert_eq!(object.nearest_point(&p), p);
        assert!(object.distance_to_point(&p).is_none());
        assert!(!object.contains_point(&Point3::origin(), 0.5));
    }

    #[test]
    fn failed_import_uses_fallback_sphere() {
        let settings = ObjectSettings {
            source: MeshSource::Imported {
                path: PathBuf::from("does/not/exist.obj"),
                options: ImportOptions::default(),
                center_pivot: false,
                scale: 1.0,
            },
            fallback_radius: 2.0,
            ..Default::default()
        };
        let object = MeshObject::from_source(settings).unwrap();
        let expected = SphereGenerator::new(2.0)
            .with_uniform_tessellation(FALLBACK_SPHERE_TESSELLATION)
            .generate()
            .unwrap();
        assert_eq!(object.triangle_count(), expected.triangle_count());
    }

    #[test]
    fn failed_boolean_leaves_mesh_unchanged() {
        let mut object = MeshObject::from_source(cube_settings()).unwrap();
        let mut open = MeshObject::from_source(cube_settings()).unwrap();
        open.edit_mesh(|m| m.remove_triangle(crate::mesh::TriangleId(0), true).unwrap());
        let before = object.mesh_copy();

        assert!(object.union_with(&open).is_err());
        assert_eq!(object.triangle_count(), before.triangle_count());
        assert!((object.mesh_ref().volume() - before.volume()).abs() < 1e-12);
    }

    #[test]
    fn subtract_uses_relative_placement() {
        let mut a = MeshObject::from_source(cube_settings()).unwrap();
        let mut b = MeshObject::from_source(cube_settings()).unwrap();
        b.set_transform(nalgebra::convert(Translation3::new(0.5, 0.5, 0.5)))
            .unwrap();
        a.subtract(&b).unwrap();
        assert!((a.mesh_ref().volume() - 0.875).abs() < 1e-6);
    }

    #[test]
    fn simplify_target_above_count_is_noop() {
        let mut object = MeshObject::from_source(cube_settings()).unwrap();
        object.simplify_to_triangle_count(1000).unwrap();
        assert_eq!(object.triangle_count(), 12);
    }

    #[test]
    fn plane_cut_hands_second_piece_to_other() {
        let mut object = MeshObject::from_source(cube_settings()).unwrap();
        let mut other = MeshObject::new(ObjectSettings {
            source: MeshSource::None,
            ..Default::default()
        });
        let options = PlaneCutOptions {
            keep_both_halves: true,
            ..Default::default()
        };
        let count = object
            .plane_cut(Some(&mut other), &Point3::origin(), &Vector3::x(), options)
            .unwrap();
        assert_eq!(count, 2);
        assert!((object.mesh_ref().volume() - 0.5).abs() < 1e-9);
        assert!((other.mesh_ref().volume() - 0.5).abs() < 1e-9);
        assert_eq!(other.settings().normals_mode, NormalsMode::Split);
    }

    #[test]
    fn advanced_cut_spawns_objects_without_sub_object_tag() {
        let mut object = MeshObject::from_source(cube_settings()).unwrap();
        let spawned = object
            .advanced_plane_cut(&Point3::origin(), &Vector3::z(), 1.0)
            .unwrap();
        assert_eq!(spawned.len(), 1);
        let attributes = spawned[0].mesh_ref().attributes().unwrap();
        assert!(attributes.has_tag::<IsShell>());
        assert!(!attributes.has_tag::<crate::mesh::SubObjectId>());
    }

    #[test]
    fn write_obj_round_trips() {
        let object = MeshObject::from_source(cube_settings()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.obj");
        object.write_obj(&path).unwrap();

        let mut reloaded = MeshObject::new(ObjectSettings::default());
        reloaded.import_mesh(&path, false, true).unwrap();
        assert_eq!(reloaded.triangle_count(), 12);
        assert!((reloaded.mesh_ref().volume() - 1.0).abs() < 1e-9);
    }
}
