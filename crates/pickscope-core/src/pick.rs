//! Picking records and the contract for pickable items.

use std::any::Any;
use std::cmp::Ordering;

use glam::{Mat4, Vec2, Vec3};

use crate::bounds::Aabb;
use crate::ray::Ray;

/// Handle identifying an item registered in a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u32);

impl ItemId {
    /// Returns the raw index of this id.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Filter applied to every candidate triangle before it is tested.
///
/// Receives the three vertex positions (local space), the local ray and the
/// three vertex indices. Returning `false` skips the triangle.
pub type TrianglePredicate = dyn Fn(Vec3, Vec3, Vec3, &Ray, [u32; 3]) -> bool;

/// Result of a scene-level pick.
///
/// The default value is a miss. Items are referenced by [`ItemId`] only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PickingInfo {
    /// Whether anything was hit.
    pub hit: bool,
    /// World-space distance from the ray origin to the picked point.
    pub distance: f32,
    /// World-space hit position.
    pub picked_point: Option<Vec3>,
    /// The item that was hit.
    pub picked_item: Option<ItemId>,
    /// Barycentric weight of the first vertex of the hit triangle.
    pub bu: f32,
    /// Barycentric weight of the second vertex of the hit triangle.
    pub bv: f32,
    /// Index of the hit triangle (or line) within the whole item.
    pub face_id: Option<usize>,
    /// Index of the hit triangle (or line) within its sub-mesh.
    pub sub_mesh_face_id: Option<usize>,
    /// Index of the hit sub-mesh.
    pub sub_mesh_id: usize,
    /// Sprite hit, for sprite pickers layered on top.
    pub picked_sprite: Option<usize>,
    /// Index of the thin instance that was hit, if the item is instanced.
    pub thin_instance_index: Option<usize>,
    /// The world-space ray used for this pick.
    pub ray: Option<Ray>,
    /// Controller origin, filled in by XR pointer layers.
    pub origin_item: Option<ItemId>,
    /// Controller aim transform, filled in by XR pointer layers.
    pub aim_transform: Option<ItemId>,
    /// Controller grip transform, filled in by XR pointer layers.
    pub grip_transform: Option<ItemId>,
}

impl PickingInfo {
    /// Creates a miss record.
    pub fn miss() -> Self {
        Self::default()
    }

    /// Returns the third barycentric weight.
    pub fn bw(&self) -> f32 {
        1.0 - self.bu - self.bv
    }

    /// Returns the normal of the picked face.
    ///
    /// With `use_vertex_normals` the vertex normals are interpolated with the
    /// barycentric weights, otherwise the flat face normal is used. The result
    /// is flipped to face the pick ray when one is recorded and normalized.
    /// Returns `None` on a miss, for line geometry, or when the required
    /// buffers are missing.
    pub fn normal(
        &self,
        item: &dyn Pickable,
        use_world_coordinates: bool,
        use_vertex_normals: bool,
    ) -> Option<Vec3> {
        let face = self.hit_face()?;
        let geometry = item.geometry()?;
        if !geometry.triangles {
            return None;
        }
        let [i0, i1, i2] = geometry.triangle(face)?;

        let mut normal = if use_vertex_normals {
            let Some(normals) = geometry.normals else {
                log::warn!("item {} has no vertex normals", item.name());
                return None;
            };
            let n0 = *normals.get(i0)?;
            let n1 = *normals.get(i1)?;
            let n2 = *normals.get(i2)?;
            n0 * self.bu + n1 * self.bv + n2 * self.bw()
        } else {
            let p0 = *geometry.positions.get(i0)?;
            let p1 = *geometry.positions.get(i1)?;
            let p2 = *geometry.positions.get(i2)?;
            (p0 - p1).cross(p2 - p1)
        };

        let normal_matrix = self.instance_world(item).inverse().transpose();
        let world_normal = normal_matrix.transform_vector3(normal);
        if use_world_coordinates {
            normal = world_normal;
        }
        if let Some(ray) = &self.ray {
            if world_normal.dot(ray.direction) > 0.0 {
                normal = -normal;
            }
        }

        Some(normal.normalize_or_zero())
    }

    /// Returns the interpolated texture coordinates at the picked point.
    pub fn texture_coordinates(&self, item: &dyn Pickable) -> Option<Vec2> {
        let face = self.hit_face()?;
        let geometry = item.geometry()?;
        if !geometry.triangles {
            return None;
        }
        let Some(uvs) = geometry.uvs else {
            log::warn!("item {} has no texture coordinates", item.name());
            return None;
        };
        let [i0, i1, i2] = geometry.triangle(face)?;

        let uv0 = *uvs.get(i0)?;
        let uv1 = *uvs.get(i1)?;
        let uv2 = *uvs.get(i2)?;
        Some(uv0 * self.bu + uv1 * self.bv + uv2 * self.bw())
    }

    fn hit_face(&self) -> Option<usize> {
        if self.hit {
            self.face_id
        } else {
            None
        }
    }

    fn instance_world(&self, item: &dyn Pickable) -> Mat4 {
        let world = item.world_matrix();
        match self
            .thin_instance_index
            .and_then(|index| item.thin_instances().get(index))
        {
            Some(instance) => world * *instance,
            None => world,
        }
    }
}

/// Borrowed view of an item's vertex data.
#[derive(Debug, Clone, Copy)]
pub struct GeometryView<'a> {
    /// Vertex positions in local space.
    pub positions: &'a [Vec3],
    /// Triangle (or line) vertex indices.
    pub indices: &'a [u32],
    /// Per-vertex normals.
    pub normals: Option<&'a [Vec3]>,
    /// Per-vertex texture coordinates.
    pub uvs: Option<&'a [Vec2]>,
    /// Whether `indices` describes triangles (otherwise line segments).
    pub triangles: bool,
}

impl GeometryView<'_> {
    /// Returns the vertex indices of triangle `face`.
    pub fn triangle(&self, face: usize) -> Option<[usize; 3]> {
        let start = face.checked_mul(3)?;
        let tri = self.indices.get(start..start + 3)?;
        Some([tri[0] as usize, tri[1] as usize, tri[2] as usize])
    }
}

/// Options forwarded to [`Pickable::intersects`].
#[derive(Clone, Copy, Default)]
pub struct IntersectOptions<'a> {
    /// Stop at the first accepted primitive instead of searching for the nearest.
    pub fast_check: bool,
    /// Optional per-triangle filter.
    pub triangle_predicate: Option<&'a TrianglePredicate>,
    /// Only run the bounding tests and report a hit on the bounds.
    pub bounding_only: bool,
    /// World matrix to use instead of [`Pickable::world_matrix`].
    pub world_override: Option<Mat4>,
    /// Skip the bounding sphere and box rejection.
    pub skip_bounding_check: bool,
}

impl std::fmt::Debug for IntersectOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntersectOptions")
            .field("fast_check", &self.fast_check)
            .field("triangle_predicate", &self.triangle_predicate.is_some())
            .field("bounding_only", &self.bounding_only)
            .field("world_override", &self.world_override)
            .field("skip_bounding_check", &self.skip_bounding_check)
            .finish()
    }
}

/// An object that rays can be tested against.
pub trait Pickable: Any + Send + Sync {
    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to self as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Returns the id assigned when the item was registered.
    fn id(&self) -> ItemId;

    /// Assigns the item's id. Called by the scene on registration.
    fn set_id(&mut self, id: ItemId);

    /// Returns the unique name of this item.
    fn name(&self) -> &str;

    /// Returns the local-to-world transform.
    fn world_matrix(&self) -> Mat4;

    /// Returns whether the item is enabled.
    fn is_enabled(&self) -> bool;

    /// Returns whether the item is visible.
    fn is_visible(&self) -> bool;

    /// Returns whether the item accepts picks.
    fn is_pickable(&self) -> bool;

    /// Returns the local-space bounding box, covering every thin instance
    /// when instances are picked individually.
    fn bounding_box(&self) -> Option<Aabb>;

    /// Returns the world-space bounding box.
    fn world_bounding_box(&self) -> Option<Aabb> {
        let world = self.world_matrix();
        self.bounding_box().map(|aabb| aabb.transformed(&world))
    }

    /// Returns the per-instance transforms, applied before the world matrix.
    fn thin_instances(&self) -> &[Mat4] {
        &[]
    }

    /// Whether picking runs per thin instance.
    fn thin_instance_picking_enabled(&self) -> bool {
        !self.thin_instances().is_empty()
    }

    /// Distance within which a ray counts as touching the item's primitives.
    ///
    /// Zero for surfaces. Broad-phase indexes pad the item bounds by this much.
    fn intersection_threshold(&self) -> f32 {
        0.0
    }

    /// Returns the vertex data used to derive normals and texture coordinates.
    fn geometry(&self) -> Option<GeometryView<'_>> {
        None
    }

    /// Precise test against a ray expressed in this item's local space.
    ///
    /// Distances and the picked point in the result are in world space,
    /// computed with `options.world_override` or [`Pickable::world_matrix`].
    fn intersects(&self, local_ray: &Ray, options: &IntersectOptions<'_>) -> PickingInfo;
}

impl Ray {
    /// Tests a world-space ray against one item.
    pub fn intersects_item(&self, item: &dyn Pickable, fast_check: bool) -> PickingInfo {
        let mut local = Ray::zero();
        self.transform_to_ref(&item.world_matrix().inverse(), &mut local);

        let options = IntersectOptions {
            fast_check,
            ..IntersectOptions::default()
        };
        let mut info = item.intersects(&local, &options);
        if info.hit {
            info.ray = Some(*self);
        }
        info
    }

    /// Tests a world-space ray against several items.
    ///
    /// Returns only the hits, sorted by ascending distance. Hits at equal
    /// distance keep the order of `items`.
    pub fn intersects_items(&self, items: &[&dyn Pickable], fast_check: bool) -> Vec<PickingInfo> {
        let mut hits: Vec<PickingInfo> = items
            .iter()
            .map(|item| self.intersects_item(*item, fast_check))
            .filter(|info| info.hit)
            .collect();
        hits.sort_by(compare_distance);
        hits
    }
}

/// Three-way comparison on distance, treating unordered values as equal.
pub fn compare_distance(a: &PickingInfo, b: &PickingInfo) -> Ordering {
    if a.distance < b.distance {
        Ordering::Less
    } else if a.distance > b.distance {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A unit quad in the z = 0 plane made of two triangles.
    struct Quad {
        id: ItemId,
        world: Mat4,
        positions: Vec<Vec3>,
        indices: Vec<u32>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
    }

    impl Quad {
        fn new(id: u32, z: f32) -> Self {
            Self {
                id: ItemId(id),
                world: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
                positions: vec![
                    Vec3::new(-1.0, -1.0, 0.0),
                    Vec3::new(1.0, -1.0, 0.0),
                    Vec3::new(1.0, 1.0, 0.0),
                    Vec3::new(-1.0, 1.0, 0.0),
                ],
                indices: vec![0, 1, 2, 0, 2, 3],
                normals: vec![Vec3::Z; 4],
                uvs: vec![
                    Vec2::new(0.0, 0.0),
                    Vec2::new(1.0, 0.0),
                    Vec2::new(1.0, 1.0),
                    Vec2::new(0.0, 1.0),
                ],
            }
        }
    }

    impl Pickable for Quad {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn id(&self) -> ItemId {
            self.id
        }
        fn set_id(&mut self, id: ItemId) {
            self.id = id;
        }
        fn name(&self) -> &str {
            "quad"
        }
        fn world_matrix(&self) -> Mat4 {
            self.world
        }
        fn is_enabled(&self) -> bool {
            true
        }
        fn is_visible(&self) -> bool {
            true
        }
        fn is_pickable(&self) -> bool {
            true
        }
        fn bounding_box(&self) -> Option<Aabb> {
            Aabb::from_points(self.positions.iter())
        }
        fn geometry(&self) -> Option<GeometryView<'_>> {
            Some(GeometryView {
                positions: &self.positions,
                indices: &self.indices,
                normals: Some(&self.normals),
                uvs: Some(&self.uvs),
                triangles: true,
            })
        }
        fn intersects(&self, local_ray: &Ray, options: &IntersectOptions<'_>) -> PickingInfo {
            let world = options.world_override.unwrap_or(self.world);
            let mut best: Option<(usize, crate::IntersectionInfo)> = None;
            for face in 0..2 {
                let [a, b, c] = self.geometry().unwrap().triangle(face).unwrap();
                if let Some(info) =
                    local_ray.intersects_triangle(self.positions[a], self.positions[b], self.positions[c])
                {
                    if best.map_or(true, |(_, prev)| info.distance < prev.distance) {
                        best = Some((face, info));
                    }
                }
            }
            let Some((face, info)) = best else {
                return PickingInfo::miss();
            };
            let origin = world.transform_point3(local_ray.origin);
            let point = world.transform_point3(local_ray.at(info.distance));
            PickingInfo {
                hit: true,
                distance: origin.distance(point),
                picked_point: Some(point),
                picked_item: Some(self.id),
                bu: info.bu,
                bv: info.bv,
                face_id: Some(face),
                sub_mesh_face_id: Some(face),
                ..PickingInfo::default()
            }
        }
    }

    #[test]
    fn test_default_is_miss() {
        let info = PickingInfo::default();
        assert!(!info.hit);
        assert_eq!(info.distance, 0.0);
        assert!(info.picked_item.is_none());
        assert!(info.thin_instance_index.is_none());
    }

    #[test]
    fn test_intersects_items_sorted() {
        let far = Quad::new(0, 5.0);
        let near = Quad::new(1, 2.0);
        let ray = Ray::infinite(Vec3::new(0.2, 0.1, -10.0), Vec3::Z);
        let items: [&dyn Pickable; 2] = [&far, &near];
        let hits = ray.intersects_items(&items, false);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].picked_item, Some(ItemId(1)));
        assert!((hits[0].distance - 12.0).abs() < 1e-4);
        assert!((hits[1].distance - 15.0).abs() < 1e-4);
        assert_eq!(hits[0].ray, Some(ray));
    }

    #[test]
    fn test_intersects_items_equal_distance_keeps_order() {
        let a = Quad::new(7, 1.0);
        let b = Quad::new(3, 1.0);
        let ray = Ray::infinite(Vec3::new(0.2, 0.1, -10.0), Vec3::Z);
        let items: [&dyn Pickable; 2] = [&a, &b];
        let hits = ray.intersects_items(&items, false);
        assert_eq!(hits[0].picked_item, Some(ItemId(7)));
        assert_eq!(hits[1].picked_item, Some(ItemId(3)));
    }

    #[test]
    fn test_normal_faces_ray() {
        let quad = Quad::new(0, 0.0);
        let ray = Ray::infinite(Vec3::new(0.2, 0.1, -10.0), Vec3::Z);
        let info = ray.intersects_item(&quad, false);
        assert!(info.hit);

        let flat = info.normal(&quad, true, false).unwrap();
        assert!((flat - Vec3::NEG_Z).length() < 1e-5);
        let smooth = info.normal(&quad, true, true).unwrap();
        assert!((smooth - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_texture_coordinates() {
        let quad = Quad::new(0, 0.0);
        let ray = Ray::infinite(Vec3::new(0.5, -0.5, -10.0), Vec3::Z);
        let info = ray.intersects_item(&quad, false);
        let uv = info.texture_coordinates(&quad).unwrap();
        assert!((uv - Vec2::new(0.75, 0.25)).length() < 1e-5);
    }

    #[test]
    fn test_normal_on_miss() {
        let quad = Quad::new(0, 0.0);
        assert!(PickingInfo::miss().normal(&quad, true, true).is_none());
        assert!(PickingInfo::miss().texture_coordinates(&quad).is_none());
    }
}
