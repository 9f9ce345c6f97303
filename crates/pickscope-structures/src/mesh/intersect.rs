//! Precise ray tests against mesh triangles and line segments.

use glam::Mat4;
use pickscope_core::pick::{IntersectOptions, PickingInfo, Pickable};
use pickscope_core::{IntersectionInfo, Ray};

use super::{Mesh, MeshTopology, SubMesh};

impl Mesh {
    /// Tests a ray expressed in this mesh's local space.
    pub(super) fn intersect_local(&self, ray: &Ray, options: &IntersectOptions<'_>) -> PickingInfo {
        let Some(bounds) = self.bounding_box else {
            log::warn!("mesh {} has no vertex data, skipping", self.name);
            return PickingInfo::miss();
        };
        let epsilon = self.topology.bounds_epsilon();
        let sphere = bounds.bounding_sphere();

        if !options.skip_bounding_check
            && (!ray.intersects_bounding_sphere(&sphere, epsilon)
                || !ray.intersects_box(&bounds, epsilon))
        {
            return PickingInfo::miss();
        }

        let world = options.world_override.unwrap_or(self.transform);

        if options.bounding_only {
            let origin = world.transform_point3(ray.origin);
            let center = world.transform_point3(sphere.center);
            return PickingInfo {
                hit: true,
                distance: origin.distance(center),
                picked_item: Some(self.id),
                ..PickingInfo::default()
            };
        }

        if self.indices.is_empty() {
            log::warn!("mesh {} has no indices, skipping", self.name);
            return PickingInfo::miss();
        }

        let candidates: Vec<usize> = match &self.sub_meshes_octree {
            Some(octree) => {
                let mut candidates = octree.intersects_ray(ray);
                candidates.sort_unstable();
                candidates
            }
            None => (0..self.sub_meshes.len()).collect(),
        };
        let check_sub_mesh_bounds = self.sub_meshes.len() > 1;

        let mut best: Option<IntersectionInfo> = None;
        for index in candidates {
            let Some(sub_mesh) = self.sub_meshes.get(index) else {
                continue;
            };
            if check_sub_mesh_bounds
                && !self
                    .sub_mesh_bounds(index)
                    .is_some_and(|aabb| ray.intersects_box(&aabb, epsilon))
            {
                continue;
            }

            let hit = match self.topology {
                MeshTopology::Triangles => self.intersect_triangles(ray, index, sub_mesh, options),
                MeshTopology::Lines { threshold } => {
                    self.intersect_lines(ray, index, sub_mesh, threshold, options.fast_check)
                }
            };
            let Some(info) = hit else {
                continue;
            };
            if options.fast_check || best.map_or(true, |prev| info.distance < prev.distance) {
                best = Some(info);
                if options.fast_check {
                    break;
                }
            }
        }

        match best {
            Some(info) => self.to_picking_info(ray, &world, &info),
            None => PickingInfo::miss(),
        }
    }

    fn intersect_triangles(
        &self,
        ray: &Ray,
        sub_mesh_id: usize,
        sub_mesh: &SubMesh,
        options: &IntersectOptions<'_>,
    ) -> Option<IntersectionInfo> {
        let range = self.index_range(sub_mesh)?;

        let mut best: Option<IntersectionInfo> = None;
        for (face, tri) in range.chunks_exact(3).enumerate() {
            let (Some(&p0), Some(&p1), Some(&p2)) = (
                self.positions.get(tri[0] as usize),
                self.positions.get(tri[1] as usize),
                self.positions.get(tri[2] as usize),
            ) else {
                continue;
            };

            if let Some(predicate) = options.triangle_predicate {
                if !predicate(p0, p1, p2, ray, [tri[0], tri[1], tri[2]]) {
                    continue;
                }
            }

            let Some(mut info) = ray.intersects_triangle(p0, p1, p2) else {
                continue;
            };
            if info.distance < 0.0 {
                continue;
            }

            if options.fast_check || best.map_or(true, |prev| info.distance < prev.distance) {
                info.face_id = face;
                info.sub_mesh_id = sub_mesh_id;
                best = Some(info);
                if options.fast_check {
                    break;
                }
            }
        }
        best
    }

    fn intersect_lines(
        &self,
        ray: &Ray,
        sub_mesh_id: usize,
        sub_mesh: &SubMesh,
        threshold: f32,
        fast_check: bool,
    ) -> Option<IntersectionInfo> {
        let range = self.index_range(sub_mesh)?;

        let mut best: Option<IntersectionInfo> = None;
        for (face, segment) in range.chunks_exact(2).enumerate() {
            let (Some(&a), Some(&b)) = (
                self.positions.get(segment[0] as usize),
                self.positions.get(segment[1] as usize),
            ) else {
                continue;
            };

            let Some(distance) = ray.intersection_segment(a, b, threshold) else {
                continue;
            };

            if fast_check || best.map_or(true, |prev| distance < prev.distance) {
                let mut info = IntersectionInfo::new(0.0, 0.0, distance);
                info.face_id = face;
                info.sub_mesh_id = sub_mesh_id;
                best = Some(info);
                if fast_check {
                    break;
                }
            }
        }
        best
    }

    /// The slice of the index buffer covered by a sub-mesh, clipped to the buffer.
    fn index_range(&self, sub_mesh: &SubMesh) -> Option<&[u32]> {
        let end = (sub_mesh.index_start + sub_mesh.index_count).min(self.indices.len());
        self.indices.get(sub_mesh.index_start..end)
    }

    fn to_picking_info(&self, ray: &Ray, world: &Mat4, info: &IntersectionInfo) -> PickingInfo {
        let origin = world.transform_point3(ray.origin);
        let point = origin + world.transform_vector3(ray.direction * info.distance);

        let stride = self.topology.stride();
        let first_face = self
            .sub_meshes
            .get(info.sub_mesh_id)
            .map_or(0, |sub_mesh| sub_mesh.index_start / stride);

        PickingInfo {
            hit: true,
            distance: origin.distance(point),
            picked_point: Some(point),
            picked_item: Some(self.id()),
            bu: info.bu,
            bv: info.bv,
            face_id: Some(first_face + info.face_id),
            sub_mesh_face_id: Some(info.face_id),
            sub_mesh_id: info.sub_mesh_id,
            ..PickingInfo::default()
        }
    }
}
