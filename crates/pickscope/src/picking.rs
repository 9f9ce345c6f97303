//! Scene picking: turns screen positions or world rays into hits.
//!
//! A pick draws candidates from the scene's [`SpatialIndexProvider`],
//! filters them with a predicate, and runs each item's precise test against
//! the ray expressed in that item's local space. Items with thin instances
//! are first tested on their bounds only, and on a broad hit every instance
//! is tested on its own.
//!
//! [`SpatialIndexProvider`]: crate::spatial_index::SpatialIndexProvider

use glam::Mat4;
use pickscope_core::{
    Camera, IntersectOptions, Pickable, PickingInfo, PickscopeError, Ray, Result,
    TrianglePredicate,
};

use crate::scene::SceneView;

/// Filter deciding which items a pick considers.
pub type ItemPredicate = dyn Fn(&dyn Pickable) -> bool;

/// Returns whether an item passes the default pick filter.
pub fn is_pickable_by_default(item: &dyn Pickable) -> bool {
    item.is_enabled() && item.is_visible() && item.is_pickable()
}

/// Rays reused across picks made through one orchestrator.
///
/// A value here is only valid until the next pick call overwrites it.
#[derive(Debug, Clone, Default)]
pub struct PickScratch {
    /// The last world-space ray built from screen coordinates.
    pub world_ray: Ray,
    /// The last ray transformed into an item's local space.
    pub local_ray: Ray,
}

/// Per-call settings shared by every pick flavour.
#[derive(Clone, Copy)]
struct PickRequest<'p> {
    predicate: Option<&'p ItemPredicate>,
    fast_check: bool,
    bounding_only: bool,
    triangle_predicate: Option<&'p TrianglePredicate>,
}

impl PickRequest<'_> {
    fn accepts(&self, item: &dyn Pickable) -> bool {
        match self.predicate {
            Some(predicate) => predicate(item),
            None => is_pickable_by_default(item),
        }
    }
}

/// Runs picks against a scene.
///
/// Each orchestrator owns its own scratch rays, so separate orchestrators
/// may pick against the same scene independently.
pub struct PickingOrchestrator<'a, S: SceneView + ?Sized> {
    scene: &'a S,
    scratch: PickScratch,
}

impl<'a, S: SceneView + ?Sized> PickingOrchestrator<'a, S> {
    /// Creates an orchestrator for `scene`.
    pub fn new(scene: &'a S) -> Self {
        Self {
            scene,
            scratch: PickScratch::default(),
        }
    }

    /// Returns the scene this orchestrator picks against.
    pub fn scene(&self) -> &'a S {
        self.scene
    }

    /// Returns the scratch rays left by the last pick.
    pub fn scratch(&self) -> &PickScratch {
        &self.scratch
    }

    // === Ray construction ===

    /// Builds the ray through screen position (`x`, `y`).
    ///
    /// `world` maps the space the ray is returned in to world space; pass
    /// the identity for a world-space ray. Uses `camera`, or the scene's
    /// active camera when `None`.
    pub fn create_picking_ray(
        &self,
        x: f32,
        y: f32,
        world: &Mat4,
        camera: Option<&Camera>,
    ) -> Result<Ray> {
        let mut ray = Ray::zero();
        self.create_picking_ray_to_ref(x, y, world, &mut ray, camera, false)?;
        Ok(ray)
    }

    /// Builds the ray through screen position (`x`, `y`) in camera space.
    pub fn create_picking_ray_in_camera_space(
        &self,
        x: f32,
        y: f32,
        camera: Option<&Camera>,
    ) -> Result<Ray> {
        let mut ray = Ray::zero();
        self.create_picking_ray_to_ref(x, y, &Mat4::IDENTITY, &mut ray, camera, true)?;
        Ok(ray)
    }

    /// In-place version of [`PickingOrchestrator::create_picking_ray`].
    ///
    /// With `camera_space` the view matrix is skipped.
    pub fn create_picking_ray_to_ref(
        &self,
        x: f32,
        y: f32,
        world: &Mat4,
        result: &mut Ray,
        camera: Option<&Camera>,
        camera_space: bool,
    ) -> Result<()> {
        let camera = camera
            .or_else(|| self.scene.active_camera())
            .ok_or(PickscopeError::NoActiveCamera)?;

        let (render_width, render_height) = self.scene.render_size();
        let viewport = camera.viewport.to_global(render_width, render_height);
        let scaling = self.scene.hardware_scaling_level();

        // Input y runs down from the top; viewport y runs up from the bottom
        let x = x / scaling - viewport.x;
        let y = y / scaling - (render_height - viewport.y - viewport.height);

        let view = if camera_space {
            Mat4::IDENTITY
        } else {
            camera.view_matrix()
        };
        result.update(
            x,
            y,
            viewport.width,
            viewport.height,
            world,
            &view,
            &camera.projection_matrix(),
            self.scene.half_z_range(),
        );
        Ok(())
    }

    // === Picking ===

    /// Returns the nearest hit under screen position (`x`, `y`).
    ///
    /// With `fast_check` the first hit found is returned instead, in
    /// candidate order. A miss is a default [`PickingInfo`] with `ray` set.
    pub fn pick(
        &mut self,
        x: f32,
        y: f32,
        predicate: Option<&ItemPredicate>,
        fast_check: bool,
        camera: Option<&Camera>,
    ) -> Result<PickingInfo> {
        let ray = self.screen_ray(x, y, camera)?;
        let request = PickRequest {
            predicate,
            fast_check,
            bounding_only: false,
            triangle_predicate: None,
        };
        Ok(self.pick_nearest(&ray, &request))
    }

    /// Like [`PickingOrchestrator::pick`], but only tests item bounds.
    ///
    /// Distances are measured from the ray origin to the center of each
    /// item's bounding sphere.
    pub fn pick_with_bounding_info(
        &mut self,
        x: f32,
        y: f32,
        predicate: Option<&ItemPredicate>,
        fast_check: bool,
        camera: Option<&Camera>,
    ) -> Result<PickingInfo> {
        let ray = self.screen_ray(x, y, camera)?;
        let request = PickRequest {
            predicate,
            fast_check,
            bounding_only: true,
            triangle_predicate: None,
        };
        Ok(self.pick_nearest(&ray, &request))
    }

    /// Returns the nearest hit along a world-space ray.
    pub fn pick_with_ray(
        &mut self,
        ray: &Ray,
        predicate: Option<&ItemPredicate>,
        fast_check: bool,
        triangle_predicate: Option<&TrianglePredicate>,
    ) -> PickingInfo {
        let request = PickRequest {
            predicate,
            fast_check,
            bounding_only: false,
            triangle_predicate,
        };
        self.pick_nearest(ray, &request)
    }

    /// Returns every hit under screen position (`x`, `y`), unsorted.
    pub fn multi_pick(
        &mut self,
        x: f32,
        y: f32,
        predicate: Option<&ItemPredicate>,
        camera: Option<&Camera>,
        triangle_predicate: Option<&TrianglePredicate>,
    ) -> Result<Vec<PickingInfo>> {
        let ray = self.screen_ray(x, y, camera)?;
        Ok(self.multi_pick_with_ray(&ray, predicate, triangle_predicate))
    }

    /// Returns every hit along a world-space ray, unsorted.
    ///
    /// Each hit thin instance is reported separately.
    pub fn multi_pick_with_ray(
        &mut self,
        ray: &Ray,
        predicate: Option<&ItemPredicate>,
        triangle_predicate: Option<&TrianglePredicate>,
    ) -> Vec<PickingInfo> {
        let request = PickRequest {
            predicate,
            fast_check: false,
            bounding_only: false,
            triangle_predicate,
        };
        let scene = self.scene;
        let candidates = scene.candidate_provider().select_by_ray(ray);
        log::trace!("multi pick: {} candidates", candidates.len());

        let mut hits = Vec::new();
        for id in candidates {
            let Some(item) = scene.item(id) else {
                continue;
            };
            if !request.accepts(item) {
                continue;
            }
            self.pick_item(item, ray, &request, Some(&mut hits));
        }

        for hit in &mut hits {
            hit.ray = Some(*ray);
        }
        hits
    }

    fn screen_ray(&mut self, x: f32, y: f32, camera: Option<&Camera>) -> Result<Ray> {
        let mut ray = self.scratch.world_ray;
        self.create_picking_ray_to_ref(x, y, &Mat4::IDENTITY, &mut ray, camera, false)?;
        self.scratch.world_ray = ray;
        Ok(ray)
    }

    fn pick_nearest(&mut self, ray: &Ray, request: &PickRequest<'_>) -> PickingInfo {
        let scene = self.scene;
        let candidates = scene.candidate_provider().select_by_ray(ray);
        log::trace!("pick: {} candidates", candidates.len());

        let mut best: Option<PickingInfo> = None;
        for id in candidates {
            let Some(item) = scene.item(id) else {
                continue;
            };
            if !request.accepts(item) {
                continue;
            }

            let Some(hit) = self.pick_item(item, ray, request, None) else {
                continue;
            };
            if request.fast_check || best.as_ref().map_or(true, |prev| hit.distance < prev.distance)
            {
                best = Some(hit);
                if request.fast_check {
                    break;
                }
            }
        }

        let mut info = best.unwrap_or_default();
        info.ray = Some(*ray);
        info
    }

    /// Tests one item, returning its nearest hit (or first, on fast check).
    ///
    /// When `all_hits` is given every hit is also pushed to it, one per
    /// thin instance.
    fn pick_item(
        &mut self,
        item: &dyn Pickable,
        ray: &Ray,
        request: &PickRequest<'_>,
        mut all_hits: Option<&mut Vec<PickingInfo>>,
    ) -> Option<PickingInfo> {
        let world = item.world_matrix();

        if !item.thin_instance_picking_enabled() {
            let options = IntersectOptions {
                fast_check: request.fast_check,
                triangle_predicate: request.triangle_predicate,
                bounding_only: request.bounding_only,
                world_override: Some(world),
                skip_bounding_check: false,
            };
            let hit = self.intersect_in(item, ray, &world, &options)?;
            if let Some(all_hits) = all_hits {
                all_hits.push(hit.clone());
            }
            return Some(hit);
        }

        // Broad test of the base transform against bounds covering every instance
        let broad = IntersectOptions {
            fast_check: true,
            bounding_only: true,
            world_override: Some(world),
            ..IntersectOptions::default()
        };
        let broad_hit = self.intersect_in(item, ray, &world, &broad)?;
        if request.bounding_only {
            if let Some(all_hits) = all_hits {
                all_hits.push(broad_hit.clone());
            }
            return Some(broad_hit);
        }

        let mut best: Option<PickingInfo> = None;
        for (index, instance) in item.thin_instances().iter().enumerate() {
            let instance_world = world * *instance;
            let options = IntersectOptions {
                fast_check: request.fast_check,
                triangle_predicate: request.triangle_predicate,
                bounding_only: false,
                world_override: Some(instance_world),
                skip_bounding_check: true,
            };
            let Some(mut hit) = self.intersect_in(item, ray, &instance_world, &options) else {
                continue;
            };
            hit.thin_instance_index = Some(index);

            if let Some(all_hits) = all_hits.as_deref_mut() {
                all_hits.push(hit.clone());
            }
            if request.fast_check || best.as_ref().map_or(true, |prev| hit.distance < prev.distance)
            {
                best = Some(hit);
                if request.fast_check {
                    break;
                }
            }
        }
        best
    }

    /// Runs the precise test with `ray` moved into the space `world` maps from.
    fn intersect_in(
        &mut self,
        item: &dyn Pickable,
        ray: &Ray,
        world: &Mat4,
        options: &IntersectOptions<'_>,
    ) -> Option<PickingInfo> {
        ray.transform_to_ref(&world.inverse(), &mut self.scratch.local_ray);
        let hit = item.intersects(&self.scratch.local_ray, options);
        hit.hit.then_some(hit)
    }
}
