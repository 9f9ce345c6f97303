//! Scene registry and the view picking runs against.

use std::collections::HashMap;

use glam::{Mat4, Vec3};
use pickscope_core::{
    Aabb, Camera, Frustum, ItemId, Options, Pickable, PickscopeError, Result,
};
use pickscope_structures::Mesh;

use crate::picking::PickingOrchestrator;
use crate::spatial_index::{FullScan, SelectionOctree, SpatialIndexProvider};

/// Read-only view of a scene, as needed by picking.
pub trait SceneView {
    /// Returns the camera used when a pick does not name one.
    fn active_camera(&self) -> Option<&Camera>;

    /// Returns the render target size in pixels.
    fn render_size(&self) -> (f32, f32);

    /// Returns the ratio between input pixels and render pixels.
    fn hardware_scaling_level(&self) -> f32;

    /// Returns whether clip space depth runs over `[0, 1]`.
    fn half_z_range(&self) -> bool;

    /// Looks up an item.
    fn item(&self, id: ItemId) -> Option<&dyn Pickable>;

    /// Iterates over every item in registration order.
    fn items(&self) -> Box<dyn Iterator<Item = &dyn Pickable> + '_>;

    /// Returns the broad-phase provider picks draw candidates from.
    fn candidate_provider(&self) -> &dyn SpatialIndexProvider;

    /// Returns the active camera's frustum.
    fn frustum(&self) -> Option<Frustum> {
        self.active_camera()
            .map(|camera| camera.frustum(self.half_z_range()))
    }
}

/// A collection of pickable items plus the camera and render target they
/// are viewed through.
pub struct Scene {
    items: HashMap<ItemId, Box<dyn Pickable>>,
    full_scan: FullScan,
    next_id: u32,
    active_camera: Option<Camera>,
    render_width: f32,
    render_height: f32,
    options: Options,
    selection_octree: Option<SelectionOctree>,
}

impl Scene {
    /// Creates an empty scene with default options.
    pub fn new(render_width: f32, render_height: f32) -> Self {
        Self::with_options(Options::default(), render_width, render_height)
    }

    /// Creates an empty scene with the given options.
    pub fn with_options(options: Options, render_width: f32, render_height: f32) -> Self {
        Self {
            items: HashMap::new(),
            full_scan: FullScan::new(),
            next_id: 0,
            active_camera: None,
            render_width,
            render_height,
            options,
            selection_octree: None,
        }
    }

    // === Configuration ===

    /// Returns the options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the options for modification.
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// Sets the active camera.
    pub fn set_active_camera(&mut self, camera: Option<Camera>) {
        self.active_camera = camera;
    }

    /// Returns the active camera for modification.
    pub fn active_camera_mut(&mut self) -> Option<&mut Camera> {
        self.active_camera.as_mut()
    }

    /// Sets the render target size in pixels.
    pub fn set_render_size(&mut self, width: f32, height: f32) {
        self.render_width = width;
        self.render_height = height;
    }

    // === Registry ===

    /// Registers an item and returns its id.
    ///
    /// Fails if an item with the same name is already registered.
    pub fn add_item(&mut self, item: impl Pickable) -> Result<ItemId> {
        self.add_boxed_item(Box::new(item))
    }

    /// Registers a boxed item and returns its id.
    pub fn add_boxed_item(&mut self, mut item: Box<dyn Pickable>) -> Result<ItemId> {
        if self.item_by_name(item.name()).is_some() {
            return Err(PickscopeError::ItemExists(item.name().to_string()));
        }

        let id = ItemId(self.next_id);
        self.next_id += 1;
        item.set_id(id);

        if let Some(octree) = &mut self.selection_octree {
            octree.add_item(id, index_bounds(item.as_ref()));
        }
        self.full_scan.push(id);
        self.items.insert(id, item);
        Ok(id)
    }

    /// Registers a triangle mesh.
    pub fn register_mesh(
        &mut self,
        name: impl Into<String>,
        positions: Vec<Vec3>,
        indices: Vec<u32>,
    ) -> Result<ItemId> {
        self.add_item(Mesh::new(name, positions, indices))
    }

    /// Registers a line mesh using the configured line threshold.
    pub fn register_lines(
        &mut self,
        name: impl Into<String>,
        positions: Vec<Vec3>,
        indices: Vec<u32>,
    ) -> Result<ItemId> {
        let threshold = self.options.line_intersection_threshold;
        self.add_item(Mesh::lines(name, positions, indices, threshold))
    }

    /// Unregisters an item and hands it back.
    pub fn remove_item(&mut self, id: ItemId) -> Result<Box<dyn Pickable>> {
        let item = self
            .items
            .remove(&id)
            .ok_or_else(|| PickscopeError::ItemNotFound(id.to_string()))?;
        self.full_scan.remove(id);
        if let Some(octree) = &mut self.selection_octree {
            octree.remove_item(id);
        }
        Ok(item)
    }

    /// Unregisters every item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.full_scan = FullScan::new();
        if let Some(octree) = &mut self.selection_octree {
            octree.update(std::iter::empty());
        }
    }

    /// Looks up an item by name.
    pub fn item_by_name(&self, name: &str) -> Option<&dyn Pickable> {
        self.items().find(|item| item.name() == name)
    }

    /// Modifies an item through its [`Pickable`] interface and re-indexes it.
    ///
    /// The id assigned at registration is kept even if `f` changes it.
    pub fn item_mut<R>(
        &mut self,
        id: ItemId,
        f: impl FnOnce(&mut dyn Pickable) -> R,
    ) -> Result<R> {
        let item = self
            .items
            .get_mut(&id)
            .ok_or_else(|| PickscopeError::ItemNotFound(id.to_string()))?;
        let result = f(item.as_mut());
        if item.id() != id {
            log::warn!("item {} tried to change its id, restoring {id}", item.name());
            item.set_id(id);
        }
        self.refresh_item(id)?;
        Ok(result)
    }

    /// Returns an item downcast to its concrete type.
    pub fn get<T: Pickable>(&self, id: ItemId) -> Option<&T> {
        self.items.get(&id)?.as_any().downcast_ref::<T>()
    }

    /// Modifies an item in place and re-indexes it.
    pub fn update_item<T: Pickable, R>(
        &mut self,
        id: ItemId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R> {
        let item = self
            .items
            .get_mut(&id)
            .and_then(|item| item.as_any_mut().downcast_mut::<T>())
            .ok_or_else(|| PickscopeError::ItemNotFound(id.to_string()))?;
        let result = f(item);
        self.refresh_item(id)?;
        Ok(result)
    }

    /// Re-indexes an item after its bounds or transform changed.
    pub fn refresh_item(&mut self, id: ItemId) -> Result<()> {
        let item = self
            .items
            .get(&id)
            .ok_or_else(|| PickscopeError::ItemNotFound(id.to_string()))?;
        if let Some(octree) = &mut self.selection_octree {
            octree.refresh_item(id, index_bounds(item.as_ref()));
        }
        Ok(())
    }

    /// Returns the number of registered items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether no items are registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Builds an octree over the sub-meshes of a registered mesh, using the
    /// configured capacity and depth.
    pub fn create_or_update_sub_meshes_octree(&mut self, id: ItemId) -> Result<()> {
        let capacity = self.options.sub_mesh_octree_capacity;
        let max_depth = self.options.sub_mesh_octree_max_depth;
        self.update_item(id, |mesh: &mut Mesh| {
            mesh.create_or_update_sub_meshes_octree(capacity, max_depth)
                .map(|_| ())
        })?
    }

    // === Selection octree ===

    /// Builds (or rebuilds) the selection octree over every registered item.
    ///
    /// Once built, picks and frustum selection draw candidates from the
    /// octree instead of scanning every item.
    pub fn create_or_update_selection_octree(
        &mut self,
        capacity: usize,
        max_depth: usize,
    ) -> Result<&SelectionOctree> {
        let reusable = self.selection_octree.as_ref().is_some_and(|octree| {
            octree.octree().capacity() == capacity && octree.octree().max_depth() == max_depth
        });
        let mut octree = match self.selection_octree.take() {
            Some(octree) if reusable => octree,
            // A failed build leaves the previous index in place
            previous => {
                let octree = SelectionOctree::new(capacity, max_depth);
                if octree.is_err() {
                    self.selection_octree = previous;
                }
                octree?
            }
        };

        let bounds: Vec<(ItemId, Option<Aabb>)> = self
            .items()
            .map(|item| (item.id(), index_bounds(item)))
            .collect();
        octree.update(bounds);
        Ok(self.selection_octree.insert(octree))
    }

    /// Builds the selection octree with the configured capacity and depth.
    pub fn create_or_update_selection_octree_from_options(&mut self) -> Result<&SelectionOctree> {
        let capacity = self.options.selection_octree_capacity;
        let max_depth = self.options.selection_octree_max_depth;
        self.create_or_update_selection_octree(capacity, max_depth)
    }

    /// Returns the selection octree, if one is active.
    pub fn selection_octree(&self) -> Option<&SelectionOctree> {
        self.selection_octree.as_ref()
    }

    /// Drops the selection octree and returns to scanning every item.
    pub fn dispose_selection_octree(&mut self) {
        if self.selection_octree.take().is_some() {
            log::debug!("selection octree disposed");
        }
    }

    /// Returns the items that may be visible from the active camera.
    ///
    /// Without a camera every item is returned.
    pub fn active_item_candidates(&self) -> Vec<ItemId> {
        match self.frustum() {
            Some(frustum) => self.candidate_provider().select_by_frustum(&frustum),
            None => self.full_scan.ids().to_vec(),
        }
    }

    // === Picking ===

    /// Returns a picking orchestrator bound to this scene.
    pub fn picker(&self) -> PickingOrchestrator<'_, Self> {
        PickingOrchestrator::new(self)
    }
}

impl SceneView for Scene {
    fn active_camera(&self) -> Option<&Camera> {
        self.active_camera.as_ref()
    }

    fn render_size(&self) -> (f32, f32) {
        (self.render_width, self.render_height)
    }

    fn hardware_scaling_level(&self) -> f32 {
        self.options.hardware_scaling_level
    }

    fn half_z_range(&self) -> bool {
        self.options.half_z_range
    }

    fn item(&self, id: ItemId) -> Option<&dyn Pickable> {
        self.items.get(&id).map(|item| item.as_ref())
    }

    fn items(&self) -> Box<dyn Iterator<Item = &dyn Pickable> + '_> {
        Box::new(
            self.full_scan
                .ids()
                .iter()
                .filter_map(|id| self.items.get(id))
                .map(|item| item.as_ref()),
        )
    }

    fn candidate_provider(&self) -> &dyn SpatialIndexProvider {
        match &self.selection_octree {
            Some(octree) => octree,
            None => &self.full_scan,
        }
    }
}

/// World bounds used to index an item, grown by its pick threshold.
fn index_bounds(item: &dyn Pickable) -> Option<Aabb> {
    let bounds = item.world_bounding_box()?;
    let threshold = item.intersection_threshold();
    if threshold <= 0.0 {
        return Some(bounds);
    }

    // The threshold is in local units; scale it to world units
    let scale = std::iter::once(item.world_matrix())
        .chain(item.thin_instances().iter().map(|m| item.world_matrix() * *m))
        .map(max_scale)
        .fold(0.0_f32, f32::max);
    let pad = Vec3::splat(threshold * scale);
    Some(Aabb::new(bounds.min - pad, bounds.max + pad))
}

fn max_scale(matrix: Mat4) -> f32 {
    matrix
        .x_axis
        .truncate()
        .length()
        .max(matrix.y_axis.truncate().length())
        .max(matrix.z_axis.truncate().length())
}
