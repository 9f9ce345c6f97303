//! Candidate providers used to narrow down which items a pick tests.

use glam::Vec3;
use pickscope_core::{Aabb, Frustum, ItemId, Octree, OctreeEntry, Ray, Result};

/// Extent given to each axis of the selection octree's root when the scene
/// bounds are flat along that axis.
const DEGENERATE_EXTENT_PADDING: f32 = 1.0;

/// Broad-phase selection of scene items.
///
/// Implementations may return items that turn out not to intersect, but must
/// never leave out one that does.
pub trait SpatialIndexProvider {
    /// Items that may lie inside the frustum.
    fn select_by_frustum(&self, frustum: &Frustum) -> Vec<ItemId>;

    /// Items the ray may hit.
    fn select_by_ray(&self, ray: &Ray) -> Vec<ItemId>;

    /// Items that may touch the sphere.
    fn select_by_sphere(&self, center: Vec3, radius: f32) -> Vec<ItemId>;
}

/// Provider returning every registered item, in registration order.
#[derive(Debug, Clone, Default)]
pub struct FullScan {
    ids: Vec<ItemId>,
}

impl FullScan {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item.
    pub fn push(&mut self, id: ItemId) {
        self.ids.push(id);
    }

    /// Removes an item, preserving the order of the rest.
    pub fn remove(&mut self, id: ItemId) -> bool {
        match self.ids.iter().position(|other| *other == id) {
            Some(pos) => {
                self.ids.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Returns every item in registration order.
    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }
}

impl SpatialIndexProvider for FullScan {
    fn select_by_frustum(&self, _frustum: &Frustum) -> Vec<ItemId> {
        self.ids.clone()
    }

    fn select_by_ray(&self, _ray: &Ray) -> Vec<ItemId> {
        self.ids.clone()
    }

    fn select_by_sphere(&self, _center: Vec3, _radius: f32) -> Vec<ItemId> {
        self.ids.clone()
    }
}

/// Octree over the world bounds of a scene's items.
///
/// Items without bounds are kept as dynamic content and returned by every
/// query. Items that move must be refreshed with
/// [`SelectionOctree::refresh_item`] (or the whole tree rebuilt).
#[derive(Debug, Clone)]
pub struct SelectionOctree {
    octree: Octree<ItemId>,
}

impl SelectionOctree {
    /// Creates an empty selection octree.
    pub fn new(capacity: usize, max_depth: usize) -> Result<Self> {
        Ok(Self {
            octree: Octree::new(capacity, max_depth)?,
        })
    }

    /// Rebuilds the tree over the union of the given bounds.
    ///
    /// Flat axes are padded so the root always has volume.
    pub fn update(&mut self, items: impl IntoIterator<Item = (ItemId, Option<Aabb>)>) {
        let mut entries = Vec::new();
        let mut unbounded = Vec::new();
        for (id, bounds) in items {
            match bounds {
                Some(bounds) => entries.push(OctreeEntry::new(id, bounds)),
                None => unbounded.push(id),
            }
        }

        let extents = entries
            .iter()
            .map(|entry| entry.bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| Aabb::new(Vec3::ZERO, Vec3::ZERO));
        let (min, max) = padded(extents);

        self.octree.dynamic_content = unbounded;
        self.octree.update(min, max, entries);
        log::debug!(
            "selection octree updated: {} items, {} unbounded, {} nodes",
            self.octree.len(),
            self.octree.dynamic_content.len(),
            self.octree.node_count()
        );
    }

    /// Inserts one item without rebuilding.
    pub fn add_item(&mut self, id: ItemId, bounds: Option<Aabb>) {
        match bounds {
            Some(bounds) => self.octree.add_entry(id, bounds),
            None => self.octree.dynamic_content.push(id),
        }
    }

    /// Removes one item. Returns whether it was indexed.
    pub fn remove_item(&mut self, id: ItemId) -> bool {
        if let Some(pos) = self.octree.dynamic_content.iter().position(|other| *other == id) {
            self.octree.dynamic_content.remove(pos);
            return true;
        }
        self.octree.remove_entry(&id)
    }

    /// Re-inserts an item whose bounds changed.
    pub fn refresh_item(&mut self, id: ItemId, bounds: Option<Aabb>) {
        self.remove_item(id);
        self.add_item(id, bounds);
    }

    /// Returns whether the item is indexed.
    pub fn contains(&self, id: ItemId) -> bool {
        self.octree.dynamic_content.contains(&id) || self.octree.contains(&id)
    }

    /// Returns the number of indexed items, unbounded ones included.
    pub fn len(&self) -> usize {
        self.octree.len() + self.octree.dynamic_content.len()
    }

    /// Returns whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the underlying octree.
    pub fn octree(&self) -> &Octree<ItemId> {
        &self.octree
    }
}

impl SpatialIndexProvider for SelectionOctree {
    fn select_by_frustum(&self, frustum: &Frustum) -> Vec<ItemId> {
        self.octree.select(frustum)
    }

    fn select_by_ray(&self, ray: &Ray) -> Vec<ItemId> {
        self.octree.intersects_ray(ray)
    }

    fn select_by_sphere(&self, center: Vec3, radius: f32) -> Vec<ItemId> {
        self.octree.intersects(center, radius)
    }
}

fn padded(extents: Aabb) -> (Vec3, Vec3) {
    let mut min = extents.min;
    let mut max = extents.max;
    for axis in 0..3 {
        if max[axis] - min[axis] <= f32::EPSILON {
            min[axis] -= DEGENERATE_EXTENT_PADDING * 0.5;
            max[axis] += DEGENERATE_EXTENT_PADDING * 0.5;
        }
    }
    (min, max)
}
