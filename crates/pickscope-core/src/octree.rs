//! Bounded-depth octree used as a broad-phase candidate filter.
//!
//! Each entry is stored at exactly one node: the deepest node whose bounds
//! fully contain the entry's bounds. Entries straddling child regions stay at
//! the parent, and entries not contained by the root bounds go to an overflow
//! list that every query returns. Queries may therefore return entries that
//! do not actually touch the query shape, but never omit one that does.

use glam::Vec3;

use crate::bounds::Aabb;
use crate::error::{PickscopeError, Result};
use crate::frustum::Frustum;
use crate::options::{DEFAULT_OCTREE_CAPACITY, DEFAULT_OCTREE_MAX_DEPTH};
use crate::ray::Ray;

/// An item stored in an octree together with its bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct OctreeEntry<T> {
    /// The stored item.
    pub item: T,
    /// The item's bounds in the octree's space.
    pub bounds: Aabb,
}

impl<T> OctreeEntry<T> {
    /// Creates a new entry.
    pub fn new(item: T, bounds: Aabb) -> Self {
        Self { item, bounds }
    }
}

#[derive(Debug, Clone)]
struct OctreeNode<T> {
    bounds: Aabb,
    depth: usize,
    entries: Vec<OctreeEntry<T>>,
    children: Option<Box<[OctreeNode<T>; 8]>>,
}

impl<T> OctreeNode<T> {
    fn new(bounds: Aabb, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, entry: OctreeEntry<T>, capacity: usize, max_depth: usize) {
        if let Some(children) = self.children.as_mut() {
            match children
                .iter_mut()
                .find(|child| child.bounds.contains(&entry.bounds))
            {
                Some(child) => child.insert(entry, capacity, max_depth),
                None => self.entries.push(entry),
            }
            return;
        }

        self.entries.push(entry);
        if self.entries.len() > capacity && self.depth < max_depth {
            self.subdivide(capacity, max_depth);
        }
    }

    fn subdivide(&mut self, capacity: usize, max_depth: usize) {
        let depth = self.depth + 1;
        let children = self.bounds.octants().map(|bounds| OctreeNode::new(bounds, depth));
        self.children = Some(Box::new(children));

        for entry in std::mem::take(&mut self.entries) {
            self.insert(entry, capacity, max_depth);
        }
    }

    fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        if let Some(pos) = self.entries.iter().position(|entry| entry.item == *item) {
            self.entries.remove(pos);
            return true;
        }
        self.children
            .as_mut()
            .map_or(false, |children| children.iter_mut().any(|child| child.remove(item)))
    }

    fn collect<F>(&self, test: &F, out: &mut Vec<T>)
    where
        T: Clone,
        F: Fn(&Aabb) -> bool,
    {
        if !test(&self.bounds) {
            return;
        }
        out.extend(self.entries.iter().map(|entry| entry.item.clone()));
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect(test, out);
            }
        }
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a OctreeNode<T>)) {
        f(self);
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.visit(f);
            }
        }
    }
}

/// A spatial index over items with axis-aligned bounds.
///
/// Lifecycle: an octree starts empty, is (re)built with [`Octree::update`],
/// mutated with [`Octree::add_entry`] / [`Octree::remove_entry`] and queried
/// any number of times, and can be dropped back to empty with
/// [`Octree::dispose`].
#[derive(Debug, Clone)]
pub struct Octree<T> {
    root: Option<OctreeNode<T>>,
    overflow: Vec<OctreeEntry<T>>,
    /// Items returned by every query regardless of position, for content
    /// that moves too often to be worth indexing.
    pub dynamic_content: Vec<T>,
    capacity: usize,
    max_depth: usize,
}

impl<T> Default for Octree<T> {
    fn default() -> Self {
        Self {
            root: None,
            overflow: Vec::new(),
            dynamic_content: Vec::new(),
            capacity: DEFAULT_OCTREE_CAPACITY,
            max_depth: DEFAULT_OCTREE_MAX_DEPTH,
        }
    }
}

impl<T: Clone + PartialEq> Octree<T> {
    /// Creates an empty octree.
    ///
    /// `capacity` is the number of entries a node holds before it splits and
    /// must be at least one.
    pub fn new(capacity: usize, max_depth: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PickscopeError::InvalidOctreeParameters {
                capacity,
                max_depth,
            });
        }
        Ok(Self {
            capacity,
            max_depth,
            ..Self::default()
        })
    }

    /// Returns the node capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the maximum subdivision depth.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the root bounds, if built.
    pub fn bounds(&self) -> Option<Aabb> {
        self.root.as_ref().map(|root| root.bounds)
    }

    /// Returns whether the tree has been built.
    pub fn is_built(&self) -> bool {
        self.root.is_some()
    }

    /// Rebuilds the tree over `[world_min, world_max]` from scratch.
    ///
    /// Each entry is expected to name a distinct item.
    pub fn update(
        &mut self,
        world_min: Vec3,
        world_max: Vec3,
        entries: impl IntoIterator<Item = OctreeEntry<T>>,
    ) {
        self.root = Some(OctreeNode::new(Aabb::new(world_min, world_max), 0));
        self.overflow.clear();
        for entry in entries {
            self.add(entry);
        }
        log::debug!(
            "octree rebuilt: {} entries in {} nodes ({} overflow)",
            self.len(),
            self.node_count(),
            self.overflow.len()
        );
    }

    /// Adds a single entry without rebuilding.
    ///
    /// An item that is already stored is moved to the new bounds.
    pub fn add_entry(&mut self, item: T, bounds: Aabb) {
        self.remove_entry(&item);
        self.add(OctreeEntry::new(item, bounds));
    }

    fn add(&mut self, entry: OctreeEntry<T>) {
        match self.root.as_mut() {
            Some(root) if root.bounds.contains(&entry.bounds) => {
                root.insert(entry, self.capacity, self.max_depth);
            }
            _ => self.overflow.push(entry),
        }
    }

    /// Removes an item. Returns whether it was present.
    pub fn remove_entry(&mut self, item: &T) -> bool {
        if let Some(pos) = self.overflow.iter().position(|entry| entry.item == *item) {
            self.overflow.remove(pos);
            return true;
        }
        self.root.as_mut().map_or(false, |root| root.remove(item))
    }

    /// Returns whether an item is stored in the tree.
    pub fn contains(&self, item: &T) -> bool {
        self.entries().any(|entry| entry.item == *item)
    }

    /// Drops every node and entry, returning the tree to its empty state.
    pub fn dispose(&mut self) {
        self.root = None;
        self.overflow.clear();
        self.dynamic_content.clear();
    }

    /// Returns the number of stored entries, excluding dynamic content.
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    /// Returns whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        if let Some(root) = &self.root {
            root.visit(&mut |_| count += 1);
        }
        count
    }

    /// Returns the depth of the deepest node, or `None` if not built.
    pub fn depth(&self) -> Option<usize> {
        let root = self.root.as_ref()?;
        let mut depth = 0;
        root.visit(&mut |node| depth = depth.max(node.depth));
        Some(depth)
    }

    /// Iterates over every stored entry, overflow first.
    pub fn entries(&self) -> impl Iterator<Item = &OctreeEntry<T>> + '_ {
        let mut nodes = Vec::new();
        if let Some(root) = &self.root {
            root.visit(&mut |node| nodes.push(node));
        }
        self.overflow
            .iter()
            .chain(nodes.into_iter().flat_map(|node| node.entries.iter()))
    }

    /// Returns the entries stored in nodes whose bounds pass `test`.
    ///
    /// Dynamic content and overflow entries are always included. Each item
    /// appears once.
    pub fn query(&self, test: impl Fn(&Aabb) -> bool) -> Vec<T> {
        let mut stored: Vec<T> = self
            .overflow
            .iter()
            .map(|entry| entry.item.clone())
            .collect();
        if let Some(root) = &self.root {
            root.collect(&test, &mut stored);
        }

        let mut out: Vec<T> = Vec::with_capacity(self.dynamic_content.len() + stored.len());
        for item in &self.dynamic_content {
            if !out.contains(item) {
                out.push(item.clone());
            }
        }
        out.extend(
            stored
                .into_iter()
                .filter(|item| !self.dynamic_content.contains(item)),
        );
        out
    }

    /// Returns the candidates that may lie inside the frustum.
    pub fn select(&self, frustum: &Frustum) -> Vec<T> {
        self.query(|bounds| bounds.is_in_frustum(frustum))
    }

    /// Returns the candidates that may be hit by the ray.
    pub fn intersects_ray(&self, ray: &Ray) -> Vec<T> {
        self.query(|bounds| ray.intersects_box(bounds, 0.0))
    }

    /// Returns the candidates that may touch the sphere.
    pub fn intersects(&self, center: Vec3, radius: f32) -> Vec<T> {
        self.query(|bounds| bounds.intersects_sphere(center, radius))
    }
}
