//! Configuration options for pickscope.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default number of entries a node may hold before it subdivides.
pub const DEFAULT_OCTREE_CAPACITY: usize = 64;

/// Default maximum subdivision depth of an octree.
pub const DEFAULT_OCTREE_MAX_DEPTH: usize = 2;

/// Global configuration options for picking and spatial indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Node capacity of the scene-level selection octree.
    pub selection_octree_capacity: usize,

    /// Maximum depth of the scene-level selection octree.
    pub selection_octree_max_depth: usize,

    /// Node capacity of per-mesh sub-mesh octrees.
    pub sub_mesh_octree_capacity: usize,

    /// Maximum depth of per-mesh sub-mesh octrees.
    pub sub_mesh_octree_max_depth: usize,

    /// Whether clip space depth runs over `[0, 1]` (wgpu, glam `*_rh`) rather than `[-1, 1]`.
    pub half_z_range: bool,

    /// Ratio between canvas pixels and render pixels.
    pub hardware_scaling_level: f32,

    /// Pick distance threshold used by line meshes that do not set their own.
    pub line_intersection_threshold: f32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            selection_octree_capacity: DEFAULT_OCTREE_CAPACITY,
            selection_octree_max_depth: DEFAULT_OCTREE_MAX_DEPTH,
            sub_mesh_octree_capacity: DEFAULT_OCTREE_CAPACITY,
            sub_mesh_octree_max_depth: DEFAULT_OCTREE_MAX_DEPTH,
            half_z_range: true,
            hardware_scaling_level: 1.0,
            line_intersection_threshold: 0.1,
        }
    }
}

impl Options {
    /// Parses options from a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serializes the options as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
