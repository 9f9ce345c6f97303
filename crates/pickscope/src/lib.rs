//! pickscope: ray picking and spatial selection for 3D scenes.
//!
//! Register pickable items in a [`Scene`], point a [`Camera`] at them, and ask
//! what lies under a screen position.
//!
//! # Quick Start
//!
//! ```
//! use pickscope::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let mut scene = Scene::new(800.0, 600.0);
//!     scene.set_active_camera(Some(Camera::looking_at(
//!         Vec3::new(0.0, 0.0, 10.0),
//!         Vec3::ZERO,
//!         800.0 / 600.0,
//!     )));
//!     let id = scene.add_item(Mesh::cuboid("box", Vec3::splat(-1.0), Vec3::splat(1.0)))?;
//!
//!     let info = scene.picker().pick(400.0, 300.0, None, false, None)?;
//!     assert_eq!(info.picked_item, Some(id));
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`pickscope_core`] holds the ray kernel, result records, bounds and the
//!   generic [`Octree`]
//! - [`pickscope_structures`] holds concrete [`Pickable`] items such as [`Mesh`]
//! - this crate ties them to a [`Scene`], the [`SpatialIndexProvider`]s that
//!   feed picks with candidates, and the [`PickingOrchestrator`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::float_cmp)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod picking;
pub mod scene;
pub mod spatial_index;

// Re-export core types
pub use pickscope_core::{
    compare_distance, Aabb, Axis, BoundingSphere, Camera, Frustum, GeometryView,
    IntersectOptions, IntersectionInfo, ItemId, Octree, OctreeEntry, Options, Pickable,
    PickingInfo, PickscopeError, Plane, ProjectionMode, Ray, Result, TrianglePredicate,
    Viewport,
};
pub use pickscope_core::{Mat4, Vec2, Vec3, Vec4};

// Re-export structures
pub use pickscope_structures::{Mesh, MeshTopology, SubMesh};

pub use picking::{is_pickable_by_default, ItemPredicate, PickScratch, PickingOrchestrator};
pub use scene::{Scene, SceneView};
pub use spatial_index::{FullScan, SelectionOctree, SpatialIndexProvider};

/// Initializes the `env_logger` backend for the `log` facade.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
