//! Core abstractions for pickscope.
//!
//! This crate provides the geometry and indexing pieces picking is built from:
//! - [`Ray`] and its intersection tests against boxes, spheres, triangles,
//!   planes, axes and segments
//! - [`IntersectionInfo`] and [`PickingInfo`] result records
//! - [`Octree`] for broad-phase candidate selection
//! - the [`Pickable`] trait implemented by anything a ray can hit
//! - [`Camera`], [`Frustum`] and configuration [`Options`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Geometry code compares floats against exact sentinels on purpose
#![allow(clippy::float_cmp)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::cast_possible_truncation)]

pub mod bounds;
pub mod camera;
pub mod error;
pub mod frustum;
pub mod intersection;
pub mod octree;
pub mod options;
pub mod pick;
pub mod ray;

pub use bounds::{Aabb, BoundingSphere};
pub use camera::{Camera, ProjectionMode, Viewport};
pub use error::{PickscopeError, Result};
pub use frustum::{Frustum, Plane};
pub use intersection::IntersectionInfo;
pub use octree::{Octree, OctreeEntry};
pub use options::Options;
pub use pick::{
    compare_distance, GeometryView, IntersectOptions, ItemId, Pickable, PickingInfo,
    TrianglePredicate,
};
pub use ray::{Axis, Ray};

// Re-export glam types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};
