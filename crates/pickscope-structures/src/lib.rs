//! Pickable structures for pickscope.
//!
//! This crate provides concrete items that implement
//! [`Pickable`](pickscope_core::Pickable):
//! - Triangle meshes, split into sub-meshes and drawn through thin instances
//! - Line meshes, picked within a distance threshold

// Index buffers are u32 and are cast to usize and back throughout
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::float_cmp)]

pub mod mesh;

pub use mesh::{Mesh, MeshTopology, SubMesh};
