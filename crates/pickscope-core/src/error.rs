//! Error types for pickscope.
//!
//! A ray that hits nothing is not an error: misses are reported through
//! [`crate::PickingInfo::hit`], empty candidate lists or `None`.

use thiserror::Error;

/// The main error type for pickscope operations.
#[derive(Error, Debug)]
pub enum PickscopeError {
    /// A camera-relative ray was requested but no camera is active.
    #[error("no active camera - set one on the scene or pass a camera explicitly")]
    NoActiveCamera,

    /// An item with the given name already exists in the scene.
    #[error("item '{0}' already exists")]
    ItemExists(String),

    /// An item with the given name or id was not found.
    #[error("item '{0}' not found")]
    ItemNotFound(String),

    /// Octree capacity must be at least one.
    #[error("invalid octree parameters: capacity {capacity}, max depth {max_depth}")]
    InvalidOctreeParameters { capacity: usize, max_depth: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for pickscope operations.
pub type Result<T> = std::result::Result<T, PickscopeError>;
