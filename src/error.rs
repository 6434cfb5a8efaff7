//! Error types shared across the engine.

use crate::common::config::ConfigError;

/// Errors reported by the collision engine.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CollisionError {
    /// A broad-phase handle that does not name a tracked leaf (stale, removed twice, or a branch).
    #[error("invalid broad-phase handle")]
    InvalidHandle,

    /// The broad phase tracks a body index the body source no longer has.
    #[error("unknown body index: {0}")]
    UnknownBody(usize),

    /// A polygon with too few vertices or no enclosed area.
    #[error("degenerate polygon: {vertices} vertices, area {area}")]
    DegeneratePolygon {
        /// Number of vertices supplied.
        vertices: usize,
        /// Absolute enclosed area.
        area: f64,
    },

    /// Configuration could not be loaded or is out of range.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CollisionError>;
