pub mod aabb;
pub mod detection;
pub mod manifold;
pub mod resolution;

// Re-export key types
pub use aabb::AABB;
pub use detection::{check_collision, project_onto_axis};
pub use manifold::{build_manifold, Collision, ContactManifold};
pub use resolution::{resolve_collision, ResolvedContact};
