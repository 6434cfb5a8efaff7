//! 2D convex-polygon collision engine: a dynamic AABB tree broad phase, a
//! separating-axis narrow phase with clipped contact manifolds, and an
//! impulse-based contact resolver.

pub mod broad_phase;
pub mod collision;
pub mod common;
pub mod error;
pub mod integration;
pub mod math;
pub mod objects;
pub mod shapes;
pub mod world;

// Re-export key types for easier use
pub use broad_phase::{BodySource, BroadPhase, BruteForce, CandidatePair, DynamicAabbTree, Gizmo, GizmoKind, LeafHandle};
pub use collision::{build_manifold, check_collision, resolve_collision, Collision, ContactManifold, ResolvedContact, AABB};
pub use common::{BroadPhaseKind, ConfigError, ContactConfig, SimulationConfig};
pub use error::{CollisionError, Result};
pub use math::{Transform, Vec2};
pub use objects::RigidBody;
pub use shapes::Polygon;
pub use world::PhysicsWorld;
