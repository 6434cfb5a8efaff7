use log::{debug, trace, warn};

use crate::broad_phase::{BroadPhase, BruteForce, DynamicAabbTree, Gizmo, QueryStats};
use crate::collision::{self, Collision, ResolvedContact};
use crate::common::config::{BroadPhaseKind, SimulationConfig};
use crate::error::{CollisionError, Result};
use crate::integration::integrator;
use crate::objects::rigid_body::RigidBody;

/// Owns the bodies and drives the per-frame pipeline:
/// integrate, broad phase, SAT, manifold, impulse resolution.
pub struct PhysicsWorld {
    bodies: Vec<RigidBody>,
    broad_phase: Box<dyn BroadPhase>,
    config: SimulationConfig,
    // Collisions detected in the last step
    contacts: Vec<Collision>,
    // Bodies the broad phase has been told about
    tracked: usize,
}

impl PhysicsWorld {
    /// Creates an empty world using the broad phase named by `config`.
    ///
    /// Fails with [`CollisionError::Config`] when `config` does not pass
    /// [`SimulationConfig::validate`].
    pub fn new(config: SimulationConfig) -> Result<Self> {
        if let Err(err) = config.validate() {
            warn!("Rejected simulation config: {}", err);
            return Err(err.into());
        }
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: SimulationConfig) -> Self {
        let broad_phase: Box<dyn BroadPhase> = match config.broad_phase {
            BroadPhaseKind::AabbTree => Box::new(DynamicAabbTree::new(config.tree_margin)),
            BroadPhaseKind::BruteForce => Box::new(BruteForce::default()),
        };
        debug!("Created physics world with {:?} broad phase", config.broad_phase);
        Self {
            bodies: Vec::new(),
            broad_phase,
            config,
            contacts: Vec::new(),
            tracked: 0,
        }
    }

    /// Creates a world from a TOML configuration file.
    pub fn from_config_file(path: &str) -> Result<Self> {
        let config = SimulationConfig::load_from_file(path)?;
        Ok(Self::with_valid_config(config))
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Adds a rigid body to the world and returns its index.
    pub fn add_body(&mut self, body: RigidBody) -> usize {
        let index = self.bodies.len();
        self.bodies.push(body);
        index
    }

    pub fn body(&self, index: usize) -> Option<&RigidBody> {
        self.bodies.get(index)
    }

    pub fn body_mut(&mut self, index: usize) -> Option<&mut RigidBody> {
        self.bodies.get_mut(index)
    }

    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    /// Collisions found during the last step.
    pub fn contacts(&self) -> &[Collision] {
        &self.contacts
    }

    /// Broad-phase boxes for debug drawing.
    pub fn gizmos(&self) -> Vec<Gizmo> {
        self.broad_phase.gizmos()
    }

    pub fn broad_phase_stats(&self) -> QueryStats {
        self.broad_phase.last_query_stats()
    }

    /// Runs the broad phase and SAT over the current state.
    ///
    /// Candidate pairs are visited in ascending `(a, b)` order so the result
    /// does not depend on the broad phase's internal layout. Pairs of two
    /// static bodies are skipped.
    pub fn detect_collisions(&mut self) -> Result<Vec<Collision>> {
        if self.tracked < self.bodies.len() {
            self.broad_phase.init(&self.bodies)?;
            self.tracked = self.bodies.len();
        }

        let mut pairs = self.broad_phase.candidate_pairs(&self.bodies)?;
        pairs.sort_unstable();

        let mut collisions = Vec::new();
        for pair in pairs {
            let body_a = self.bodies.get(pair.a).ok_or(CollisionError::UnknownBody(pair.a))?;
            let body_b = self.bodies.get(pair.b).ok_or(CollisionError::UnknownBody(pair.b))?;
            if body_a.is_static() && body_b.is_static() {
                continue;
            }
            if let Some(collision) = collision::check_collision(body_a, pair.a, body_b, pair.b) {
                collisions.push(collision);
            }
        }
        Ok(collisions)
    }

    /// Resolves collisions in order. Each manifold is built from the bodies'
    /// state at the moment that collision is handled.
    pub fn resolve(&mut self, collisions: &[Collision]) -> Vec<ResolvedContact> {
        let mut resolved = Vec::with_capacity(collisions.len());
        for collision in collisions {
            let manifold = match (self.bodies.get(collision.body_a), self.bodies.get(collision.body_b)) {
                (Some(body_a), Some(body_b)) => collision::build_manifold(collision, body_a, body_b),
                _ => continue,
            };
            if let Some(contact) =
                collision::resolve_collision(collision, Some(&manifold), &mut self.bodies, &self.config.contact)
            {
                resolved.push(contact);
            } else {
                trace!(
                    "Skipped contact {}-{} ({} manifold points)",
                    collision.body_a,
                    collision.body_b,
                    manifold.len()
                );
            }
        }
        resolved
    }

    /// Advances the simulation by one time step `dt`.
    pub fn step(&mut self, dt: f64) -> Result<()> {
        if dt <= 0.0 {
            return Ok(());
        }

        let gravity = self.config.gravity();
        for body in self.bodies.iter_mut() {
            integrator::integrate(body, gravity, dt);
        }

        let collisions = self.detect_collisions()?;
        let resolved = self.resolve(&collisions);
        debug!(
            "Step: {} collisions, {} resolved",
            collisions.len(),
            resolved.len()
        );
        self.contacts = collisions;
        Ok(())
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::with_valid_config(SimulationConfig::default())
    }
}
