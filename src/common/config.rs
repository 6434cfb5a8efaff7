//! Simulation configuration.
//!
//! Tuning values for the broad phase and the contact resolver, passed
//! explicitly to whoever needs them.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// Which broad-phase strategy the host builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BroadPhaseKind {
    /// Dynamic AABB tree with fattened leaves.
    #[default]
    AabbTree,
    /// All-pairs tight-box test. Reference only, quadratic.
    BruteForce,
}

/// Coefficients used by the contact resolver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    /// Coefficient of restitution. 0 = perfectly inelastic, 1 = perfectly elastic.
    pub restitution: f64,
    /// Coulomb friction coefficient bounding the tangential impulse.
    pub friction: f64,
    /// Fraction of the penetration depth pushed out per contact per frame.
    pub position_damping: f64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            restitution: 0.0,
            friction: 0.0,
            position_damping: 0.5,
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub broad_phase: BroadPhaseKind,
    /// Margin added on every side of a leaf's tight box to build its fat box.
    pub tree_margin: f64,
    /// Gravity acceleration `[x, y]` in world units per second squared.
    pub gravity: [f64; 2],
    pub contact: ContactConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            broad_phase: BroadPhaseKind::default(),
            tree_margin: 0.2,
            gravity: [0.0, -9.81],
            contact: ContactConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Parses a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Err(err) = config.validate() {
            warn!("Rejected simulation config: {}", err);
            return Err(err);
        }
        Ok(config)
    }

    /// Loads a configuration from a `.toml` file.
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&contents)
    }

    /// Serializes the configuration to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn gravity(&self) -> Vec2 {
        Vec2::new(self.gravity[0], self.gravity[1])
    }

    /// Rejects values the solver cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tree_margin >= 0.0 && self.tree_margin.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "tree_margin must be finite and >= 0, got {}",
                self.tree_margin
            )));
        }
        let contact = &self.contact;
        if !(0.0..=1.0).contains(&contact.restitution) {
            return Err(ConfigError::Invalid(format!(
                "restitution must be in [0, 1], got {}",
                contact.restitution
            )));
        }
        if !(contact.friction >= 0.0 && contact.friction.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "friction must be finite and >= 0, got {}",
                contact.friction
            )));
        }
        if !(0.0..=1.0).contains(&contact.position_damping) {
            return Err(ConfigError::Invalid(format!(
                "position_damping must be in [0, 1], got {}",
                contact.position_damping
            )));
        }
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(ConfigError::Invalid("gravity must be finite".to_string()));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Invalid value: {0}")]
    Invalid(String),
}

// io::Error is not PartialEq; compare by message so CollisionError can derive it.
impl PartialEq for ConfigError {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
