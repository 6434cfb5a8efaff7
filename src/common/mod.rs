pub mod config;

pub use config::{BroadPhaseKind, ConfigError, ContactConfig, SimulationConfig};
