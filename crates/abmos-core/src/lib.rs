//! ABMOS Opinion Dynamics Engine Library
//!
//! Agents connected through several weighted relationship layers and a
//! spatial grid, with a synchronous per-iteration opinion update.

pub mod components;
pub mod config;
pub mod error;
pub mod graph;
pub mod output;
pub mod setup;
pub mod sim;
pub mod space;
pub mod systems;

pub use components::*;
pub use config::{AgentConfig, Config, LayerConfig, SimulationConfig, SpaceConfig};
pub use error::{AbmError, ErrorKind, Result};
pub use graph::{LayerSet, RelationshipLayer};
pub use sim::{ClockState, ModelBuilder, ModelView, SimulationClock};
pub use space::{BoundaryPolicy, Placement, SpatialGrid};
pub use systems::{InfluenceRule, PersonalityRule, RelationshipPolicy};
