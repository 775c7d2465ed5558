//! Agent Components
//!
//! The agent record and the registry that owns every agent.

pub mod agent;
pub mod registry;

pub use agent::*;
pub use registry::*;
