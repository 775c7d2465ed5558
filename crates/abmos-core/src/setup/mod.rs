//! Setup
//!
//! Population generation.

pub mod agents;

pub use agents::{AgentGenerator, AttributeSpec, Distribution, ValueSampler};
