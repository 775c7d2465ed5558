//! Simulation Systems
//!
//! Pluggable per-phase policies: opinion influence and relationship mutation.

pub mod influence;
pub mod mutation;

pub use influence::{
    influence_constants, InfluenceRule, InfluenceSubject, LinearRule, NeighbourOpinion,
    PersonalityRule, PROXIMITY_LAYER,
};
pub use mutation::{Homophily, NoMutation, RelationshipPolicy};
