//! Relationship Layers
//!
//! Directed weighted graphs, one per social hierarchy, and the ordered set that holds them.

pub mod generate;
pub mod layer;
pub mod layer_set;
pub mod persist;

pub use generate::LayerGenerator;
pub use layer::{DirectedWeights, LayerEdge, LayerNode, RelationshipLayer};
pub use layer_set::{LayerInfluence, LayerSet, DEFAULT_SIGNIFICANCE_THRESHOLD};
pub use petgraph::stable_graph::{EdgeIndex, NodeIndex};
