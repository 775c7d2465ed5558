//! Shared snapshot and persistence types for the opinion dynamics engine.
//!
//! This crate contains pure data structures with no simulation logic.
//! Visualisers and analysis tooling depend on it without pulling in the engine.

pub mod graph_doc;
pub mod snapshot;
pub mod summary;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

// Re-export persisted layer types
pub use graph_doc::{GraphDocument, LinkRecord, NodeRecord};

// Re-export snapshot types
pub use snapshot::{
    generate_snapshot_id, AgentSnapshot, CellSnapshot, EdgeSnapshot, GridSnapshot,
    LayerSnapshot, OpinionMetrics, WorldSnapshot,
};

// Re-export run summary types
pub use summary::{DiagnosticCounts, RunSummary};
