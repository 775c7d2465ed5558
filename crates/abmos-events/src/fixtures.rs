//! Sample data fixtures for testing.
//!
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // abmos-events = { path = "../abmos-events", features = ["test-fixtures"] }
//!
//! use abmos_events::fixtures;
//!
//! let layer = fixtures::religion_layer();
//! let snapshot = fixtures::sample_snapshot();
//! ```

use crate::{GraphDocument, WorldSnapshot};

/// Returns the three-agent "Religion" layer document.
///
/// Contains nodes for agents 0, 1 and 2 and the edges 0 -> 1 (0.8) and 1 -> 2 (0.3).
pub fn religion_layer() -> GraphDocument {
    let json = include_str!("../tests/fixtures/religion_layer.json");
    GraphDocument::from_json(json).expect("Failed to parse religion_layer.json")
}

/// Returns a sample snapshot of a small four-agent model.
pub fn sample_snapshot() -> WorldSnapshot {
    let json = include_str!("../tests/fixtures/sample_snapshot.json");
    serde_json::from_str(json).expect("Failed to parse sample_snapshot.json")
}

/// Returns a layer document whose link points at an undeclared node.
pub fn dangling_layer_json() -> &'static str {
    r#"{
  "name": "Broken",
  "directed": true,
  "nodes": [{ "id": 0, "agent": 0 }],
  "links": [{ "source": 0, "target": 7, "weight": 0.5 }]
}"#
}
