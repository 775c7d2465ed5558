//! Persisted Layer Document
//!
//! Node-link JSON representation of a single relationship layer.
//!
//! # Example
//!
//! ```
//! use abmos_events::{GraphDocument, LinkRecord, NodeRecord};
//!
//! let mut doc = GraphDocument::new("Religion");
//! doc.nodes.push(NodeRecord { id: 0, agent: 10 });
//! doc.nodes.push(NodeRecord { id: 1, agent: 11 });
//! doc.links.push(LinkRecord { source: 0, target: 1, weight: 0.8 });
//!
//! let json = doc.to_json().unwrap();
//! let parsed = GraphDocument::from_json(&json).unwrap();
//! assert_eq!(parsed.links[0].weight, 0.8);
//! ```

use serde::{Deserialize, Serialize};

fn default_directed() -> bool {
    true
}

/// A layer as written to disk: declared name, node list and edge list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub name: String,
    #[serde(default = "default_directed")]
    pub directed: bool,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

/// One node: a document-local id and the agent it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: u32,
    pub agent: u64,
}

/// One directed, weighted edge between two document-local node ids.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub source: u32,
    pub target: u32,
    #[serde(default)]
    pub weight: f64,
}

impl GraphDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directed: true,
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Serializes to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
