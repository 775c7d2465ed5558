//! Layer Persistence
//!
//! Saves and loads layers as node-link JSON documents. Node handles are
//! renumbered on save; agent ids, direction and weights are preserved.

use petgraph::stable_graph::NodeIndex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use abmos_events::{GraphDocument, LinkRecord, NodeRecord};

use super::layer::RelationshipLayer;
use crate::components::agent::AgentId;
use crate::error::{AbmError, Result};

impl RelationshipLayer {
    /// Builds the persisted form, numbering nodes densely in node order.
    pub fn to_document(&self) -> GraphDocument {
        let mut doc = GraphDocument::new(self.name());
        let mut dense: HashMap<AgentId, u32> = HashMap::new();

        for (i, agent) in self.members().into_iter().enumerate() {
            let id = i as u32;
            dense.insert(agent, id);
            doc.nodes.push(NodeRecord { id, agent: agent.0 });
        }
        for (from, to, weight) in self.edges() {
            if let (Some(&source), Some(&target)) = (dense.get(&from), dense.get(&to)) {
                doc.links.push(LinkRecord { source, target, weight });
            }
        }
        doc
    }

    /// Rebuilds a layer from a document. `origin` names the source in errors.
    pub fn from_document(doc: &GraphDocument, origin: &Path) -> Result<Self> {
        if !doc.directed {
            return Err(AbmError::format(origin, "layer documents must be directed"));
        }

        let mut layer = RelationshipLayer::new(&doc.name);
        let mut nodes: HashMap<u32, NodeIndex> = HashMap::new();
        let mut agents: HashSet<u64> = HashSet::new();

        for record in &doc.nodes {
            if !agents.insert(record.agent) {
                return Err(AbmError::format(
                    origin,
                    format!("agent {} appears on more than one node", record.agent),
                ));
            }
            let node = layer.add_members([AgentId(record.agent)])[0];
            if nodes.insert(record.id, node).is_some() {
                return Err(AbmError::format(
                    origin,
                    format!("node id {} is declared twice", record.id),
                ));
            }
        }

        let mut seen: HashSet<(u32, u32)> = HashSet::new();
        let mut from = Vec::with_capacity(doc.links.len());
        let mut to = Vec::with_capacity(doc.links.len());
        let mut weights = Vec::with_capacity(doc.links.len());

        for link in &doc.links {
            let resolve = |id: u32| {
                nodes.get(&id).copied().ok_or_else(|| {
                    AbmError::format(origin, format!("link references undeclared node {}", id))
                })
            };
            let source = resolve(link.source)?;
            let target = resolve(link.target)?;
            if !link.weight.is_finite() {
                return Err(AbmError::format(
                    origin,
                    format!("link {} -> {} has a non-finite weight", link.source, link.target),
                ));
            }
            if !seen.insert((link.source, link.target)) {
                return Err(AbmError::format(
                    origin,
                    format!("duplicate link {} -> {}", link.source, link.target),
                ));
            }
            from.push(source);
            to.push(target);
            weights.push(link.weight);
        }

        layer.add_edges(&from, &to, Some(&weights))?;
        Ok(layer)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_document().to_json()?)?;
        tracing::debug!(
            layer = self.name(),
            nodes = self.node_count(),
            edges = self.edge_count(),
            "saved layer to {}",
            path.display()
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let doc: GraphDocument =
            serde_json::from_slice(&bytes).map_err(|e| AbmError::format(path, e.to_string()))?;
        Self::from_document(&doc, path)
    }
}
