//! Relationship Layer
//!
//! One directed, weighted graph over agents for a single social hierarchy.
//!
//! Storage is a petgraph `StableDiGraph`: node and edge handles survive removals
//! of other nodes and edges, and recycling of freed handles is left to petgraph.
//! Nodes carry the agent id as payload, so the layer never owns agents.
//!
//! An edge `a -> b` with weight `w` reads "a attends to b with strength w".

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::components::agent::{Agent, AgentId};
use crate::error::{AbmError, Result};

/// Node payload: the member agent and its cached layer-local index
#[derive(Debug, Clone, PartialEq)]
pub struct LayerNode {
    pub agent: AgentId,
    pub index: usize,
}

/// Edge payload
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEdge {
    pub weight: f64,
    pub from: usize,
    pub to: usize,
    pub layer: Arc<str>,
}

/// Weights keyed by literal direction
pub type DirectedWeights = BTreeMap<(NodeIndex, NodeIndex), f64>;

#[derive(Debug, Clone)]
pub struct RelationshipLayer {
    name: Arc<str>,
    graph: StableDiGraph<LayerNode, LayerEdge>,
    members: HashMap<AgentId, NodeIndex>,
}

impl RelationshipLayer {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            graph: StableDiGraph::new(),
            members: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_of(&self, agent: AgentId) -> Option<NodeIndex> {
        self.members.get(&agent).copied()
    }

    pub fn agent_of(&self, node: NodeIndex) -> Result<AgentId> {
        self.graph
            .node_weight(node)
            .map(|n| n.agent)
            .ok_or_else(|| self.node_not_found(node))
    }

    /// Membership by agent identity
    pub fn agent_in_layer(&self, agent: &Agent) -> bool {
        agent.id().map_or(false, |id| self.members.contains_key(&id))
    }

    pub fn contains_agent(&self, agent: AgentId) -> bool {
        self.members.contains_key(&agent)
    }

    /// Member agent ids in node order
    pub fn members(&self) -> Vec<AgentId> {
        self.graph
            .node_indices()
            .filter_map(|n| self.graph.node_weight(n).map(|w| w.agent))
            .collect()
    }

    /// Adds one node per agent. Agents already present keep their node.
    pub fn add_nodes<'a>(
        &mut self,
        agents: impl IntoIterator<Item = &'a Agent>,
    ) -> Result<Vec<NodeIndex>> {
        let mut ids = Vec::new();
        for agent in agents {
            let id = agent.id().ok_or_else(|| {
                AbmError::Invariant(format!(
                    "unregistered agent offered to layer '{}'",
                    self.name
                ))
            })?;
            ids.push(id);
        }
        Ok(self.add_members(ids))
    }

    /// Adds nodes for agent ids directly.
    pub fn add_members(&mut self, agents: impl IntoIterator<Item = AgentId>) -> Vec<NodeIndex> {
        let nodes = agents
            .into_iter()
            .map(|agent| self.insert_member(agent))
            .collect();
        self.update_node_indices();
        nodes
    }

    fn insert_member(&mut self, agent: AgentId) -> NodeIndex {
        if let Some(&node) = self.members.get(&agent) {
            return node;
        }
        let node = self.graph.add_node(LayerNode { agent, index: 0 });
        self.members.insert(agent, node);
        node
    }

    /// Adds an agent together with its edges: `(other, weight)` pairs are
    /// inserted as `agent -> other`.
    pub fn add_node_with_edges(
        &mut self,
        agent: AgentId,
        edges: &[(NodeIndex, f64)],
    ) -> Result<NodeIndex> {
        for (other, _) in edges {
            self.ensure_node(*other)?;
        }
        let node = self.insert_member(agent);
        self.update_node_indices();
        for &(other, weight) in edges {
            self.upsert_edge(node, other, weight);
        }
        self.update_edge_indices();
        Ok(node)
    }

    /// Bulk-inserts directed edges `from[i] -> to[i]`. Missing weights default
    /// to 0.0. An existing ordered pair has its weight updated instead.
    pub fn add_edges(
        &mut self,
        from: &[NodeIndex],
        to: &[NodeIndex],
        weights: Option<&[f64]>,
    ) -> Result<Vec<EdgeIndex>> {
        if from.len() != to.len() || weights.map_or(false, |w| w.len() != from.len()) {
            return Err(AbmError::InvalidConfig(format!(
                "edge lists for layer '{}' differ in length",
                self.name
            )));
        }
        for &node in from.iter().chain(to) {
            self.ensure_node(node)?;
        }

        let edges = from
            .iter()
            .zip(to)
            .enumerate()
            .map(|(i, (&a, &b))| {
                let weight = weights.map_or(0.0, |w| w[i]);
                self.upsert_edge(a, b, weight)
            })
            .collect();
        self.update_edge_indices();
        Ok(edges)
    }

    fn upsert_edge(&mut self, from: NodeIndex, to: NodeIndex, weight: f64) -> EdgeIndex {
        if let Some(edge) = self.graph.find_edge(from, to) {
            if let Some(payload) = self.graph.edge_weight_mut(edge) {
                payload.weight = weight;
            }
            return edge;
        }
        self.graph.add_edge(
            from,
            to,
            LayerEdge {
                weight,
                from: from.index(),
                to: to.index(),
                layer: Arc::clone(&self.name),
            },
        )
    }

    /// Some edge index if an edge exists in either direction.
    pub fn relationship_exists(
        &self,
        node_1: NodeIndex,
        node_2: NodeIndex,
    ) -> Result<Option<EdgeIndex>> {
        self.ensure_node(node_1)?;
        self.ensure_node(node_2)?;
        Ok(self
            .graph
            .find_edge(node_1, node_2)
            .or_else(|| self.graph.find_edge(node_2, node_1)))
    }

    /// Up to two weights, one per existing direction between the nodes.
    pub fn get_relationships(
        &self,
        node_1: NodeIndex,
        node_2: NodeIndex,
    ) -> Result<Option<DirectedWeights>> {
        self.ensure_node(node_1)?;
        self.ensure_node(node_2)?;

        let mut found = DirectedWeights::new();
        for (a, b) in [(node_1, node_2), (node_2, node_1)] {
            if let Some(weight) = self.weight(a, b) {
                found.insert((a, b), weight);
            }
        }
        Ok(if found.is_empty() { None } else { Some(found) })
    }

    /// Weight of the directed edge `from -> to`, if present.
    pub fn weight(&self, from: NodeIndex, to: NodeIndex) -> Option<f64> {
        self.graph
            .find_edge(from, to)
            .and_then(|e| self.graph.edge_weight(e))
            .map(|e| e.weight)
    }

    /// Overwrites the weight of `node_1 -> node_2` in place, or inserts that edge.
    pub fn change_weight(
        &mut self,
        node_1: NodeIndex,
        node_2: NodeIndex,
        value: f64,
    ) -> Result<EdgeIndex> {
        self.ensure_node(node_1)?;
        self.ensure_node(node_2)?;
        let edge = self.upsert_edge(node_1, node_2, value);
        self.update_edge_indices();
        Ok(edge)
    }

    /// Removes the node and every edge touching it.
    pub fn remove_node(&mut self, node: NodeIndex) -> Result<AgentId> {
        let removed = self
            .graph
            .remove_node(node)
            .ok_or_else(|| self.node_not_found(node))?;
        self.members.remove(&removed.agent);
        Ok(removed.agent)
    }

    /// Cascade helper: drops the agent's node if it has one.
    pub fn remove_agent(&mut self, agent: AgentId) -> bool {
        match self.members.get(&agent).copied() {
            Some(node) => self.remove_node(node).is_ok(),
            None => false,
        }
    }

    /// Removes exactly the directed edge `node_1 -> node_2`.
    pub fn remove_edge(&mut self, node_1: NodeIndex, node_2: NodeIndex) -> Result<f64> {
        self.ensure_node(node_1)?;
        self.ensure_node(node_2)?;
        let edge = self
            .graph
            .find_edge(node_1, node_2)
            .ok_or_else(|| AbmError::EdgeNotFound {
                layer: self.name.to_string(),
                from: node_1.index(),
                to: node_2.index(),
            })?;
        let removed = self.graph.remove_edge(edge).ok_or_else(|| AbmError::EdgeNotFound {
            layer: self.name.to_string(),
            from: node_1.index(),
            to: node_2.index(),
        })?;
        Ok(removed.weight)
    }

    /// Agents this node attends to, with edge weights.
    pub fn outgoing(&self, node: NodeIndex) -> Result<Vec<(AgentId, f64)>> {
        self.neighbours(node, Direction::Outgoing)
    }

    /// Agents attending to this node, with edge weights.
    pub fn incoming(&self, node: NodeIndex) -> Result<Vec<(AgentId, f64)>> {
        self.neighbours(node, Direction::Incoming)
    }

    fn neighbours(&self, node: NodeIndex, direction: Direction) -> Result<Vec<(AgentId, f64)>> {
        self.ensure_node(node)?;
        let mut found = Vec::new();
        for edge in self.graph.edges_directed(node, direction) {
            let other = match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            };
            found.push((self.agent_of(other)?, edge.weight().weight));
        }
        Ok(found)
    }

    /// Every edge as `(from agent, to agent, weight)`, in edge-index order.
    pub fn edges(&self) -> Vec<(AgentId, AgentId, f64)> {
        self.graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                let from = self.graph.node_weight(a)?.agent;
                let to = self.graph.node_weight(b)?.agent;
                Some((from, to, self.graph.edge_weight(e)?.weight))
            })
            .collect()
    }

    /// Overwrites the weight of an edge by handle; used by mutation policies.
    pub(crate) fn set_edge_weight(&mut self, edge: EdgeIndex, weight: f64) -> Result<()> {
        let name = self.name.to_string();
        let payload = self
            .graph
            .edge_weight_mut(edge)
            .ok_or(AbmError::EdgeNotFound {
                layer: name,
                from: edge.index(),
                to: edge.index(),
            })?;
        payload.weight = weight;
        Ok(())
    }

    /// Outgoing edge handles of a node with their target agents.
    pub(crate) fn outgoing_edges(&self, node: NodeIndex) -> Vec<(EdgeIndex, AgentId, f64)> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .filter_map(|e| {
                let target = self.graph.node_weight(e.target())?.agent;
                Some((e.id(), target, e.weight().weight))
            })
            .collect()
    }

    pub fn node(&self, node: NodeIndex) -> Option<&LayerNode> {
        self.graph.node_weight(node)
    }

    pub fn edge(&self, edge: EdgeIndex) -> Option<&LayerEdge> {
        self.graph.edge_weight(edge)
    }

    /// Refreshes the index cached in every node payload.
    pub fn update_node_indices(&mut self) {
        let nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        for node in nodes {
            if let Some(payload) = self.graph.node_weight_mut(node) {
                payload.index = node.index();
            }
        }
    }

    /// Refreshes the endpoint indices cached in every edge payload.
    pub fn update_edge_indices(&mut self) {
        let edges: Vec<EdgeIndex> = self.graph.edge_indices().collect();
        for edge in edges {
            if let Some((a, b)) = self.graph.edge_endpoints(edge) {
                if let Some(payload) = self.graph.edge_weight_mut(edge) {
                    payload.from = a.index();
                    payload.to = b.index();
                }
            }
        }
    }

    fn ensure_node(&self, node: NodeIndex) -> Result<()> {
        if self.graph.contains_node(node) {
            Ok(())
        } else {
            Err(self.node_not_found(node))
        }
    }

    fn node_not_found(&self, node: NodeIndex) -> AbmError {
        AbmError::NodeNotFound {
            layer: self.name.to_string(),
            node: node.index(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::registry::AgentRegistry;

    fn religion() -> (RelationshipLayer, Vec<NodeIndex>) {
        let mut registry = AgentRegistry::new();
        for _ in 0..3 {
            registry.insert(Agent::new(0.0));
        }
        let agents: Vec<&Agent> = registry.iter().map(|(_, a)| a).collect();
        let mut layer = RelationshipLayer::new("Religion");
        let nodes = layer.add_nodes(agents).unwrap();
        layer
            .add_edges(&[nodes[0], nodes[1]], &[nodes[1], nodes[2]], Some(&[0.8, 0.3]))
            .unwrap();
        (layer, nodes)
    }

    #[test]
    fn test_add_nodes_and_edges() {
        let (layer, nodes) = religion();
        assert_eq!(layer.node_count(), 3);
        assert_eq!(layer.edge_count(), 2);
        assert_eq!(layer.weight(nodes[0], nodes[1]), Some(0.8));
        assert_eq!(layer.weight(nodes[1], nodes[0]), None);
        assert_eq!(layer.node(nodes[2]).unwrap().index, nodes[2].index());
    }

    #[test]
    fn test_add_edges_defaults_weight() {
        let (mut layer, nodes) = religion();
        layer.add_edges(&[nodes[2]], &[nodes[0]], None).unwrap();
        assert_eq!(layer.weight(nodes[2], nodes[0]), Some(0.0));
    }

    #[test]
    fn test_add_edges_rejects_unknown_node_without_mutating() {
        let (mut layer, nodes) = religion();
        let ghost = NodeIndex::new(99);
        let err = layer
            .add_edges(&[nodes[0], nodes[2]], &[nodes[2], ghost], None)
            .unwrap_err();
        assert!(matches!(err, AbmError::NodeNotFound { node: 99, .. }));
        assert_eq!(layer.edge_count(), 2);
    }

    #[test]
    fn test_add_nodes_rejects_unregistered_agent() {
        let mut layer = RelationshipLayer::new("Age");
        let loose = Agent::new(0.0);
        assert!(layer.add_nodes([&loose]).unwrap_err().is_fatal());
    }

    #[test]
    fn test_relationship_exists_is_symmetric() {
        let (layer, nodes) = religion();
        assert!(layer.relationship_exists(nodes[0], nodes[1]).unwrap().is_some());
        assert!(layer.relationship_exists(nodes[1], nodes[0]).unwrap().is_some());
        assert!(layer.relationship_exists(nodes[0], nodes[2]).unwrap().is_none());
        assert!(layer.relationship_exists(nodes[0], NodeIndex::new(42)).is_err());
    }

    #[test]
    fn test_get_relationships_keys_by_direction() {
        let (mut layer, nodes) = religion();
        layer.change_weight(nodes[1], nodes[0], -0.4).unwrap();

        let rels = layer.get_relationships(nodes[0], nodes[1]).unwrap().unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[&(nodes[0], nodes[1])], 0.8);
        assert_eq!(rels[&(nodes[1], nodes[0])], -0.4);

        let one_way = layer.get_relationships(nodes[2], nodes[1]).unwrap().unwrap();
        assert_eq!(one_way.len(), 1);
        assert_eq!(one_way[&(nodes[1], nodes[2])], 0.3);

        assert!(layer.get_relationships(nodes[0], nodes[2]).unwrap().is_none());
    }

    #[test]
    fn test_change_weight_updates_in_place() {
        let (mut layer, nodes) = religion();
        let first = layer.change_weight(nodes[0], nodes[2], 0.1).unwrap();
        let second = layer.change_weight(nodes[0], nodes[2], 0.6).unwrap();

        assert_eq!(first, second);
        assert_eq!(layer.edge_count(), 3);
        assert_eq!(layer.weight(nodes[0], nodes[2]), Some(0.6));
    }

    #[test]
    fn test_remove_node_drops_both_directions() {
        let (mut layer, nodes) = religion();
        layer.change_weight(nodes[2], nodes[1], 0.5).unwrap();
        assert_eq!(layer.edge_count(), 3);

        let agent = layer.remove_node(nodes[1]).unwrap();
        assert_eq!(agent, AgentId(1));
        assert_eq!(layer.node_count(), 2);
        assert_eq!(layer.edge_count(), 0);
        assert!(!layer.contains_agent(AgentId(1)));
        assert!(layer.edges().is_empty());

        // Surviving handles stay valid
        assert_eq!(layer.agent_of(nodes[2]).unwrap(), AgentId(2));
        assert!(layer.remove_node(nodes[1]).is_err());
    }

    #[test]
    fn test_remove_edge_is_directional() {
        let (mut layer, nodes) = religion();
        layer.change_weight(nodes[1], nodes[0], 0.2).unwrap();

        assert_eq!(layer.remove_edge(nodes[0], nodes[1]).unwrap(), 0.8);
        assert_eq!(layer.weight(nodes[1], nodes[0]), Some(0.2));
        assert!(matches!(
            layer.remove_edge(nodes[0], nodes[1]),
            Err(AbmError::EdgeNotFound { .. })
        ));
    }

    #[test]
    fn test_agent_in_layer_by_identity() {
        let mut registry = AgentRegistry::new();
        let a = registry.insert(Agent::new(0.5));
        let b = registry.insert(Agent::new(0.5));
        let mut layer = RelationshipLayer::new("Family");
        layer.add_members([a]);

        // Same attributes, different identity
        assert!(layer.agent_in_layer(registry.get(a).unwrap()));
        assert!(!layer.agent_in_layer(registry.get(b).unwrap()));
        assert!(!layer.agent_in_layer(&Agent::new(0.5)));
    }

    #[test]
    fn test_outgoing_and_incoming() {
        let (layer, nodes) = religion();
        assert_eq!(layer.outgoing(nodes[0]).unwrap(), vec![(AgentId(1), 0.8)]);
        assert_eq!(layer.incoming(nodes[2]).unwrap(), vec![(AgentId(1), 0.3)]);
        assert!(layer.outgoing(nodes[2]).unwrap().is_empty());
    }

    #[test]
    fn test_add_node_with_edges() {
        let (mut layer, nodes) = religion();
        let node = layer
            .add_node_with_edges(AgentId(7), &[(nodes[0], 0.4), (nodes[2], -0.1)])
            .unwrap();
        assert_eq!(layer.node_count(), 4);
        assert_eq!(layer.weight(node, nodes[0]), Some(0.4));
        assert_eq!(layer.weight(node, nodes[2]), Some(-0.1));
        assert_eq!(layer.edge(layer.relationship_exists(node, nodes[0]).unwrap().unwrap())
            .map(|e| e.layer.as_ref()), Some("Religion"));
    }
}
