//! Layer Set
//!
//! Ordered collection of relationship layers with cross-layer queries.

use crate::components::agent::{Agent, AgentId};
use crate::components::registry::OpinionBuffer;
use crate::error::{AbmError, Result};
use crate::systems::influence::NeighbourOpinion;

use super::layer::RelationshipLayer;

/// Default cut-off for [`LayerSet::agent_significant_layers`]
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 0.9;

/// One layer's view of an agent's neighbourhood for a single opinion phase
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfluence {
    pub layer: String,
    /// The agent's own weighting of this layer
    pub weighting: f64,
    pub neighbours: Vec<NeighbourOpinion>,
}

#[derive(Debug, Clone, Default)]
pub struct LayerSet {
    layers: Vec<RelationshipLayer>,
}

impl LayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer. A name already in use is rejected; see
    /// [`insert_shadowed`](Self::insert_shadowed) and [`replace`](Self::replace).
    pub fn add(&mut self, layer: RelationshipLayer) -> Result<()> {
        if self.get(layer.name()).is_some() {
            return Err(AbmError::DuplicateLayer(layer.name().to_string()));
        }
        self.layers.push(layer);
        Ok(())
    }

    /// Appends a layer even if its name is taken. Name lookups keep
    /// resolving to the earlier layer.
    pub fn insert_shadowed(&mut self, layer: RelationshipLayer) {
        if self.get(layer.name()).is_some() {
            tracing::warn!(layer = layer.name(), "adding a layer that shadows an existing name");
        }
        self.layers.push(layer);
    }

    /// Swaps in a layer for the first one with the same name, keeping its position.
    pub fn replace(&mut self, layer: RelationshipLayer) -> Option<RelationshipLayer> {
        match self.layers.iter().position(|l| l.name() == layer.name()) {
            Some(i) => Some(std::mem::replace(&mut self.layers[i], layer)),
            None => {
                self.layers.push(layer);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&RelationshipLayer> {
        self.layers.iter().find(|l| l.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut RelationshipLayer> {
        self.layers.iter_mut().find(|l| l.name() == name)
    }

    /// Like [`get`](Self::get), failing with `LayerNotFound`.
    pub fn layer(&self, name: &str) -> Result<&RelationshipLayer> {
        self.get(name)
            .ok_or_else(|| AbmError::LayerNotFound(name.to_string()))
    }

    pub fn layer_mut(&mut self, name: &str) -> Result<&mut RelationshipLayer> {
        self.layers
            .iter_mut()
            .find(|l| l.name() == name)
            .ok_or_else(|| AbmError::LayerNotFound(name.to_string()))
    }

    /// Takes the first layer with this name out of the set.
    pub fn remove(&mut self, name: &str) -> Result<RelationshipLayer> {
        let index = self
            .layers
            .iter()
            .position(|l| l.name() == name)
            .ok_or_else(|| AbmError::LayerNotFound(name.to_string()))?;
        Ok(self.layers.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationshipLayer> {
        self.layers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RelationshipLayer> {
        self.layers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer names in insertion order
    pub fn list_names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.name().to_string()).collect()
    }

    /// Names of the member layers whose personal weighting exceeds `threshold`
    /// in absolute value. Edge weights play no part.
    pub fn agent_significant_layers(&self, agent: &Agent, threshold: f64) -> Result<Vec<String>> {
        let mut significant = Vec::new();
        for layer in self.layers.iter().filter(|l| l.agent_in_layer(agent)) {
            let weighting = member_weighting(agent, layer)?;
            if weighting.abs() > threshold {
                significant.push(layer.name().to_string());
            }
        }
        Ok(significant)
    }

    /// Per-layer neighbourhoods of `agent`, with neighbour opinions read from
    /// `opinions`. Layers the agent is not a member of are skipped; a failing
    /// layer yields an `Err` entry without affecting the others.
    pub fn neighbour_influences(
        &self,
        agent: &Agent,
        opinions: &OpinionBuffer,
    ) -> Vec<Result<LayerInfluence>> {
        let Some(id) = agent.id() else {
            return Vec::new();
        };
        self.layers
            .iter()
            .filter(|l| l.contains_agent(id))
            .map(|layer| layer_influence(layer, agent, id, opinions))
            .collect()
    }

    /// Removes the agent from every layer. Returns how many layers held it.
    pub fn remove_agent(&mut self, agent: AgentId) -> usize {
        self.layers
            .iter_mut()
            .map(|l| l.remove_agent(agent))
            .filter(|removed| *removed)
            .count()
    }
}

fn member_weighting(agent: &Agent, layer: &RelationshipLayer) -> Result<f64> {
    agent
        .weighting(layer.name())
        .ok_or_else(|| AbmError::MissingWeighting {
            agent: agent.id().unwrap_or(AgentId(u64::MAX)),
            layer: layer.name().to_string(),
        })
}

fn layer_influence(
    layer: &RelationshipLayer,
    agent: &Agent,
    id: AgentId,
    opinions: &OpinionBuffer,
) -> Result<LayerInfluence> {
    let weighting = member_weighting(agent, layer)?;
    let node = layer
        .node_of(id)
        .ok_or_else(|| AbmError::AgentNotFound(id))?;

    let mut neighbours = Vec::new();
    for (neighbour, weight) in layer.outgoing(node)? {
        let opinion = *opinions
            .get(&neighbour)
            .ok_or(AbmError::AgentNotFound(neighbour))?;
        neighbours.push(NeighbourOpinion {
            agent: neighbour,
            weight,
            opinion,
        });
    }

    Ok(LayerInfluence {
        layer: layer.name().to_string(),
        weighting,
        neighbours,
    })
}
