//! Relationship Mutation
//!
//! Structural-phase policies that revise edge weights from agent opinions.

use crate::components::agent::AgentId;
use crate::components::registry::OpinionBuffer;
use crate::error::{AbmError, Result};
use crate::graph::LayerSet;

/// Revises the outgoing edges of one agent across every layer.
pub trait RelationshipPolicy {
    /// Returns how many edge weights changed.
    fn mutate(&self, layers: &mut LayerSet, agent: AgentId, opinions: &OpinionBuffer)
        -> Result<usize>;

    fn name(&self) -> &str {
        "custom"
    }
}

/// Leaves every weight untouched
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NoMutation;

impl RelationshipPolicy for NoMutation {
    fn mutate(&self, _: &mut LayerSet, _: AgentId, _: &OpinionBuffer) -> Result<usize> {
        Ok(0)
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Pulls each outgoing weight toward `1 - |opinion_a - opinion_b|` by `rate`.
/// Like-minded agents grow closer; distant ones drift apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homophily {
    pub rate: f64,
}

impl Homophily {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    fn revised(&self, weight: f64, own: f64, other: f64) -> f64 {
        let target = 1.0 - (own - other).abs();
        (weight + self.rate * (target - weight)).clamp(-1.0, 1.0)
    }
}

impl RelationshipPolicy for Homophily {
    fn mutate(
        &self,
        layers: &mut LayerSet,
        agent: AgentId,
        opinions: &OpinionBuffer,
    ) -> Result<usize> {
        let own = *opinions.get(&agent).ok_or(AbmError::AgentNotFound(agent))?;
        let mut changed = 0;
        for layer in layers.iter_mut() {
            let Some(node) = layer.node_of(agent) else {
                continue;
            };
            for (edge, target, weight) in layer.outgoing_edges(node) {
                let other = *opinions.get(&target).ok_or(AbmError::AgentNotFound(target))?;
                let next = self.revised(weight, own, other);
                if next != weight {
                    layer.set_edge_weight(edge, next)?;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    fn name(&self) -> &str {
        "homophily"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RelationshipLayer;

    fn setup() -> (LayerSet, OpinionBuffer) {
        let mut layer = RelationshipLayer::new("Friends");
        let nodes = layer.add_members([AgentId(0), AgentId(1), AgentId(2)]);
        layer
            .add_edges(&[nodes[0], nodes[0]], &[nodes[1], nodes[2]], Some(&[0.5, 0.5]))
            .unwrap();
        let mut layers = LayerSet::new();
        layers.add(layer).unwrap();

        let opinions = OpinionBuffer::from([(AgentId(0), 0.4), (AgentId(1), 0.4), (AgentId(2), -0.6)]);
        (layers, opinions)
    }

    #[test]
    fn test_no_mutation() {
        let (mut layers, opinions) = setup();
        assert_eq!(NoMutation.mutate(&mut layers, AgentId(0), &opinions).unwrap(), 0);
    }

    #[test]
    fn test_homophily_moves_weights() {
        let (mut layers, opinions) = setup();
        let changed = Homophily::new(0.5).mutate(&mut layers, AgentId(0), &opinions).unwrap();
        assert_eq!(changed, 2);

        let layer = layers.get("Friends").unwrap();
        let n0 = layer.node_of(AgentId(0)).unwrap();
        let n1 = layer.node_of(AgentId(1)).unwrap();
        let n2 = layer.node_of(AgentId(2)).unwrap();
        // Same opinion: target 1.0
        assert!((layer.weight(n0, n1).unwrap() - 0.75).abs() < 1e-12);
        // Distance 1.0: target 0.0
        assert!((layer.weight(n0, n2).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_homophily_clamps() {
        let policy = Homophily::new(2.0);
        assert_eq!(policy.revised(-1.0, 1.0, -1.0), -1.0);
        assert_eq!(policy.revised(0.9, 0.0, 0.0), 1.0);
    }

    #[test]
    fn test_non_member_is_untouched() {
        let (mut layers, mut opinions) = setup();
        opinions.insert(AgentId(9), 0.0);
        assert_eq!(Homophily::new(0.5).mutate(&mut layers, AgentId(9), &opinions).unwrap(), 0);
    }

    #[test]
    fn test_missing_opinion_is_not_found() {
        let (mut layers, _) = setup();
        let err = Homophily::new(0.5)
            .mutate(&mut layers, AgentId(0), &OpinionBuffer::new())
            .unwrap_err();
        assert!(matches!(err, AbmError::AgentNotFound(AgentId(0))));
    }
}
