//! Layer Generation
//!
//! Random relationship layers for synthetic populations: every ordered pair of
//! distinct members is linked independently with probability `density`.

use rand::rngs::SmallRng;
use rand::Rng;

use super::layer::RelationshipLayer;
use crate::components::agent::AgentId;
use crate::error::{AbmError, Result};
use crate::setup::agents::{AttributeSpec, ValueSampler};

#[derive(Debug, Clone)]
pub struct LayerGenerator {
    name: String,
    density: f64,
    weight: ValueSampler,
}

impl LayerGenerator {
    pub fn new(name: impl Into<String>, density: f64, weight: &AttributeSpec) -> Result<Self> {
        let name = name.into();
        if !(0.0..=1.0).contains(&density) {
            return Err(AbmError::InvalidConfig(format!(
                "density for layer '{}' must be within [0, 1], got {}",
                name, density
            )));
        }
        let weight = weight.resolve(&format!("{}.weight", name));
        if let ValueSampler::Literal(value) = &weight {
            if value.as_real().is_none() {
                return Err(AbmError::InvalidConfig(format!(
                    "edge weight for layer '{}' must be numeric",
                    name
                )));
            }
        }
        Ok(Self { name, density, weight })
    }

    pub fn generate(&self, members: &[AgentId], rng: &mut SmallRng) -> Result<RelationshipLayer> {
        let mut layer = RelationshipLayer::new(&self.name);
        let nodes = layer.add_members(members.iter().copied());

        let mut from = Vec::new();
        let mut to = Vec::new();
        let mut weights = Vec::new();
        for (i, &a) in nodes.iter().enumerate() {
            for (j, &b) in nodes.iter().enumerate() {
                if i == j || rng.gen::<f64>() >= self.density {
                    continue;
                }
                from.push(a);
                to.push(b);
                weights.push(self.weight.sample_real(rng).unwrap_or_default());
            }
        }
        layer.add_edges(&from, &to, Some(&weights))?;

        tracing::debug!(
            layer = %self.name,
            nodes = layer.node_count(),
            edges = layer.edge_count(),
            "generated layer"
        );
        Ok(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn members(n: u64) -> Vec<AgentId> {
        (0..n).map(AgentId).collect()
    }

    #[test]
    fn test_density_extremes() {
        let mut rng = SmallRng::seed_from_u64(5);
        let empty = LayerGenerator::new("Age", 0.0, &AttributeSpec::literal(1.0))
            .unwrap()
            .generate(&members(6), &mut rng)
            .unwrap();
        assert_eq!(empty.node_count(), 6);
        assert_eq!(empty.edge_count(), 0);

        let full = LayerGenerator::new("Age", 1.0, &AttributeSpec::literal(0.5))
            .unwrap()
            .generate(&members(6), &mut rng)
            .unwrap();
        assert_eq!(full.edge_count(), 30);
        assert!(full.edges().iter().all(|&(a, b, w)| a != b && w == 0.5));
    }

    #[test]
    fn test_same_seed_same_layer() {
        let generator =
            LayerGenerator::new("Friends", 0.3, &AttributeSpec::uniform(0.5, 0.5)).unwrap();
        let a = generator
            .generate(&members(20), &mut SmallRng::seed_from_u64(9))
            .unwrap();
        let b = generator
            .generate(&members(20), &mut SmallRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a.edges(), b.edges());
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(LayerGenerator::new("X", 1.5, &AttributeSpec::literal(1.0)).is_err());
        assert!(LayerGenerator::new("X", 0.5, &AttributeSpec::literal("strong")).is_err());
    }
}
