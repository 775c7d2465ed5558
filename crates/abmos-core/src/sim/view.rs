//! Read-only model view handed to observers and visualisers.

use abmos_events::OpinionMetrics;

use crate::components::agent::{Agent, AgentId};
use crate::components::registry::AgentRegistry;
use crate::graph::LayerSet;
use crate::space::SpatialGrid;

#[derive(Debug, Clone, Copy)]
pub struct ModelView<'a> {
    pub iteration: u64,
    pub max_iterations: u64,
    pub agents: &'a AgentRegistry,
    pub layers: &'a LayerSet,
    pub grid: Option<&'a SpatialGrid>,
    pub significance_threshold: f64,
}

impl<'a> ModelView<'a> {
    pub fn agent(&self, id: AgentId) -> Option<&'a Agent> {
        self.agents.get(id)
    }

    pub fn opinion_metrics(&self) -> OpinionMetrics {
        OpinionMetrics::from_opinions(self.agents.iter().map(|(_, a)| (a.opinion, a.radicalised)))
    }

    /// How many agents hold each layer above the significance threshold.
    /// Agents missing a weighting are left out.
    pub fn significant_layer_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> =
            self.layers.list_names().into_iter().map(|n| (n, 0)).collect();
        for (_, agent) in self.agents.iter() {
            let Ok(significant) = self
                .layers
                .agent_significant_layers(agent, self.significance_threshold)
            else {
                continue;
            };
            for name in significant {
                if let Some(entry) = counts.iter_mut().find(|(n, _)| *n == name) {
                    entry.1 += 1;
                }
            }
        }
        counts
    }
}
