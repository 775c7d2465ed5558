//! Model Builder
//!
//! Assembles a ready-to-run [`SimulationClock`] from a [`Config`]: generates or
//! accepts the population, places it on the grid, loads or generates every
//! layer and wires the configured observers.

use std::path::{Path, PathBuf};

use rand::rngs::SmallRng;
use rand::SeedableRng;

use super::clock::SimulationClock;
use crate::components::agent::Agent;
use crate::components::registry::AgentRegistry;
use crate::config::{Config, LayerConfig};
use crate::error::{AbmError, Result};
use crate::graph::{LayerGenerator, LayerSet, RelationshipLayer};
use crate::output::{ProgressLogger, SnapshotRecorder};
use crate::setup::agents::{AgentGenerator, AttributeSpec};
use crate::space::{Placement, SpatialGrid};
use crate::systems::mutation::Homophily;

/// Where a layer comes from
#[derive(Debug, Clone)]
pub enum LayerSource {
    /// Loaded from a file or generated, as configured
    Config(LayerConfig),
    /// Built by the caller; `weighting` fills in agents that lack one
    Layer {
        layer: RelationshipLayer,
        weighting: AttributeSpec,
    },
}

impl LayerSource {
    fn name(&self) -> &str {
        match self {
            LayerSource::Config(config) => &config.name,
            LayerSource::Layer { layer, .. } => layer.name(),
        }
    }

    fn weighting(&self) -> &AttributeSpec {
        match self {
            LayerSource::Config(config) => &config.weighting,
            LayerSource::Layer { weighting, .. } => weighting,
        }
    }
}

#[derive(Debug)]
pub struct ModelBuilder {
    config: Config,
    agents: Option<Vec<Agent>>,
    extra_layers: Vec<LayerSource>,
    base_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    verbose: bool,
}

impl ModelBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            agents: None,
            extra_layers: Vec::new(),
            base_dir: None,
            output_dir: None,
            verbose: false,
        }
    }

    /// Uses these agents instead of generating `agents.count` of them.
    pub fn with_agents(mut self, agents: Vec<Agent>) -> Self {
        self.agents = Some(agents);
        self
    }

    /// Adds a prebuilt layer after the configured ones.
    pub fn with_layer(mut self, layer: RelationshipLayer, weighting: AttributeSpec) -> Self {
        self.extra_layers.push(LayerSource::Layer { layer, weighting });
        self
    }

    /// Relative layer paths are resolved against this directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Directory for periodic snapshots.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn build(self) -> Result<SimulationClock> {
        self.config.validate()?;
        let sources: Vec<LayerSource> = self
            .config
            .layers
            .iter()
            .cloned()
            .map(LayerSource::Config)
            .chain(self.extra_layers)
            .collect();

        let sim = &self.config.simulation;
        let mut rng = SmallRng::seed_from_u64(sim.seed);

        let mut registry = AgentRegistry::new();
        match self.agents {
            Some(agents) => {
                for agent in agents {
                    registry.insert(agent);
                }
                fill_missing_weightings(&mut registry, &sources, &mut rng);
            }
            None => {
                let mut generator = AgentGenerator::new(&self.config.agents.attributes)?;
                for source in &sources {
                    generator = generator.with_default_weighting(source.name(), source.weighting());
                }
                for agent in generator.generate(self.config.agents.count, &mut rng) {
                    registry.insert(agent);
                }
            }
        }

        let space = &self.config.space;
        let mut grid = SpatialGrid::new(
            space.x_bounds,
            space.y_bounds,
            space.max_agents_per_grid,
            space.boundary,
        )?;
        let mut unplaced = 0usize;
        for id in registry.ids() {
            let agent = registry.get_mut(id).ok_or(AbmError::AgentNotFound(id))?;
            if grid.place_randomly(agent, &mut rng)? == Placement::CellFull {
                unplaced += 1;
            }
        }
        if unplaced > 0 {
            tracing::warn!(unplaced, "grid is full, some agents were not placed");
        }

        let mut layers = LayerSet::new();
        let ids = registry.ids();
        for source in sources {
            let layer = match source {
                LayerSource::Config(config) => match (&config.path, config.density) {
                    (Some(path), _) => {
                        load_layer(&config.name, &resolve(self.base_dir.as_deref(), path))?
                    }
                    (None, density) => {
                        let weight = config
                            .weight
                            .clone()
                            .unwrap_or_else(|| AttributeSpec::literal(1.0));
                        LayerGenerator::new(&config.name, density.unwrap_or_default(), &weight)?
                            .generate(&ids, &mut rng)?
                    }
                },
                LayerSource::Layer { layer, .. } => layer,
            };
            if let Some(stranger) = layer.members().into_iter().find(|m| !registry.contains(*m)) {
                return Err(AbmError::InvalidConfig(format!(
                    "layer '{}' references agent {} which is not in the population",
                    layer.name(),
                    stranger
                )));
            }
            tracing::debug!(
                layer = layer.name(),
                nodes = layer.node_count(),
                edges = layer.edge_count(),
                "layer ready"
            );
            layers.add(layer)?;
        }

        tracing::info!(
            agents = registry.len(),
            layers = layers.len(),
            occupied = grid.total_occupancy(),
            seed = sim.seed,
            "model built"
        );

        let mut clock = SimulationClock::new(registry, layers, sim.max_iterations)
            .with_grid(grid)
            .with_seed(sim.seed)
            .with_proximity_weight(sim.proximity_weight)
            .with_radicalisation_threshold(sim.radicalisation_threshold)
            .with_significance_threshold(sim.significance_threshold);
        if sim.homophily_rate > 0.0 {
            clock = clock.with_mutation(Homophily::new(sim.homophily_rate));
        }
        if sim.print_interval > 0 {
            let logger = ProgressLogger::new(sim.print_interval).verbose(self.verbose);
            clock = clock.with_observer(logger);
        }
        if sim.snapshot_interval > 0 {
            match &self.output_dir {
                Some(dir) => {
                    let recorder = SnapshotRecorder::new(dir.join("snapshots"), sim.snapshot_interval);
                    clock = clock.with_observer(recorder);
                }
                None => tracing::warn!("snapshot_interval is set but there is no output directory"),
            }
        }
        Ok(clock)
    }
}

fn resolve(base: Option<&Path>, path: &Path) -> PathBuf {
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

fn load_layer(name: &str, path: &Path) -> Result<RelationshipLayer> {
    let layer = RelationshipLayer::load(path)?;
    if layer.name() != name {
        return Err(AbmError::InvalidConfig(format!(
            "{} holds layer '{}', expected '{}'",
            path.display(),
            layer.name(),
            name
        )));
    }
    Ok(layer)
}

fn fill_missing_weightings(
    registry: &mut AgentRegistry,
    sources: &[LayerSource],
    rng: &mut SmallRng,
) {
    for source in sources {
        let sampler = source.weighting().resolve(source.name());
        for id in registry.ids() {
            if let Some(agent) = registry.get_mut(id) {
                if agent.weighting(source.name()).is_none() {
                    agent.set_weighting(source.name(), sampler.sample_real(rng).unwrap_or_default());
                }
            }
        }
    }
}
