//! Configuration loading for a model run.
//!
//! Every setting can come from a TOML file; missing sections fall back to
//! defaults, so an empty file describes a valid 100-agent run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::components::agent::{AttributeValue, Personality};
use crate::error::{AbmError, Result};
use crate::graph::DEFAULT_SIGNIFICANCE_THRESHOLD;
use crate::setup::agents::{AttributeSpec, PERSONALITY_KEY};
use crate::space::{grid_slots, BoundaryPolicy, SpaceKind};

/// Complete model configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Iteration loop settings
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Spatial grid settings
    #[serde(default)]
    pub space: SpaceConfig,
    /// Population settings
    #[serde(default)]
    pub agents: AgentConfig,
    /// Relationship layers, in evaluation order
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Returns the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects settings that would only fail later, mid-run.
    pub fn validate(&self) -> Result<()> {
        let space = &self.space;
        if space.kind != SpaceKind::Discrete {
            return Err(AbmError::UnsupportedSpace(format!("{:?}", space.kind).to_lowercase()));
        }
        let capacity = space.capacity()?;
        if self.agents.count > capacity {
            return Err(AbmError::InvalidConfig(format!(
                "{} agents do not fit a grid holding {}",
                self.agents.count, capacity
            )));
        }

        if let Some(spec) = self.agents.attributes.get(PERSONALITY_KEY) {
            match spec {
                AttributeSpec::Literal(AttributeValue::Text(tag)) => {
                    tag.parse::<Personality>()?;
                }
                _ => {
                    return Err(AbmError::InvalidConfig(
                        "personality must be a literal name".to_string(),
                    ))
                }
            }
        }

        let mut names = BTreeSet::new();
        for layer in &self.layers {
            if !names.insert(layer.name.as_str()) {
                return Err(AbmError::DuplicateLayer(layer.name.clone()));
            }
            layer.validate()?;
        }

        let sim = &self.simulation;
        if !(0.0..=1.0).contains(&sim.homophily_rate) {
            return Err(AbmError::InvalidConfig(format!(
                "homophily_rate {} is outside [0, 1]",
                sim.homophily_rate
            )));
        }
        if sim.proximity_weight < 0.0 {
            return Err(AbmError::InvalidConfig(
                "proximity_weight must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Iteration loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub max_iterations: u64,
    /// Seed for generation, placement and movement
    pub seed: u64,
    /// Iterations between progress lines
    pub print_interval: u64,
    /// Iterations between world snapshots; 0 disables them
    pub snapshot_interval: u64,
    /// Cut-off used when reporting significant layers
    pub significance_threshold: f64,
    /// Absolute opinion at which an agent counts as radicalised
    pub radicalisation_threshold: f64,
    /// Edge weight of the spatial pseudo-layer; 0 disables it
    pub proximity_weight: f64,
    /// Relationship mutation rate; 0 disables mutation
    pub homophily_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            seed: 42,
            print_interval: 10,
            snapshot_interval: 0,
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
            radicalisation_threshold: 0.8,
            proximity_weight: 0.0,
            homophily_rate: 0.0,
        }
    }
}

/// Spatial grid settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    pub kind: SpaceKind,
    /// Half-open `[lower, upper)` column range
    pub x_bounds: (i32, i32),
    /// Half-open `[lower, upper)` row range
    pub y_bounds: (i32, i32),
    pub max_agents_per_grid: usize,
    pub boundary: BoundaryPolicy,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            kind: SpaceKind::Discrete,
            x_bounds: (0, 100),
            y_bounds: (0, 100),
            max_agents_per_grid: 1,
            boundary: BoundaryPolicy::Bounded,
        }
    }
}

impl SpaceConfig {
    /// Agent capacity of the configured grid. Fails for grids that could not
    /// be built.
    pub fn capacity(&self) -> Result<usize> {
        grid_slots(
            self.x_bounds,
            self.y_bounds,
            self.max_agents_per_grid,
            self.boundary,
        )
    }
}

/// Population settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub count: usize,
    /// Attribute name to literal or sampled value
    pub attributes: BTreeMap<String, AttributeSpec>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            count: 100,
            attributes: BTreeMap::from([(
                "opinion".to_string(),
                AttributeSpec::uniform(0.0, 1.0),
            )]),
        }
    }
}

/// One relationship layer: loaded from `path`, or generated from `density`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    /// Edge weight spec for generated layers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<AttributeSpec>,
    /// Every agent's personal weighting of this layer
    #[serde(default = "default_weighting")]
    pub weighting: AttributeSpec,
}

fn default_weighting() -> AttributeSpec {
    AttributeSpec::literal(1.0)
}

impl LayerConfig {
    /// A layer generated with the given density and a constant edge weight.
    pub fn generated(name: impl Into<String>, density: f64, weight: f64) -> Self {
        Self {
            name: name.into(),
            path: None,
            density: Some(density),
            weight: Some(AttributeSpec::literal(weight)),
            weighting: default_weighting(),
        }
    }

    /// A layer read from a persisted document.
    pub fn from_path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
            density: None,
            weight: None,
            weighting: default_weighting(),
        }
    }

    pub fn with_weighting(mut self, weighting: AttributeSpec) -> Self {
        self.weighting = weighting;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AbmError::InvalidConfig("layer name must not be empty".to_string()));
        }
        match (&self.path, self.density) {
            (Some(_), Some(_)) => Err(AbmError::InvalidConfig(format!(
                "layer '{}' sets both path and density",
                self.name
            ))),
            (None, None) => Err(AbmError::InvalidConfig(format!(
                "layer '{}' needs a path or a density",
                self.name
            ))),
            (None, Some(density)) if !(0.0..=1.0).contains(&density) => {
                Err(AbmError::InvalidConfig(format!(
                    "layer '{}' density {} is outside [0, 1]",
                    self.name, density
                )))
            }
            _ => Ok(()),
        }
    }
}
