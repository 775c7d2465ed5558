//! Snapshot Types
//!
//! Serialization structs for model snapshots.
//!
//! Snapshots capture the complete observable state of a model at one iteration:
//! agents, relationship layers and grid occupancy. They are the read-only
//! boundary handed to visualisers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Generates a snapshot ID with the given sequence number.
pub fn generate_snapshot_id(sequence: u64) -> String {
    format!("snap_{:06}", sequence)
}

/// Agent state at snapshot time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: u64,
    pub opinion: f64,
    pub personality: String,
    #[serde(default)]
    pub position: Option<(i32, i32)>,
    #[serde(default)]
    pub radicalised: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub social_weightings: BTreeMap<String, f64>,
}

/// One directed edge of a layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub from: u64,
    pub to: u64,
    pub weight: f64,
}

/// Relationship layer structure, keyed by agent ids rather than node indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub name: String,
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(default)]
    pub members: Vec<u64>,
    #[serde(default)]
    pub edges: Vec<EdgeSnapshot>,
}

/// A single occupied grid cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub x: i32,
    pub y: i32,
    pub agents: Vec<u64>,
}

/// Grid bounds and occupied cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub x_bounds: (i32, i32),
    pub y_bounds: (i32, i32),
    pub max_agents_per_grid: usize,
    #[serde(default)]
    pub occupied: Vec<CellSnapshot>,
}

impl GridSnapshot {
    /// Total number of placed agents
    pub fn total_occupancy(&self) -> usize {
        self.occupied.iter().map(|c| c.agents.len()).sum()
    }
}

/// Aggregate opinion statistics over the population
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpinionMetrics {
    pub population: usize,
    pub mean_opinion: f64,
    pub opinion_variance: f64,
    pub min_opinion: f64,
    pub max_opinion: f64,
    pub radicalised_count: usize,
    /// Counts over ten equal bins spanning [-1, 1]; values outside are clamped into the end bins
    #[serde(default)]
    pub histogram: Vec<usize>,
}

impl OpinionMetrics {
    pub const HISTOGRAM_BINS: usize = 10;

    /// Computes metrics from `(opinion, radicalised)` pairs.
    pub fn from_opinions(values: impl IntoIterator<Item = (f64, bool)>) -> Self {
        let mut metrics = OpinionMetrics {
            histogram: vec![0; Self::HISTOGRAM_BINS],
            min_opinion: f64::INFINITY,
            max_opinion: f64::NEG_INFINITY,
            ..Default::default()
        };
        let mut sum = 0.0;
        let mut sum_sq = 0.0;

        for (opinion, radicalised) in values {
            metrics.population += 1;
            sum += opinion;
            sum_sq += opinion * opinion;
            metrics.min_opinion = metrics.min_opinion.min(opinion);
            metrics.max_opinion = metrics.max_opinion.max(opinion);
            if radicalised {
                metrics.radicalised_count += 1;
            }
            let bin = (((opinion + 1.0) / 2.0) * Self::HISTOGRAM_BINS as f64).floor();
            let bin = (bin.max(0.0) as usize).min(Self::HISTOGRAM_BINS - 1);
            metrics.histogram[bin] += 1;
        }

        if metrics.population == 0 {
            metrics.min_opinion = 0.0;
            metrics.max_opinion = 0.0;
            return metrics;
        }

        let n = metrics.population as f64;
        metrics.mean_opinion = sum / n;
        metrics.opinion_variance = (sum_sq / n - metrics.mean_opinion.powi(2)).max(0.0);
        metrics
    }
}

/// Complete model snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub snapshot_id: String,
    pub iteration: u64,
    pub max_iterations: u64,
    pub triggered_by: String,
    pub agents: Vec<AgentSnapshot>,
    pub layers: Vec<LayerSnapshot>,
    pub grid: Option<GridSnapshot>,
    pub metrics: OpinionMetrics,
}

impl WorldSnapshot {
    pub fn new(
        snapshot_id: impl Into<String>,
        iteration: u64,
        max_iterations: u64,
        triggered_by: impl Into<String>,
    ) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            iteration,
            max_iterations,
            triggered_by: triggered_by.into(),
            agents: Vec::new(),
            layers: Vec::new(),
            grid: None,
            metrics: OpinionMetrics::default(),
        }
    }

    pub fn agent(&self, agent_id: u64) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }

    pub fn layer(&self, name: &str) -> Option<&LayerSnapshot> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
