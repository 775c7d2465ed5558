//! Snapshot Generation
//!
//! Builds `WorldSnapshot`s from a model view and writes them at regular intervals.

use std::fs;
use std::path::{Path, PathBuf};

use abmos_events::{
    generate_snapshot_id, AgentSnapshot, CellSnapshot, EdgeSnapshot, GridSnapshot,
    LayerSnapshot, WorldSnapshot,
};

use super::observer::IterationObserver;
use crate::error::Result;
use crate::graph::RelationshipLayer;
use crate::sim::view::ModelView;
use crate::space::SpatialGrid;

/// Generate a complete snapshot of the model
pub fn generate_snapshot(view: &ModelView<'_>, snapshot_id: &str, triggered_by: &str) -> WorldSnapshot {
    let mut snapshot =
        WorldSnapshot::new(snapshot_id, view.iteration, view.max_iterations, triggered_by);

    snapshot.agents = view
        .agents
        .iter()
        .map(|(id, agent)| AgentSnapshot {
            agent_id: id.0,
            opinion: agent.opinion,
            personality: agent.personality.to_string(),
            position: agent.position().map(|p| (p.x, p.y)),
            radicalised: agent.radicalised,
            social_weightings: agent.social_weightings.clone(),
        })
        .collect();
    snapshot.layers = view.layers.iter().map(layer_snapshot).collect();
    snapshot.grid = view.grid.map(grid_snapshot);
    snapshot.metrics = view.opinion_metrics();
    snapshot
}

fn layer_snapshot(layer: &RelationshipLayer) -> LayerSnapshot {
    let mut members: Vec<u64> = layer.members().into_iter().map(|a| a.0).collect();
    members.sort_unstable();
    let mut edges: Vec<EdgeSnapshot> = layer
        .edges()
        .into_iter()
        .map(|(from, to, weight)| EdgeSnapshot {
            from: from.0,
            to: to.0,
            weight,
        })
        .collect();
    edges.sort_by_key(|e| (e.from, e.to));

    LayerSnapshot {
        name: layer.name().to_string(),
        node_count: layer.node_count(),
        edge_count: layer.edge_count(),
        members,
        edges,
    }
}

fn grid_snapshot(grid: &SpatialGrid) -> GridSnapshot {
    GridSnapshot {
        x_bounds: grid.x_bounds(),
        y_bounds: grid.y_bounds(),
        max_agents_per_grid: grid.max_agents_per_grid(),
        occupied: grid
            .cells()
            .into_iter()
            .map(|(x, y, agents)| CellSnapshot {
                x,
                y,
                agents: agents.into_iter().map(|a| a.0).collect(),
            })
            .collect(),
    }
}

/// Writes a snapshot as `<dir>/<snapshot_id>.json`.
pub fn write_snapshot_to_dir(snapshot: &WorldSnapshot, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", snapshot.snapshot_id));
    fs::write(&path, snapshot.to_json()?)?;
    Ok(path)
}

/// Writes a snapshot every `snapshot_interval` iterations, plus one at the end.
#[derive(Debug, Clone)]
pub struct SnapshotRecorder {
    dir: PathBuf,
    snapshot_interval: u64,
    next_snapshot_id: u64,
    last_snapshot_iteration: Option<u64>,
}

impl SnapshotRecorder {
    pub fn new(dir: impl Into<PathBuf>, snapshot_interval: u64) -> Self {
        Self {
            dir: dir.into(),
            snapshot_interval,
            next_snapshot_id: 1,
            last_snapshot_iteration: None,
        }
    }

    pub fn should_snapshot(&self, completed: u64) -> bool {
        self.snapshot_interval > 0 && completed % self.snapshot_interval == 0
    }

    pub fn next_id(&mut self) -> String {
        let id = generate_snapshot_id(self.next_snapshot_id);
        self.next_snapshot_id += 1;
        id
    }

    pub fn snapshot_count(&self) -> u64 {
        self.next_snapshot_id - 1
    }

    fn write(&mut self, view: &ModelView<'_>, triggered_by: &str) -> Result<()> {
        let id = self.next_id();
        let snapshot = generate_snapshot(view, &id, triggered_by);
        let path = write_snapshot_to_dir(&snapshot, &self.dir)?;
        tracing::debug!(path = %path.display(), iteration = view.iteration, "wrote snapshot");
        self.last_snapshot_iteration = Some(view.iteration);
        Ok(())
    }
}

impl IterationObserver for SnapshotRecorder {
    fn on_iteration(&mut self, iteration: u64, view: &ModelView<'_>) -> Result<()> {
        if self.should_snapshot(iteration + 1) {
            self.write(view, "periodic")?;
        }
        Ok(())
    }

    fn on_finish(&mut self, view: &ModelView<'_>) -> Result<()> {
        if self.last_snapshot_iteration != Some(view.iteration) {
            self.write(view, "simulation_end")?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "snapshots"
    }
}
