//! Spatial Grid
//!
//! Bounded two-dimensional grid with a fixed number of agent slots per cell.
//! Storage is a dense `x * y * slot` array of optional agent ids.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::agent::{Agent, AgentId, Position};
use crate::error::{AbmError, Result};

/// Moore neighbourhood, left to right then top to bottom, centre excluded
pub const NEIGHBOUR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Random probes before `place_randomly` falls back to a full scan
const RANDOM_PLACEMENT_ATTEMPTS: usize = 32;

/// Largest `width * height * max_agents_per_grid` a grid may allocate
pub const MAX_GRID_SLOTS: usize = 1 << 24;

/// Narrowest side of a wrapping grid. Below this some Moore offsets land on
/// the same cell, or on the centre cell itself.
pub const MIN_WRAP_EXTENT: i64 = 3;

/// Space variants. Only `Discrete` is implemented; `Continuous` would keep the
/// same contract with real coordinates and a distance-based capacity rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceKind {
    #[default]
    Discrete,
    Continuous,
}

/// What lies beyond the grid edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Outside cells count as empty and are never move targets
    #[default]
    Bounded,
    /// The grid is a torus. Both sides must span at least
    /// [`MIN_WRAP_EXTENT`] cells so the eight neighbours stay distinct.
    Wrap,
}

/// Outcome of a placement attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Placed { slot: usize },
    CellFull,
}

impl Placement {
    pub fn is_placed(&self) -> bool {
        matches!(self, Placement::Placed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    x_bounds: (i32, i32),
    y_bounds: (i32, i32),
    max_agents_per_grid: usize,
    boundary: BoundaryPolicy,
    slots: Vec<Option<AgentId>>,
}

/// Number of agent slots a grid with these dimensions needs.
///
/// Fails with `InvalidConfig` for empty bounds, a zero cell capacity, a
/// wrapping grid narrower than [`MIN_WRAP_EXTENT`], or more than
/// [`MAX_GRID_SLOTS`] slots.
pub fn grid_slots(
    x_bounds: (i32, i32),
    y_bounds: (i32, i32),
    max_agents_per_grid: usize,
    boundary: BoundaryPolicy,
) -> Result<usize> {
    let width = i64::from(x_bounds.1) - i64::from(x_bounds.0);
    let height = i64::from(y_bounds.1) - i64::from(y_bounds.0);
    if width <= 0 || height <= 0 {
        return Err(AbmError::InvalidConfig(format!(
            "grid bounds {:?} x {:?} are empty",
            x_bounds, y_bounds
        )));
    }
    if max_agents_per_grid == 0 {
        return Err(AbmError::InvalidConfig(
            "max_agents_per_grid must be at least 1".to_string(),
        ));
    }
    if boundary == BoundaryPolicy::Wrap && (width < MIN_WRAP_EXTENT || height < MIN_WRAP_EXTENT) {
        return Err(AbmError::InvalidConfig(format!(
            "a wrapping grid needs at least {0} x {0} cells, got {1} x {2}",
            MIN_WRAP_EXTENT, width, height
        )));
    }

    usize::try_from(width)
        .ok()
        .zip(usize::try_from(height).ok())
        .and_then(|(w, h)| w.checked_mul(h))
        .and_then(|cells| cells.checked_mul(max_agents_per_grid))
        .filter(|&slots| slots <= MAX_GRID_SLOTS)
        .ok_or_else(|| {
            AbmError::InvalidConfig(format!(
                "grid {} x {} with {} agents per cell exceeds {} slots",
                width, height, max_agents_per_grid, MAX_GRID_SLOTS
            ))
        })
}

impl SpatialGrid {
    /// Bounds are half-open `[lower, upper)`.
    pub fn new(
        x_bounds: (i32, i32),
        y_bounds: (i32, i32),
        max_agents_per_grid: usize,
        boundary: BoundaryPolicy,
    ) -> Result<Self> {
        let slots = grid_slots(x_bounds, y_bounds, max_agents_per_grid, boundary)?;
        Ok(Self {
            x_bounds,
            y_bounds,
            max_agents_per_grid,
            boundary,
            slots: vec![None; slots],
        })
    }

    pub fn x_bounds(&self) -> (i32, i32) {
        self.x_bounds
    }

    pub fn y_bounds(&self) -> (i32, i32) {
        self.y_bounds
    }

    pub fn max_agents_per_grid(&self) -> usize {
        self.max_agents_per_grid
    }

    pub fn boundary(&self) -> BoundaryPolicy {
        self.boundary
    }

    fn width(&self) -> usize {
        (self.x_bounds.1 - self.x_bounds.0) as usize
    }

    fn height(&self) -> usize {
        (self.y_bounds.1 - self.y_bounds.0) as usize
    }

    /// Total agent capacity of the grid
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.x_bounds.0..self.x_bounds.1).contains(&x)
            && (self.y_bounds.0..self.y_bounds.1).contains(&y)
    }

    /// First slot offset of an in-bounds cell
    fn cell_base(&self, x: i32, y: i32) -> usize {
        let col = (x - self.x_bounds.0) as usize;
        let row = (y - self.y_bounds.0) as usize;
        (row * self.width() + col) * self.max_agents_per_grid
    }

    fn cell(&self, x: i32, y: i32) -> &[Option<AgentId>] {
        let base = self.cell_base(x, y);
        &self.slots[base..base + self.max_agents_per_grid]
    }

    /// The cell at `offset` from `from`, mapped through the boundary policy.
    fn resolve(&self, from: Position, (dx, dy): (i32, i32)) -> Option<(i32, i32)> {
        match self.boundary {
            BoundaryPolicy::Bounded => {
                let x = from.x.checked_add(dx)?;
                let y = from.y.checked_add(dy)?;
                self.contains(x, y).then_some((x, y))
            }
            BoundaryPolicy::Wrap => {
                let wrap = |v: i32, d: i32, (lower, _): (i32, i32), extent: usize| {
                    let shifted = (i64::from(v) + i64::from(d) - i64::from(lower))
                        .rem_euclid(extent as i64);
                    i32::try_from(shifted + i64::from(lower)).ok()
                };
                Some((
                    wrap(from.x, dx, self.x_bounds, self.width())?,
                    wrap(from.y, dy, self.y_bounds, self.height())?,
                ))
            }
        }
    }

    /// Agents in a cell; out-of-bounds cells are empty.
    pub fn occupancy(&self, x: i32, y: i32) -> usize {
        if !self.contains(x, y) {
            return 0;
        }
        self.cell(x, y).iter().filter(|s| s.is_some()).count()
    }

    pub fn agents_at(&self, x: i32, y: i32) -> Vec<AgentId> {
        if !self.contains(x, y) {
            return Vec::new();
        }
        self.cell(x, y).iter().flatten().copied().collect()
    }

    pub fn total_occupancy(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Occupied cells as `(x, y, agents)`, row-major.
    pub fn cells(&self) -> Vec<(i32, i32, Vec<AgentId>)> {
        let mut occupied = Vec::new();
        for y in self.y_bounds.0..self.y_bounds.1 {
            for x in self.x_bounds.0..self.x_bounds.1 {
                let agents = self.agents_at(x, y);
                if !agents.is_empty() {
                    occupied.push((x, y, agents));
                }
            }
        }
        occupied
    }

    /// Places the agent in the first free slot of `(x, y)`. A full cell is not
    /// an error: the agent is left untouched and `CellFull` is returned.
    pub fn add_agent(&mut self, x: i32, y: i32, agent: &mut Agent) -> Result<Placement> {
        let id = agent
            .id()
            .ok_or_else(|| AbmError::Invariant("unregistered agent offered to the grid".into()))?;
        if !self.contains(x, y) {
            return Err(AbmError::OutOfBounds { x, y });
        }
        if let Some(current) = agent.position() {
            return Err(AbmError::Invariant(format!(
                "agent {} is already placed at ({}, {})",
                id, current.x, current.y
            )));
        }

        let base = self.cell_base(x, y);
        let Some(slot) = self.cell(x, y).iter().position(Option::is_none) else {
            tracing::debug!(agent = %id, x, y, "cell full, agent not placed");
            return Ok(Placement::CellFull);
        };
        self.slots[base + slot] = Some(id);
        agent.set_position(Some(Position::new(x, y)));
        Ok(Placement::Placed { slot })
    }

    /// Clears the agent's slot and marks it unplaced. No-op for unplaced agents.
    pub fn remove_agent(&mut self, agent: &mut Agent) -> bool {
        let (Some(id), Some(position)) = (agent.id(), agent.position()) else {
            return false;
        };
        agent.set_position(None);
        if !self.contains(position.x, position.y) {
            return false;
        }
        let base = self.cell_base(position.x, position.y);
        match self.slots[base..base + self.max_agents_per_grid]
            .iter()
            .position(|s| *s == Some(id))
        {
            Some(slot) => {
                self.slots[base + slot] = None;
                true
            }
            None => false,
        }
    }

    fn placed(&self, agent: &Agent) -> Result<(AgentId, Position)> {
        let id = agent
            .id()
            .ok_or_else(|| AbmError::Invariant("unregistered agent queried on the grid".into()))?;
        let position = agent.position().ok_or(AbmError::AgentNotFound(id))?;
        Ok((id, position))
    }

    /// Occupancy of the 8 surrounding cells in [`NEIGHBOUR_OFFSETS`] order.
    pub fn count_neighbours(&self, agent: &Agent) -> Result<[usize; 8]> {
        let (_, position) = self.placed(agent)?;
        let mut counts = [0; 8];
        for (count, (dx, dy)) in counts.iter_mut().zip(NEIGHBOUR_OFFSETS) {
            if let Some((x, y)) = self.resolve(position, (dx, dy)) {
                *count = self.occupancy(x, y);
            }
        }
        Ok(counts)
    }

    /// Agents sharing the cell or in the Moore neighbourhood, excluding the agent.
    pub fn neighbours_of(&self, agent: &Agent) -> Result<Vec<AgentId>> {
        let (id, position) = self.placed(agent)?;
        let mut cells = vec![(position.x, position.y)];
        for (dx, dy) in NEIGHBOUR_OFFSETS {
            if let Some(cell) = self.resolve(position, (dx, dy)) {
                if !cells.contains(&cell) {
                    cells.push(cell);
                }
            }
        }
        Ok(cells
            .into_iter()
            .flat_map(|(x, y)| self.agents_at(x, y))
            .filter(|&other| other != id)
            .collect())
    }

    /// Picks uniformly among neighbouring cells with room. Falls back to the
    /// current position when none has. Does not mutate.
    pub fn propose_move(&self, agent: &Agent, rng: &mut SmallRng) -> Result<Position> {
        let (_, position) = self.placed(agent)?;
        let open: Vec<(i32, i32)> = NEIGHBOUR_OFFSETS
            .iter()
            .filter_map(|&offset| self.resolve(position, offset))
            .filter(|&(x, y)| self.occupancy(x, y) < self.max_agents_per_grid)
            .collect();
        Ok(open
            .choose(rng)
            .map(|&(x, y)| Position::new(x, y))
            .unwrap_or(position))
    }

    /// Moves the agent to a proposed neighbouring cell. The destination slot is
    /// found before the source slot is cleared, and both writes happen together.
    pub fn move_agent(&mut self, agent: &mut Agent, rng: &mut SmallRng) -> Result<Position> {
        let (id, from) = self.placed(agent)?;
        let to = self.propose_move(agent, rng)?;
        if to == from {
            return Ok(from);
        }

        let source_base = self.cell_base(from.x, from.y);
        let source_slot = self.slots[source_base..source_base + self.max_agents_per_grid]
            .iter()
            .position(|s| *s == Some(id))
            .ok_or_else(|| {
                AbmError::Invariant(format!(
                    "agent {} claims ({}, {}) but is not stored there",
                    id, from.x, from.y
                ))
            })?;
        let target_base = self.cell_base(to.x, to.y);
        let Some(target_slot) = self.cell(to.x, to.y).iter().position(Option::is_none) else {
            return Err(AbmError::CellFull { x: to.x, y: to.y });
        };

        self.slots[source_base + source_slot] = None;
        self.slots[target_base + target_slot] = Some(id);
        agent.set_position(Some(to));
        Ok(to)
    }

    /// Places the agent in a random cell with room, scanning the grid if
    /// random probes keep hitting full cells.
    pub fn place_randomly(&mut self, agent: &mut Agent, rng: &mut SmallRng) -> Result<Placement> {
        for _ in 0..RANDOM_PLACEMENT_ATTEMPTS {
            let x = rng.gen_range(self.x_bounds.0..self.x_bounds.1);
            let y = rng.gen_range(self.y_bounds.0..self.y_bounds.1);
            if self.occupancy(x, y) < self.max_agents_per_grid {
                return self.add_agent(x, y, agent);
            }
        }
        for y in self.y_bounds.0..self.y_bounds.1 {
            for x in self.x_bounds.0..self.x_bounds.1 {
                if self.occupancy(x, y) < self.max_agents_per_grid {
                    return self.add_agent(x, y, agent);
                }
            }
        }
        Ok(Placement::CellFull)
    }

    /// Number of slots holding this id across the whole grid
    pub fn slots_holding(&self, id: AgentId) -> usize {
        self.slots.iter().filter(|s| **s == Some(id)).count()
    }

    /// A placed agent must be in bounds and stored exactly once, at its position.
    pub fn check_agent(&self, agent: &Agent) -> Result<()> {
        let (Some(id), Some(position)) = (agent.id(), agent.position()) else {
            return Ok(());
        };
        if !self.contains(position.x, position.y) {
            return Err(AbmError::OutOfBounds {
                x: position.x,
                y: position.y,
            });
        }
        let held = self.slots_holding(id);
        if held != 1 || !self.agents_at(position.x, position.y).contains(&id) {
            return Err(AbmError::Invariant(format!(
                "agent {} is stored in {} slots, expected exactly one at ({}, {})",
                id, held, position.x, position.y
            )));
        }
        Ok(())
    }
}
