//! Simulation Clock
//!
//! Drives the model one discrete step at a time. Each `advance()` runs the
//! opinion, structural and bookkeeping phases in order, notifies observers and
//! bumps the iteration counter.
//!
//! Recoverable errors skip the offending agent or layer and are counted in
//! [`Diagnostics`]. Fatal errors abort the step as [`AbmError::Aborted`]; there
//! is no rollback of work already done within that step.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use uuid::Uuid;

use abmos_events::RunSummary;

use super::diagnostics::Diagnostics;
use super::view::ModelView;
use crate::components::agent::{Agent, AgentId, Position};
use crate::components::registry::{AgentRegistry, OpinionBuffer};
use crate::error::{AbmError, Result};
use crate::graph::{LayerSet, DEFAULT_SIGNIFICANCE_THRESHOLD};
use crate::output::observer::{IterationObserver, ObserverChain};
use crate::space::{Placement, SpatialGrid};
use crate::systems::influence::{
    influence_constants, InfluenceRule, InfluenceSubject, NeighbourOpinion, PersonalityRule,
};
use crate::systems::mutation::{NoMutation, RelationshipPolicy};

/// Default absolute opinion at which an agent is flagged radicalised
pub const DEFAULT_RADICALISATION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Idle,
    Running,
    Finished,
}

pub struct SimulationClock {
    run_id: Uuid,
    current_iteration: u64,
    max_iterations: u64,
    seed: u64,
    agents: AgentRegistry,
    layers: LayerSet,
    grid: Option<SpatialGrid>,
    rule: Box<dyn InfluenceRule>,
    mutation: Box<dyn RelationshipPolicy>,
    observers: ObserverChain,
    rng: SmallRng,
    proximity_weight: f64,
    radicalisation_threshold: f64,
    significance_threshold: f64,
    diagnostics: Diagnostics,
    finished_warned: bool,
}

impl SimulationClock {
    pub fn new(agents: AgentRegistry, layers: LayerSet, max_iterations: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            current_iteration: 0,
            max_iterations,
            seed: 0,
            agents,
            layers,
            grid: None,
            rule: Box::new(PersonalityRule::default()),
            mutation: Box::new(NoMutation),
            observers: ObserverChain::new(),
            rng: SmallRng::seed_from_u64(0),
            proximity_weight: 0.0,
            radicalisation_threshold: DEFAULT_RADICALISATION_THRESHOLD,
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
            diagnostics: Diagnostics::new(),
            finished_warned: false,
        }
    }

    pub fn with_grid(mut self, grid: SpatialGrid) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Seeds the movement RNG.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn with_rule(mut self, rule: impl InfluenceRule + 'static) -> Self {
        self.rule = Box::new(rule);
        self
    }

    pub fn with_mutation(mut self, policy: impl RelationshipPolicy + 'static) -> Self {
        self.mutation = Box::new(policy);
        self
    }

    pub fn with_observer(mut self, observer: impl IterationObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Grid neighbours act as an extra layer with this edge weight. 0 disables it.
    pub fn with_proximity_weight(mut self, weight: f64) -> Self {
        self.proximity_weight = weight;
        self
    }

    pub fn with_radicalisation_threshold(mut self, threshold: f64) -> Self {
        self.radicalisation_threshold = threshold;
        self
    }

    pub fn with_significance_threshold(mut self, threshold: f64) -> Self {
        self.significance_threshold = threshold;
        self
    }

    pub fn current_iteration(&self) -> u64 {
        self.current_iteration
    }

    pub fn max_iterations(&self) -> u64 {
        self.max_iterations
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> ClockState {
        if self.current_iteration >= self.max_iterations {
            ClockState::Finished
        } else if self.current_iteration == 0 {
            ClockState::Idle
        } else {
            ClockState::Running
        }
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    pub fn grid(&self) -> Option<&SpatialGrid> {
        self.grid.as_ref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn rule_name(&self) -> &str {
        self.rule.name()
    }

    pub fn view(&self) -> ModelView<'_> {
        ModelView {
            iteration: self.current_iteration,
            max_iterations: self.max_iterations,
            agents: &self.agents,
            layers: &self.layers,
            grid: self.grid.as_ref(),
            significance_threshold: self.significance_threshold,
        }
    }

    fn observers_and_view(&mut self, iteration: u64) -> (&mut ObserverChain, ModelView<'_>) {
        let view = ModelView {
            iteration,
            max_iterations: self.max_iterations,
            agents: &self.agents,
            layers: &self.layers,
            grid: self.grid.as_ref(),
            significance_threshold: self.significance_threshold,
        };
        (&mut self.observers, view)
    }

    /// Registers an agent and, given a position, places it on the grid. A full
    /// cell leaves the agent registered but unplaced and is counted as a
    /// capacity diagnostic.
    pub fn add_agent(&mut self, agent: Agent, position: Option<Position>) -> Result<AgentId> {
        let Some(position) = position else {
            return Ok(self.agents.insert(agent));
        };
        let Some(grid) = self.grid.as_mut() else {
            return Err(AbmError::InvalidConfig(
                "cannot place an agent on a model without a grid".to_string(),
            ));
        };
        if !grid.contains(position.x, position.y) {
            return Err(AbmError::OutOfBounds {
                x: position.x,
                y: position.y,
            });
        }

        let id = self.agents.insert(agent);
        let placed = match self.agents.get_mut(id) {
            Some(agent) => grid.add_agent(position.x, position.y, agent)?,
            None => return Err(AbmError::AgentNotFound(id)),
        };
        if placed == Placement::CellFull {
            self.diagnostics
                .record_capacity(self.current_iteration, id, position.x, position.y);
        }
        Ok(id)
    }

    /// Removes an agent from the grid, every layer and the registry.
    pub fn remove_agent(&mut self, id: AgentId) -> Result<Agent> {
        let agent = self.agents.get_mut(id).ok_or(AbmError::AgentNotFound(id))?;
        if let Some(grid) = self.grid.as_mut() {
            grid.remove_agent(agent);
        }
        let layers = self.layers.remove_agent(id);
        tracing::debug!(agent = %id, layers, "removed agent");
        self.agents.remove(id)
    }

    /// Runs one iteration. On a finished clock this is a no-op.
    pub fn advance(&mut self) -> Result<ClockState> {
        if self.state() == ClockState::Finished {
            if !self.finished_warned {
                tracing::warn!(
                    iteration = self.current_iteration,
                    "advance() called on a finished simulation, ignoring"
                );
                self.finished_warned = true;
            }
            return Ok(ClockState::Finished);
        }

        let iteration = self.current_iteration;
        self.step_phases(iteration)
            .map_err(|source| AbmError::Aborted {
                iteration,
                source: Box::new(source),
            })?;

        let (observers, view) = self.observers_and_view(iteration);
        // Chain failures are logged inside the chain
        let _ = observers.on_iteration(iteration, &view);

        self.current_iteration += 1;
        Ok(self.state())
    }

    /// Advances until finished and reports the run.
    pub fn run(&mut self) -> Result<RunSummary> {
        tracing::info!(
            max_iterations = self.max_iterations,
            agents = self.agents.len(),
            layers = self.layers.len(),
            rule = self.rule.name(),
            "starting simulation"
        );
        while self.state() != ClockState::Finished {
            self.advance()?;
        }

        let (observers, view) = self.observers_and_view(self.current_iteration);
        let _ = observers.on_finish(&view);
        self.diagnostics.log_summary();
        let summary = self.summary();
        tracing::info!(
            iterations = summary.iterations_completed,
            mean_opinion = summary.final_metrics.mean_opinion,
            "simulation complete"
        );
        Ok(summary)
    }

    /// Report of the run so far
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::new(self.seed, self.max_iterations);
        summary.run_id = self.run_id;
        summary.iterations_completed = self.current_iteration;
        summary.finished = self.state() == ClockState::Finished;
        summary.final_metrics = self.view().opinion_metrics();
        summary.diagnostics = self.diagnostics.counts().clone();
        summary.iterations_with_diagnostics = self.diagnostics.iterations();
        summary
    }

    fn step_phases(&mut self, iteration: u64) -> Result<()> {
        self.agents.check_integrity()?;
        self.opinion_phase(iteration)?;
        self.structural_phase(iteration)?;
        self.bookkeeping_phase();
        Ok(())
    }

    /// Every agent reads the pre-phase opinion buffer; deltas are applied
    /// only after all of them are computed.
    fn opinion_phase(&mut self, iteration: u64) -> Result<()> {
        let snapshot = self.agents.opinions();
        let mut deltas = Vec::with_capacity(self.agents.len());

        for (id, agent) in self.agents.iter() {
            let mut total_change = 0.0;

            for influence in self.layers.neighbour_influences(agent, &snapshot) {
                let influence = match influence {
                    Ok(influence) => influence,
                    Err(e) => {
                        skip_or_abort(&mut self.diagnostics, iteration, "opinion", id, e)?;
                        continue;
                    }
                };
                let subject = InfluenceSubject {
                    agent: id,
                    opinion: snapshot.get(&id).copied().unwrap_or(agent.opinion),
                    personality: agent.personality,
                    weighting: influence.weighting,
                    layer: &influence.layer,
                };
                match self.rule.contribution(&subject, &influence.neighbours) {
                    Ok(delta) => total_change += delta,
                    Err(e) => skip_or_abort(&mut self.diagnostics, iteration, "opinion", id, e)?,
                }
            }

            if self.proximity_weight > 0.0 {
                match self.proximity_contribution(id, agent, &snapshot) {
                    Ok(delta) => total_change += delta,
                    Err(e) => skip_or_abort(&mut self.diagnostics, iteration, "opinion", id, e)?,
                }
            }
            deltas.push((id, total_change));
        }

        for (id, delta) in deltas {
            if let Some(agent) = self.agents.get_mut(id) {
                agent.previous_opinion = agent.opinion;
            }
            self.agents.apply_opinion_delta(id, delta)?;
        }
        tracing::debug!(iteration, "opinion phase done");
        Ok(())
    }

    fn proximity_contribution(&self, id: AgentId, agent: &Agent, snapshot: &OpinionBuffer) -> Result<f64> {
        let Some(grid) = self.grid.as_ref() else {
            return Ok(0.0);
        };
        if agent.position().is_none() {
            return Ok(0.0);
        }
        let neighbours = grid
            .neighbours_of(agent)?
            .into_iter()
            .map(|other| {
                let opinion = *snapshot.get(&other).ok_or(AbmError::AgentNotFound(other))?;
                Ok(NeighbourOpinion {
                    agent: other,
                    weight: self.proximity_weight,
                    opinion,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let subject = InfluenceSubject {
            agent: id,
            opinion: snapshot.get(&id).copied().unwrap_or(agent.opinion),
            personality: agent.personality,
            weighting: influence_constants::PROXIMITY_WEIGHTING,
            layer: influence_constants::PROXIMITY_LAYER,
        };
        self.rule.contribution(&subject, &neighbours)
    }

    /// Movement, then relationship mutation against post-opinion-phase values.
    fn structural_phase(&mut self, iteration: u64) -> Result<()> {
        let ids = self.agents.ids();

        if let Some(grid) = self.grid.as_mut() {
            let mut moved = 0usize;
            for &id in &ids {
                let agent = self.agents.get_mut(id).ok_or(AbmError::AgentNotFound(id))?;
                let Some(from) = agent.position() else {
                    continue;
                };
                match grid.move_agent(agent, &mut self.rng) {
                    Ok(to) if to != from => moved += 1,
                    Ok(_) => {}
                    Err(e) => skip_or_abort(&mut self.diagnostics, iteration, "step", id, e)?,
                }
                grid.check_agent(agent)?;
            }
            tracing::debug!(iteration, moved, "movement done");
        }

        let opinions = self.agents.opinions();
        for &id in &ids {
            if let Err(e) = self.mutation.mutate(&mut self.layers, id, &opinions) {
                skip_or_abort(&mut self.diagnostics, iteration, "step", id, e)?;
            }
        }
        Ok(())
    }

    fn bookkeeping_phase(&mut self) {
        let threshold = self.radicalisation_threshold;
        let ids = self.agents.ids();
        let mut newly_radicalised = 0usize;
        for id in ids {
            if let Some(agent) = self.agents.get_mut(id) {
                let radicalised = agent.opinion.abs() >= threshold;
                if radicalised && !agent.radicalised {
                    newly_radicalised += 1;
                }
                agent.radicalised = radicalised;
            }
        }
        if newly_radicalised > 0 {
            tracing::debug!(newly_radicalised, "agents crossed the radicalisation threshold");
        }
    }
}

/// Counts a recoverable error, or hands a fatal one back to abort the step.
fn skip_or_abort(
    diagnostics: &mut Diagnostics,
    iteration: u64,
    phase: &'static str,
    agent: AgentId,
    error: AbmError,
) -> Result<()> {
    if error.is_fatal() {
        return Err(error);
    }
    diagnostics.record(iteration, phase, Some(agent), &error);
    Ok(())
}

impl std::fmt::Debug for SimulationClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationClock")
            .field("current_iteration", &self.current_iteration)
            .field("max_iterations", &self.max_iterations)
            .field("agents", &self.agents.len())
            .field("layers", &self.layers.list_names())
            .field("rule", &self.rule.name())
            .field("observers", &self.observers)
            .finish()
    }
}
