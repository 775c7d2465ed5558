//! End-to-end scenarios
//!
//! Small hand-built models whose outcome can be worked out on paper.

use std::path::Path;

use abmos_core::components::{Agent, AgentId, AgentRegistry, Position};
use abmos_core::graph::{LayerSet, RelationshipLayer};
use abmos_core::space::{BoundaryPolicy, Placement, SpatialGrid, NEIGHBOUR_OFFSETS};
use abmos_core::systems::influence::LinearRule;
use abmos_core::{ClockState, SimulationClock};
use abmos_events::fixtures;
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn religion_model(weighting: f64) -> (AgentRegistry, LayerSet) {
    let mut agents = AgentRegistry::new();
    agents.insert(Agent::builder().opinion(0.0).weighting("Religion", weighting).build());
    agents.insert(Agent::builder().opinion(0.2).weighting("Religion", 0.4).build());
    agents.insert(Agent::builder().opinion(-0.3).weighting("Religion", 0.4).build());

    let layer =
        RelationshipLayer::from_document(&fixtures::religion_layer(), Path::new("religion.json"))
            .unwrap();
    let mut layers = LayerSet::new();
    layers.add(layer).unwrap();
    (agents, layers)
}

#[test]
fn test_religion_significance_threshold() {
    let (agents, layers) = religion_model(0.9);
    let agent_0 = agents.get(AgentId(0)).unwrap();

    assert_eq!(
        layers.agent_significant_layers(agent_0, 0.5).unwrap(),
        vec!["Religion".to_string()]
    );
    assert!(layers.agent_significant_layers(agent_0, 0.95).unwrap().is_empty());
}

#[test]
fn test_significance_uses_absolute_weighting() {
    let (agents, layers) = religion_model(-0.9);
    let agent_0 = agents.get(AgentId(0)).unwrap();
    assert_eq!(layers.agent_significant_layers(agent_0, 0.5).unwrap(), vec!["Religion"]);
}

#[test]
fn test_lonely_agent_keeps_opinion() {
    let mut agents = AgentRegistry::new();
    let id = agents.insert(Agent::builder().opinion(0.0).weighting("Family", 1.0).build());
    let mut family = RelationshipLayer::new("Family");
    family.add_members([id]);
    let mut layers = LayerSet::new();
    layers.add(family).unwrap();
    layers.add(RelationshipLayer::new("Age")).unwrap();

    let mut clock = SimulationClock::new(agents, layers, 3);
    for _ in 0..3 {
        clock.advance().unwrap();
    }

    assert_eq!(clock.current_iteration(), 3);
    assert_eq!(clock.state(), ClockState::Finished);
    assert_eq!(clock.agents().get(id).unwrap().opinion, 0.0);
    assert!(clock.diagnostics().is_clean());
}

#[test]
fn test_follower_adopts_prior_opinion() {
    let mut agents = AgentRegistry::new();
    let a0 = agents.insert(Agent::builder().opinion(0.0).weighting("Family", 1.0).build());
    let a1 = agents.insert(Agent::builder().opinion(0.5).weighting("Family", 1.0).build());

    let mut layer = RelationshipLayer::new("Family");
    let nodes = layer.add_members([a0, a1]);
    layer.add_edges(&[nodes[0]], &[nodes[1]], Some(&[1.0])).unwrap();
    let mut layers = LayerSet::new();
    layers.add(layer).unwrap();

    let mut clock = SimulationClock::new(agents, layers, 1).with_rule(LinearRule);
    clock.advance().unwrap();

    assert_eq!(clock.agents().get(a0).unwrap().opinion, 0.5);
    assert_eq!(clock.agents().get(a1).unwrap().opinion, 0.5);
    assert_eq!(clock.agents().get(a0).unwrap().previous_opinion, 0.0);
}

#[test]
fn test_placement_is_visible_to_neighbours() {
    for (x, y) in [(0, 0), (2, 2), (4, 0), (4, 4), (1, 3)] {
        let mut agents = AgentRegistry::new();
        let target = agents.insert(Agent::new(0.0));
        let mut grid = SpatialGrid::new((0, 5), (0, 5), 1, BoundaryPolicy::Bounded).unwrap();
        let placed = grid.add_agent(x, y, agents.get_mut(target).unwrap()).unwrap();
        assert_eq!(placed, Placement::Placed { slot: 0 });
        assert_eq!(agents.get(target).unwrap().position(), Some(Position::new(x, y)));

        // Every in-bounds surrounding agent sees the new occupant in the mirrored slot
        for (i, (dx, dy)) in NEIGHBOUR_OFFSETS.iter().enumerate() {
            let (nx, ny) = (x + dx, y + dy);
            if !grid.contains(nx, ny) {
                continue;
            }
            let probe = agents.insert(Agent::new(0.0));
            grid.add_agent(nx, ny, agents.get_mut(probe).unwrap()).unwrap();
            let counts = grid.count_neighbours(agents.get(probe).unwrap()).unwrap();
            assert_eq!(counts[NEIGHBOUR_OFFSETS.len() - 1 - i], 1, "probe at ({nx}, {ny})");
            grid.remove_agent(agents.get_mut(probe).unwrap());
        }
    }
}

#[test]
fn test_movement_conserves_population() {
    let mut agents = AgentRegistry::new();
    let mut grid = SpatialGrid::new((0, 6), (0, 6), 2, BoundaryPolicy::Wrap).unwrap();
    let mut rng = SmallRng::seed_from_u64(11);
    for _ in 0..40 {
        let id = agents.insert(Agent::new(0.0));
        assert!(grid.place_randomly(agents.get_mut(id).unwrap(), &mut rng).unwrap().is_placed());
    }

    for _ in 0..50 {
        for id in agents.ids() {
            let agent = agents.get_mut(id).unwrap();
            grid.move_agent(agent, &mut rng).unwrap();
            assert_eq!(grid.slots_holding(id), 1);
        }
        assert_eq!(grid.total_occupancy(), 40);
    }
}

#[test]
fn test_full_cell_rejection_is_idempotent() {
    let mut agents = AgentRegistry::new();
    let mut grid = SpatialGrid::new((0, 3), (0, 3), 2, BoundaryPolicy::Bounded).unwrap();
    let ids: Vec<AgentId> = (0..4).map(|_| agents.insert(Agent::new(0.0))).collect();
    for &id in &ids[..2] {
        grid.add_agent(1, 1, agents.get_mut(id).unwrap()).unwrap();
    }
    let before = grid.agents_at(1, 1);

    for &id in &ids[2..] {
        let outcome = grid.add_agent(1, 1, agents.get_mut(id).unwrap()).unwrap();
        assert_eq!(outcome, Placement::CellFull);
        assert_eq!(grid.agents_at(1, 1), before);
        assert!(agents.get(id).unwrap().position().is_none());
    }
}

#[test]
fn test_change_weight_never_duplicates() {
    let mut layer = RelationshipLayer::new("Friends");
    let nodes = layer.add_members([AgentId(0), AgentId(1)]);
    layer.change_weight(nodes[0], nodes[1], 0.2).unwrap();
    layer.change_weight(nodes[0], nodes[1], -0.7).unwrap();

    assert_eq!(layer.edge_count(), 1);
    assert_eq!(layer.weight(nodes[0], nodes[1]), Some(-0.7));
    assert_eq!(layer.weight(nodes[1], nodes[0]), None);
}

#[test]
fn test_relationship_exists_is_symmetric() {
    let mut layer = RelationshipLayer::new("Age");
    let nodes = layer.add_members([AgentId(0), AgentId(1), AgentId(2)]);
    layer.change_weight(nodes[0], nodes[1], 0.5).unwrap();

    assert!(layer.relationship_exists(nodes[0], nodes[1]).unwrap().is_some());
    assert!(layer.relationship_exists(nodes[1], nodes[0]).unwrap().is_some());
    assert!(layer.relationship_exists(nodes[1], nodes[2]).unwrap().is_none());

    layer.change_weight(nodes[1], nodes[0], 0.1).unwrap();
    let both = layer.get_relationships(nodes[1], nodes[0]).unwrap().unwrap();
    assert_eq!(both[&(nodes[0], nodes[1])], 0.5);
    assert_eq!(both[&(nodes[1], nodes[0])], 0.1);
}

#[test]
fn test_removed_agent_leaves_no_trace() {
    let (agents, layers) = religion_model(0.9);
    let grid = SpatialGrid::new((0, 4), (0, 4), 1, BoundaryPolicy::Bounded).unwrap();
    let mut clock = SimulationClock::new(agents, layers, 4).with_grid(grid).with_seed(9);
    let extra = clock
        .add_agent(Agent::builder().weighting("Religion", 1.0).build(), Some(Position::new(3, 3)))
        .unwrap();

    clock.advance().unwrap();
    clock.remove_agent(AgentId(1)).unwrap();
    clock.remove_agent(extra).unwrap();
    clock.advance().unwrap();

    let religion = clock.layers().get("Religion").unwrap();
    assert_eq!(religion.node_count(), 2);
    assert_eq!(religion.edge_count(), 0);
    assert_eq!(clock.grid().unwrap().total_occupancy(), 0);
    assert!(clock.diagnostics().is_clean());
}
