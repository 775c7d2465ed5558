//! Influence System
//!
//! Turns a layer's neighbourhood into an opinion contribution. The rule is a
//! plug-in point; the default dispatches on the agent's personality.

use crate::components::agent::{AgentId, Personality};
use crate::error::Result;

/// Constants for the built-in personality responses
pub mod influence_constants {
    /// Fraction of the neutral response a stubborn agent accepts
    pub const STUBBORNNESS: f64 = 0.25;
    /// Name of the pseudo-layer built from grid neighbours
    pub const PROXIMITY_LAYER: &str = "proximity";
    /// Weighting an agent gives the proximity pseudo-layer
    pub const PROXIMITY_WEIGHTING: f64 = 1.0;
}

pub use influence_constants::PROXIMITY_LAYER;

/// A neighbour as seen from the opinion phase: who, how strongly, and what
/// they believed before the phase began.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighbourOpinion {
    pub agent: AgentId,
    pub weight: f64,
    pub opinion: f64,
}

/// The agent receiving influence through one layer
#[derive(Debug, Clone, PartialEq)]
pub struct InfluenceSubject<'a> {
    pub agent: AgentId,
    /// Opinion at the start of the phase
    pub opinion: f64,
    pub personality: Personality,
    /// The agent's own weighting of this layer
    pub weighting: f64,
    pub layer: &'a str,
}

/// Computes one layer's contribution to an agent's opinion change.
///
/// Implementations must be pure: the clock calls them for every agent against
/// the same frozen opinion buffer.
pub trait InfluenceRule {
    fn contribution(&self, subject: &InfluenceSubject<'_>, neighbours: &[NeighbourOpinion])
        -> Result<f64>;

    fn name(&self) -> &str {
        "custom"
    }
}

/// Personality-driven default rule
#[derive(Debug, Clone, PartialEq)]
pub struct PersonalityRule {
    pub stubbornness: f64,
}

impl Default for PersonalityRule {
    fn default() -> Self {
        Self {
            stubbornness: influence_constants::STUBBORNNESS,
        }
    }
}

impl PersonalityRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stubbornness(mut self, stubbornness: f64) -> Self {
        self.stubbornness = stubbornness;
        self
    }
}

impl InfluenceRule for PersonalityRule {
    fn contribution(
        &self,
        subject: &InfluenceSubject<'_>,
        neighbours: &[NeighbourOpinion],
    ) -> Result<f64> {
        let pull = subject.weighting * weighted_sum(neighbours);
        let delta = match subject.personality {
            Personality::Neutral => pull,
            Personality::Rational => {
                if neighbours.is_empty() {
                    0.0
                } else {
                    let gap: f64 = neighbours
                        .iter()
                        .map(|n| n.weight * (n.opinion - subject.opinion))
                        .sum();
                    subject.weighting * gap / neighbours.len() as f64
                }
            }
            Personality::Stubborn => self.stubbornness * pull,
            Personality::Contrarian => -pull,
        };
        Ok(delta)
    }

    fn name(&self) -> &str {
        "personality"
    }
}

/// `weighting * sum(weight * opinion)` for every agent, whatever its personality
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearRule;

impl InfluenceRule for LinearRule {
    fn contribution(
        &self,
        subject: &InfluenceSubject<'_>,
        neighbours: &[NeighbourOpinion],
    ) -> Result<f64> {
        Ok(subject.weighting * weighted_sum(neighbours))
    }

    fn name(&self) -> &str {
        "linear"
    }
}

fn weighted_sum(neighbours: &[NeighbourOpinion]) -> f64 {
    neighbours.iter().map(|n| n.weight * n.opinion).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(personality: Personality, opinion: f64, weighting: f64) -> InfluenceSubject<'static> {
        InfluenceSubject {
            agent: AgentId(0),
            opinion,
            personality,
            weighting,
            layer: "Family",
        }
    }

    fn neighbours() -> Vec<NeighbourOpinion> {
        vec![
            NeighbourOpinion { agent: AgentId(1), weight: 1.0, opinion: 0.5 },
            NeighbourOpinion { agent: AgentId(2), weight: 0.5, opinion: -0.2 },
        ]
    }

    #[test]
    fn test_neutral_is_weighted_sum() {
        let rule = PersonalityRule::new();
        let delta = rule
            .contribution(&subject(Personality::Neutral, 0.0, 0.5), &neighbours())
            .unwrap();
        assert!((delta - 0.5 * (0.5 - 0.1)).abs() < 1e-12);
    }

    #[test]
    fn test_no_neighbours_no_change() {
        let rule = PersonalityRule::new();
        for personality in Personality::ALL {
            let delta = rule.contribution(&subject(personality, 0.3, 1.0), &[]).unwrap();
            assert_eq!(delta, 0.0, "{personality}");
        }
    }

    #[test]
    fn test_rational_moves_toward_neighbours() {
        let rule = PersonalityRule::new();
        let n = vec![NeighbourOpinion { agent: AgentId(1), weight: 1.0, opinion: 0.6 }];
        let delta = rule
            .contribution(&subject(Personality::Rational, 0.2, 1.0), &n)
            .unwrap();
        assert!((delta - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_stubborn_and_contrarian_scale_neutral() {
        let rule = PersonalityRule::new();
        let neutral = rule
            .contribution(&subject(Personality::Neutral, 0.0, 1.0), &neighbours())
            .unwrap();
        let stubborn = rule
            .contribution(&subject(Personality::Stubborn, 0.0, 1.0), &neighbours())
            .unwrap();
        let contrarian = rule
            .contribution(&subject(Personality::Contrarian, 0.0, 1.0), &neighbours())
            .unwrap();

        assert!((stubborn - 0.25 * neutral).abs() < 1e-12);
        assert_eq!(contrarian, -neutral);
    }

    #[test]
    fn test_custom_stubbornness() {
        let rule = PersonalityRule::new().with_stubbornness(0.0);
        let delta = rule
            .contribution(&subject(Personality::Stubborn, 0.0, 1.0), &neighbours())
            .unwrap();
        assert_eq!(delta, 0.0);
    }

    #[test]
    fn test_linear_ignores_personality() {
        let s = subject(Personality::Contrarian, 0.0, 1.0);
        let delta = LinearRule.contribution(&s, &neighbours()).unwrap();
        assert!((delta - 0.4).abs() < 1e-12);
        assert_eq!(LinearRule.name(), "linear");
    }
}
