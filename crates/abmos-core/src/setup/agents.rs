//! Agent Generation
//!
//! Bulk creation of agents from an attribute specification: each attribute is
//! either a literal shared by every agent or a distribution sampled per agent.

use rand::rngs::SmallRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::TAU;

use crate::components::agent::{Agent, AttributeValue, Personality};
use crate::error::{AbmError, Result};

/// Attribute key that sets the agent's opinion
pub const OPINION_KEY: &str = "opinion";
/// Attribute key that sets the agent's personality
pub const PERSONALITY_KEY: &str = "personality";
/// Prefix of keys that set `social_weightings[<layer>]`
pub const WEIGHTING_PREFIX: &str = "weighting.";

/// How one attribute is produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeSpec {
    /// `{ mean = 0.0, spread = 0.3, distribution = "normal" }`
    Sampled {
        mean: f64,
        spread: f64,
        #[serde(default)]
        distribution: String,
    },
    /// `[0.0, 0.3, "uniform"]`
    Triple(f64, f64, String),
    Literal(AttributeValue),
}

impl AttributeSpec {
    pub fn normal(mean: f64, spread: f64) -> Self {
        AttributeSpec::Sampled {
            mean,
            spread,
            distribution: "normal".to_string(),
        }
    }

    pub fn uniform(mean: f64, spread: f64) -> Self {
        AttributeSpec::Sampled {
            mean,
            spread,
            distribution: "uniform".to_string(),
        }
    }

    pub fn literal(value: impl Into<AttributeValue>) -> Self {
        AttributeSpec::Literal(value.into())
    }

    /// Resolves the distribution name once. Unknown names fall back to normal.
    pub fn resolve(&self, name: &str) -> ValueSampler {
        match self {
            AttributeSpec::Literal(value) => ValueSampler::Literal(value.clone()),
            AttributeSpec::Sampled { mean, spread, distribution }
            | AttributeSpec::Triple(mean, spread, distribution) => ValueSampler::Sample {
                mean: *mean,
                spread: *spread,
                distribution: Distribution::parse(name, distribution),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    Normal,
    Uniform,
}

impl Distribution {
    fn parse(attribute: &str, kind: &str) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "normal" | "" => Distribution::Normal,
            "uniform" => Distribution::Uniform,
            other => {
                tracing::warn!(
                    attribute,
                    "unknown distribution '{}', falling back to normal",
                    other
                );
                Distribution::Normal
            }
        }
    }
}

/// A resolved attribute source
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSampler {
    Literal(AttributeValue),
    Sample {
        mean: f64,
        spread: f64,
        distribution: Distribution,
    },
}

impl ValueSampler {
    pub fn sample(&self, rng: &mut SmallRng) -> AttributeValue {
        match self {
            ValueSampler::Literal(value) => value.clone(),
            _ => AttributeValue::Real(self.sample_real(rng).unwrap_or_default()),
        }
    }

    /// A real value, or `None` for a non-numeric literal.
    pub fn sample_real(&self, rng: &mut SmallRng) -> Option<f64> {
        match self {
            ValueSampler::Literal(value) => value.as_real(),
            ValueSampler::Sample { mean, spread, distribution } => Some(match distribution {
                Distribution::Normal => mean + spread * standard_normal(rng),
                Distribution::Uniform => mean + spread * (2.0 * rng.gen::<f64>() - 1.0),
            }),
        }
    }

    fn is_numeric(&self) -> bool {
        match self {
            ValueSampler::Literal(value) => value.as_real().is_some(),
            ValueSampler::Sample { .. } => true,
        }
    }
}

/// Box-Muller on the simulation RNG
fn standard_normal(rng: &mut SmallRng) -> f64 {
    // gen::<f64>() is in [0, 1); flip it so ln never sees zero
    let u1 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

#[derive(Debug, Clone)]
enum Target {
    Opinion,
    Weighting(String),
    Attribute(String),
}

/// Creates agents from a validated attribute specification
#[derive(Debug, Clone)]
pub struct AgentGenerator {
    personality: Personality,
    samplers: Vec<(Target, ValueSampler)>,
}

impl AgentGenerator {
    /// Validates the specification up front: personality must be a known
    /// literal, opinion and weightings must be numeric.
    pub fn new(specs: &BTreeMap<String, AttributeSpec>) -> Result<Self> {
        let mut personality = Personality::default();
        let mut samplers = Vec::new();

        for (name, spec) in specs {
            let sampler = spec.resolve(name);
            if name == PERSONALITY_KEY {
                personality = match &sampler {
                    ValueSampler::Literal(AttributeValue::Text(tag)) => tag.parse()?,
                    _ => {
                        return Err(AbmError::InvalidConfig(
                            "personality must be a literal name".to_string(),
                        ))
                    }
                };
                continue;
            }

            let target = if name == OPINION_KEY {
                Target::Opinion
            } else if let Some(layer) = name.strip_prefix(WEIGHTING_PREFIX) {
                Target::Weighting(layer.to_string())
            } else {
                Target::Attribute(name.clone())
            };
            if !matches!(target, Target::Attribute(_)) && !sampler.is_numeric() {
                return Err(AbmError::InvalidConfig(format!(
                    "attribute '{}' must be numeric",
                    name
                )));
            }
            samplers.push((target, sampler));
        }

        Ok(Self { personality, samplers })
    }

    /// Adds a weighting sampler for a layer unless the spec already has one.
    pub fn with_default_weighting(mut self, layer: &str, spec: &AttributeSpec) -> Self {
        let present = self
            .samplers
            .iter()
            .any(|(t, _)| matches!(t, Target::Weighting(l) if l == layer));
        if !present {
            let name = format!("{}{}", WEIGHTING_PREFIX, layer);
            self.samplers
                .push((Target::Weighting(layer.to_string()), spec.resolve(&name)));
        }
        self
    }

    pub fn generate_one(&self, rng: &mut SmallRng) -> Agent {
        let mut agent = Agent::builder().personality(self.personality).build();
        for (target, sampler) in &self.samplers {
            match target {
                Target::Opinion => {
                    let opinion = sampler.sample_real(rng).unwrap_or_default();
                    agent.opinion = opinion;
                    agent.previous_opinion = opinion;
                }
                Target::Weighting(layer) => {
                    agent.set_weighting(layer.clone(), sampler.sample_real(rng).unwrap_or_default());
                }
                Target::Attribute(name) => agent.add_attribute(name.clone(), sampler.sample(rng)),
            }
        }
        agent
    }

    pub fn generate(&self, count: usize, rng: &mut SmallRng) -> Vec<Agent> {
        (0..count).map(|_| self.generate_one(rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn specs(entries: &[(&str, AttributeSpec)]) -> BTreeMap<String, AttributeSpec> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_literals_apply_to_all() {
        let generator = AgentGenerator::new(&specs(&[
            ("opinion", AttributeSpec::literal(0.25)),
            ("personality", AttributeSpec::literal("contrarian")),
            ("profession", AttributeSpec::literal("farmer")),
            ("weighting.Family", AttributeSpec::literal(0.6)),
        ]))
        .unwrap();

        let mut rng = SmallRng::seed_from_u64(1);
        for agent in generator.generate(5, &mut rng) {
            assert_eq!(agent.opinion, 0.25);
            assert_eq!(agent.personality, Personality::Contrarian);
            assert_eq!(agent.weighting("Family"), Some(0.6));
            assert_eq!(
                agent.get_attribute("profession").and_then(|v| v.as_text()),
                Some("farmer")
            );
        }
    }

    #[test]
    fn test_uniform_stays_in_range() {
        let generator =
            AgentGenerator::new(&specs(&[("opinion", AttributeSpec::uniform(0.0, 0.5))])).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        for agent in generator.generate(200, &mut rng) {
            assert!(agent.opinion >= -0.5 && agent.opinion <= 0.5);
        }
    }

    #[test]
    fn test_normal_sample_moments() {
        let sampler = AttributeSpec::normal(2.0, 0.5).resolve("x");
        let mut rng = SmallRng::seed_from_u64(11);
        let n = 5000;
        let values: Vec<f64> = (0..n).map(|_| sampler.sample_real(&mut rng).unwrap()).collect();
        let mean = values.iter().sum::<f64>() / n as f64;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 2.0).abs() < 0.05, "mean was {}", mean);
        assert!((var.sqrt() - 0.5).abs() < 0.05, "sd was {}", var.sqrt());
    }

    #[test]
    fn test_unknown_distribution_falls_back_to_normal() {
        let spec = AttributeSpec::Triple(0.0, 1.0, "poisson".to_string());
        assert_eq!(
            spec.resolve("age"),
            ValueSampler::Sample {
                mean: 0.0,
                spread: 1.0,
                distribution: Distribution::Normal
            }
        );
    }

    #[test]
    fn test_invalid_specs_fail_fast() {
        assert!(matches!(
            AgentGenerator::new(&specs(&[("personality", AttributeSpec::literal("zealot"))])),
            Err(AbmError::UnknownPersonality(_))
        ));
        assert!(AgentGenerator::new(&specs(&[(
            "personality",
            AttributeSpec::normal(0.0, 1.0)
        )]))
        .is_err());
        assert!(AgentGenerator::new(&specs(&[("opinion", AttributeSpec::literal("high"))])).is_err());
    }

    #[test]
    fn test_spec_deserializes_all_forms() {
        let parsed: BTreeMap<String, AttributeSpec> = toml::from_str(
            r#"
            opinion = { mean = 0.0, spread = 0.3, distribution = "uniform" }
            age = [40.0, 12.0, "normal"]
            personality = "rational"
            religious = true
            "#,
        )
        .unwrap();
        assert_eq!(parsed["opinion"], AttributeSpec::uniform(0.0, 0.3));
        assert_eq!(parsed["age"], AttributeSpec::Triple(40.0, 12.0, "normal".into()));
        assert_eq!(parsed["personality"], AttributeSpec::literal("rational"));
        assert_eq!(parsed["religious"], AttributeSpec::literal(true));
    }

    #[test]
    fn test_default_weighting_does_not_override() {
        let generator = AgentGenerator::new(&specs(&[(
            "weighting.Age",
            AttributeSpec::literal(0.1),
        )]))
        .unwrap()
        .with_default_weighting("Age", &AttributeSpec::literal(0.9))
        .with_default_weighting("Family", &AttributeSpec::literal(0.4));

        let mut rng = SmallRng::seed_from_u64(3);
        let agent = generator.generate_one(&mut rng);
        assert_eq!(agent.weighting("Age"), Some(0.1));
        assert_eq!(agent.weighting("Family"), Some(0.4));
    }
}
