//! Agent Components
//!
//! The agent record: fixed core fields plus an explicit attribute bag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AbmError;

/// Unique identifier for an agent, assigned by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Grid coordinates of a placed agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Closed set of influence-response policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    /// Adds the weighted opinions of its neighbours
    #[default]
    Neutral,
    /// Moves toward the weighted mean difference from its neighbours
    Rational,
    /// Like neutral, damped
    Stubborn,
    /// Moves away from its neighbours
    Contrarian,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Neutral,
        Personality::Rational,
        Personality::Stubborn,
        Personality::Contrarian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Neutral => "neutral",
            Personality::Rational => "rational",
            Personality::Stubborn => "stubborn",
            Personality::Contrarian => "contrarian",
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Personality {
    type Err = AbmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Personality::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AbmError::UnknownPersonality(s.to_string()))
    }
}

/// Tagged value for runtime-defined agent attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_real(&self) -> Option<f64> {
        match self {
            AttributeValue::Real(v) => Some(*v),
            AttributeValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Real(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

/// A single agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    id: Option<AgentId>,
    pub opinion: f64,
    /// Opinion at the start of the last opinion phase
    pub previous_opinion: f64,
    pub personality: Personality,
    pub radicalised: bool,
    position: Option<Position>,
    /// Importance the agent assigns to each relationship layer, by layer name
    pub social_weightings: BTreeMap<String, f64>,
    attributes: BTreeMap<String, AttributeValue>,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            id: None,
            opinion: 0.0,
            previous_opinion: 0.0,
            personality: Personality::default(),
            radicalised: false,
            position: None,
            social_weightings: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }
}

impl Agent {
    pub fn new(opinion: f64) -> Self {
        Self {
            opinion,
            previous_opinion: opinion,
            ..Default::default()
        }
    }

    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    /// Registry-assigned id; `None` until the agent is registered
    pub fn id(&self) -> Option<AgentId> {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: AgentId) {
        self.id = Some(id);
    }

    #[cfg(test)]
    pub(crate) fn clear_id(&mut self) {
        self.id = None;
    }

    /// Grid position; `None` while unplaced
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Option<Position>) {
        self.position = position;
    }

    pub fn weighting(&self, layer: &str) -> Option<f64> {
        self.social_weightings.get(layer).copied()
    }

    pub fn set_weighting(&mut self, layer: impl Into<String>, weight: f64) {
        self.social_weightings.insert(layer.into(), weight);
    }

    /// Adds or replaces a runtime attribute. Core fields are never touched.
    pub fn add_attribute(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(name.into(), value);
    }

    pub fn get_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }
}

/// Named-field construction for agents
#[derive(Debug, Clone, Default)]
pub struct AgentBuilder {
    agent: Agent,
}

impl AgentBuilder {
    pub fn opinion(mut self, opinion: f64) -> Self {
        self.agent.opinion = opinion;
        self.agent.previous_opinion = opinion;
        self
    }

    pub fn personality(mut self, personality: Personality) -> Self {
        self.agent.personality = personality;
        self
    }

    pub fn weighting(mut self, layer: impl Into<String>, weight: f64) -> Self {
        self.agent.set_weighting(layer, weight);
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.agent.add_attribute(name, value);
        self
    }

    pub fn build(self) -> Agent {
        self.agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personality_parse() {
        assert_eq!("neutral".parse::<Personality>().unwrap(), Personality::Neutral);
        assert_eq!(" Rational ".parse::<Personality>().unwrap(), Personality::Rational);
        let err = "zealot".parse::<Personality>().unwrap_err();
        assert!(matches!(err, AbmError::UnknownPersonality(ref s) if s == "zealot"));
    }

    #[test]
    fn test_builder_sets_fields() {
        let agent = Agent::builder()
            .opinion(0.3)
            .personality(Personality::Stubborn)
            .weighting("Family", 0.9)
            .attribute("age", AttributeValue::Integer(34))
            .build();

        assert_eq!(agent.opinion, 0.3);
        assert_eq!(agent.previous_opinion, 0.3);
        assert_eq!(agent.personality, Personality::Stubborn);
        assert_eq!(agent.weighting("Family"), Some(0.9));
        assert_eq!(agent.get_attribute("age"), Some(&AttributeValue::Integer(34)));
        assert!(agent.id().is_none());
        assert!(agent.position().is_none());
    }

    #[test]
    fn test_attribute_named_like_core_field_stays_in_bag() {
        let mut agent = Agent::new(0.25);
        agent.add_attribute("opinion", AttributeValue::Text("loud".into()));

        assert_eq!(agent.opinion, 0.25);
        assert_eq!(
            agent.get_attribute("opinion").and_then(|v| v.as_text()),
            Some("loud")
        );
    }

    #[test]
    fn test_attribute_value_untagged() {
        let values: Vec<AttributeValue> =
            serde_json::from_str(r#"[true, 3, 0.5, "nurse"]"#).unwrap();
        assert_eq!(values[0], AttributeValue::Boolean(true));
        assert_eq!(values[1], AttributeValue::Integer(3));
        assert_eq!(values[2], AttributeValue::Real(0.5));
        assert_eq!(values[3], AttributeValue::Text("nurse".into()));
        assert_eq!(values[1].as_real(), Some(3.0));
    }
}
