//! Agent Registry
//!
//! Sole owner of agent storage. Agents are keyed by id; ids are handed out
//! once and never reused, so a stale id simply misses. Explicit ids may be
//! sparse, so storage never grows with the size of an id.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::agent::{Agent, AgentId};
use crate::error::{AbmError, Result};

/// Largest id accepted from callers. Keeps half the id space free for
/// automatic ids, so `insert` can never run out.
pub const MAX_AGENT_ID: u64 = i64::MAX as u64;

/// Pre-phase copy of every live agent's opinion
pub type OpinionBuffer = HashMap<AgentId, f64>;

#[derive(Debug, Default)]
pub struct AgentRegistry {
    live: BTreeMap<AgentId, Agent>,
    retired: BTreeSet<AgentId>,
    next_id: u64,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent under the next free id.
    pub fn insert(&mut self, mut agent: Agent) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        agent.assign_id(id);
        self.live.insert(id, agent);
        id
    }

    /// Registers an agent under a caller-chosen id, e.g. one read back from a layer file.
    /// Ids above [`MAX_AGENT_ID`] are rejected.
    pub fn insert_with_id(&mut self, id: AgentId, mut agent: Agent) -> Result<AgentId> {
        if self.live.contains_key(&id) || self.retired.contains(&id) {
            return Err(AbmError::DuplicateAgent(id));
        }
        if id.0 > MAX_AGENT_ID {
            return Err(AbmError::InvalidConfig(format!(
                "agent id {} is above the largest allowed id {}",
                id, MAX_AGENT_ID
            )));
        }
        agent.assign_id(id);
        self.live.insert(id, agent);
        self.next_id = self.next_id.max(id.0 + 1);
        Ok(id)
    }

    pub fn remove(&mut self, id: AgentId) -> Result<Agent> {
        let agent = self.live.remove(&id).ok_or(AbmError::AgentNotFound(id))?;
        self.retired.insert(id);
        Ok(agent)
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.live.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.live.get_mut(&id)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live ids in ascending order
    pub fn ids(&self) -> Vec<AgentId> {
        self.live.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.live.iter().map(|(&id, agent)| (id, agent))
    }

    pub fn opinions(&self) -> OpinionBuffer {
        self.iter().map(|(id, agent)| (id, agent.opinion)).collect()
    }

    pub fn apply_opinion_delta(&mut self, id: AgentId, delta: f64) -> Result<f64> {
        let agent = self.get_mut(id).ok_or(AbmError::AgentNotFound(id))?;
        agent.opinion += delta;
        Ok(agent.opinion)
    }

    /// Every live entry must hold an agent carrying its own key as id.
    pub fn check_integrity(&self) -> Result<()> {
        for (&id, agent) in &self.live {
            if agent.id() != Some(id) {
                return Err(AbmError::Invariant(format!(
                    "entry {} holds an agent with id {:?}",
                    id,
                    agent.id()
                )));
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn corrupt_id_for_test(&mut self, id: AgentId, bogus: Option<AgentId>) {
        if let Some(agent) = self.live.get_mut(&id) {
            match bogus {
                Some(b) => agent.assign_id(b),
                None => agent.clear_id(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential_and_never_reused() {
        let mut registry = AgentRegistry::new();
        let a = registry.insert(Agent::new(0.1));
        let b = registry.insert(Agent::new(0.2));
        assert_eq!(a, AgentId(0));
        assert_eq!(b, AgentId(1));

        registry.remove(a).unwrap();
        let c = registry.insert(Agent::new(0.3));
        assert_eq!(c, AgentId(2));
        assert!(registry.get(a).is_none());
        assert_eq!(registry.ids(), vec![b, c]);
    }

    #[test]
    fn test_insert_with_id() {
        let mut registry = AgentRegistry::new();
        registry.insert_with_id(AgentId(5), Agent::new(0.0)).unwrap();
        assert_eq!(registry.get(AgentId(5)).and_then(|a| a.id()), Some(AgentId(5)));

        // Next automatic id continues past the explicit one
        assert_eq!(registry.insert(Agent::new(0.0)), AgentId(6));

        assert!(matches!(
            registry.insert_with_id(AgentId(5), Agent::new(0.0)),
            Err(AbmError::DuplicateAgent(AgentId(5)))
        ));
    }

    #[test]
    fn test_insert_with_id_at_the_top_of_the_id_space() {
        let mut registry = AgentRegistry::new();
        for id in [u64::MAX, MAX_AGENT_ID + 1] {
            assert!(matches!(
                registry.insert_with_id(AgentId(id), Agent::new(0.0)),
                Err(AbmError::InvalidConfig(_))
            ));
        }
        assert!(registry.is_empty());

        // Large sparse ids are stored without growing storage to match
        let far = AgentId(1 << 40);
        registry.insert_with_id(far, Agent::new(0.0)).unwrap();
        assert_eq!(registry.insert(Agent::new(0.0)), AgentId((1 << 40) + 1));
        assert_eq!(registry.ids(), vec![far, AgentId((1 << 40) + 1)]);

        let last = AgentId(MAX_AGENT_ID);
        registry.insert_with_id(last, Agent::new(0.0)).unwrap();
        assert_eq!(registry.insert(Agent::new(0.0)), AgentId(MAX_AGENT_ID + 1));
    }

    #[test]
    fn test_removed_id_cannot_be_reclaimed() {
        let mut registry = AgentRegistry::new();
        let a = registry.insert(Agent::new(0.0));
        registry.remove(a).unwrap();
        assert!(registry.insert_with_id(a, Agent::new(0.0)).is_err());
    }

    #[test]
    fn test_remove_missing() {
        let mut registry = AgentRegistry::new();
        assert!(matches!(
            registry.remove(AgentId(9)),
            Err(AbmError::AgentNotFound(AgentId(9)))
        ));
    }

    #[test]
    fn test_apply_opinion_delta() {
        let mut registry = AgentRegistry::new();
        let a = registry.insert(Agent::new(0.25));
        assert_eq!(registry.apply_opinion_delta(a, 0.5).unwrap(), 0.75);
        assert!(registry.apply_opinion_delta(AgentId(42), 0.1).is_err());
    }

    #[test]
    fn test_opinion_buffer_is_a_copy() {
        let mut registry = AgentRegistry::new();
        let a = registry.insert(Agent::new(0.25));
        let buffer = registry.opinions();
        registry.apply_opinion_delta(a, 1.0).unwrap();
        assert_eq!(buffer[&a], 0.25);
    }

    #[test]
    fn test_integrity_check() {
        let mut registry = AgentRegistry::new();
        let a = registry.insert(Agent::new(0.0));
        assert!(registry.check_integrity().is_ok());

        registry.corrupt_id_for_test(a, None);
        let err = registry.check_integrity().unwrap_err();
        assert!(err.is_fatal());
    }
}
