//! Diagnostics
//!
//! Recoverable errors are counted here instead of being logged one by one.
//! The clock reports the totals once at the end of a run.

use std::collections::BTreeMap;

use abmos_events::DiagnosticCounts;

use crate::components::agent::AgentId;
use crate::error::{AbmError, ErrorKind};

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    counts: DiagnosticCounts,
    per_iteration: BTreeMap<u64, u64>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a recoverable error raised while processing `agent` in `phase`.
    pub fn record(&mut self, iteration: u64, phase: &'static str, agent: Option<AgentId>, error: &AbmError) {
        tracing::trace!(iteration, phase, agent = ?agent, %error, "skipped");
        match error.kind() {
            ErrorKind::NotFound => self.counts.not_found += 1,
            ErrorKind::Configuration => self.counts.configuration += 1,
            ErrorKind::Format | ErrorKind::Io => self.counts.format += 1,
            ErrorKind::Capacity => self.counts.capacity += 1,
            ErrorKind::Fatal => {
                tracing::error!(iteration, phase, %error, "fatal error recorded as a diagnostic");
                return;
            }
        }
        *self.per_iteration.entry(iteration).or_insert(0) += 1;
    }

    /// Counts a soft capacity rejection (a full cell).
    pub fn record_capacity(&mut self, iteration: u64, agent: AgentId, x: i32, y: i32) {
        self.record(iteration, "placement", Some(agent), &AbmError::CellFull { x, y });
    }

    pub fn counts(&self) -> &DiagnosticCounts {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.total()
    }

    pub fn is_clean(&self) -> bool {
        self.counts.is_clean()
    }

    /// Diagnostics raised during one iteration
    pub fn for_iteration(&self, iteration: u64) -> u64 {
        self.per_iteration.get(&iteration).copied().unwrap_or(0)
    }

    /// Iterations with at least one diagnostic, ascending
    pub fn iterations(&self) -> Vec<u64> {
        self.per_iteration.keys().copied().collect()
    }

    /// Logs the end-of-run totals once.
    pub fn log_summary(&self) {
        if self.is_clean() {
            tracing::info!("no recoverable errors");
            return;
        }
        tracing::warn!(
            not_found = self.counts.not_found,
            configuration = self.counts.configuration,
            format = self.counts.format,
            capacity = self.counts.capacity,
            iterations = self.per_iteration.len(),
            "{} recoverable errors skipped during the run",
            self.total()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_kind_and_iteration() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record(0, "opinion", Some(AgentId(1)), &AbmError::AgentNotFound(AgentId(9)));
        diagnostics.record(
            0,
            "opinion",
            Some(AgentId(2)),
            &AbmError::MissingWeighting { agent: AgentId(2), layer: "Age".into() },
        );
        diagnostics.record_capacity(3, AgentId(4), 1, 1);

        assert_eq!(diagnostics.counts().not_found, 1);
        assert_eq!(diagnostics.counts().configuration, 1);
        assert_eq!(diagnostics.counts().capacity, 1);
        assert_eq!(diagnostics.total(), 3);
        assert_eq!(diagnostics.for_iteration(0), 2);
        assert_eq!(diagnostics.for_iteration(1), 0);
        assert_eq!(diagnostics.iterations(), vec![0, 3]);
    }

    #[test]
    fn test_fatal_is_not_counted() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record(0, "step", None, &AbmError::Invariant("boom".into()));
        assert!(diagnostics.is_clean());
        assert!(diagnostics.iterations().is_empty());
    }
}
