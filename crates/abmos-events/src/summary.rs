//! Run Summary
//!
//! End-of-run report: how far the run got and how many recoverable problems it absorbed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::OpinionMetrics;

/// Recoverable error counts, by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticCounts {
    pub not_found: u64,
    pub configuration: u64,
    pub format: u64,
    pub capacity: u64,
}

impl DiagnosticCounts {
    pub fn total(&self) -> u64 {
        self.not_found + self.configuration + self.format + self.capacity
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}

/// Summary written once a run stops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub seed: u64,
    pub iterations_completed: u64,
    pub max_iterations: u64,
    pub finished: bool,
    pub final_metrics: OpinionMetrics,
    pub diagnostics: DiagnosticCounts,
    /// Iterations in which at least one recoverable problem occurred
    #[serde(default)]
    pub iterations_with_diagnostics: Vec<u64>,
}

impl RunSummary {
    pub fn new(seed: u64, max_iterations: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            seed,
            iterations_completed: 0,
            max_iterations,
            finished: false,
            final_metrics: OpinionMetrics::default(),
            diagnostics: DiagnosticCounts::default(),
            iterations_with_diagnostics: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
