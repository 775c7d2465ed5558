//! Statistics Output
//!
//! Collects per-iteration opinion statistics for analysis.

use serde::Serialize;
use std::fs;
use std::path::Path;

use abmos_events::OpinionMetrics;

use super::observer::IterationObserver;
use crate::error::Result;
use crate::sim::view::ModelView;

/// Metrics after one iteration
#[derive(Debug, Clone, Serialize)]
pub struct IterationStats {
    pub iteration: u64,
    pub metrics: OpinionMetrics,
}

/// Accumulates opinion statistics during a run
#[derive(Debug, Clone, Default)]
pub struct StatsCollector {
    history: Vec<IterationStats>,
    peak_radicalised: usize,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the model state after an iteration
    pub fn record(&mut self, iteration: u64, metrics: OpinionMetrics) {
        self.peak_radicalised = self.peak_radicalised.max(metrics.radicalised_count);
        self.history.push(IterationStats { iteration, metrics });
    }

    pub fn history(&self) -> &[IterationStats] {
        &self.history
    }

    pub fn latest(&self) -> Option<&IterationStats> {
        self.history.last()
    }

    pub fn peak_radicalised(&self) -> usize {
        self.peak_radicalised
    }

    /// Change in mean opinion between the first and last recorded iteration
    pub fn mean_opinion_drift(&self) -> f64 {
        match (self.history.first(), self.history.last()) {
            (Some(first), Some(last)) => last.metrics.mean_opinion - first.metrics.mean_opinion,
            _ => 0.0,
        }
    }

    /// Write the history as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.history)?)?;
        Ok(())
    }
}

impl IterationObserver for StatsCollector {
    fn on_iteration(&mut self, iteration: u64, view: &ModelView<'_>) -> Result<()> {
        self.record(iteration, view.opinion_metrics());
        Ok(())
    }

    fn name(&self) -> &str {
        "stats"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_collector_new() {
        let collector = StatsCollector::new();
        assert!(collector.history().is_empty());
        assert!(collector.latest().is_none());
        assert_eq!(collector.mean_opinion_drift(), 0.0);
    }

    #[test]
    fn test_record_tracks_peak_and_drift() {
        let mut collector = StatsCollector::new();
        collector.record(0, OpinionMetrics::from_opinions([(0.0, false), (0.2, false)]));
        collector.record(1, OpinionMetrics::from_opinions([(0.9, true), (0.5, false)]));
        collector.record(2, OpinionMetrics::from_opinions([(0.4, false), (0.4, false)]));

        assert_eq!(collector.history().len(), 3);
        assert_eq!(collector.peak_radicalised(), 1);
        assert!((collector.mean_opinion_drift() - 0.3).abs() < 1e-12);
        assert_eq!(collector.latest().unwrap().iteration, 2);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats").join("history.json");
        let mut collector = StatsCollector::new();
        collector.record(0, OpinionMetrics::from_opinions([(0.1, false)]));
        collector.write_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"iteration\": 0"));
    }
}
