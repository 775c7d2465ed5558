//! Output Systems
//!
//! Observers that report on a running model: progress lines, snapshots and statistics.

pub mod observer;
pub mod snapshot;
pub mod stats;

pub use observer::{IterationObserver, ObserverChain, ProgressLogger};
pub use snapshot::{generate_snapshot, write_snapshot_to_dir, SnapshotRecorder};
pub use stats::{IterationStats, StatsCollector};
