//! Output module for progress reporting and harvest statistics
//!
//! This module handles:
//! - Progress and ETA snapshots logged by the stages
//! - Statistics for `--stats` built from checkpoints and the run ledger

mod progress;
pub mod stats;

pub use progress::{format_duration, snapshot_at, Progress, ProgressSnapshot};
pub use stats::{
    catalog_snapshot, load_statistics, print_statistics, CatalogSnapshot, HarvestStatistics,
};
