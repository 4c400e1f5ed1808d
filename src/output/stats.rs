//! Statistics from the checkpoints and the run ledger
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics for `--stats`.

use crate::storage::{CheckpointStore, RunLedger, RunRecord};
use crate::Result;

/// Counts derived from the checkpoint records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    /// Entries in the catalog index
    pub entries: u64,

    /// Entries whose site identifier has been resolved
    pub resolved_ids: u64,

    /// Detail records present on disk
    pub detail_records: u64,

    /// Sum of contiguous completed chapters over all detail records
    pub subitems_harvested: u64,

    /// Sum of known chapter totals over all detail records
    pub subitems_known: u64,

    /// Detail records with every chapter harvested
    pub complete_items: u64,
}

impl CatalogSnapshot {
    pub fn percent_harvested(&self) -> f64 {
        if self.subitems_known == 0 {
            0.0
        } else {
            self.subitems_harvested as f64 / self.subitems_known as f64 * 100.0
        }
    }
}

/// Everything `--stats` reports
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    pub catalog: CatalogSnapshot,
    pub recent_runs: Vec<RunRecord>,
}

/// Walks the catalog index and the detail records it points at
///
/// Unreadable detail records are counted as missing.
pub fn catalog_snapshot(store: &dyn CheckpointStore) -> Result<CatalogSnapshot> {
    let catalog = store.read_catalog()?;
    let mut snapshot = CatalogSnapshot {
        entries: catalog.len() as u64,
        ..CatalogSnapshot::default()
    };

    for id in catalog.entries().filter_map(|entry| entry.id.as_deref()) {
        snapshot.resolved_ids += 1;
        match store.read_detail(id) {
            Ok(detail) => {
                snapshot.detail_records += 1;
                snapshot.subitems_harvested += u64::from(detail.completed_subitems);
                snapshot.subitems_known += u64::from(detail.total_subitems);
                if detail.is_complete() {
                    snapshot.complete_items += 1;
                }
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => tracing::warn!(id, "Unreadable detail record: {}", e),
        }
    }

    Ok(snapshot)
}

/// Loads the catalog snapshot and the `limit` most recent runs
pub fn load_statistics(
    store: &dyn CheckpointStore,
    ledger: &RunLedger,
    limit: usize,
) -> Result<HarvestStatistics> {
    Ok(HarvestStatistics {
        catalog: catalog_snapshot(store)?,
        recent_runs: ledger.recent_runs(limit)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    let catalog = &stats.catalog;
    println!("=== Harvest Statistics ===\n");

    println!("Catalog:");
    println!("  Entries: {}", catalog.entries);
    println!("  Resolved ids: {}", catalog.resolved_ids);
    println!("  Detail records: {}", catalog.detail_records);
    println!("  Complete items: {}", catalog.complete_items);
    println!(
        "  Chapters harvested: {} / {} ({:.1}%)",
        catalog.subitems_harvested,
        catalog.subitems_known,
        catalog.percent_harvested()
    );
    println!();

    if stats.recent_runs.is_empty() {
        println!("No runs recorded yet.");
        return;
    }

    println!("Recent Runs:");
    for run in &stats.recent_runs {
        println!(
            "  #{} {} [{}] started {}{}",
            run.id,
            run.stage,
            run.status.to_db_string(),
            run.started_at,
            run.finished_at
                .as_deref()
                .map(|finished| format!(", finished {}", finished))
                .unwrap_or_default()
        );
        println!(
            "      processed {}, skipped {}, failed {}, changed {}, chapters {} fetched / {} failed",
            run.processed,
            run.skipped,
            run.failed,
            run.changed,
            run.subitems_fetched,
            run.subitems_failed
        );
        if let Some(message) = &run.error_message {
            println!("      error: {}", message);
        }
    }
}
