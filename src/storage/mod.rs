//! Storage module for persisting crawl data
//!
//! This module handles:
//! - Checkpoint records (catalog index, details, chapters) as JSON files
//! - The SQLite run ledger used for `--stats` and interrupted-run detection

mod fs;
mod ledger;
mod schema;
mod traits;

pub use fs::FsCheckpointStore;
pub use ledger::RunLedger;
pub use traits::{CheckpointStore, StorageError, StorageResult};

/// Represents one stage execution in the ledger
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub stage: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub changed: u64,
    pub subitems_fetched: u64,
    pub subitems_failed: u64,
    pub error_message: Option<String>,
}

/// Status of a stage run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }
}
