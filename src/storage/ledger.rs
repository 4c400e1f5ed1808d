//! SQLite run ledger
//!
//! Journals every stage execution so `--stats` can report history and a
//! crashed run can be detected on the next start.

use crate::stages::{Stage, StageSummary};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, stage, started_at, finished_at, config_hash, status, \
     processed, skipped, failed, changed, subitems_fetched, subitems_failed, error_message";

/// SQLite-backed journal of stage runs
pub struct RunLedger {
    conn: Connection,
}

impl RunLedger {
    /// Opens or creates the ledger database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory ledger (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Inserts a `running` row for a stage and returns its id
    pub fn start_run(&mut self, stage: Stage, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (stage, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                stage.as_str(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Marks a run completed and stores its counters
    pub fn finish_run(&mut self, run_id: i64, summary: &StageSummary) -> StorageResult<()> {
        self.close_run(run_id, RunStatus::Completed, summary, None)
    }

    /// Marks a run failed with the error that aborted it
    pub fn fail_run(
        &mut self,
        run_id: i64,
        summary: &StageSummary,
        message: &str,
    ) -> StorageResult<()> {
        self.close_run(run_id, RunStatus::Failed, summary, Some(message))
    }

    fn close_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &StageSummary,
        message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, processed = ?3, skipped = ?4,
                failed = ?5, changed = ?6, subitems_fetched = ?7, subitems_failed = ?8,
                error_message = ?9
             WHERE id = ?10",
            params![
                status.to_db_string(),
                now,
                summary.processed as i64,
                summary.skipped as i64,
                summary.failed as i64,
                summary.changed as i64,
                summary.subitems_fetched as i64,
                summary.subitems_failed as i64,
                message,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("run {}", run_id)));
        }
        Ok(())
    }

    /// Flags every run left `running` by a previous process as interrupted
    ///
    /// Returns the affected runs as they were before the update.
    pub fn mark_interrupted(&mut self) -> StorageResult<Vec<RunRecord>> {
        let stale = self.runs_with_status(RunStatus::Running)?;
        if !stale.is_empty() {
            let now = Utc::now().to_rfc3339();
            self.conn.execute(
                "UPDATE runs SET status = ?1, finished_at = ?2 WHERE status = ?3",
                params![
                    RunStatus::Interrupted.to_db_string(),
                    now,
                    RunStatus::Running.to_db_string()
                ],
            )?;
        }
        Ok(stale)
    }

    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("run {}", run_id)))
    }

    /// Most recent runs first
    pub fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT ?1", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn runs_with_status(&self, status: RunStatus) -> StorageResult<Vec<RunRecord>> {
        let sql = format!("SELECT {} FROM runs WHERE status = ?1 ORDER BY id", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map(params![status.to_db_string()], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        stage: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
        processed: row.get::<_, i64>(6)? as u64,
        skipped: row.get::<_, i64>(7)? as u64,
        failed: row.get::<_, i64>(8)? as u64,
        changed: row.get::<_, i64>(9)? as u64,
        subitems_fetched: row.get::<_, i64>(10)? as u64,
        subitems_failed: row.get::<_, i64>(11)? as u64,
        error_message: row.get(12)?,
    })
}
