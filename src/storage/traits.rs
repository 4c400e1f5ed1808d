//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::state::{CatalogIndex, DetailRecord, SubitemContent, SubitemList};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Expected-absent record; drives create-vs-update branching
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid item id {0:?}: expected ASCII letters, digits, '-' or '_'")]
    InvalidId(String),

    #[error("Corrupt record {path}: {source}")]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to commit {path}: {source}")]
    Commit {
        path: String,
        source: std::io::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint backends
///
/// Every write replaces the whole record and either commits completely or
/// leaves the previously committed record untouched.
pub trait CheckpointStore {
    // ===== Catalog =====

    /// Reads the catalog index, returning an empty index on first run
    fn read_catalog(&self) -> StorageResult<CatalogIndex>;

    /// Replaces the catalog index
    fn write_catalog(&self, catalog: &CatalogIndex) -> StorageResult<()>;

    // ===== Item detail =====

    /// Reads a detail record, failing with `NotFound` if it was never written
    fn read_detail(&self, id: &str) -> StorageResult<DetailRecord>;

    /// Replaces a detail record
    fn write_detail(&self, detail: &DetailRecord) -> StorageResult<()>;

    // ===== Chapters =====

    /// Reads the chapter list, failing with `NotFound` if absent
    fn read_subitem_list(&self, id: &str) -> StorageResult<SubitemList>;

    /// Replaces the chapter list
    fn write_subitem_list(&self, id: &str, list: &SubitemList) -> StorageResult<()>;

    /// Whether content for a chapter has been committed
    fn has_subitem(&self, id: &str, index: u32) -> bool;

    /// Reads one chapter's content
    fn read_subitem(&self, id: &str, index: u32) -> StorageResult<SubitemContent>;

    /// Writes one chapter's content
    fn write_subitem(&self, id: &str, content: &SubitemContent) -> StorageResult<()>;
}
