//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CatalogIndex` / `CatalogEntry`: items discovered in the catalog
//! - `DetailRecord`: per-item metadata and the harvest watermark
//! - `SubitemList` / `SubitemContent`: harvested chapters
//! - `PacingState`: request spacing owned by the scheduler

mod pacing;
mod records;

// Re-export main types
pub use pacing::{min_interval, PacingState};
pub use records::{
    CatalogEntry, CatalogIndex, DetailRecord, SubitemContent, SubitemEntry, SubitemList,
};
