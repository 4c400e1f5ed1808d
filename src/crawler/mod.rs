//! Crawler module: fetching, extraction, scheduling and stage orchestration
//!
//! This module contains the network-facing half of the harvester:
//! - A transport that performs single HTTP GETs
//! - The scheduler actor that paces, retries and rotates identities
//! - Site extractors that turn HTML into typed records
//! - The coordinator that runs the stages in order

mod coordinator;
pub(crate) mod fetcher;
mod parser;
mod scheduler;

pub use coordinator::{Coordinator, Mode};
pub use fetcher::{HttpTransport, Transport, TransportResponse};
pub use parser::{
    clean_text, compile_selector, title_case, DetailFields, Extractor, ListRow, SiteExtractor,
    SubitemFields,
};
pub use scheduler::{next_delay, status_multiplier, Scheduler, SchedulerHandle, BACKOFF_GROWTH};
