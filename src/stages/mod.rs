//! Crawl stages
//!
//! Each stage reads checkpoints, does its network work through the shared
//! scheduler, and writes checkpoints back. Per-entity failures are logged and
//! counted; only failures that leave the stage without a usable starting point
//! are returned as errors.

pub mod discovery;
pub mod enrichment;
pub mod harvest;

use crate::config::{DelayConfig, SiteConfig};
use crate::crawler::{Extractor, SchedulerHandle};
use crate::storage::CheckpointStore;
use crate::HarvestError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The three crawl stages, in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Discovery,
    Enrichment,
    Harvest,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Discovery, Stage::Enrichment, Stage::Harvest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Enrichment => "enrichment",
            Self::Harvest => "harvest",
        }
    }

    /// Runs this stage to completion
    ///
    /// A stage that stops early still reports the counters it reached.
    pub async fn run(
        &self,
        ctx: &StageContext<'_>,
    ) -> std::result::Result<StageSummary, StageFailure> {
        let mut summary = StageSummary::new(*self);
        let outcome = match self {
            Self::Discovery => discovery::run(ctx, &mut summary).await,
            Self::Enrichment => enrichment::run(ctx, &mut summary).await,
            Self::Harvest => harvest::run(ctx, &mut summary).await,
        };

        match outcome {
            Ok(()) => {
                tracing::info!("{}", summary);
                Ok(summary)
            }
            Err(error) => Err(StageFailure { summary, error }),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters reported by a finished stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub stage: Stage,
    /// Entities (pages, items) handled successfully
    pub processed: u64,
    /// Entities left alone: nothing to do or not eligible
    pub skipped: u64,
    /// Entities abandoned after an error
    pub failed: u64,
    /// Entities whose checkpoint changed
    pub changed: u64,
    pub subitems_fetched: u64,
    pub subitems_failed: u64,
}

impl StageSummary {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            processed: 0,
            skipped: 0,
            failed: 0,
            changed: 0,
            subitems_fetched: 0,
            subitems_failed: 0,
        }
    }
}

impl fmt::Display for StageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: processed {}, skipped {}, failed {}, changed {}",
            self.stage, self.processed, self.skipped, self.failed, self.changed
        )?;
        if self.stage == Stage::Harvest {
            write!(
                f,
                ", chapters fetched {}, chapters failed {}",
                self.subitems_fetched, self.subitems_failed
            )?;
        }
        Ok(())
    }
}

/// A stage that stopped early
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}", stage = .summary.stage)]
pub struct StageFailure {
    /// Counters reached before the stage stopped
    pub summary: StageSummary,
    #[source]
    pub error: HarvestError,
}

/// Randomized pause inserted between successive fetches of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDelay {
    min_ms: u64,
    max_ms: u64,
}

impl ItemDelay {
    pub fn new(config: &DelayConfig) -> Self {
        Self {
            min_ms: config.min_item_delay_ms,
            max_ms: config.max_item_delay_ms.max(config.min_item_delay_ms),
        }
    }

    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    /// Uniform sample in `[min, max]`
    pub fn sample(&self) -> Duration {
        Duration::from_millis(fastrand::u64(self.min_ms..=self.max_ms))
    }

    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Collaborators shared by every stage of a run
pub struct StageContext<'a> {
    pub site: &'a SiteConfig,
    pub store: &'a dyn CheckpointStore,
    pub extractor: &'a dyn Extractor,
    pub scheduler: &'a SchedulerHandle,
    pub delay: ItemDelay,
}
