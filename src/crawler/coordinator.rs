//! Crawl coordinator: runs the stages of a mode in fixed order
//!
//! The coordinator owns everything a run needs: the checkpoint store, the run
//! ledger, the extractor and the scheduler task. Stages run one after another
//! and share the same scheduler, so the request spacing holds across stage
//! boundaries.

use crate::config::Config;
use crate::crawler::{HttpTransport, Scheduler, SiteExtractor, Transport};
use crate::stages::{ItemDelay, Stage, StageContext, StageSummary};
use crate::storage::{FsCheckpointStore, RunLedger};
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Which stages a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Mode {
    /// Discovery only: refresh the catalog index
    Urls,
    /// Enrichment only: resolve ids and write detail records
    Details,
    /// Harvest only: fetch outstanding chapters
    Chapters,
    /// All three stages in order
    #[default]
    All,
}

impl Mode {
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            Self::Urls => &[Stage::Discovery],
            Self::Details => &[Stage::Enrichment],
            Self::Chapters => &[Stage::Harvest],
            Self::All => &Stage::ALL,
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    config_hash: String,
    transport: Arc<dyn Transport>,
}

impl Coordinator {
    /// Creates a coordinator that talks HTTP through reqwest
    pub fn new(config: Config, config_hash: String) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config.scheduler)?);
        Ok(Self::with_transport(config, config_hash, transport))
    }

    /// Creates a coordinator over any transport
    pub fn with_transport(
        config: Config,
        config_hash: String,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            config_hash,
            transport,
        }
    }

    /// Runs the stages of `mode`, stopping at the first stage that fails
    ///
    /// Each stage execution is journaled in the run ledger. Rows left
    /// `running` by a previous process are marked interrupted first; the
    /// stages themselves resume from their checkpoints.
    pub async fn run(&self, mode: Mode) -> Result<Vec<StageSummary>> {
        let store = FsCheckpointStore::new(&self.config.output.data_dir)?;
        let mut ledger = RunLedger::open(Path::new(&self.config.output.ledger_path))?;

        for stale in ledger.mark_interrupted()? {
            tracing::warn!(
                run_id = stale.id,
                stage = %stale.stage,
                started_at = %stale.started_at,
                "Previous run was interrupted; the stage will resume from checkpoints"
            );
        }

        let extractor = SiteExtractor::new(&self.config.selectors, &self.config.site)?;
        let (scheduler, task) = Scheduler::spawn(
            Arc::clone(&self.transport),
            self.config.scheduler.clone(),
            self.config.identity_profiles(),
        );

        let ctx = StageContext {
            site: &self.config.site,
            store: &store,
            extractor: &extractor,
            scheduler: &scheduler,
            delay: ItemDelay::new(&self.config.delays),
        };

        tracing::info!(
            mode = ?mode,
            base_url = %self.config.site.base_url,
            "Starting run"
        );

        let mut summaries = Vec::new();
        let mut outcome = Ok(());

        for stage in mode.stages() {
            let run_id = ledger.start_run(*stage, &self.config_hash)?;
            tracing::info!(run_id, stage = %stage, "Stage started");

            match stage.run(&ctx).await {
                Ok(summary) => {
                    ledger.finish_run(run_id, &summary)?;
                    summaries.push(summary);
                }
                Err(failure) => {
                    tracing::error!(
                        run_id,
                        stage = %stage,
                        processed = failure.summary.processed,
                        "Stage failed: {}",
                        failure.error
                    );
                    let message = failure.error.to_string();
                    if let Err(ledger_err) = ledger.fail_run(run_id, &failure.summary, &message) {
                        tracing::error!(run_id, "Failed to record stage failure: {}", ledger_err);
                    }
                    outcome = Err(failure.error);
                    break;
                }
            }
        }

        drop(ctx);
        drop(scheduler);
        match task.await {
            Ok(requests) => tracing::info!(requests, "Scheduler finished"),
            Err(e) => tracing::warn!("Scheduler task ended abnormally: {}", e),
        }

        outcome.map(|()| summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::crawler::fetcher::scripted::ScriptedTransport;
    use crate::stages::test_support::{
        catalog_page, chapter_page, item_page, item_url, page_url, BASE,
    };
    use crate::storage::{CheckpointStore, RunStatus};
    use crate::url::subitem_url;
    use crate::HarvestError;
    use tempfile::TempDir;

    fn create_test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.site.base_url = BASE.to_string();
        config.scheduler = SchedulerConfig {
            requests_per_second: 100.0,
            max_retries: 0,
            base_retry_delay_ms: 10,
            ..SchedulerConfig::default()
        };
        config.delays.min_item_delay_ms = 0;
        config.delays.max_item_delay_ms = 0;
        config.output.data_dir = dir.path().join("data").to_string_lossy().into_owned();
        config.output.ledger_path = dir
            .path()
            .join("data/ledger.db")
            .to_string_lossy()
            .into_owned();
        config
    }

    fn scripted_site() -> Arc<ScriptedTransport> {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .respond(&page_url(0), 200, &catalog_page(&[("alpha", 3)], 0))
            .respond(&item_url("alpha"), 200, &item_page("42", "Alpha"));
        for index in 1..=3 {
            transport.respond(
                &subitem_url(&item_url("alpha"), index),
                200,
                &chapter_page(index),
            );
        }
        transport
    }

    #[test]
    fn test_mode_stages() {
        assert_eq!(Mode::Urls.stages(), &[Stage::Discovery]);
        assert_eq!(Mode::Details.stages(), &[Stage::Enrichment]);
        assert_eq!(Mode::Chapters.stages(), &[Stage::Harvest]);
        assert_eq!(Mode::All.stages(), &Stage::ALL);
        assert_eq!(Mode::default(), Mode::All);
    }

    #[tokio::test]
    async fn test_full_run_records_every_stage() {
        let dir = TempDir::new().unwrap();
        let config = create_test_config(&dir);
        let transport = scripted_site();
        let coordinator =
            Coordinator::with_transport(config.clone(), "hash".to_string(), transport.clone());

        let summaries = coordinator.run(Mode::All).await.unwrap();
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[2].subitems_fetched, 3);

        let store = FsCheckpointStore::new(&config.output.data_dir).unwrap();
        let detail = store.read_detail("42").unwrap();
        assert_eq!(detail.completed_subitems, 3);

        let ledger = RunLedger::open(Path::new(&config.output.ledger_path)).unwrap();
        let runs = ledger.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 3);
        assert!(runs.iter().all(|run| run.status == RunStatus::Completed));
        assert!(runs.iter().all(|run| run.config_hash == "hash"));
    }

    #[tokio::test]
    async fn test_second_run_only_refetches_the_catalog() {
        let dir = TempDir::new().unwrap();
        let config = create_test_config(&dir);
        let transport = scripted_site();
        let coordinator =
            Coordinator::with_transport(config, "hash".to_string(), transport.clone());

        coordinator.run(Mode::All).await.unwrap();
        let calls = transport.call_count();

        coordinator.run(Mode::All).await.unwrap();
        assert_eq!(transport.call_count(), calls + 1);
    }

    #[tokio::test]
    async fn test_single_stage_mode() {
        let dir = TempDir::new().unwrap();
        let config = create_test_config(&dir);
        let transport = scripted_site();
        let coordinator =
            Coordinator::with_transport(config.clone(), "hash".to_string(), transport.clone());

        let summaries = coordinator.run(Mode::Urls).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].stage, Stage::Discovery);
        assert_eq!(transport.calls(), vec![page_url(0)]);

        let store = FsCheckpointStore::new(&config.output.data_dir).unwrap();
        assert!(store.read_detail("42").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_failed_stage_stops_the_run() {
        let dir = TempDir::new().unwrap();
        let config = create_test_config(&dir);
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(&page_url(0), 503, "");
        let coordinator =
            Coordinator::with_transport(config.clone(), "hash".to_string(), transport.clone());

        let err = coordinator.run(Mode::All).await.unwrap_err();
        assert!(matches!(err, HarvestError::HttpStatus { status: 503, .. }));

        let ledger = RunLedger::open(Path::new(&config.output.ledger_path)).unwrap();
        let runs = ledger.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].stage, "discovery");
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert!(runs[0].error_message.is_some());
    }

    #[tokio::test]
    async fn test_failed_stage_keeps_partial_counters() {
        let dir = TempDir::new().unwrap();
        let config = create_test_config(&dir);
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .respond(
                &page_url(0),
                200,
                &catalog_page(&[("alpha", 2), ("beta", 2)], 0),
            )
            .respond(&item_url("alpha"), 200, &item_page("42", "Alpha"))
            .respond(&item_url("beta"), 200, &item_page("43", "Beta"));
        for slug in ["alpha", "beta"] {
            for index in 1..=2 {
                transport.respond(
                    &subitem_url(&item_url(slug), index),
                    200,
                    &chapter_page(index),
                );
            }
        }

        // A directory where beta's first chapter belongs makes its commit fail
        let store = FsCheckpointStore::new(&config.output.data_dir).unwrap();
        std::fs::create_dir_all(store.subitem_path("43", 1).unwrap()).unwrap();

        let coordinator =
            Coordinator::with_transport(config.clone(), "hash".to_string(), transport);
        let err = coordinator.run(Mode::All).await.unwrap_err();
        assert!(matches!(err, HarvestError::Storage(_)));

        let ledger = RunLedger::open(Path::new(&config.output.ledger_path)).unwrap();
        let runs = ledger.recent_runs(10).unwrap();
        let harvest = runs.iter().find(|run| run.stage == "harvest").unwrap();
        assert_eq!(harvest.status, RunStatus::Failed);
        assert_eq!(harvest.processed, 1);
        assert_eq!(harvest.subitems_fetched, 2);
        assert!(harvest.error_message.is_some());
    }

    #[tokio::test]
    async fn test_stale_runs_are_marked_interrupted() {
        let dir = TempDir::new().unwrap();
        let config = create_test_config(&dir);
        let stale_id = {
            let mut ledger = RunLedger::open(Path::new(&config.output.ledger_path)).unwrap();
            ledger.start_run(Stage::Harvest, "old").unwrap()
        };

        let coordinator =
            Coordinator::with_transport(config.clone(), "hash".to_string(), scripted_site());
        coordinator.run(Mode::Urls).await.unwrap();

        let ledger = RunLedger::open(Path::new(&config.output.ledger_path)).unwrap();
        assert_eq!(
            ledger.get_run(stale_id).unwrap().status,
            RunStatus::Interrupted
        );
    }
}
