//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest catalog harvester.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::crawler::{Coordinator, Mode};
use sumi_harvest::output::{load_statistics, print_statistics};
use sumi_harvest::storage::{FsCheckpointStore, RunLedger};

const STATS_RUN_LIMIT: usize = 10;

/// Sumi-Harvest: a polite, resumable catalog harvester
///
/// Sumi-Harvest walks a paginated catalog, enriches every listed work with
/// its detail page, and downloads its chapters. Every stage checkpoints its
/// progress, so an interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite, resumable catalog harvester", long_about = None)]
struct Cli {
    /// Stages to run
    #[arg(value_enum, default_value_t = Mode::All)]
    mode: Mode,

    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would run without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the checkpoints and the run ledger and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_config_with_hash(cli.config.as_deref())
        .context("Failed to load configuration")?;

    // Held until exit so buffered file events are flushed
    let _log_guard =
        sumi_harvest::logging::init(cli.verbose, cli.quiet, Path::new(&config.output.log_dir));

    match &cli.config {
        Some(path) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            path.display(),
            config_hash
        ),
        None => tracing::info!("Using built-in configuration"),
    }

    if cli.dry_run {
        handle_dry_run(&config, cli.mode);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_harvest(config, config_hash, cli.mode).await
    }
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, mode: Mode) {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Catalog path: {}", config.site.catalog_path);
    println!("  Default category: {}", config.site.default_category);

    println!("\nScheduler:");
    println!(
        "  Requests per second: {}",
        config.scheduler.requests_per_second
    );
    println!("  Max retries: {}", config.scheduler.max_retries);
    println!(
        "  Base retry delay: {}ms",
        config.scheduler.base_retry_delay_ms
    );
    println!(
        "  Request timeout: {}s",
        config.scheduler.request_timeout_secs
    );
    println!("  Respect robots.txt: {}", config.scheduler.respect_robots);
    println!(
        "  Identities: {}",
        config.identity_profiles().len()
    );

    println!("\nItem delay:");
    println!(
        "  {}ms - {}ms",
        config.delays.min_item_delay_ms, config.delays.max_item_delay_ms
    );

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_dir);
    println!("  Run ledger: {}", config.output.ledger_path);
    println!("  Logs: {}", config.output.log_dir);

    println!("\n✓ Configuration is valid");
    let stages: Vec<&str> = mode.stages().iter().map(|stage| stage.as_str()).collect();
    println!("✓ Would run: {}", stages.join(" -> "));
}

/// Handles the --stats mode: catalog snapshot plus recent runs
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Data directory: {}", config.output.data_dir);
    println!("Run ledger: {}\n", config.output.ledger_path);

    let store = FsCheckpointStore::new(&config.output.data_dir)?;
    let ledger = RunLedger::open(Path::new(&config.output.ledger_path))?;

    let stats = load_statistics(&store, &ledger, STATS_RUN_LIMIT)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: String, mode: Mode) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config, config_hash)?;

    match coordinator.run(mode).await {
        Ok(summaries) => {
            for summary in &summaries {
                println!("{}", summary);
            }
            tracing::info!("Harvest completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
