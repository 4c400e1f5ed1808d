//! Tracing subscriber setup
//!
//! Console output is filtered by verbosity. When the log directory can be
//! created, every event is also written as JSON to a daily-rotated file
//! (`{log_dir}/harvest.log.YYYY-MM-DD`).

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

const LOG_FILE_PREFIX: &str = "harvest.log";

/// Filter directives for a verbosity level; `RUST_LOG` overrides them
pub fn filter_directives(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "sumi_harvest=info,warn",
        1 => "sumi_harvest=debug,info",
        2 => "sumi_harvest=trace,debug",
        _ => "trace",
    }
}

/// Installs the global subscriber
///
/// The returned guard flushes the file writer when dropped and must be held
/// for the life of the process. `None` means console-only logging.
pub fn init(verbose: u8, quiet: bool, log_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(verbose, quiet)));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let dir_error = std::fs::create_dir_all(log_dir).err();
    let (file_layer, guard) = if dir_error.is_none() {
        let (writer, guard) = non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));
        let layer = fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(e) = dir_error {
        tracing::warn!(
            log_dir = %log_dir.display(),
            "Cannot create log directory, logging to console only: {}",
            e
        );
    }

    guard
}
