//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over `logging.level` when set. With `logging.directory`
//! configured, output goes to a daily rolling file through a non-blocking
//! writer; keep the returned guard alive or buffered lines are lost on exit.

use crate::infrastructure::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "doc-vault.log";

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = env_filter(config);

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            let installed = if config.json {
                builder.json().try_init().is_ok()
            } else {
                builder.try_init().is_ok()
            };
            if installed {
                tracing::info!(directory = %directory.display(), "File logging initialized");
            }
            Some(guard)
        }
        None => {
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false);
            let _ = if config.json {
                builder.json().try_init()
            } else {
                builder.try_init()
            };
            None
        }
    }
}
