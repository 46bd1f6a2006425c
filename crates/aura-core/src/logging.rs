//! File logging via `tracing`.
//!
//! The full-screen UI owns the terminal, so logs go to a daily-rolling file
//! under `${AURA_HOME}/logs`. `AURA_LOG` overrides the configured filter.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogConfig;

pub const LOG_ENV: &str = "AURA_LOG";
const LOG_FILE_PREFIX: &str = "aura.log";

/// Keeps the background log writer alive; drop it at exit to flush.
#[must_use = "dropping the guard stops log output"]
#[derive(Debug, Default)]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

/// Filter from `AURA_LOG`, falling back to `default_level`.
///
/// # Errors
/// Returns an error if neither directive string parses.
pub fn build_filter(default_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .with_context(|| format!("Invalid log filter: {default_level}"))
}

/// Installs the global subscriber writing to `logs_dir`.
///
/// Does nothing when file logging is disabled.
///
/// # Errors
/// Returns an error if the directory cannot be created, the filter is
/// invalid, or a subscriber is already installed.
pub fn init(config: &LogConfig, logs_dir: &Path) -> Result<LogGuard> {
    if !config.file {
        return Ok(LogGuard::default());
    }

    fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(logs_dir)
        .with_context(|| format!("Failed to open log file in {}", logs_dir.display()))?;
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(build_filter(&config.level)?)
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(LogGuard {
        _worker: Some(worker),
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_disabled_logging_touches_nothing() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");
        let config = LogConfig {
            file: false,
            ..LogConfig::default()
        };
        let _guard = init(&config, &logs).unwrap();
        assert!(!logs.exists());
    }

    #[test]
    fn test_build_filter_accepts_directives() {
        assert!(build_filter("info,aura_core=debug").is_ok());
    }
}
