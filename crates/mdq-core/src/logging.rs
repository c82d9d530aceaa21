//! Logging init: rolling file under XDG state dir, or graceful fallback to stderr.
//!
//! Files are named `mdq.YYYY-MM-DD.log`; the appender rolls over daily while
//! writing and keeps the newest three.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

const LOG_PREFIX: &str = "mdq";
const LOG_SUFFIX: &str = "log";
const MAX_LOG_FILES: usize = 3;
const DEFAULT_FILTER: &str = "info,mdq_core=debug,mdq=debug";

/// Initialize structured logging under `~/.local/state/mdq/`.
///
/// The returned guard flushes the background writer on drop; keep it alive
/// for the life of the process. On failure the caller can fall back to stderr.
pub fn init_logging() -> Result<WorkerGuard> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
    let log_dir = xdg_dirs.get_state_home();
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("create log dir {}", log_dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(file_appender(&log_dir)?);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install log subscriber: {e}"))?;

    tracing::info!("mdq logging initialized in {}", log_dir.display());
    Ok(guard)
}

/// Initialize logging to stderr only (no file). Use when init_logging() fails so the CLI doesn't crash.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn file_appender(dir: &Path) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("open log appender in {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn log_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn appender_writes_dated_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut appender = file_appender(dir.path()).unwrap();
        appender.write_all(b"task admitted\n").unwrap();
        appender.flush().unwrap();

        let files = log_files(dir.path());
        assert_eq!(files.len(), 1, "{files:?}");
        let name = &files[0];
        assert!(name.starts_with("mdq.") && name.ends_with(".log"), "{name}");
        let body = fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(body, "task admitted\n");
    }
}
