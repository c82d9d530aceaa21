//! Shared fixtures for scheduler integration tests.

#![allow(dead_code)]

pub mod scripted_backend;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mdq_core::config::OutputWaitConfig;
use mdq_core::scheduler::{PriorityScheduler, SchedulerOptions};

pub use scripted_backend::{Outcome, Script, ScriptedBackend, Step};

pub const WAIT: Duration = Duration::from_secs(10);

/// Scheduler over `backend` with download/staging dirs inside `dir`.
pub fn scheduler(dir: &Path, backend: &Arc<ScriptedBackend>, max_concurrent: usize) -> PriorityScheduler {
    scheduler_with_wait(
        dir,
        backend,
        max_concurrent,
        OutputWaitConfig {
            attempts: 3,
            interval_ms: 10,
        },
    )
}

pub fn scheduler_with_wait(
    dir: &Path,
    backend: &Arc<ScriptedBackend>,
    max_concurrent: usize,
    output_wait: OutputWaitConfig,
) -> PriorityScheduler {
    let download_dir = dir.join("downloads");
    let staging_dir = dir.join("staging");
    fs::create_dir_all(&download_dir).unwrap();
    fs::create_dir_all(&staging_dir).unwrap();
    PriorityScheduler::new(
        backend.clone(),
        SchedulerOptions {
            max_concurrent,
            download_dir,
            staging_dir,
            output_wait,
        },
    )
}

/// YouTube URL whose video id is `key`; the scripted backend is keyed by it.
pub fn url(key: &str) -> String {
    format!("https://www.youtube.com/watch?v={key}")
}

/// Polls `cond` until it holds or `WAIT` passes.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}
