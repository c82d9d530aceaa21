//! Cooperative cancellation tokens and the control socket location.
//!
//! Cancellation is never preemptive: the scheduler sets a task's token and
//! the worker observes it at the next callback from the fetch backend (or the
//! next poll while waiting for the output file). That callback is the upper
//! bound on cancel latency; a backend that stops calling back cannot be
//! cancelled.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancel flag for one run of a task. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the running worker will see it on its next check.
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Default path for the control socket used by `mdq run` (XDG state dir).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("mdq")?.get_state_home();
    Ok(dir.join("control.sock"))
}
