//! Output file lifecycle: wait for the backend's artifact, then move it into
//! the download directory.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::OutputWaitConfig;
use crate::control::CancelToken;

/// Result of waiting for the finished artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Found,
    Missing,
    Cancelled,
}

/// Polls for `path` up to `wait.attempts` times, sleeping `wait.interval()`
/// between checks. The cancel token is checked before every poll.
pub fn wait_for_output(path: &Path, wait: &OutputWaitConfig, cancel: &CancelToken) -> WaitOutcome {
    let attempts = wait.attempts.max(1);
    for attempt in 1..=attempts {
        if cancel.is_requested() {
            return WaitOutcome::Cancelled;
        }
        if path.is_file() {
            return WaitOutcome::Found;
        }
        if attempt < attempts {
            tracing::debug!(path = %path.display(), attempt, "output not there yet");
            std::thread::sleep(wait.interval());
        }
    }
    if cancel.is_requested() {
        WaitOutcome::Cancelled
    } else {
        WaitOutcome::Missing
    }
}

/// First free name in `dir` for `file_name`: `name.ext`, `name (1).ext`, `name (2).ext`, …
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = as_path.extension().map(|e| e.to_string_lossy().into_owned());
    let mut n = 1u32;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Moves `src` into `dir` under `file_name` (or a free variant of it).
///
/// Uses rename; falls back to copy + remove when source and destination are
/// on different filesystems.
pub fn move_into_dir(src: &Path, dir: &Path, file_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create download dir: {}", dir.display()))?;
    let dest = unique_destination(dir, file_name);
    match fs::rename(src, &dest) {
        Ok(()) => {}
        Err(e) if is_cross_device(&e) => {
            tracing::debug!(src = %src.display(), "rename crossed filesystems, copying");
            fs::copy(src, &dest)
                .with_context(|| format!("copy {} to {}", src.display(), dest.display()))?;
            fs::remove_file(src)
                .with_context(|| format!("remove staged file: {}", src.display()))?;
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("move {} to {}", src.display(), dest.display())
            })
        }
    }
    Ok(dest)
}

fn is_cross_device(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::CrossesDevices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_wait(attempts: u32) -> OutputWaitConfig {
        OutputWaitConfig {
            attempts,
            interval_ms: 5,
        }
    }

    #[test]
    fn wait_finds_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("clip.mp4");
        fs::write(&f, b"x").unwrap();
        assert_eq!(
            wait_for_output(&f, &quick_wait(3), &CancelToken::new()),
            WaitOutcome::Found
        );
    }

    #[test]
    fn wait_reports_missing_after_bound() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("never.mp4");
        assert_eq!(
            wait_for_output(&f, &quick_wait(3), &CancelToken::new()),
            WaitOutcome::Missing
        );
    }

    #[test]
    fn wait_observes_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancelToken::new();
        token.request();
        assert_eq!(
            wait_for_output(&dir.path().join("x"), &quick_wait(3), &token),
            WaitOutcome::Cancelled
        );
    }

    #[test]
    fn unique_destination_adds_counter() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_destination(dir.path(), "a.mp4"), dir.path().join("a.mp4"));
        fs::write(dir.path().join("a.mp4"), b"1").unwrap();
        fs::write(dir.path().join("a (1).mp4"), b"2").unwrap();
        assert_eq!(
            unique_destination(dir.path(), "a.mp4"),
            dir.path().join("a (2).mp4")
        );
    }

    #[test]
    fn move_into_dir_moves_file() {
        let staging = tempfile::tempdir().unwrap();
        let downloads = tempfile::tempdir().unwrap();
        let src = staging.path().join("song.mp3");
        fs::write(&src, b"audio").unwrap();

        let dest = move_into_dir(&src, downloads.path(), "song.mp3").unwrap();
        assert_eq!(dest, downloads.path().join("song.mp3"));
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"audio");
    }

    #[test]
    fn cross_device_errors_are_recognized() {
        assert!(is_cross_device(&io::Error::from(io::ErrorKind::CrossesDevices)));
        assert!(!is_cross_device(&io::Error::from(io::ErrorKind::PermissionDenied)));
        #[cfg(target_os = "linux")]
        assert!(is_cross_device(&io::Error::from_raw_os_error(18)));
    }
}
