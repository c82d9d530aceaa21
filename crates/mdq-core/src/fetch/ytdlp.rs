//! yt-dlp process backend.
//!
//! The program is run once per attempt with tagged print/progress templates
//! (see `progress.rs`). stdout lines are forwarded over a channel so the
//! cancel token can be polled while the process is quiet (e.g. during a
//! merge). stderr is drained on its own thread and its tail is used for the
//! failure message and for retry classification.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use url::Url;

use super::progress::{parse_line, BackendLine, FILE_TAG, PROGRESS_TAG, TITLE_TAG};
use super::{FetchError, FetchJob, FetchOutcome, FetchProgress, FetchService, Flow};
use crate::config::{FetchConfig, MdqConfig};
use crate::retry::{classify_backend_output, run_with_retry, ErrorKind, RetryPolicy};
use crate::task::{DownloadRequest, MediaFormat};
use crate::url_model::{classify, sanitize_title, Platform};

const LINE_POLL: Duration = Duration::from_millis(200);
const STDERR_TAIL_LINES: usize = 40;

/// Runs the yt-dlp executable named in `[fetch] program`.
#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    cfg: FetchConfig,
    retry: RetryPolicy,
}

impl YtDlpBackend {
    pub fn new(cfg: FetchConfig, retry: RetryPolicy) -> Self {
        Self { cfg, retry }
    }

    pub fn from_config(cfg: &MdqConfig) -> Self {
        Self::new(cfg.fetch.clone(), RetryPolicy::from(&cfg.retry_config()))
    }

    /// Command-line arguments for one run of `job`.
    pub fn build_args(&self, job: &FetchJob) -> Vec<OsString> {
        let req = &job.request;
        let mut args: Vec<OsString> = Vec::new();
        let mut push = |s: &str| args.push(OsString::from(s));

        push("--newline");
        push("--no-simulate");
        push("--progress");
        push("--no-playlist");
        push("--print");
        push(&format!("before_dl:{TITLE_TAG} %(title)s"));
        push("--print");
        push(&format!("after_move:{FILE_TAG} %(filepath)s"));
        push("--progress-template");
        push(&format!(
            "download:{PROGRESS_TAG} %(progress.status)s %(progress.downloaded_bytes)s \
             %(progress.total_bytes)s %(progress.total_bytes_estimate)s"
        ));
        push("--retries");
        push(&self.cfg.retries.to_string());
        push("--fragment-retries");
        push(&self.cfg.fragment_retries.to_string());
        push("--http-chunk-size");
        push(&self.cfg.http_chunk_size.to_string());
        if self.cfg.no_check_certificate {
            push("--no-check-certificates");
        }
        if is_twitch(&req.url) && self.cfg.twitch_concurrent_fragments > 1 {
            push("--concurrent-fragments");
            push(&self.cfg.twitch_concurrent_fragments.to_string());
        }
        match req.format {
            MediaFormat::Audio => {
                push("-f");
                push(&format_selector(req));
                push("--extract-audio");
                push("--audio-format");
                push("mp3");
                push("--audio-quality");
                push(&format!("{}K", self.cfg.audio_quality_kbps));
            }
            MediaFormat::Video => {
                push("-f");
                push(&format_selector(req));
                push("--merge-output-format");
                push("mp4");
            }
        }

        args.push(OsString::from("-o"));
        args.push(job.staging_dir.join("%(title)s.%(ext)s").into_os_string());
        args.push(OsString::from("--"));
        args.push(OsString::from(&req.url));
        args
    }

    fn run_once<F>(&self, job: &FetchJob, on_progress: &mut F) -> Result<FetchOutcome, FetchError>
    where
        F: FnMut(FetchProgress) -> Flow + ?Sized,
    {
        tracing::debug!(task_id = %job.task_id, program = %self.cfg.program.display(), "starting fetch backend");

        let mut command = Command::new(&self.cfg.program);
        command
            .args(self.build_args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group: terminal SIGINT is not delivered to it, and
        // `kill_and_reap` signals the whole group.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let mut child = command
            .spawn()
            .map_err(|e| {
                FetchError::Unavailable(format!("{}: {}", self.cfg.program.display(), e))
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            kill_and_reap(&mut child);
            return Err(FetchError::Failed("backend pipes unavailable".to_string()));
        };

        let (tx, rx) = mpsc::channel::<String>();
        let reader = thread::Builder::new()
            .name("mdq-ytdlp-out".to_string())
            .spawn(move || {
                for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = reader {
            kill_and_reap(&mut child);
            return Err(FetchError::Failed(format!("spawn output reader: {e}")));
        }
        let stderr_tail = match thread::Builder::new()
            .name("mdq-ytdlp-err".to_string())
            .spawn(move || collect_tail(stderr, STDERR_TAIL_LINES))
        {
            Ok(h) => h,
            Err(e) => {
                kill_and_reap(&mut child);
                return Err(FetchError::Failed(format!("spawn stderr reader: {e}")));
            }
        };

        let mut title: Option<String> = None;
        let mut reported: Option<PathBuf> = None;
        loop {
            if job.cancel.is_requested() {
                kill_and_reap(&mut child);
                return Err(FetchError::Aborted);
            }
            let line = match rx.recv_timeout(LINE_POLL) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            let flow = match parse_line(&line) {
                Some(BackendLine::Title(t)) => {
                    title = Some(t.clone());
                    on_progress(FetchProgress::Title(t))
                }
                Some(BackendLine::File(p)) => {
                    reported = Some(p);
                    Flow::Continue
                }
                Some(BackendLine::Downloading { downloaded, total }) => {
                    on_progress(FetchProgress::Bytes {
                        downloaded: downloaded.unwrap_or(0),
                        total,
                    })
                }
                Some(BackendLine::Finished) => on_progress(FetchProgress::Finished),
                None => {
                    tracing::trace!(task_id = %job.task_id, "yt-dlp: {}", line);
                    Flow::Continue
                }
            };
            if flow == Flow::Abort {
                kill_and_reap(&mut child);
                return Err(FetchError::Aborted);
            }
        }

        let status = child
            .wait()
            .map_err(|e| FetchError::Failed(format!("wait for backend: {e}")))?;
        let tail = stderr_tail.join().unwrap_or_default();

        if !status.success() {
            let message = failure_message(&tail, status, &self.cfg.program);
            let joined = tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n");
            return Err(match classify_backend_output(&joined) {
                ErrorKind::Other => FetchError::Failed(message),
                _ => FetchError::Transient(message),
            });
        }

        let output = expected_output(job, reported, title.as_deref());
        tracing::debug!(task_id = %job.task_id, output = %output.display(), "fetch backend finished");
        Ok(FetchOutcome { output, title })
    }
}

impl FetchService for YtDlpBackend {
    fn fetch(
        &self,
        job: &FetchJob,
        on_progress: &mut dyn FnMut(FetchProgress) -> Flow,
    ) -> Result<FetchOutcome, FetchError> {
        let result = run_with_retry(
            &self.retry,
            on_progress,
            |cb, attempt| {
                if attempt > 1 {
                    tracing::info!(task_id = %job.task_id, attempt, "retrying fetch");
                }
                self.run_once(job, cb)
            },
            |e| match e {
                FetchError::Transient(msg) => classify_backend_output(msg),
                _ => ErrorKind::Other,
            },
            |cb, attempt, delay| {
                tracing::warn!(task_id = %job.task_id, attempt, ?delay, "transient fetch failure");
                if cb(FetchProgress::Retrying { attempt, delay }) == Flow::Abort {
                    return false;
                }
                sleep_unless_cancelled(delay, job);
                !job.cancel.is_requested()
            },
        );
        match result {
            Err(FetchError::Transient(msg)) => Err(FetchError::Failed(msg)),
            Err(_) if job.cancel.is_requested() => Err(FetchError::Aborted),
            other => other,
        }
    }
}

/// yt-dlp format selector for a request.
pub fn format_selector(req: &DownloadRequest) -> String {
    match req.format {
        MediaFormat::Audio => "bestaudio/best".to_string(),
        MediaFormat::Video => match req.resolution.max_height() {
            None => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
            Some(h) => format!(
                "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}][ext=mp4]"
            ),
        },
    }
}

fn is_twitch(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| classify(&u))
        .is_some_and(|p| p == Platform::Twitch)
}

/// Final artifact path: the one yt-dlp printed, else `<staging>/<title>.<ext>`;
/// the extension always matches the requested format.
fn expected_output(job: &FetchJob, reported: Option<PathBuf>, title: Option<&str>) -> PathBuf {
    let ext = job.request.format.extension();
    let base = reported.unwrap_or_else(|| {
        let stem = title
            .map(sanitize_title)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("task-{}", job.task_id));
        job.staging_dir.join(stem)
    });
    with_forced_extension(&base, ext)
}

fn with_forced_extension(path: &Path, ext: &str) -> PathBuf {
    if path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)) {
        return path.to_path_buf();
    }
    // Titles may contain dots, so append rather than replace when the
    // current "extension" is not a known media one.
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp4" | "mkv" | "webm" | "m4a" | "mp3" | "opus" | "ogg") => path.with_extension(ext),
        _ => {
            let mut s = path.as_os_str().to_os_string();
            s.push(".");
            s.push(ext);
            PathBuf::from(s)
        }
    }
}

fn failure_message(tail: &[String], status: ExitStatus, program: &Path) -> String {
    tail.iter()
        .rev()
        .find_map(|l| l.trim().strip_prefix("ERROR:").map(|m| m.trim().to_string()))
        .or_else(|| tail.iter().rev().find(|l| !l.trim().is_empty()).map(|l| l.trim().to_string()))
        .unwrap_or_else(|| format!("{} exited with {}", program.display(), status))
}

fn collect_tail<R: Read>(r: R, keep: usize) -> Vec<String> {
    let mut tail = VecDeque::with_capacity(keep);
    for line in BufReader::new(r).lines().map_while(Result::ok) {
        if tail.len() == keep {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into()
}

/// Kills the backend and everything it started (ffmpeg for merges and
/// audio extraction), then reaps the backend.
fn kill_and_reap(child: &mut Child) {
    kill_process_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    // The backend leads its own group, so its pid is the group id. Must run
    // before `wait` so the id cannot have been reused.
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    let r = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if r != 0 {
        tracing::debug!(pgid, "killpg: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

fn sleep_unless_cancelled(delay: Duration, job: &FetchJob) {
    let deadline = Instant::now() + delay;
    while !job.cancel.is_requested() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(LINE_POLL));
    }
}
