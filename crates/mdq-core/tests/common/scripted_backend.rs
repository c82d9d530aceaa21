//! Fetch backend driven by per-URL scripts, with hold points the test releases.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use mdq_core::fetch::{FetchError, FetchJob, FetchOutcome, FetchProgress, FetchService, Flow};

#[derive(Debug, Clone)]
pub enum Step {
    Title(String),
    Bytes(u64, u64),
    /// Block until `release(key)` / `release_all()`, or until cancelled.
    Hold,
    Finished,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    /// Write the output file into staging and report it.
    File,
    /// Report success but never create the file.
    NoFile,
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct Script {
    pub steps: Vec<Step>,
    pub outcome: Outcome,
}

impl Script {
    pub fn ok() -> Self {
        Self {
            steps: vec![Step::Bytes(50, 100), Step::Bytes(100, 100), Step::Finished],
            outcome: Outcome::File,
        }
    }

    pub fn held() -> Self {
        Self {
            steps: vec![Step::Bytes(10, 100), Step::Hold, Step::Bytes(100, 100), Step::Finished],
            outcome: Outcome::File,
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            steps: vec![Step::Bytes(10, 100)],
            outcome: Outcome::Fail(msg.to_string()),
        }
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    /// Per key: one script per run; the last one repeats.
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    started: Mutex<Vec<String>>,
    released: Mutex<(HashSet<String>, bool)>,
    release_cv: Condvar,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, key: &str, runs: Vec<Script>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(key.to_string(), runs.into());
    }

    /// Keys in the order their runs started.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn release(&self, key: &str) {
        self.released.lock().unwrap().0.insert(key.to_string());
        self.release_cv.notify_all();
    }

    pub fn release_all(&self) {
        self.released.lock().unwrap().1 = true;
        self.release_cv.notify_all();
    }

    fn next_script(&self, key: &str) -> Script {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(key) {
            Some(runs) if runs.len() > 1 => runs.pop_front().unwrap(),
            Some(runs) => runs.front().cloned().unwrap_or_else(Script::ok),
            None => Script::ok(),
        }
    }

    /// Waits for release; keeps calling back so a cancel is observed.
    fn hold(&self, key: &str, on_progress: &mut dyn FnMut(FetchProgress) -> Flow) -> Flow {
        let mut released = self.released.lock().unwrap();
        loop {
            if released.1 || released.0.contains(key) {
                return Flow::Continue;
            }
            drop(released);
            let flow = on_progress(FetchProgress::Bytes {
                downloaded: 0,
                total: None,
            });
            if flow == Flow::Abort {
                return Flow::Abort;
            }
            released = self.released.lock().unwrap();
            released = self
                .release_cv
                .wait_timeout(released, Duration::from_millis(5))
                .unwrap()
                .0;
        }
    }

    fn run_script(
        &self,
        key: &str,
        job: &FetchJob,
        on_progress: &mut dyn FnMut(FetchProgress) -> Flow,
    ) -> Result<FetchOutcome, FetchError> {
        let script = self.next_script(key);
        for step in script.steps {
            let flow = match step {
                Step::Title(t) => on_progress(FetchProgress::Title(t)),
                Step::Bytes(done, total) => on_progress(FetchProgress::Bytes {
                    downloaded: done,
                    total: Some(total),
                }),
                Step::Hold => self.hold(key, on_progress),
                Step::Finished => on_progress(FetchProgress::Finished),
            };
            if flow == Flow::Abort {
                return Err(FetchError::Aborted);
            }
        }
        let output = job.staging_dir.join(format!("{key}.mp4"));
        match script.outcome {
            Outcome::File => {
                fs::write(&output, key.as_bytes()).map_err(|e| FetchError::Failed(e.to_string()))?;
            }
            Outcome::NoFile => {}
            Outcome::Fail(msg) => return Err(FetchError::Failed(msg)),
        }
        Ok(FetchOutcome {
            output,
            title: Some(key.to_string()),
        })
    }
}

impl FetchService for ScriptedBackend {
    fn fetch(
        &self,
        job: &FetchJob,
        on_progress: &mut dyn FnMut(FetchProgress) -> Flow,
    ) -> Result<FetchOutcome, FetchError> {
        let key = job
            .request
            .url
            .rsplit('=')
            .next()
            .unwrap_or_default()
            .to_string();
        self.started.lock().unwrap().push(key.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let result = self.run_script(&key, job, on_progress);

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
