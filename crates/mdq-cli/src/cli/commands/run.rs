//! `mdq run` – run queued tasks through the priority scheduler until idle.

use anyhow::{Context, Result};
use mdq_core::config::MdqConfig;
use mdq_core::events::TaskEvent;
use mdq_core::fetch::YtDlpBackend;
use mdq_core::history_db::HistoryDb;
use mdq_core::scheduler::{PriorityScheduler, SchedulerOptions};
use mdq_core::task::{StatusKind, TaskId, TaskStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::control_socket;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run_scheduler(db: &HistoryDb, cfg: &MdqConfig, jobs: Option<usize>) -> Result<()> {
    let recovered = db.recover_running().await?;
    if recovered > 0 {
        tracing::info!("recovered {} task(s) from previous run", recovered);
    }
    let queued = db.list_queued().await?;
    if queued.is_empty() {
        println!("No queued tasks.");
        return Ok(());
    }

    cfg.ensure_dirs()?;
    let mut opts = SchedulerOptions::from_config(cfg)?;
    if let Some(n) = jobs {
        opts.max_concurrent = n;
    }
    let backend = Arc::new(YtDlpBackend::from_config(cfg));
    let scheduler = PriorityScheduler::new(backend, opts);
    tracing::info!(
        max_concurrent = scheduler.max_concurrent(),
        queued = queued.len(),
        "starting run"
    );

    // Subscribe before submitting so no event is missed.
    let mut events = scheduler.subscribe();
    let writer_db = db.clone();
    let consumer = tokio::spawn(async move {
        let mut printer = ProgressPrinter::default();
        while let Some(ev) = events.recv().await {
            if let Err(e) = writer_db.record_event(&ev).await {
                tracing::warn!(task_id = %ev.task_id, "history update failed: {:#}", e);
            }
            printer.print(&ev);
        }
    });

    let socket_path = mdq_core::control::default_control_socket_path().ok();
    let listener = socket_path.as_ref().and_then(|path| {
        control_socket::spawn_control_listener(scheduler.clone(), db.clone(), path)
            .inspect(|_| tracing::debug!(path = %path.display(), "control socket listening"))
            .ok()
    });

    for row in queued {
        if let Err(e) = scheduler.submit(row.to_task(), row.priority) {
            tracing::warn!(task_id = %row.id, "not queued: {}", e);
            db.record_event(&TaskEvent {
                task_id: row.id,
                progress: 0.0,
                status: TaskStatus::failed(e.to_string()),
                title: None,
                message: None,
            })
            .await?;
        }
    }

    let interrupt = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("Interrupted, cancelling tasks...");
                scheduler.cancel_all();
            }
        })
    };

    let waiter = scheduler.clone();
    tokio::task::spawn_blocking(move || waiter.wait_idle())
        .await
        .context("wait for scheduler")?;

    interrupt.abort();
    if let Some(handle) = listener {
        handle.abort();
    }
    if let Some(path) = socket_path {
        let _ = std::fs::remove_file(path);
    }
    scheduler.close_events();
    consumer.await.context("event consumer")?;

    let mut counts: HashMap<StatusKind, usize> = HashMap::new();
    for t in scheduler.snapshot() {
        *counts.entry(t.status.kind()).or_default() += 1;
    }
    let count = |k: StatusKind| counts.get(&k).copied().unwrap_or(0);
    println!(
        "Done: {} completed, {} failed, {} cancelled",
        count(StatusKind::Completed),
        count(StatusKind::Failed),
        count(StatusKind::Cancelled)
    );
    tracing::info!("run finished");
    Ok(())
}

/// Prints status changes immediately and progress at most every 500 ms per task.
#[derive(Default)]
struct ProgressPrinter {
    last: HashMap<TaskId, (StatusKind, Instant)>,
}

impl ProgressPrinter {
    fn print(&mut self, ev: &TaskEvent) {
        let now = Instant::now();
        let kind = ev.status.kind();
        let due = match self.last.get(&ev.task_id) {
            Some((prev, at)) => *prev != kind || now.duration_since(*at) >= PROGRESS_INTERVAL,
            None => true,
        };
        if !due && ev.message.is_none() {
            return;
        }
        self.last.insert(ev.task_id, (kind, now));

        let name = ev.title.as_deref().unwrap_or("");
        match &ev.status {
            TaskStatus::Completed { path } => {
                println!("[{}] completed  {}", ev.task_id, path.display())
            }
            TaskStatus::Failed { reason } => println!("[{}] failed     {}", ev.task_id, reason),
            TaskStatus::Cancelled => println!("[{}] cancelled", ev.task_id),
            _ => match &ev.message {
                Some(msg) => println!("[{}] {:<10} {}", ev.task_id, kind.as_str(), msg),
                None => println!(
                    "[{}] {:<10} {:>5.1}%  {}",
                    ev.task_id,
                    kind.as_str(),
                    ev.progress,
                    name
                ),
            },
        }
    }
}
