//! Control socket: server (during `mdq run`) and client (for `mdq add`,
//! `mdq cancel`, `mdq retry`).
//! Protocol: one line per command: "submit <id>", "cancel <id>" or "retry <id>".

use anyhow::Result;
use mdq_core::history_db::HistoryDb;
use mdq_core::scheduler::PriorityScheduler;
use mdq_core::task::{StatusKind, TaskId};
use std::fmt;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// A row was queued in the history; pick it up if not tracked yet.
    Submit(TaskId),
    Cancel(TaskId),
    Retry(TaskId),
}

impl ControlCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let (verb, arg) = line.trim().split_once(' ')?;
        let id: TaskId = arg.trim().parse().ok()?;
        match verb {
            "submit" => Some(ControlCommand::Submit(id)),
            "cancel" => Some(ControlCommand::Cancel(id)),
            "retry" => Some(ControlCommand::Retry(id)),
            _ => None,
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Submit(id) => write!(f, "submit {id}"),
            ControlCommand::Cancel(id) => write!(f, "cancel {id}"),
            ControlCommand::Retry(id) => write!(f, "retry {id}"),
        }
    }
}

/// Spawns a task that listens on `path` and applies each command line to
/// `scheduler`. Ignores malformed lines.
pub fn spawn_control_listener(
    scheduler: PriorityScheduler,
    db: HistoryDb,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let handle = tokio::spawn(async move {
        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let _ = std::fs::remove_file(&path);
        let listener = match UnixListener::bind(&path) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(path = %path.display(), "control socket bind: {}", e);
                return;
            }
        };
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let scheduler = scheduler.clone();
                    let db = db.clone();
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            match ControlCommand::parse(&line) {
                                Some(cmd) => apply(&scheduler, &db, cmd).await,
                                None => tracing::debug!("control socket: ignoring {:?}", line),
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn apply(scheduler: &PriorityScheduler, db: &HistoryDb, cmd: ControlCommand) {
    tracing::debug!(command = %cmd, "control command");
    match cmd {
        ControlCommand::Cancel(id) => {
            if !scheduler.cancel(id) {
                tracing::debug!(task_id = %id, "cancel: not waiting or running here");
            }
        }
        ControlCommand::Retry(id) => {
            if !scheduler.retry(id) && scheduler.get(id).is_none() {
                submit_from_history(scheduler, db, id).await;
            }
        }
        ControlCommand::Submit(id) => {
            if scheduler.get(id).is_none() {
                submit_from_history(scheduler, db, id).await;
            }
        }
    }
}

/// Submits a queued history row the scheduler does not track yet.
async fn submit_from_history(scheduler: &PriorityScheduler, db: &HistoryDb, id: TaskId) {
    let row = match db.get_task(id).await {
        Ok(Some(row)) if row.status == StatusKind::Queued => row,
        Ok(_) => return,
        Err(e) => {
            tracing::warn!(task_id = %id, "control socket: load task: {:#}", e);
            return;
        }
    };
    if let Err(e) = scheduler.submit(row.to_task(), row.priority) {
        tracing::warn!(task_id = %id, "control socket: submit: {}", e);
    }
}

/// Sends one command line to a running `mdq run`. Returns `false` (and does
/// nothing) if no socket exists or nobody is listening.
pub async fn send_command(socket_path: &Path, cmd: ControlCommand) -> Result<bool> {
    if !socket_path.exists() {
        return Ok(false);
    }
    let mut stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(path = %socket_path.display(), "control socket connect: {}", e);
            return Ok(false);
        }
    };
    stream.write_all(format!("{cmd}\n").as_bytes()).await?;
    stream.shutdown().await?;
    Ok(true)
}

/// `send_command` against the default socket path; errors are logged, not returned.
pub async fn notify_running(cmd: ControlCommand) -> bool {
    let Ok(path) = mdq_core::control::default_control_socket_path() else {
        return false;
    };
    match send_command(&path, cmd).await {
        Ok(sent) => sent,
        Err(e) => {
            tracing::debug!("control socket send: {:#}", e);
            false
        }
    }
}
