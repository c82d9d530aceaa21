//! `mdq retry <id>` – queue a failed task again.

use anyhow::{bail, Result};
use mdq_core::history_db::HistoryDb;
use mdq_core::task::TaskId;

use crate::cli::control_socket::{self, ControlCommand};

pub async fn run_retry(db: &HistoryDb, id: TaskId) -> Result<()> {
    let Some(row) = db.get_task(id).await? else {
        bail!("no task with id {id}");
    };
    if !db.requeue_failed(id).await? {
        bail!("task {id} is {}; only failed tasks can be retried", row.status.as_str());
    }
    control_socket::notify_running(ControlCommand::Retry(id)).await;
    println!("Task {id} queued again ({} priority)", row.priority);
    Ok(())
}
