//! `mdq cancel <id>` – cancel a queued task, or signal a running `mdq run`.

use anyhow::{bail, Result};
use mdq_core::history_db::HistoryDb;
use mdq_core::task::{StatusKind, TaskId};

use crate::cli::control_socket::{self, ControlCommand};

pub async fn run_cancel(db: &HistoryDb, id: TaskId) -> Result<()> {
    let Some(row) = db.get_task(id).await? else {
        bail!("no task with id {id}");
    };
    if row.status.is_terminal() {
        bail!("task {id} already {}", row.status.as_str());
    }
    let signalled = control_socket::notify_running(ControlCommand::Cancel(id)).await;
    match row.status {
        StatusKind::Queued => {
            db.cancel_queued(id).await?;
            println!("Cancelled task {id}");
        }
        _ if signalled => println!("Cancel requested for task {id}"),
        _ => println!("Task {id} is marked {} but no `mdq run` is active", row.status.as_str()),
    }
    Ok(())
}
