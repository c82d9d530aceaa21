//! `mdq remove <id>` – drop a finished task from the history. Downloaded files are kept.

use anyhow::{bail, Result};
use mdq_core::history_db::HistoryDb;
use mdq_core::task::TaskId;

pub async fn run_remove(db: &HistoryDb, id: TaskId) -> Result<()> {
    if !db.remove_task(id).await? {
        match db.get_task(id).await? {
            Some(row) => bail!("task {id} is {}; cancel it first", row.status.as_str()),
            None => bail!("no task with id {id}"),
        }
    }
    println!("Removed task {id}");
    Ok(())
}
