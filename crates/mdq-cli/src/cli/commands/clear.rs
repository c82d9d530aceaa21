//! `mdq clear [--keep-failed]` – remove finished tasks from the history.

use anyhow::Result;
use mdq_core::history_db::HistoryDb;
use mdq_core::scheduler::ClearMode;

pub async fn run_clear(db: &HistoryDb, mode: ClearMode) -> Result<()> {
    let n = db.clear_finished(mode).await?;
    tracing::info!(removed = n, ?mode, "cleared finished tasks");
    println!("Cleared {n} task(s)");
    Ok(())
}
