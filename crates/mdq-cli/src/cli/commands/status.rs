//! `mdq status` – show all tasks.

use anyhow::Result;
use mdq_core::history_db::{HistoryDb, HistoryRow};
use mdq_core::task::StatusKind;

pub async fn run_status(db: &HistoryDb, json: bool) -> Result<()> {
    let rows = db.list_tasks().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No tasks in history.");
        return Ok(());
    }
    println!(
        "{:<6} {:<12} {:<7} {:>6} {:<6} {}",
        "ID", "STATUS", "PRIO", "PCT", "FMT", "TITLE / URL"
    );
    for r in &rows {
        println!(
            "{:<6} {:<12} {:<7} {:>5.1}% {:<6} {}",
            r.id,
            r.status.as_str(),
            r.priority.as_str(),
            r.progress,
            r.request.format.as_str(),
            describe(r)
        );
    }
    Ok(())
}

fn describe(r: &HistoryRow) -> String {
    let name = r.title.as_deref().unwrap_or(&r.request.url);
    match r.status {
        StatusKind::Failed => format!("{name} ({})", r.reason.as_deref().unwrap_or("unknown error")),
        StatusKind::Completed => match &r.result_path {
            Some(p) => format!("{name} -> {}", p.display()),
            None => name.to_string(),
        },
        _ => name.to_string(),
    }
}
