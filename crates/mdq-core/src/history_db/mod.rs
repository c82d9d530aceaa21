//! Task history database (SQLite via sqlx).
//!
//! One row per task: request parameters, priority, last known status and
//! progress, title and result path. The CLI queues work here between
//! invocations and mirrors scheduler events into it while running.

mod db;
mod types;

mod tasks {
    mod read;
    mod write;
}


pub use db::HistoryDb;
pub use types::HistoryRow;
