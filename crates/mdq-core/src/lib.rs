pub mod config;
pub mod logging;

pub mod control;
pub mod events;
pub mod fetch;
pub mod history_db;
pub mod retry;
pub mod scheduler;
pub mod storage;
pub mod task;
pub mod url_model;
