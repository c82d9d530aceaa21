//! CLI command handlers. Each command is in its own file.

mod add;
mod cancel;
mod clear;
mod config;
mod remove;
mod retry;
mod run;
mod status;

pub use add::run_add;
pub use cancel::run_cancel;
pub use clear::run_clear;
pub use config::{run_config_set_download_dir, run_config_show};
pub use remove::run_remove;
pub use retry::run_retry;
pub use run::run_scheduler;
pub use status::run_status;
