use mdq_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible; fall back to stderr.
    let log_guard = match logging::init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            logging::init_logging_stderr();
            tracing::warn!("file logging unavailable, using stderr: {:#}", e);
            None
        }
    };

    // Parse CLI and dispatch.
    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("mdq error: {:#}", err);
        drop(log_guard);
        std::process::exit(1);
    }
}
