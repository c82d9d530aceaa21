//! CLI for the MDQ media download queue.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mdq_core::config;
use mdq_core::history_db::HistoryDb;
use mdq_core::scheduler::ClearMode;
use mdq_core::task::{Priority, Resolution, TaskId};
use std::path::PathBuf;

use commands::{
    run_add, run_cancel, run_clear, run_config_set_download_dir, run_config_show, run_remove,
    run_retry, run_scheduler, run_status,
};

/// Top-level CLI for the media download queue.
#[derive(Debug, Parser)]
#[command(name = "mdq")]
#[command(about = "MDQ: priority download queue for YouTube, Instagram and Twitch media", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a video (or audio with --audio) for download.
    Add {
        /// YouTube, Instagram (post/reel/tv) or Twitch URL.
        url: String,
        /// Extract audio as mp3 instead of downloading video.
        #[arg(long)]
        audio: bool,
        /// Maximum video height: best, 8k, 4k, 1080p, 720p or 360p.
        #[arg(long, default_value = "best", value_name = "R")]
        resolution: Resolution,
        /// high, normal or low.
        #[arg(long, default_value = "normal", value_name = "P")]
        priority: Priority,
    },

    /// Run queued tasks until the queue is empty.
    Run {
        /// Maximum concurrent downloads (defaults to max_concurrent from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
    },

    /// Show all tasks.
    Status {
        /// Print rows as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Cancel a queued or running task.
    Cancel {
        /// Task identifier.
        id: i64,
    },

    /// Queue a failed task again.
    Retry {
        /// Task identifier.
        id: i64,
    },

    /// Remove a finished task from the history.
    Remove {
        /// Task identifier.
        id: i64,
    },

    /// Remove completed, failed and cancelled tasks.
    Clear {
        /// Keep failed tasks so they can still be retried.
        #[arg(long)]
        keep_failed: bool,
    },

    /// Show or change configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Change the folder finished downloads are moved to.
    SetDownloadDir {
        path: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        // Config commands do not touch the history database.
        if let CliCommand::Config { action } = &cli.command {
            return match action {
                ConfigAction::Show => run_config_show(&cfg),
                ConfigAction::SetDownloadDir { path } => run_config_set_download_dir(cfg, path),
            };
        }

        let db = HistoryDb::open_default().await?;
        match cli.command {
            CliCommand::Add {
                url,
                audio,
                resolution,
                priority,
            } => run_add(&db, &url, audio, resolution, priority).await?,
            CliCommand::Run { jobs } => run_scheduler(&db, &cfg, jobs).await?,
            CliCommand::Status { json } => run_status(&db, json).await?,
            CliCommand::Cancel { id } => run_cancel(&db, TaskId(id)).await?,
            CliCommand::Retry { id } => run_retry(&db, TaskId(id)).await?,
            CliCommand::Remove { id } => run_remove(&db, TaskId(id)).await?,
            CliCommand::Clear { keep_failed } => {
                let mode = if keep_failed {
                    ClearMode::KeepFailed
                } else {
                    ClearMode::AllTerminal
                };
                run_clear(&db, mode).await?
            }
            CliCommand::Config { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
