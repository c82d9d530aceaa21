//! `mdq add <url>` – validate and queue a download.

use anyhow::{Context, Result};
use mdq_core::history_db::HistoryDb;
use mdq_core::task::{DownloadRequest, MediaFormat, Priority, Resolution};
use mdq_core::url_model;

use crate::cli::control_socket::{self, ControlCommand};

/// Builds the request as it will be stored: trimmed URL, Instagram posts
/// rewritten to reels, platform checked.
pub(crate) fn prepare_request(
    url: &str,
    audio: bool,
    resolution: Resolution,
) -> Result<(DownloadRequest, url_model::Platform)> {
    let url = url_model::normalize_for_submission(url);
    let platform = url_model::validate(&url).with_context(|| format!("cannot queue {url:?}"))?;
    let format = if audio {
        MediaFormat::Audio
    } else {
        MediaFormat::Video
    };
    Ok((DownloadRequest::new(url, format, resolution), platform))
}

pub async fn run_add(
    db: &HistoryDb,
    url: &str,
    audio: bool,
    resolution: Resolution,
    priority: Priority,
) -> Result<()> {
    let (request, platform) = prepare_request(url, audio, resolution)?;
    let id = db.add_task(&request, priority).await?;
    println!(
        "Added task {id} ({}, {}, {} priority): {}",
        platform.as_str(),
        request.format,
        priority,
        request.url
    );
    if control_socket::notify_running(ControlCommand::Submit(id)).await {
        tracing::debug!(task_id = %id, "handed to running scheduler");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instagram_post_is_stored_as_reel() {
        let (req, platform) =
            prepare_request(" https://www.instagram.com/p/XyZ/ ", true, Resolution::Best).unwrap();
        assert_eq!(req.url, "https://www.instagram.com/reel/XyZ/");
        assert_eq!(req.format, MediaFormat::Audio);
        assert_eq!(platform, url_model::Platform::Instagram);
    }

    #[test]
    fn unsupported_url_is_refused() {
        assert!(prepare_request("https://example.com/a.mp4", false, Resolution::Best).is_err());
        assert!(prepare_request("", false, Resolution::Best).is_err());
    }
}
