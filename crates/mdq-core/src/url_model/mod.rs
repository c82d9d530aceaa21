//! URL classification, pre-submission normalization and title sanitation.
//!
//! Only a fixed set of platforms is accepted: YouTube, Instagram
//! (post/reel/tv) and Twitch. Instagram post links are rewritten to reel
//! links before submission because the fetch backend handles reels more
//! reliably.

mod platform;
mod sanitize;

pub use platform::{classify, Platform};
pub use sanitize::sanitize_title;

use thiserror::Error;
use url::Url;

/// Why a URL was rejected at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("empty url")]
    Empty,
    #[error("malformed url: {0}")]
    Malformed(String),
    #[error("unsupported platform: {0}")]
    Unsupported(String),
}

/// Validates `url` and returns the platform it belongs to.
pub fn validate(url: &str) -> Result<Platform, UrlError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(UrlError::Empty);
    }
    let parsed = Url::parse(url).map_err(|e| UrlError::Malformed(format!("{url} ({e})")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(UrlError::Malformed(url.to_string()));
    }
    classify(&parsed).ok_or_else(|| UrlError::Unsupported(url.to_string()))
}

/// Trims the input and applies the Instagram `/p/` → `/reel/` rewrite.
///
/// Returns the input (trimmed) unchanged when it does not parse; validation
/// reports the problem later.
pub fn normalize_for_submission(url: &str) -> String {
    let trimmed = url.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    if classify(&parsed) != Some(Platform::Instagram) {
        return trimmed.to_string();
    }
    let segments: Vec<String> = match parsed.path_segments() {
        Some(s) => s.map(str::to_string).collect(),
        None => return trimmed.to_string(),
    };
    if segments.first().map(String::as_str) != Some("p") {
        return trimmed.to_string();
    }
    let rest = segments[1..].join("/");
    parsed.set_path(&format!("/reel/{rest}"));
    tracing::info!(url = %parsed, "instagram post link rewritten to reel");
    parsed.to_string()
}
