//! Supported platform patterns.

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    Instagram,
    Twitch,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Twitch => "twitch",
        }
    }
}

/// Instagram paths must start with one of these segments.
const INSTAGRAM_KINDS: &[&str] = &["p", "reel", "tv"];

/// Matches `url` against the supported platforms.
///
/// Accepted shapes: `http(s)://[www.]youtube.com/…`, `http(s)://[www.]youtu.be/…`,
/// `http(s)://[www.]instagram.com/{p,reel,tv}/…` and `http(s)://[www.]twitch.tv/…`,
/// with something after the host's slash. Explicit ports are not accepted.
pub fn classify(url: &Url) -> Option<Platform> {
    if !matches!(url.scheme(), "http" | "https") || url.port().is_some() {
        return None;
    }
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let tail = tail_after_root(url);
    if tail.is_empty() {
        return None;
    }

    match host {
        "youtube.com" | "youtu.be" => Some(Platform::YouTube),
        "twitch.tv" => Some(Platform::Twitch),
        "instagram.com" => {
            let (kind, rest) = tail.split_once('/')?;
            if INSTAGRAM_KINDS.contains(&kind) && !rest.is_empty() {
                Some(Platform::Instagram)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Everything after the leading `/` of the path, plus query and fragment.
fn tail_after_root(url: &Url) -> String {
    let mut tail = url.path().trim_start_matches('/').to_string();
    if let Some(q) = url.query() {
        tail.push('?');
        tail.push_str(q);
    }
    if let Some(f) = url.fragment() {
        tail.push('#');
        tail.push_str(f);
    }
    tail
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_str(s: &str) -> Option<Platform> {
        classify(&Url::parse(s).unwrap())
    }

    #[test]
    fn youtube_variants() {
        assert_eq!(classify_str("http://youtube.com/watch?v=1"), Some(Platform::YouTube));
        assert_eq!(classify_str("https://youtu.be/abc"), Some(Platform::YouTube));
        assert_eq!(classify_str("https://youtube.com/"), None);
        assert_eq!(classify_str("https://m.youtube.com/watch?v=1"), None);
    }

    #[test]
    fn youtube_query_only_counts_as_tail() {
        assert_eq!(classify_str("https://youtube.com/?v=1"), Some(Platform::YouTube));
    }

    #[test]
    fn instagram_requires_known_kind() {
        assert_eq!(classify_str("https://instagram.com/p/abc"), Some(Platform::Instagram));
        assert_eq!(classify_str("https://www.instagram.com/tv/abc"), Some(Platform::Instagram));
        assert_eq!(classify_str("https://instagram.com/someuser"), None);
        assert_eq!(classify_str("https://instagram.com/reel/"), None);
    }

    #[test]
    fn twitch_and_ports() {
        assert_eq!(classify_str("https://www.twitch.tv/somechannel"), Some(Platform::Twitch));
        assert_eq!(classify_str("https://twitch.tv:8443/somechannel"), None);
    }
}
