//! Request parameters: what to fetch, in which format, at what priority.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scheduling priority. Lower numeric value is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High = 1,
    #[default]
    Normal = 2,
    Low = 3,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn from_rank(rank: i64) -> Option<Self> {
        match rank {
            1 => Some(Priority::High),
            2 => Some(Priority::Normal),
            3 => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "1" => Ok(Priority::High),
            "normal" | "2" => Ok(Priority::Normal),
            "low" | "3" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {other} (expected high, normal or low)")),
        }
    }
}

/// Output kind: a muxed video file or extracted audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    #[default]
    Video,
    Audio,
}

impl MediaFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaFormat::Video => "video",
            MediaFormat::Audio => "audio",
        }
    }

    /// Extension of the finished artifact.
    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Video => "mp4",
            MediaFormat::Audio => "mp3",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" | "mp4" => Ok(MediaFormat::Video),
            "audio" | "mp3" => Ok(MediaFormat::Audio),
            other => Err(format!("unknown format: {other} (expected video or audio)")),
        }
    }
}

/// Requested video resolution cap. Ignored for audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "8k")]
    P4320,
    #[serde(rename = "4k")]
    P2160,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "360p")]
    P360,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Best => "best",
            Resolution::P4320 => "8k",
            Resolution::P2160 => "4k",
            Resolution::P1080 => "1080p",
            Resolution::P720 => "720p",
            Resolution::P360 => "360p",
        }
    }

    /// Maximum frame height, or None for "best available".
    pub fn max_height(self) -> Option<u32> {
        match self {
            Resolution::Best => None,
            Resolution::P4320 => Some(4320),
            Resolution::P2160 => Some(2160),
            Resolution::P1080 => Some(1080),
            Resolution::P720 => Some(720),
            Resolution::P360 => Some(360),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best" => Ok(Resolution::Best),
            "8k" | "4320p" => Ok(Resolution::P4320),
            "4k" | "2160p" => Ok(Resolution::P2160),
            "1080p" => Ok(Resolution::P1080),
            "720p" => Ok(Resolution::P720),
            "360p" => Ok(Resolution::P360),
            other => Err(format!(
                "unknown resolution: {other} (expected best, 8k, 4k, 1080p, 720p or 360p)"
            )),
        }
    }
}

/// Immutable request parameters of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub format: MediaFormat,
    pub resolution: Resolution,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, format: MediaFormat, resolution: Resolution) -> Self {
        Self {
            url: url.into(),
            format,
            resolution,
        }
    }

    /// Video at best quality.
    pub fn video(url: impl Into<String>) -> Self {
        Self::new(url, MediaFormat::Video, Resolution::Best)
    }

    pub fn audio(url: impl Into<String>) -> Self {
        Self::new(url, MediaFormat::Audio, Resolution::Best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_high_first() {
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
        assert_eq!(Priority::High.rank(), 1);
        assert_eq!(Priority::Low.rank(), 3);
    }

    #[test]
    fn parse_choices() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("mp3".parse::<MediaFormat>().unwrap(), MediaFormat::Audio);
        assert_eq!("4K".parse::<Resolution>().unwrap(), Resolution::P2160);
        assert!("urgent".parse::<Priority>().is_err());
        assert!("480p".parse::<Resolution>().is_err());
    }

    #[test]
    fn resolution_heights() {
        assert_eq!(Resolution::Best.max_height(), None);
        assert_eq!(Resolution::P4320.max_height(), Some(4320));
        assert_eq!(Resolution::P360.max_height(), Some(360));
    }
}
