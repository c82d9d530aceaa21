use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retry policy parameters for transient fetch failures (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of backend runs per task run (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 2.0).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2.0,
            max_delay_secs: 30,
        }
    }
}

/// Options passed to the fetch backend. None of these are visible to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Backend executable (looked up on PATH when not absolute).
    pub program: PathBuf,
    /// Network retries inside the backend.
    pub retries: u32,
    pub fragment_retries: u32,
    pub http_chunk_size: u64,
    /// Parallel fragment downloads for Twitch streams.
    pub twitch_concurrent_fragments: u32,
    pub no_check_certificate: bool,
    /// Audio bitrate (kbit/s) for mp3 extraction.
    pub audio_quality_kbps: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            retries: 10,
            fragment_retries: 10,
            http_chunk_size: 1024 * 1024,
            twitch_concurrent_fragments: 4,
            no_check_certificate: true,
            audio_quality_kbps: 192,
        }
    }
}

/// Bounded wait for the finished artifact to appear on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputWaitConfig {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl Default for OutputWaitConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval_ms: 1000,
        }
    }
}

impl OutputWaitConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Global configuration loaded from `~/.config/mdq/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MdqConfig {
    /// Where finished files are moved.
    pub download_dir: PathBuf,
    /// Staging directory the backend writes into before the move.
    /// Defaults to `~/.local/state/mdq/staging` when unset.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    /// Maximum number of tasks downloading or processing at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub output_wait: OutputWaitConfig,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_max_concurrent() -> usize {
    3
}

impl Default for MdqConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            temp_dir: None,
            max_concurrent: default_max_concurrent(),
            fetch: FetchConfig::default(),
            output_wait: OutputWaitConfig::default(),
            retry: None,
        }
    }
}

/// Platform Downloads folder, or `$HOME/Downloads`, or `./Downloads` as a last resort.
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}

impl MdqConfig {
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Staging directory, falling back to the XDG state dir.
    pub fn staging_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.temp_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
        Ok(xdg_dirs.get_state_home().join("staging"))
    }

    /// Create the download and staging directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.download_dir).with_context(|| {
            format!("create download dir: {}", self.download_dir.display())
        })?;
        let staging = self.staging_dir()?;
        fs::create_dir_all(&staging)
            .with_context(|| format!("create staging dir: {}", staging.display()))?;
        Ok(())
    }

    /// Write this config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write config: {}", path.display()))?;
        Ok(())
    }

    /// Write this config to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MdqConfig> {
    load_or_init_at(&config_path()?)
}

/// Same as [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<MdqConfig> {
    if !path.exists() {
        let default_cfg = MdqConfig::default();
        default_cfg.save_to(path)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: MdqConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
