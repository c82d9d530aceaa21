//! `mdq config show` / `mdq config set-download-dir <path>`.

use anyhow::{Context, Result};
use mdq_core::config::{self, MdqConfig};
use std::path::Path;

pub fn run_config_show(cfg: &MdqConfig) -> Result<()> {
    if let Ok(path) = config::config_path() {
        println!("# {}", path.display());
    }
    print!("{}", toml::to_string_pretty(cfg).context("serialize config")?);
    Ok(())
}

pub fn run_config_set_download_dir(mut cfg: MdqConfig, path: &Path) -> Result<()> {
    let dir = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    cfg.download_dir = dir;
    cfg.ensure_dirs()?;
    cfg.save()?;
    println!("Download folder set to {}", cfg.download_dir.display());
    Ok(())
}
