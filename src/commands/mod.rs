//! Command handlers for the codelens CLI.
//!
//! Each submodule handles a specific CLI command or command group.
//! The main dispatch logic remains in main.rs.

pub mod analyze;
pub mod cache;
pub mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use codelens::config::CONFIG_FILE_NAME;
use codelens::Config;

/// Config file in use: `--config` or `codelens.toml` in the working directory.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Load the config, failing if an explicit `--config` file is missing.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = config_path(explicit);
    if explicit.is_some() && !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }
    Config::load_from(&path).with_context(|| format!("Failed to load {}", path.display()))
}
