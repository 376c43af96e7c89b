//! Config subcommands handler

use std::path::Path;

use anyhow::{Context, Result};

use codelens::Config;

/// Print the effective configuration as TOML, with the credential redacted.
#[cfg(not(tarpaulin_include))]
pub fn handle_show(config_path: Option<&Path>) -> Result<()> {
    let path = super::config_path(config_path);
    let config = super::load_config(config_path)?;
    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# {} not found, showing defaults", path.display());
    }
    println!("{}", render_redacted(&config)?);
    Ok(())
}

/// Write the commented starter config.
#[cfg(not(tarpaulin_include))]
pub fn handle_init(config_path: Option<&Path>) -> Result<()> {
    let path = super::config_path(config_path);
    Config::write_template(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// TOML for a config with the API key replaced by its redacted form.
fn render_redacted(config: &Config) -> Result<String> {
    let mut shown = config.clone();
    if shown.provider.api_key.is_some() {
        shown.provider.api_key = Some(config.provider.redacted_api_key());
    }
    toml::to_string_pretty(&shown).context("Failed to serialize config")
}
