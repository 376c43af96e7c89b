//! Cache subcommands handler

use std::path::Path;

use anyhow::{Context, Result};

use codelens::analyzer::AnalysisCache;

/// List cached files with their fingerprints and report locations.
#[cfg(not(tarpaulin_include))]
pub fn handle_status(config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let cache = AnalysisCache::load(config.cache_path());
    println!("Cache: {}", cache.path().display());
    if cache.is_empty() {
        println!("  (empty)");
        return Ok(());
    }

    let entries = cache.snapshot();
    let mut stale = 0;
    for (rel_path, entry) in &entries {
        let marker = if entry.report_path.exists() {
            " "
        } else {
            stale += 1;
            "!"
        };
        println!(
            "{} {}  {}  {}",
            marker,
            short_hash(entry.fingerprint.as_str()),
            entry.analyzed_at.format("%Y-%m-%d %H:%M"),
            rel_path
        );
    }
    println!("{} file(s) cached", entries.len());
    if stale > 0 {
        println!("{} report(s) missing (marked !), those files will be re-analyzed", stale);
    }
    Ok(())
}

/// Delete every cache entry and the cache file.
#[cfg(not(tarpaulin_include))]
pub fn handle_clear(config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let cache = AnalysisCache::load(config.cache_path());
    let removed = cache
        .clear()
        .with_context(|| format!("Failed to clear {}", cache.path().display()))?;
    println!("Removed {} cache entr{}", removed, if removed == 1 { "y" } else { "ies" });
    Ok(())
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
