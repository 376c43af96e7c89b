//! CLI definitions for codelens
//!
//! This module contains the clap CLI structure definitions, separated from
//! main.rs so the command tree can be inspected in tests.

use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};

use crate::config::ReportFormat;

/// Build clap styles.
///
/// - Green: headers, usage, command names
/// - White: descriptions, placeholders (light gray on dark terminals)
pub fn build_cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::White.on_default())
        .valid(AnsiColor::White.on_default())
        .invalid(AnsiColor::Red.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
}

/// Version string: package version plus the git commit for dev builds.
pub fn version_string() -> &'static str {
    #[cfg(not(feature = "release"))]
    {
        concat!(env!("CARGO_PKG_VERSION"), "-", env!("VERGEN_GIT_SHA"))
    }
    #[cfg(feature = "release")]
    {
        env!("CARGO_PKG_VERSION")
    }
}

#[derive(Parser)]
#[command(name = "codelens")]
#[command(about = "[ codelens ] - analyze a source tree with an LLM and keep per-file reports current")]
#[command(
    long_about = "codelens - analyze source files with an LLM provider.

Each matching file under the input directory is analyzed and a report is
written to the output directory, mirroring the source layout. A fingerprint
cache skips files that have not changed since their last report. Files too
large for the provider's context window are split into chunks and the chunk
results are synthesized into one report.

QUICK START:
    codelens config init               Write a starter codelens.toml
    codelens analyze                   Analyze ./ into ./codelens-reports
    codelens analyze --format json     Write JSON reports
    codelens cache status              Show cached files

Provider credentials are read from the config file, from `env:NAME`
references, or from the provider's conventional environment variable
(OPENAI_API_KEY, GEMINI_API_KEY, HUGGINGFACEHUB_API_TOKEN). A .env file is loaded
if present."
)]
#[command(version = version_string())]
#[command(styles = build_cli_styles())]
pub struct Cli {
    /// Path to the config file (default: ./codelens.toml)
    #[arg(long, short, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub debug: bool,

    /// Only log warnings and errors, no progress line
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze source files and write reports
    #[command(long_about = "Analyze every matching source file and write one report per file.

Unchanged files (same fingerprint as the cache, report still present) are
skipped. A failure in one file never stops the others; failed files are
listed in the summary and the command exits with status 1.

EXAMPLES:
    codelens analyze                          Use codelens.toml settings
    codelens analyze -i src -o reports        Override directories
    codelens analyze --workers 4 --no-cache   Re-analyze everything with 4 workers
    codelens analyze --static-analysis        Feed pylint/bandit findings to the model")]
    Analyze(AnalyzeArgs),

    /// Inspect or clear the analysis cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Overrides for one analysis run.
#[derive(Args, Debug, Default, Clone)]
pub struct AnalyzeArgs {
    /// Directory to analyze
    #[arg(long, short, value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Directory for reports
    #[arg(long, short, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report format
    #[arg(long, short, value_enum)]
    pub format: Option<ReportFormat>,

    /// Number of parallel workers (default: auto)
    #[arg(long, short, value_name = "N")]
    pub workers: Option<usize>,

    /// Ignore the cache and re-analyze every file
    #[arg(long)]
    pub no_cache: bool,

    /// Run pylint and bandit on Python files and include their findings
    #[arg(long)]
    pub static_analysis: bool,

    /// Provider type (openai, gemini, huggingface, claude-cli)
    #[arg(long, short, value_name = "TYPE")]
    pub provider: Option<String>,

    /// Model name for the provider
    #[arg(long, short, value_name = "MODEL")]
    pub model: Option<String>,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show cached files and their fingerprints
    Status,
    /// Delete all cache entries
    Clear,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a commented starter config file
    Init,
}
