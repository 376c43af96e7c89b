//! codelens library
//!
//! Analyzes a source tree file by file with an LLM provider and keeps one
//! report per file, re-analyzing only files whose content changed.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod files;

pub use analyzer::{AnalysisCache, FileOrchestrator, RunSummary};
pub use config::{Config, ConfigError};
