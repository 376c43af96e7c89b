//! Prompt templates for chunk analysis and multi-chunk synthesis.
//!
//! Templates are opaque text with named placeholders. The built-in defaults
//! live in `src/analyzer/prompts/` and are compiled in; a config can point
//! either template at a file instead.

use std::fs;
use std::path::Path;

use crate::config::{Config, ConfigError};

/// Built-in per-chunk analysis template.
pub const DEFAULT_ANALYSIS_TEMPLATE: &str = include_str!("prompts/analysis.txt");

/// Built-in synthesis template.
pub const DEFAULT_SUMMARY_TEMPLATE: &str = include_str!("prompts/summary.txt");

/// Text used when no static analysis findings are attached.
const NO_FINDINGS: &str = "Static analysis findings: none provided.";

/// The pair of templates a provider fills before each call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    analysis: String,
    summary: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            analysis: DEFAULT_ANALYSIS_TEMPLATE.to_string(),
            summary: DEFAULT_SUMMARY_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    pub fn new(analysis: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            analysis: analysis.into(),
            summary: summary.into(),
        }
    }

    /// Load the templates named in `[prompts]`, falling back to the defaults.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut templates = Self::default();
        if let Some(path) = &config.prompts.analysis_template {
            templates.analysis = read_template(&config.resolve_path(path))?;
        }
        if let Some(path) = &config.prompts.summary_template {
            templates.summary = read_template(&config.resolve_path(path))?;
        }
        Ok(templates)
    }

    /// Fill the analysis template.
    ///
    /// The code is substituted last so placeholder-like text inside it is
    /// left alone.
    pub fn render_analysis(&self, code: &str, findings: Option<&str>, file_path: &str) -> String {
        let findings = match findings {
            Some(text) if !text.trim().is_empty() => text,
            _ => NO_FINDINGS,
        };
        self.analysis
            .replace("{file_path}", file_path)
            .replace("{static_analysis_findings}", findings)
            .replace("{code}", code)
    }

    /// Fill the synthesis template with the serialized chunk analyses.
    pub fn render_summary(&self, chunk_analyses_json: &str, file_path: &str) -> String {
        self.summary
            .replace("{file_path}", file_path)
            .replace("{chunk_analyses_json}", chunk_analyses_json)
    }
}

fn read_template(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
