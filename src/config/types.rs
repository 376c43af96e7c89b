//! Configuration type definitions and defaults

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::ConfigError;

/// Main configuration structure (`codelens.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory tree to analyze
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    /// Where reports are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Analysis cache document
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
    #[serde(default)]
    pub report_format: ReportFormat,
    /// Extension allow-list (with or without the leading dot)
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,
    /// Directory names skipped anywhere in the tree
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// Glob patterns matched against the path relative to `input_dir`
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Override of the provider's context window, in tokens
    #[serde(default)]
    pub context_window: Option<usize>,
    /// Chunk size in tokens for files over the context budget
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in tokens
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Number of parallel workers (None = auto-scale)
    #[serde(default)]
    pub workers: Option<usize>,
    /// Pause between successive provider calls of one worker
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Run pylint/bandit and attach their findings to prompts
    #[serde(default)]
    pub static_analysis: bool,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    /// Directory relative paths are resolved against (computed, not stored)
    #[serde(skip)]
    pub project_root: PathBuf,
}

pub fn default_input_dir() -> PathBuf {
    PathBuf::from(".")
}

pub fn default_output_dir() -> PathBuf {
    PathBuf::from("codelens-reports")
}

pub fn default_cache_file() -> PathBuf {
    PathBuf::from(".codelens-cache.json")
}

pub fn default_file_extensions() -> Vec<String> {
    [
        ".py", ".rs", ".js", ".ts", ".jsx", ".tsx", ".java", ".go", ".c", ".cpp", ".h", ".hpp",
        ".cs", ".rb", ".php", ".swift", ".kt", ".sh", ".sql",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_exclude_dirs() -> Vec<String> {
    [".git", "target", "node_modules", "__pycache__", ".venv", "venv", "dist", "build"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn default_chunk_size() -> usize {
    4_000
}

pub fn default_chunk_overlap() -> usize {
    200
}

pub fn default_request_delay_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            cache_file: default_cache_file(),
            report_format: ReportFormat::default(),
            file_extensions: default_file_extensions(),
            exclude_dirs: default_exclude_dirs(),
            exclude_patterns: Vec::new(),
            context_window: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            workers: None,
            request_delay_ms: default_request_delay_ms(),
            static_analysis: false,
            provider: ProviderConfig::default(),
            prompts: PromptsConfig::default(),
            project_root: PathBuf::from("."),
        }
    }
}

/// LLM provider configuration (`[provider]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend type: "openai", "gemini", "huggingface" or "claude-cli"
    #[serde(rename = "type", default = "default_provider_type")]
    pub kind: String,
    /// Model identifier (None = backend default)
    #[serde(default)]
    pub model: Option<String>,
    /// Credential, either literal or `env:VAR_NAME`
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    /// Per-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Attempts per provider call, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Base delay for exponential backoff
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Alternative API endpoint (proxies, compatible servers)
    #[serde(default)]
    pub base_url: Option<String>,
}

pub fn default_provider_type() -> String {
    "openai".to_string()
}

pub fn default_timeout() -> u64 {
    120
}

pub fn default_max_retries() -> usize {
    3
}

pub fn default_retry_base_delay_ms() -> u64 {
    1_000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_type(),
            model: None,
            api_key: None,
            temperature: 0.0,
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            base_url: None,
        }
    }
}

impl ProviderConfig {
    /// Resolve the credential using the process environment.
    pub fn resolve_api_key(&self, fallback_env: &[&str]) -> Result<Option<String>, ConfigError> {
        self.resolve_api_key_with(fallback_env, |name| std::env::var(name).ok())
    }

    /// Resolve the credential with a custom variable lookup.
    ///
    /// - `env:NAME` must resolve to a non-empty variable
    /// - a literal value is used as-is
    /// - no value falls back to the first set variable in `fallback_env`
    pub fn resolve_api_key_with<F>(
        &self,
        fallback_env: &[&str],
        lookup: F,
    ) -> Result<Option<String>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match self.api_key.as_deref() {
            Some(value) if value.starts_with("env:") => {
                let name = &value[4..];
                match lookup(name).filter(|v| !v.trim().is_empty()) {
                    Some(value) => Ok(Some(value)),
                    None => Err(ConfigError::MissingCredential {
                        provider: self.kind.clone(),
                        detail: format!("environment variable '{}' is not set", name),
                    }),
                }
            }
            Some(literal) if !literal.trim().is_empty() => Ok(Some(literal.to_string())),
            _ => Ok(fallback_env
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))),
        }
    }

    /// Credential shown with the secret part hidden.
    pub fn redacted_api_key(&self) -> String {
        match self.api_key.as_deref() {
            Some(value) if value.starts_with("env:") => value.to_string(),
            Some(_) => "********".to_string(),
            None => "(not set)".to_string(),
        }
    }
}

/// Prompt template overrides (`[prompts]`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Per-chunk analysis template (placeholders: {code}, {static_analysis_findings}, {file_path})
    #[serde(default)]
    pub analysis_template: Option<PathBuf>,
    /// Synthesis template (placeholders: {chunk_analyses_json}, {file_path})
    #[serde(default)]
    pub summary_template: Option<PathBuf>,
}

/// Output format of per-file reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Text,
    Json,
    #[default]
    Markdown,
}

impl ReportFormat {
    /// File extension used for report artifacts.
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            other => Err(ConfigError::Invalid(format!(
                "report_format must be 'text', 'json' or 'markdown', got '{}'",
                other
            ))),
        }
    }
}
