//! LLM provider implementations for file analysis.
//!
//! This module provides the Strategy pattern for different LLM backends.
//! A backend only knows how to authenticate, estimate tokens and turn one
//! prompt into one response; [`LlmProvider`] layers the shared contract
//! (template filling, JSON extraction, error classification) on top.
//!
//! # Supported Backends
//!
//! - **openai**: Chat Completions API with `response_format: json_object`
//! - **gemini**: Generative Language API with `responseMimeType: application/json`
//! - **huggingface**: Inference API text generation (prompt-only JSON)
//! - **claude-cli**: `claude --print --output-format json` subprocess
//!
//! # Design
//!
//! Providers are stateless per call and shared across worker threads.
//! Adding a backend means one [`ChatBackend`] implementation plus one
//! [`ProviderKind`] entry; the orchestrator only sees [`Provider`].

mod claude_cli;
mod gemini;
mod huggingface;
mod openai;

pub use claude_cli::ClaudeCliBackend;
pub use gemini::GeminiBackend;
pub use huggingface::HuggingFaceBackend;
pub use openai::OpenAiBackend;

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

use super::chunk::{TokenBudget, CHARS_PER_TOKEN};
use super::prompt::PromptTemplates;
use super::retry::Retryable;
use crate::config::{ConfigError, ProviderConfig};

/// Structured record returned by the model for one call.
///
/// Any JSON object is accepted; downstream code reads the keys it knows.
pub type ChunkRecord = Map<String, Value>;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Analysis capability shared by every backend.
///
/// Implementors must be thread-safe; one instance serves all workers.
pub trait Provider: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Token budget for a single call.
    fn token_budget(&self) -> TokenBudget;

    /// Maximum input size of one call, in tokens.
    fn context_window(&self) -> usize {
        self.token_budget().max_input_tokens
    }

    /// Cheap approximation of the tokens `text` will consume.
    fn estimate_tokens(&self, text: &str) -> usize;

    /// Analyze one piece of code, optionally with static analysis findings.
    fn analyze(
        &self,
        code: &str,
        findings: Option<&str>,
        file_path: &str,
    ) -> ProviderResult<ChunkRecord>;

    /// Fold per-chunk records into one record for the whole file.
    fn summarize(&self, records: &[ChunkRecord], file_path: &str) -> ProviderResult<ChunkRecord>;
}

/// Transport to one LLM backend (Strategy pattern).
pub trait ChatBackend: Send + Sync {
    /// Backend name as used in config.
    fn name(&self) -> &'static str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Context window of the configured model, in tokens.
    fn default_context_window(&self) -> usize;

    /// Whether the backend enforces JSON output itself.
    ///
    /// Backends without it rely on the prompt alone and see more
    /// `JsonExtraction` failures.
    fn supports_structured_output(&self) -> bool;

    /// Token estimate; defaults to the characters-per-token heuristic.
    fn estimate_tokens(&self, text: &str) -> usize {
        estimate_tokens_by_chars(text)
    }

    /// Send one prompt and return the raw response text.
    ///
    /// Must give up after the configured timeout.
    fn complete(&self, prompt: &str) -> ProviderResult<String>;
}

/// Appended to prompts for backends that cannot enforce JSON output.
const JSON_ONLY_INSTRUCTION: &str = "\n\nRespond with a single JSON object only. \
Do not wrap it in markdown fences and do not add any text before or after it.";

/// Character-count token heuristic (rounded up).
pub fn estimate_tokens_by_chars(text: &str) -> usize {
    (text.chars().count() + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
}

/// [`Provider`] over any [`ChatBackend`].
pub struct LlmProvider<B: ChatBackend> {
    backend: B,
    templates: PromptTemplates,
    budget: TokenBudget,
}

impl<B: ChatBackend> LlmProvider<B> {
    pub fn new(backend: B, templates: PromptTemplates) -> Self {
        let budget = TokenBudget::for_context_window(backend.default_context_window());
        Self {
            backend,
            templates,
            budget,
        }
    }

    /// Replace the backend's context window (config override).
    pub fn with_context_window(mut self, max_input_tokens: usize) -> Self {
        self.budget = self.budget.with_context_window(max_input_tokens);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn call(&self, prompt: &str) -> ProviderResult<ChunkRecord> {
        let structured = self.backend.supports_structured_output();
        let prompt = if structured {
            Cow::Borrowed(prompt)
        } else {
            Cow::Owned(format!("{}{}", prompt, JSON_ONLY_INSTRUCTION))
        };
        tracing::debug!(
            backend = self.backend.name(),
            model = self.backend.model(),
            structured,
            prompt_chars = prompt.len(),
            "Sending prompt"
        );
        let response = self.backend.complete(&prompt)?;
        if response.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        extract_json(&response)
    }
}

impl<B: ChatBackend> Provider for LlmProvider<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn token_budget(&self) -> TokenBudget {
        self.budget.clone()
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        self.backend.estimate_tokens(text)
    }

    fn analyze(
        &self,
        code: &str,
        findings: Option<&str>,
        file_path: &str,
    ) -> ProviderResult<ChunkRecord> {
        let prompt = self.templates.render_analysis(code, findings, file_path);
        self.call(&prompt)
    }

    fn summarize(&self, records: &[ChunkRecord], file_path: &str) -> ProviderResult<ChunkRecord> {
        let array = Value::Array(records.iter().cloned().map(Value::Object).collect());
        let prompt = self
            .templates
            .render_summary(&format!("{:#}", array), file_path);
        self.call(&prompt)
    }
}

/// Provider types selectable in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    HuggingFace,
    ClaudeCli,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Gemini,
        ProviderKind::HuggingFace,
        ProviderKind::ClaudeCli,
    ];

    /// Config string for this provider type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::ClaudeCli => "claude-cli",
        }
    }

    /// Environment variables consulted when no credential is configured.
    pub fn credential_env_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenAi => &["OPENAI_API_KEY"],
            ProviderKind::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderKind::HuggingFace => &["HUGGINGFACEHUB_API_TOKEN", "HF_TOKEN"],
            ProviderKind::ClaudeCli => &[],
        }
    }

    pub fn requires_credential(&self) -> bool {
        !matches!(self, ProviderKind::ClaudeCli)
    }

    /// Model used when the config names none.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Gemini => "gemini-1.5-flash",
            ProviderKind::HuggingFace => "mistralai/Mistral-7B-Instruct-v0.2",
            ProviderKind::ClaudeCli => "default",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "huggingface" | "hf" => Ok(ProviderKind::HuggingFace),
            "claude-cli" | "claude" => Ok(ProviderKind::ClaudeCli),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the configured provider.
///
/// Fails before any network traffic when the type is unknown or a required
/// credential cannot be resolved.
pub fn create_provider(
    config: &ProviderConfig,
    context_window: Option<usize>,
    templates: PromptTemplates,
) -> Result<Box<dyn Provider>, ConfigError> {
    create_provider_with(config, context_window, templates, |name| {
        std::env::var(name).ok()
    })
}

/// [`create_provider`] with a custom environment lookup.
pub fn create_provider_with<F>(
    config: &ProviderConfig,
    context_window: Option<usize>,
    templates: PromptTemplates,
    lookup: F,
) -> Result<Box<dyn Provider>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let kind: ProviderKind = config.kind.parse()?;
    let api_key = config.resolve_api_key_with(kind.credential_env_vars(), lookup)?;
    let api_key = match (kind.requires_credential(), api_key) {
        (true, None) => {
            return Err(ConfigError::MissingCredential {
                provider: kind.to_string(),
                detail: format!(
                    "set provider.api_key or one of: {}",
                    kind.credential_env_vars().join(", ")
                ),
            })
        }
        (_, key) => key.unwrap_or_default(),
    };

    let settings = BackendSettings {
        model: config
            .model
            .clone()
            .unwrap_or_else(|| kind.default_model().to_string()),
        api_key,
        temperature: config.temperature,
        timeout: Duration::from_secs(config.timeout),
        base_url: config.base_url.clone(),
    };

    tracing::info!(provider = %kind, model = %settings.model, "Provider configured");

    let provider: Box<dyn Provider> = match kind {
        ProviderKind::OpenAi => boxed(OpenAiBackend::new(settings)?, templates, context_window),
        ProviderKind::Gemini => boxed(GeminiBackend::new(settings)?, templates, context_window),
        ProviderKind::HuggingFace => {
            boxed(HuggingFaceBackend::new(settings)?, templates, context_window)
        }
        ProviderKind::ClaudeCli => boxed(ClaudeCliBackend::new(settings), templates, context_window),
    };
    Ok(provider)
}

fn boxed<B: ChatBackend + 'static>(
    backend: B,
    templates: PromptTemplates,
    context_window: Option<usize>,
) -> Box<dyn Provider> {
    let provider = LlmProvider::new(backend, templates);
    match context_window {
        Some(window) => Box::new(provider.with_context_window(window)),
        None => Box::new(provider),
    }
}

/// Settings shared by all backend constructors.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub base_url: Option<String>,
}

/// Blocking HTTP client with the per-call timeout applied.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, ConfigError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("codelens/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConfigError::Invalid(format!("could not build HTTP client: {}", e)))
}

/// Errors from provider calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider returned no content")]
    EmptyResponse,

    #[error("Blocked by content policy: {0}")]
    Blocked(String),

    #[error("Failed to extract JSON from response: {}", truncate_text(response))]
    JsonExtraction { response: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited: {0}")]
    RateLimited(RateLimitInfo),

    #[error("Server error (HTTP {status}): {}", truncate_text(body))]
    ServerError { status: u16, body: String },

    #[error("Invalid request (HTTP {status}): {}", truncate_text(body))]
    InvalidRequest { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider CLI not found: {0}")]
    NotAvailable(String),

    #[error("Exit code {code}: {}", truncate_text(stderr))]
    ExitCode { code: i32, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Classify an HTTP error status.
    pub fn from_status(status: u16, body: String, retry_after: Option<Duration>) -> Self {
        match status {
            429 => {
                let parsed = parse_rate_limit_info(&body);
                ProviderError::RateLimited(RateLimitInfo {
                    retry_after: retry_after.or(parsed.as_ref().and_then(|i| i.retry_after)),
                    message: parsed
                        .map(|i| i.message)
                        .unwrap_or_else(|| "Too many requests".to_string()),
                })
            }
            408 | 500..=599 => ProviderError::ServerError { status, body },
            _ => ProviderError::InvalidRequest { status, body },
        }
    }

    /// Map a transport failure, naming the timeout when it was one.
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(timeout)
        } else {
            ProviderError::Transport(err.to_string())
        }
    }

    /// Whether the failure is a content-policy block.
    pub fn is_blocked(&self) -> bool {
        matches!(self, ProviderError::Blocked(_))
    }
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ProviderError::Blocked(_)
                | ProviderError::InvalidRequest { .. }
                | ProviderError::NotAvailable(_)
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited(info) => info.retry_after,
            _ => None,
        }
    }
}

/// Rate limit information extracted from a provider response.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// When the rate limit resets (if the provider said so)
    pub retry_after: Option<Duration>,
    /// Human-readable message
    pub message: String,
}

impl fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(retry_after) = self.retry_after {
            write!(f, "{} (retry after {:?})", self.message, retry_after)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Extract a JSON object from a model response.
///
/// Handles, in order:
/// 1. Direct JSON object
/// 2. JSON in a markdown code block
/// 3. The outermost `{ ... }` embedded in text
pub fn extract_json(response: &str) -> ProviderResult<ChunkRecord> {
    let trimmed = response.trim();

    if let Some(record) = parse_object(trimmed) {
        return Ok(record);
    }

    // Code blocks before brace boundaries so fenced output with prose
    // around it still parses
    if let Some(block) = extract_from_code_block(trimmed) {
        if let Some(record) = parse_object(block.trim()) {
            return Ok(record);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Some(record) = parse_object(&trimmed[start..=end]) {
                return Ok(record);
            }
        }
    }

    Err(ProviderError::JsonExtraction {
        response: response.to_string(),
    })
}

fn parse_object(text: &str) -> Option<ChunkRecord> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Extract the body of the first markdown code block.
fn extract_from_code_block(text: &str) -> Option<&str> {
    let patterns = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    for pattern in patterns {
        if let Some(start) = text.find(pattern) {
            let body_start = start + pattern.len();
            if let Some(end) = text[body_start..].find("```") {
                return Some(&text[body_start..body_start + end]);
            }
        }
    }
    None
}

/// Parse rate limit info from an error body or CLI stderr.
pub fn parse_rate_limit_info(text: &str) -> Option<RateLimitInfo> {
    let lower = text.to_lowercase();

    let is_rate_limited = lower.contains("rate limit")
        || lower.contains("throttled")
        || lower.contains("resource_exhausted")
        || lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("quota exceeded");

    if !is_rate_limited {
        return None;
    }

    Some(RateLimitInfo {
        retry_after: extract_retry_seconds(&lower).map(Duration::from_secs),
        message: text.lines().next().unwrap_or("Rate limited").trim().to_string(),
    })
}

/// Retry delay from the common phrasings ("retry after 45", "retryDelay: 60s").
fn extract_retry_seconds(text: &str) -> Option<u64> {
    let after = |keyword: &str| -> Option<u64> {
        text.find(keyword)
            .and_then(|pos| extract_first_number(&text[pos + keyword.len()..]))
    };

    ["retry after ", "retry_after", "retry in ", "retrydelay", "try again in "]
        .iter()
        .find_map(|keyword| after(keyword))
}

/// First run of digits close to the start of `s`.
fn extract_first_number(s: &str) -> Option<u64> {
    let digits: String = s
        .chars()
        .take(24)
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// First line of a long text, limited to 200 characters.
pub(crate) fn truncate_text(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    if first_line.chars().count() <= 200 {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(200).collect();
        format!("{}...", cut)
    }
}
