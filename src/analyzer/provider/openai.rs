//! OpenAI Chat Completions backend.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::{
    estimate_tokens_by_chars, http_client, BackendSettings, ChatBackend, ProviderError,
    ProviderResult,
};
use crate::config::ConfigError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Backend for the OpenAI API (and compatible servers via `base_url`).
pub struct OpenAiBackend {
    client: reqwest::blocking::Client,
    settings: BackendSettings,
    bpe: Option<tiktoken_rs::CoreBPE>,
}

impl OpenAiBackend {
    pub fn new(settings: BackendSettings) -> Result<Self, ConfigError> {
        let client = http_client(settings.timeout)?;
        // Unknown model names (compatible servers) fall back to cl100k
        let bpe = tiktoken_rs::get_bpe_from_model(&settings.model)
            .or_else(|_| tiktoken_rs::cl100k_base())
            .ok();
        Ok(Self {
            client,
            settings,
            bpe,
        })
    }

    fn endpoint(&self) -> String {
        let base = self
            .settings
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{}/chat/completions", base)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<Message>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
    refusal: Option<String>,
}

impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn default_context_window(&self) -> usize {
        context_window_for(&self.settings.model)
    }

    fn supports_structured_output(&self) -> bool {
        true
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => estimate_tokens_by_chars(text),
        }
    }

    fn complete(&self, prompt: &str) -> ProviderResult<String> {
        let body = json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": "You are a senior software engineer reviewing source code. Reply with JSON only." },
                { "role": "user", "content": prompt }
            ]
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .map_err(|e| ProviderError::from_transport(e, self.settings.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_header(response.headers());
            let text = response.text().unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), text, retry_after));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ProviderError::from_transport(e, self.settings.timeout))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(ProviderError::Blocked("content_filter".to_string()));
        }
        let message = choice.message.ok_or(ProviderError::EmptyResponse)?;
        if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
            return Err(ProviderError::Blocked(refusal));
        }
        message.content.ok_or(ProviderError::EmptyResponse)
    }
}

/// Context window of well-known models, in tokens.
fn context_window_for(model: &str) -> usize {
    let model = model.to_lowercase();
    if model.starts_with("gpt-4o") || model.starts_with("gpt-4-turbo") || model.starts_with("o1")
    {
        128_000
    } else if model.starts_with("gpt-4.1") {
        1_000_000
    } else if model.starts_with("gpt-4-32k") {
        32_768
    } else if model.starts_with("gpt-4") {
        8_192
    } else if model.starts_with("gpt-3.5") {
        16_385
    } else {
        128_000
    }
}

/// `Retry-After` header in seconds, when present.
pub(crate) fn retry_after_header(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}
