//! Google Gemini (Generative Language API) backend.

use serde::Deserialize;
use serde_json::json;

use super::openai::retry_after_header;
use super::{http_client, BackendSettings, ChatBackend, ProviderError, ProviderResult};
use crate::config::ConfigError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Backend for Gemini models.
///
/// Token estimation uses the characters-per-token heuristic.
pub struct GeminiBackend {
    client: reqwest::blocking::Client,
    settings: BackendSettings,
}

impl GeminiBackend {
    pub fn new(settings: BackendSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(settings.timeout)?,
            settings,
        })
    }

    fn endpoint(&self) -> String {
        let base = self
            .settings
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{}/models/{}:generateContent", base, self.settings.model)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl ChatBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn default_context_window(&self) -> usize {
        if self.settings.model.contains("1.5-pro") {
            2_000_000
        } else {
            1_000_000
        }
    }

    fn supports_structured_output(&self) -> bool {
        true
    }

    fn complete(&self, prompt: &str) -> ProviderResult<String> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.settings.temperature,
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .map_err(|e| ProviderError::from_transport(e, self.settings.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_header(response.headers());
            let text = response.text().unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), text, retry_after));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| ProviderError::from_transport(e, self.settings.timeout))?;
        response_text(parsed)
    }
}

fn response_text(parsed: GenerateResponse) -> ProviderResult<String> {
    if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::Blocked(reason));
    }

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if matches!(reason, "SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII") {
            return Err(ProviderError::Blocked(reason.to_string()));
        }
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(text)
}
