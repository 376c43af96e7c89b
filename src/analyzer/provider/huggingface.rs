//! Hugging Face Inference API backend.

use serde::Deserialize;
use serde_json::json;

use super::openai::retry_after_header;
use super::{http_client, BackendSettings, ChatBackend, ProviderError, ProviderResult};
use crate::config::ConfigError;

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co/models";

/// Backend for hosted text-generation models.
///
/// The API cannot enforce JSON, so the prompt alone asks for it.
pub struct HuggingFaceBackend {
    client: reqwest::blocking::Client,
    settings: BackendSettings,
}

impl HuggingFaceBackend {
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
        format!("{}/{}", base, self.settings.model)
    }
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Many(Vec<Generation>),
    One(Generation),
}

impl ChatBackend for HuggingFaceBackend {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn default_context_window(&self) -> usize {
        32_768
    }

    fn supports_structured_output(&self) -> bool {
        false
    }

    fn complete(&self, prompt: &str) -> ProviderResult<String> {
        // Temperature 0 is rejected by the API; sampling off means greedy.
        let sampling = self.settings.temperature > 0.0;
        let mut parameters = json!({
            "max_new_tokens": 4096,
            "return_full_text": false,
            "do_sample": sampling
        });
        if sampling {
            parameters["temperature"] = json!(self.settings.temperature);
        }
        let body = json!({
            "inputs": prompt,
            "parameters": parameters,
            "options": { "wait_for_model": true }
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

        let parsed: GenerationResponse = response
            .json()
            .map_err(|e| ProviderError::from_transport(e, self.settings.timeout))?;
        generated_text(parsed)
    }
}

fn generated_text(parsed: GenerationResponse) -> ProviderResult<String> {
    let generation = match parsed {
        GenerationResponse::Many(items) => items.into_iter().next(),
        GenerationResponse::One(item) => Some(item),
    };
    generation
        .and_then(|g| g.generated_text)
        .filter(|t| !t.trim().is_empty())
        .ok_or(ProviderError::EmptyResponse)
}
