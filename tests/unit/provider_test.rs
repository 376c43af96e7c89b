//! Unit tests for provider selection

use codelens::analyzer::provider::create_provider_with;
use codelens::analyzer::{PromptTemplates, ProviderKind};
use codelens::config::ProviderConfig;
use codelens::ConfigError;

fn provider_config(kind: &str, api_key: Option<&str>) -> ProviderConfig {
    ProviderConfig {
        kind: kind.to_string(),
        api_key: api_key.map(str::to_string),
        ..ProviderConfig::default()
    }
}

#[test]
fn aliases_select_the_same_backend() {
    assert_eq!("google".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
    assert_eq!("hf".parse::<ProviderKind>().unwrap(), ProviderKind::HuggingFace);
    assert_eq!("claude".parse::<ProviderKind>().unwrap(), ProviderKind::ClaudeCli);
}

#[test]
fn unknown_type_fails_at_construction() {
    let result = create_provider_with(
        &provider_config("llama", Some("key")),
        None,
        PromptTemplates::default(),
        |_| None,
    );
    assert!(matches!(result, Err(ConfigError::UnknownProvider(_))));
}

#[test]
fn missing_credential_fails_at_construction() {
    let result = create_provider_with(
        &provider_config("gemini", None),
        None,
        PromptTemplates::default(),
        |_| None,
    );
    assert!(matches!(result, Err(ConfigError::MissingCredential { .. })));
}

#[test]
fn conventional_env_var_supplies_credential() {
    let provider = create_provider_with(
        &provider_config("gemini", None),
        None,
        PromptTemplates::default(),
        |name| (name == "GEMINI_API_KEY").then(|| "AIza-test".to_string()),
    )
    .unwrap();
    assert_eq!(provider.name(), "gemini");
}

#[test]
fn claude_cli_needs_no_credential() {
    let provider = create_provider_with(
        &provider_config("claude-cli", None),
        None,
        PromptTemplates::default(),
        |_| None,
    )
    .unwrap();
    assert_eq!(provider.name(), "claude-cli");
}

#[test]
fn context_window_override_replaces_model_window() {
    let config = ProviderConfig {
        model: Some("gpt-4".to_string()),
        ..provider_config("openai", Some("sk-test"))
    };
    let provider =
        create_provider_with(&config, Some(20_000), PromptTemplates::default(), |_| None).unwrap();
    assert_eq!(provider.context_window(), 20_000);

    let default =
        create_provider_with(&config, None, PromptTemplates::default(), |_| None).unwrap();
    assert_eq!(default.context_window(), 8_192);
    assert!(default.token_budget().available_for_content() < 8_192);
}
