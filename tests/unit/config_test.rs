//! Unit tests for config loading and validation

use std::fs;

use codelens::config::{ReportFormat, CONFIG_FILE_NAME, DEFAULT_CONFIG_TEMPLATE};
use codelens::{Config, ConfigError};
use tempfile::TempDir;

#[test]
fn default_config_has_expected_values() {
    let config = Config::default();
    assert_eq!(config.report_format, ReportFormat::Markdown);
    assert_eq!(config.chunk_size, 4_000);
    assert_eq!(config.chunk_overlap, 200);
    assert_eq!(config.provider.kind, "openai");
    assert_eq!(config.provider.max_retries, 3);
    assert!(config.workers.is_none());
    assert!(config.file_extensions.contains(&".py".to_string()));
    assert!(config.validate().is_ok());
}

#[test]
fn template_parses_and_validates() {
    let config = Config::from_toml(DEFAULT_CONFIG_TEMPLATE).unwrap();
    assert_eq!(config.provider.api_key.as_deref(), Some("env:OPENAI_API_KEY"));
    assert!(config.validate().is_ok());
}

#[test]
fn paths_resolve_against_config_directory() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(CONFIG_FILE_NAME);
    fs::write(
        &path,
        "input_dir = \"app\"\noutput_dir = \"out/reports\"\nreport_format = \"json\"\n",
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.input_dir(), temp.path().join("app"));
    assert_eq!(config.output_dir(), temp.path().join("out/reports"));
    assert_eq!(config.cache_path(), temp.path().join(".codelens-cache.json"));
    assert_eq!(config.report_format, ReportFormat::Json);
}

#[test]
fn missing_file_gives_defaults() {
    let temp = TempDir::new().unwrap();
    let config = Config::load_from(&temp.path().join("absent.toml")).unwrap();
    assert_eq!(config.chunk_size, 4_000);
    assert_eq!(config.project_root, temp.path());
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "chunk_size = \"lots\"\n").unwrap();
    assert!(matches!(
        Config::load_from(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn unknown_report_format_is_rejected() {
    assert!(Config::from_toml("report_format = \"html\"\n").is_err());
}

#[test]
fn validation_rejects_bad_values() {
    let cases = [
        "[provider]\ntype = \"llama\"\n",
        "[provider]\ntimeout = 0\n",
        "workers = 0\n",
        "chunk_size = 100\nchunk_overlap = 100\n",
        "context_window = 0\n",
        "exclude_patterns = [\"a/[\"]\n",
    ];
    for case in cases {
        let config = Config::from_toml(case).unwrap();
        assert!(config.validate().is_err(), "accepted: {}", case);
    }
}

#[test]
fn unknown_provider_has_its_own_error() {
    let config = Config::from_toml("[provider]\ntype = \"llama\"\n").unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::UnknownProvider(name)) if name == "llama"
    ));
}

#[test]
fn env_reference_must_resolve() {
    let config = Config::from_toml("[provider]\napi_key = \"env:CODELENS_TEST_KEY\"\n").unwrap();
    let found = config
        .provider
        .resolve_api_key_with(&[], |name| {
            (name == "CODELENS_TEST_KEY").then(|| "sk-from-env".to_string())
        })
        .unwrap();
    assert_eq!(found.as_deref(), Some("sk-from-env"));

    let missing = config.provider.resolve_api_key_with(&[], |_| None);
    assert!(matches!(missing, Err(ConfigError::MissingCredential { .. })));
}

#[test]
fn write_template_refuses_to_overwrite() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(CONFIG_FILE_NAME);
    Config::write_template(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG_TEMPLATE);
    assert!(Config::write_template(&path).is_err());
}
