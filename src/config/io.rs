//! Configuration I/O operations

use std::fs;
use std::path::Path;

use super::types::Config;
use super::ConfigError;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "codelens.toml";

/// Starter config written by `codelens config init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# codelens configuration

input_dir = "."
output_dir = "codelens-reports"
cache_file = ".codelens-cache.json"
report_format = "markdown"   # text | json | markdown

file_extensions = [".py", ".rs", ".js", ".ts", ".go", ".java"]
exclude_dirs = [".git", "target", "node_modules", "__pycache__", ".venv"]
exclude_patterns = []        # globs relative to input_dir, e.g. "tests/fixtures/**"

# Sizes are in tokens
chunk_size = 4000
chunk_overlap = 200
# context_window = 128000    # override the provider's window

# workers = 8                # default: CPU cores x 2, capped at 16
request_delay_ms = 100
static_analysis = false      # run pylint/bandit on .py files

[provider]
type = "openai"              # openai | gemini | huggingface | claude-cli
# model = "gpt-4o"
api_key = "env:OPENAI_API_KEY"
temperature = 0.0
timeout = 120
max_retries = 3
retry_base_delay_ms = 1000

[prompts]
# analysis_template = "prompts/analysis.txt"
# summary_template = "prompts/summary.txt"
"#;

/// Load configuration from file, or return defaults if not found
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let mut config = if path.exists() {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse(&contents, path)?
    } else {
        Config::default()
    };

    config.project_root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| ".".into()),
    };
    Ok(config)
}

/// Parse TOML text, naming `origin` in errors.
pub fn parse(contents: &str, origin: &Path) -> Result<Config, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })
}

/// Write the starter template, refusing to overwrite.
pub fn write_template(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::Invalid(format!(
            "{} already exists",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
