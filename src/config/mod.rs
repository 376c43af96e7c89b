//! Configuration management for codelens
//!
//! Settings come from `codelens.toml` in the working directory (or the path
//! given with `--config`), then CLI flags override individual fields.

mod io;
mod types;

pub use io::{CONFIG_FILE_NAME, DEFAULT_CONFIG_TEMPLATE};
pub use types::*;

use crate::analyzer::provider::ProviderKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors. All of them abort a run before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown provider type '{0}' (supported: openai, gemini, huggingface, claude-cli)")]
    UnknownProvider(String),

    #[error("Missing credential for provider '{provider}': {detail}")]
    MissingCredential { provider: String, detail: String },

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    /// Load configuration from a file, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        io::load_from(path)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        io::parse(contents, Path::new(CONFIG_FILE_NAME))
    }

    /// Write the commented starter config. Fails if the file exists.
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        io::write_template(path)
    }

    /// Resolve a configured path: `~/` expands to the home directory and
    /// relative paths are taken from the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if let Ok(stripped) = path.strip_prefix("~") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        }
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn input_dir(&self) -> PathBuf {
        self.resolve_path(&self.input_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.output_dir)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.resolve_path(&self.cache_file)
    }

    /// Check every field that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider
            .kind
            .parse::<ProviderKind>()
            .map_err(|_| ConfigError::UnknownProvider(self.provider.kind.clone()))?;

        if self.provider.timeout == 0 || self.provider.timeout > 3600 {
            return Err(ConfigError::Invalid(format!(
                "provider.timeout must be between 1 and 3600 seconds, got {}",
                self.provider.timeout
            )));
        }
        if self.provider.max_retries == 0 || self.provider.max_retries > 10 {
            return Err(ConfigError::Invalid(format!(
                "provider.max_retries must be between 1 and 10, got {}",
                self.provider.max_retries
            )));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::Invalid(format!(
                "provider.temperature must be between 0.0 and 2.0, got {}",
                self.provider.temperature
            )));
        }
        if let Some(workers) = self.workers {
            if workers == 0 || workers > 64 {
                return Err(ConfigError::Invalid(format!(
                    "workers must be between 1 and 64, got {}",
                    workers
                )));
            }
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be > 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.context_window == Some(0) {
            return Err(ConfigError::Invalid(
                "context_window must be > 0".to_string(),
            ));
        }
        if self.file_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "file_extensions must not be empty".to_string(),
            ));
        }
        for pattern in &self.exclude_patterns {
            globset::Glob::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("bad exclude pattern '{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }
}
