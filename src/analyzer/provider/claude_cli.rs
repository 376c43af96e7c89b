//! Claude CLI backend.
//!
//! Runs `claude --print --output-format json` with the prompt on stdin and
//! tools disabled. Uses the CLI's own authentication, so no API key.

use std::process::Command;

use serde::Deserialize;

use super::{
    parse_rate_limit_info, BackendSettings, ChatBackend, ProviderError, ProviderResult,
};
use crate::analyzer::process::{command_exists, run_with_timeout};

/// Backend driving the locally installed `claude` CLI.
pub struct ClaudeCliBackend {
    settings: BackendSettings,
    command: String,
}

impl ClaudeCliBackend {
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            settings,
            command: "claude".to_string(),
        }
    }

    /// Use a different executable (wrappers, tests).
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(["--print", "--output-format", "json"]);
        if self.settings.model != "default" {
            cmd.args(["--model", &self.settings.model]);
        }
        // "-p -" reads the prompt from stdin (avoids ARG_MAX limits)
        cmd.args(["--tools", "", "-p", "-"]);
        cmd
    }
}

impl ChatBackend for ClaudeCliBackend {
    fn name(&self) -> &'static str {
        "claude-cli"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn default_context_window(&self) -> usize {
        200_000
    }

    fn supports_structured_output(&self) -> bool {
        false
    }

    fn complete(&self, prompt: &str) -> ProviderResult<String> {
        if !command_exists(&self.command) {
            return Err(ProviderError::NotAvailable(format!(
                "{} CLI not found in PATH",
                self.command
            )));
        }

        let timeout = self.settings.timeout;
        let output = match run_with_timeout(self.build_command(), Some(prompt.as_bytes()), timeout)
        {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(ProviderError::Timeout(timeout))
            }
            Err(e) => return Err(ProviderError::Io(e)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            if let Some(info) = parse_rate_limit_info(&stderr) {
                return Err(ProviderError::RateLimited(info));
            }
            // The CLI may exit 1 with the error inside the stdout envelope
            let message = unwrap_envelope(&stdout)
                .err()
                .unwrap_or(stderr);
            return Err(ProviderError::ExitCode {
                code: output.status.code().unwrap_or(-1),
                stderr: message,
            });
        }

        match unwrap_envelope(&stdout) {
            Ok(text) => Ok(text),
            Err(message) => {
                if let Some(info) = parse_rate_limit_info(&message) {
                    return Err(ProviderError::RateLimited(info));
                }
                Err(ProviderError::ExitCode {
                    code: 0,
                    stderr: message,
                })
            }
        }
    }
}

/// `--output-format json` envelope: `{"type":"result","result":"...","is_error":false}`.
#[derive(Debug, Deserialize)]
struct CliEnvelope {
    #[serde(rename = "type")]
    response_type: Option<String>,
    result: Option<String>,
    is_error: Option<bool>,
}

/// Model text from the CLI envelope, or the error message it carries.
///
/// Output that is not an envelope is passed through unchanged.
fn unwrap_envelope(stdout: &str) -> Result<String, String> {
    let envelope: CliEnvelope = match serde_json::from_str(stdout.trim()) {
        Ok(envelope) => envelope,
        Err(_) => return Ok(stdout.to_string()),
    };
    if envelope.response_type.as_deref() != Some("result") {
        return Ok(stdout.to_string());
    }
    if envelope.is_error == Some(true) {
        return Err(envelope
            .result
            .unwrap_or_else(|| "Claude returned an error".to_string()));
    }
    Ok(envelope.result.unwrap_or_default())
}
