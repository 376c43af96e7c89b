//! Static analysis findings attached to analysis prompts.
//!
//! For Python files, `pylint` and `bandit` are run when installed and their
//! JSON output is condensed into advisory text for the model. Tools that are
//! missing or misbehave are skipped; findings never fail a file.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;

use super::process::{command_exists, run_with_timeout};

/// Upper bound on findings included in one prompt.
const MAX_FINDINGS: usize = 50;

/// Source of advisory findings for a file.
pub trait FindingsSource: Send + Sync {
    /// Formatted findings, or `None` when there is nothing to add.
    fn findings(&self, path: &Path) -> Option<String>;
}

/// One normalized finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub tool: &'static str,
    pub code: String,
    pub severity: String,
    pub line: Option<u64>,
    pub message: String,
}

/// Runs pylint and bandit on `.py` files.
#[derive(Debug, Clone)]
pub struct StaticAnalyzer {
    pylint: bool,
    bandit: bool,
    timeout: Duration,
}

impl StaticAnalyzer {
    /// Probe PATH for the tools.
    pub fn detect(timeout: Duration) -> Self {
        let pylint = command_exists("pylint");
        let bandit = command_exists("bandit");
        if !pylint {
            tracing::warn!("pylint not found; install it with 'pip install pylint' for static analysis");
        }
        if !bandit {
            tracing::warn!("bandit not found; install it with 'pip install bandit' for static analysis");
        }
        Self {
            pylint,
            bandit,
            timeout,
        }
    }

    pub fn is_available(&self) -> bool {
        self.pylint || self.bandit
    }

    fn run_tool(&self, program: &str, args: &[&str], path: &Path) -> Option<String> {
        let mut cmd = Command::new(program);
        cmd.args(args).arg(path);
        match run_with_timeout(cmd, None, self.timeout) {
            // Both tools exit non-zero when they report findings
            Ok(output) => Some(String::from_utf8_lossy(&output.stdout).to_string()),
            Err(e) => {
                tracing::warn!(tool = program, file = %path.display(), error = %e, "Static analysis tool failed");
                None
            }
        }
    }
}

impl FindingsSource for StaticAnalyzer {
    fn findings(&self, path: &Path) -> Option<String> {
        let is_python = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("py"))
            .unwrap_or(false);
        if !is_python {
            return None;
        }

        let mut findings = Vec::new();
        if self.pylint {
            if let Some(out) = self.run_tool("pylint", &["--output-format=json"], path) {
                findings.extend(parse_pylint(&out));
            }
        }
        if self.bandit {
            if let Some(out) = self.run_tool("bandit", &["-f", "json", "-q"], path) {
                findings.extend(parse_bandit(&out));
            }
        }
        tracing::debug!(file = %path.display(), count = findings.len(), "Static analysis complete");
        format_findings(&findings)
    }
}

#[derive(Debug, Deserialize)]
struct PylintMessage {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(rename = "message-id", default)]
    message_id: String,
    #[serde(default)]
    symbol: String,
    line: Option<u64>,
    #[serde(default)]
    message: String,
}

/// Parse `pylint --output-format=json`.
pub fn parse_pylint(output: &str) -> Vec<Finding> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<PylintMessage>>(trimmed) {
        Ok(messages) => messages
            .into_iter()
            .map(|m| Finding {
                tool: "pylint",
                code: if m.symbol.is_empty() {
                    m.message_id
                } else {
                    format!("{} {}", m.message_id, m.symbol)
                },
                severity: m.kind,
                line: m.line,
                message: m.message,
            })
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not parse pylint output");
            Vec::new()
        }
    }
}

#[derive(Debug, Deserialize)]
struct BanditReport {
    #[serde(default)]
    results: Vec<BanditResult>,
}

#[derive(Debug, Deserialize)]
struct BanditResult {
    #[serde(default)]
    test_id: String,
    #[serde(default)]
    issue_severity: String,
    line_number: Option<u64>,
    #[serde(default)]
    issue_text: String,
}

/// Parse `bandit -f json`.
pub fn parse_bandit(output: &str) -> Vec<Finding> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<BanditReport>(trimmed) {
        Ok(report) => report
            .results
            .into_iter()
            .map(|r| Finding {
                tool: "bandit",
                code: r.test_id,
                severity: r.issue_severity.to_lowercase(),
                line: r.line_number,
                message: r.issue_text,
            })
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not parse bandit output");
            Vec::new()
        }
    }
}

/// Advisory text for the prompt, or `None` for no findings.
pub fn format_findings(findings: &[Finding]) -> Option<String> {
    if findings.is_empty() {
        return None;
    }
    let mut out = String::from("Static analysis findings (advisory):\n");
    for f in findings.iter().take(MAX_FINDINGS) {
        let line = f.line.map(|l| format!(" line {}", l)).unwrap_or_default();
        out.push_str(&format!(
            "- [{}] {} ({}{}): {}\n",
            f.tool, f.code, f.severity, line, f.message
        ));
    }
    if findings.len() > MAX_FINDINGS {
        out.push_str(&format!("- ... {} more omitted\n", findings.len() - MAX_FINDINGS));
    }
    Some(out)
}
