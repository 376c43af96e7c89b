//! Final per-file analysis result.
//!
//! The model's record is free-form JSON. This module reads the fields the
//! reports care about, tolerating the shapes models actually return
//! (strings, lists of strings, nested objects), and keeps the record itself
//! untouched for the JSON report.

use serde::Serialize;
use serde_json::Value;

use super::provider::ChunkRecord;

/// How the result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// One `analyze` call over the whole file
    SinglePass,
    /// Per-chunk analysis followed by a synthesis call
    Synthesized,
}

/// Structured analysis of one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Path relative to the input directory
    pub file_path: String,
    pub overview: String,
    /// Ordered outline entries
    pub outline: Vec<String>,
    /// Mermaid source for the main flow (may be empty)
    pub process_flow: String,
    pub business_logic: String,
    pub technical_debt: String,
    pub vulnerabilities: String,
    pub recommendations: String,
    /// The model's record, verbatim
    pub raw: ChunkRecord,
    pub mode: AnalysisMode,
    /// Chunks the file was split into (1 for single pass)
    pub chunk_count: usize,
    /// Chunks whose analysis failed and were left out of synthesis
    pub failed_chunks: usize,
}

impl AnalysisResult {
    /// Result of a single `analyze` call.
    pub fn single_pass(file_path: &str, record: ChunkRecord) -> Self {
        Self::from_record(file_path, record, AnalysisMode::SinglePass, 1, 0)
    }

    /// Result of chunk analysis plus synthesis.
    pub fn synthesized(
        file_path: &str,
        record: ChunkRecord,
        chunk_count: usize,
        failed_chunks: usize,
    ) -> Self {
        Self::from_record(
            file_path,
            record,
            AnalysisMode::Synthesized,
            chunk_count,
            failed_chunks,
        )
    }

    fn from_record(
        file_path: &str,
        record: ChunkRecord,
        mode: AnalysisMode,
        chunk_count: usize,
        failed_chunks: usize,
    ) -> Self {
        Self {
            file_path: file_path.to_string(),
            overview: text_field(&record, &["overview", "summary", "chunk_summary"]),
            outline: list_field(&record, &["main_outline", "outline", "key_functions"]),
            process_flow: strip_fences(&text_field(&record, &["process_flow"])),
            business_logic: text_field(&record, &["business_logic"]),
            technical_debt: text_field(&record, &["technical_debt", "potential_issues"]),
            vulnerabilities: text_field(&record, &["vulnerabilities", "security_issues"]),
            recommendations: text_field(&record, &["recommendations"]),
            raw: record,
            mode,
            chunk_count,
            failed_chunks,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        self.mode == AnalysisMode::Synthesized
    }
}

/// First non-empty value among `keys`, rendered as text.
fn text_field(record: &ChunkRecord, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .map(value_to_text)
        .find(|text| !text.trim().is_empty())
        .unwrap_or_default()
}

/// First non-empty value among `keys`, rendered as a list.
fn list_field(record: &ChunkRecord, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .map(|value| match value {
            Value::Array(items) => items
                .iter()
                .map(value_to_text)
                .filter(|s| !s.trim().is_empty())
                .collect(),
            Value::String(s) => s
                .lines()
                .map(|l| l.trim().trim_start_matches(['-', '*']).trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
            Value::Null => Vec::new(),
            other => vec![value_to_text(other)],
        })
        .find(|items: &Vec<String>| !items.is_empty())
        .unwrap_or_default()
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .map(|s| format!("- {}", s))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, value_to_text(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// Drop a surrounding ```mermaid fence if the model added one anyway.
fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end()
        .trim_end_matches("```")
        .trim()
        .to_string()
}
