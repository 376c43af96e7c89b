//! Report rendering and writing.
//!
//! One report per analyzed file, mirrored under the output directory:
//! `src/app.py` becomes `<output_dir>/src/app.py.md` (or `.json` / `.txt`).

use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use chrono::Utc;
use serde_json::json;

use super::fingerprint::Fingerprint;
use super::result::AnalysisResult;
use crate::config::ReportFormat;
use crate::files::write_atomic;

/// Renders results and writes them below an output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
    format: ReportFormat,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, format: ReportFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Report path for a `/`-separated relative source path.
    pub fn report_path(&self, rel_path: &str) -> PathBuf {
        let mut path = self.output_dir.clone();
        for part in rel_path.split('/').filter(|p| !p.is_empty() && *p != "..") {
            path.push(part);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "report".to_string());
        path.set_file_name(format!("{}.{}", name, self.format.extension()));
        path
    }

    /// Render and atomically write the report, returning its path.
    pub fn write(&self, result: &AnalysisResult, fingerprint: &Fingerprint) -> io::Result<PathBuf> {
        let path = self.report_path(&result.file_path);
        let contents = self.render(result, fingerprint)?;
        write_atomic(&path, contents.as_bytes())?;
        tracing::debug!(file = %result.file_path, report = %path.display(), "Report written");
        Ok(path)
    }

    pub fn render(&self, result: &AnalysisResult, fingerprint: &Fingerprint) -> io::Result<String> {
        match self.format {
            ReportFormat::Json => render_json(result, fingerprint),
            ReportFormat::Markdown => Ok(render_markdown(result)),
            ReportFormat::Text => Ok(render_text(result)),
        }
    }
}

fn render_json(result: &AnalysisResult, fingerprint: &Fingerprint) -> io::Result<String> {
    let doc = json!({
        "file": result.file_path,
        "fingerprint": fingerprint,
        "generated_at": Utc::now().to_rfc3339(),
        "mode": result.mode,
        "synthesized": result.is_synthesized(),
        "chunks": {
            "total": result.chunk_count,
            "failed": result.failed_chunks,
        },
        "analysis": result.raw,
    });
    Ok(serde_json::to_string_pretty(&doc)?)
}

fn section(out: &mut String, heading: &str, body: &str) {
    let body = if body.trim().is_empty() {
        "_Not provided._"
    } else {
        body.trim()
    };
    let _ = write!(out, "## {}\n\n{}\n\n", heading, body);
}

fn render_markdown(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = write!(out, "# Analysis: `{}`\n\n", result.file_path);
    let _ = write!(
        out,
        "_{}; generated {}_\n\n",
        mode_line(result),
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    );

    section(&mut out, "Overview", &result.overview);

    out.push_str("## Outline\n\n");
    if result.outline.is_empty() {
        out.push_str("_Not provided._\n\n");
    } else {
        for (i, entry) in result.outline.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, entry);
        }
        out.push('\n');
    }

    out.push_str("## Process Flow\n\n");
    if result.process_flow.is_empty() {
        out.push_str("_Not provided._\n\n");
    } else {
        let _ = write!(out, "```mermaid\n{}\n```\n\n", result.process_flow);
    }

    if !result.business_logic.is_empty() {
        section(&mut out, "Business Logic", &result.business_logic);
    }
    section(&mut out, "Technical Debt", &result.technical_debt);
    section(&mut out, "Vulnerabilities", &result.vulnerabilities);
    section(&mut out, "Recommendations", &result.recommendations);
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

fn render_text(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let title = format!("Analysis: {}", result.file_path);
    let _ = writeln!(out, "{}\n{}", title, "=".repeat(title.chars().count()));
    let _ = writeln!(out, "{}\n", mode_line(result));

    let mut block = |heading: &str, body: &str| {
        let _ = writeln!(out, "{}\n{}", heading, "-".repeat(heading.len()));
        let body = if body.trim().is_empty() { "(not provided)" } else { body.trim() };
        let _ = writeln!(out, "{}\n", body);
    };

    block("Overview", &result.overview);
    let outline = result
        .outline
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{}. {}", i + 1, entry))
        .collect::<Vec<_>>()
        .join("\n");
    block("Outline", &outline);
    block("Process Flow", &result.process_flow);
    if !result.business_logic.is_empty() {
        block("Business Logic", &result.business_logic);
    }
    block("Technical Debt", &result.technical_debt);
    block("Vulnerabilities", &result.vulnerabilities);
    block("Recommendations", &result.recommendations);

    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

fn mode_line(result: &AnalysisResult) -> String {
    if result.is_synthesized() {
        let ok = result.chunk_count - result.failed_chunks.min(result.chunk_count);
        format!(
            "Synthesized from {} of {} chunks",
            ok, result.chunk_count
        )
    } else {
        "Single-pass analysis".to_string()
    }
}
