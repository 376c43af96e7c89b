//! Test helper utilities

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use codelens::analyzer::provider::ProviderResult;
use codelens::analyzer::{
    discover_files, AnalysisCache, ChunkRecord, DiscoveryOptions, FileOrchestrator,
    OrchestratorSettings, Provider, ProviderError, ReportWriter, RetryPolicy, TokenBudget,
};
use codelens::config::ReportFormat;

type AnalyzeFn = dyn Fn(&str, Option<&str>) -> ProviderResult<ChunkRecord> + Send + Sync;
type SummarizeFn = dyn Fn(&[ChunkRecord]) -> ProviderResult<ChunkRecord> + Send + Sync;

/// One recorded `analyze` call.
#[derive(Debug, Clone)]
pub struct AnalyzeCall {
    pub file_path: String,
    pub code: String,
    pub findings: Option<String>,
}

/// Provider double whose answers come from closures.
///
/// Budgets have no reservations and tokens are estimated at four
/// characters each, so test inputs can be sized exactly.
pub struct ScriptedProvider {
    window: usize,
    analyze: Box<AnalyzeFn>,
    summarize: Box<SummarizeFn>,
    pub analyze_calls: Mutex<Vec<AnalyzeCall>>,
    pub summarize_calls: Mutex<Vec<Vec<ChunkRecord>>>,
    attempts: AtomicUsize,
}

impl ScriptedProvider {
    /// Returns `record` for every call.
    pub fn fixed(window: usize, record: ChunkRecord) -> Self {
        let summary = record.clone();
        Self::new(
            window,
            move |_, _| Ok(record.clone()),
            move |_| Ok(summary.clone()),
        )
    }

    pub fn new<A, S>(window: usize, analyze: A, summarize: S) -> Self
    where
        A: Fn(&str, Option<&str>) -> ProviderResult<ChunkRecord> + Send + Sync + 'static,
        S: Fn(&[ChunkRecord]) -> ProviderResult<ChunkRecord> + Send + Sync + 'static,
    {
        Self {
            window,
            analyze: Box::new(analyze),
            summarize: Box::new(summarize),
            analyze_calls: Mutex::new(Vec::new()),
            summarize_calls: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Every attempt, successful or not.
    pub fn total_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn analyze_count(&self) -> usize {
        self.analyze_calls.lock().unwrap().len()
    }

    pub fn summarize_count(&self) -> usize {
        self.summarize_calls.lock().unwrap().len()
    }
}

impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn token_budget(&self) -> TokenBudget {
        TokenBudget::new(self.window, 0, 0, 0.0)
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        (text.chars().count() + 3) / 4
    }

    fn analyze(
        &self,
        code: &str,
        findings: Option<&str>,
        file_path: &str,
    ) -> ProviderResult<ChunkRecord> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.analyze_calls.lock().unwrap().push(AnalyzeCall {
            file_path: file_path.to_string(),
            code: code.to_string(),
            findings: findings.map(str::to_string),
        });
        (self.analyze)(code, findings)
    }

    fn summarize(&self, records: &[ChunkRecord], _file_path: &str) -> ProviderResult<ChunkRecord> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.summarize_calls.lock().unwrap().push(records.to_vec());
        (self.summarize)(records)
    }
}

/// A structured record like the ones models return.
pub fn sample_record(overview: &str) -> ChunkRecord {
    let value = json!({
        "overview": overview,
        "main_outline": ["parse input", "compute totals"],
        "process_flow": "graph TD\n  A --> B",
        "technical_debt": "none noted",
        "vulnerabilities": "none",
        "recommendations": "add tests"
    });
    match value {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

pub fn server_error() -> ProviderError {
    ProviderError::ServerError {
        status: 503,
        body: "overloaded".to_string(),
    }
}

/// A Python file of `lines` short lines.
pub fn python_source(lines: usize) -> String {
    let mut out = String::from("def main():\n");
    for i in 1..lines {
        out.push_str(&format!("    x{} = {}\n", i, i));
    }
    out
}

/// Text of `lines` lines, ten characters each (newline included).
pub fn fixed_width_lines(lines: usize) -> String {
    (0..lines).map(|i| format!("{:09}\n", i)).collect()
}

/// Temp project with `src/` input, `reports/` output and a cache file.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("src")).expect("Failed to create src dir");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root().join("src")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("reports")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.root().join(".codelens-cache.json")
    }

    /// Write a file under the input directory, creating parents.
    pub fn write_source(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.input_dir().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, contents).expect("Failed to write source");
        path
    }

    pub fn discover(&self) -> Vec<codelens::analyzer::FileRecord> {
        let options = DiscoveryOptions::new(&[".py".to_string()], &[], &[])
            .unwrap()
            .exclude_path(self.output_dir());
        discover_files(&self.input_dir(), &options).unwrap()
    }

    /// Orchestrator over the persisted cache with zero-delay retries and
    /// no chunk overlap.
    pub fn orchestrator(
        &self,
        provider: Arc<dyn Provider>,
        format: ReportFormat,
    ) -> FileOrchestrator {
        let settings = OrchestratorSettings {
            chunk_overlap: 0,
            retry: RetryPolicy::new(3, Duration::ZERO),
            workers: Some(2),
            ..OrchestratorSettings::default()
        };
        FileOrchestrator::new(
            provider,
            Arc::new(AnalysisCache::load(self.cache_path())),
            ReportWriter::new(self.output_dir(), format),
            settings,
        )
    }
}
