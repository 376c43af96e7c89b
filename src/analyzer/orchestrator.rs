//! Per-file analysis pipeline and run driver.
//!
//! Each file moves through
//! `Discovered -> CacheChecked -> (SkippedUnchanged | ContentLoaded) ->
//! ChunkDecided -> (SinglePass | MultiPassAnalyzing -> Synthesizing) ->
//! ReportWritten -> CacheUpdated`, or ends in `Failed(reason)`.
//!
//! A file's whole pipeline runs on one worker. Its report is written before
//! its cache entry is recorded, and the cache is persisted after every
//! completed file. A failed file never stops the run.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::cache::AnalysisCache;
use super::chunk::TextChunker;
use super::discovery::{decode_text, ContentError, FileRecord};
use super::error::{FailureReason, FileFailure};
use super::findings::FindingsSource;
use super::fingerprint::{fingerprint_bytes, Fingerprint};
use super::provider::{ChunkRecord, Provider, ProviderResult};
use super::report::ReportWriter;
use super::result::AnalysisResult;
use super::retry::RetryPolicy;
use super::worker::{ParallelExecutor, ProgressReporter};
use crate::config::Config;

/// Shared flag that stops new files from starting.
///
/// In-flight files finish normally.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pipeline state of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Discovered,
    CacheChecked,
    SkippedUnchanged,
    ContentLoaded,
    ChunkDecided,
    SinglePass,
    MultiPassAnalyzing,
    Synthesizing,
    ReportWritten,
    CacheUpdated,
    Failed(FailureReason),
}

/// Why a file was not analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Fingerprint matches the cache and the report exists
    Unchanged,
    /// The run was stopped before the file started
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unchanged => write!(f, "unchanged"),
            SkipReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal status of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Analyzed {
        report_path: PathBuf,
        synthesized: bool,
        chunks: usize,
        failed_chunks: usize,
    },
    Skipped(SkipReason),
    Failed(FileFailure),
}

/// Provider usage attributed to one file or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Logical provider calls (analyze or summarize)
    pub calls: usize,
    /// Attempts including retries
    pub attempts: usize,
    /// Chunks sent for analysis (1 for a single-pass file)
    pub chunks: usize,
    /// Estimated tokens of content sent for analysis
    pub estimated_tokens: usize,
}

impl Usage {
    fn add(&mut self, other: &Usage) {
        self.calls += other.calls;
        self.attempts += other.attempts;
        self.chunks += other.chunks;
        self.estimated_tokens += other.estimated_tokens;
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub rel_path: String,
    pub status: FileStatus,
    pub usage: Usage,
    /// Last state reached
    pub final_state: FileState,
}

/// Knobs for the pipeline, in tokens where sizes are involved.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Target chunk size for oversized files
    pub chunk_size: usize,
    /// Overlap between consecutive chunks
    pub chunk_overlap: usize,
    /// Retry policy applied to every provider call
    pub retry: RetryPolicy,
    /// Pause between successive provider calls for one file
    pub request_delay: Duration,
    /// Worker override (None = auto-scale)
    pub workers: Option<usize>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            chunk_size: 4_000,
            chunk_overlap: 200,
            retry: RetryPolicy::default(),
            request_delay: Duration::ZERO,
            workers: None,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            retry: RetryPolicy::new(
                config.provider.max_retries,
                Duration::from_millis(config.provider.retry_base_delay_ms),
            ),
            request_delay: Duration::from_millis(config.request_delay_ms),
            workers: config.workers,
        }
    }
}

/// Runs the per-file pipeline against one provider, cache and report writer.
pub struct FileOrchestrator {
    provider: Arc<dyn Provider>,
    cache: Arc<AnalysisCache>,
    reports: ReportWriter,
    findings: Option<Arc<dyn FindingsSource>>,
    settings: OrchestratorSettings,
    stop: StopSignal,
}

/// Tracks one file's state and usage while it moves through the pipeline.
struct FileRun<'a> {
    file: &'a FileRecord,
    state: FileState,
    usage: Usage,
    provider_calls: usize,
}

impl<'a> FileRun<'a> {
    fn new(file: &'a FileRecord) -> Self {
        Self {
            file,
            state: FileState::Discovered,
            usage: Usage::default(),
            provider_calls: 0,
        }
    }

    fn advance(&mut self, next: FileState) {
        tracing::debug!(file = %self.file.rel_path, from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }

    fn finish(self, status: FileStatus) -> FileOutcome {
        FileOutcome {
            rel_path: self.file.rel_path.clone(),
            status,
            usage: self.usage,
            final_state: self.state,
        }
    }

    fn fail(mut self, reason: FailureReason, message: impl Into<String>) -> FileOutcome {
        let failure = FileFailure::new(reason, message);
        tracing::warn!(file = %self.file.rel_path, reason = %failure.reason, error = %failure.message, "File failed");
        self.advance(FileState::Failed(reason));
        self.finish(FileStatus::Failed(failure))
    }
}

impl FileOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        cache: Arc<AnalysisCache>,
        reports: ReportWriter,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            provider,
            cache,
            reports,
            findings: None,
            settings,
            stop: StopSignal::new(),
        }
    }

    /// Attach a static findings source.
    pub fn with_findings(mut self, findings: Arc<dyn FindingsSource>) -> Self {
        self.findings = Some(findings);
        self
    }

    /// Use a shared stop signal.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Worker count a run over `file_count` files would use.
    pub fn worker_count(&self, file_count: usize) -> usize {
        super::worker::WorkerScaler::with_override(self.settings.workers)
            .calculate_workers(file_count)
    }

    /// Process every file on a bounded pool and summarize the run.
    pub fn run(&self, files: Vec<FileRecord>, progress: ProgressReporter) -> RunSummary {
        let started = Instant::now();
        let executor = ParallelExecutor::new(self.worker_count(files.len()));
        tracing::info!(
            files = files.len(),
            workers = executor.worker_count(),
            provider = self.provider.name(),
            "Starting analysis run"
        );

        let outcomes = executor.execute(files, &progress, |file| {
            if self.stop.is_stopped() {
                tracing::debug!(file = %file.rel_path, "Not started: run cancelled");
                return FileRun::new(&file).finish(FileStatus::Skipped(SkipReason::Cancelled));
            }
            self.process_file(&file)
        });

        let summary = RunSummary::from_outcomes(outcomes, started.elapsed());
        tracing::info!(
            analyzed = summary.analyzed,
            skipped = summary.skipped_unchanged,
            cancelled = summary.cancelled,
            failed = summary.failures.len(),
            "Analysis run finished"
        );
        summary
    }

    /// Run the full pipeline for one file.
    pub fn process_file(&self, file: &FileRecord) -> FileOutcome {
        let mut run = FileRun::new(file);

        // One read: the fingerprint always describes the bytes that get analyzed
        let bytes = match file.read_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                let e = ContentError::from(e);
                return run.fail(e.reason(), e.to_string());
            }
        };
        let fingerprint = fingerprint_bytes(&bytes);

        run.advance(FileState::CacheChecked);
        if let Some(entry) = self.cache.lookup(&file.rel_path) {
            if AnalysisCache::is_fresh(&entry, &fingerprint) {
                tracing::info!(file = %file.rel_path, "Unchanged, skipping");
                run.advance(FileState::SkippedUnchanged);
                return run.finish(FileStatus::Skipped(SkipReason::Unchanged));
            }
        }

        let content = match decode_text(&bytes) {
            Ok(content) => content,
            Err(e) => return run.fail(e.reason(), e.to_string()),
        };
        if content.text.trim().is_empty() {
            return run.fail(FailureReason::NoContent, "file is empty");
        }
        run.advance(FileState::ContentLoaded);

        let findings = self
            .findings
            .as_ref()
            .and_then(|source| source.findings(&file.path));

        let result = match self.analyze_content(&mut run, &content.text, findings.as_deref()) {
            Ok(result) => result,
            Err(failure) => return run.fail(failure.reason, failure.message),
        };

        let report_path = match self.reports.write(&result, &fingerprint) {
            Ok(path) => path,
            Err(e) => {
                return run.fail(
                    FailureReason::ReportWriteError,
                    format!("failed to write report: {}", e),
                )
            }
        };
        run.advance(FileState::ReportWritten);

        self.update_cache(&file.rel_path, fingerprint, report_path.clone());
        run.advance(FileState::CacheUpdated);

        tracing::info!(
            file = %file.rel_path,
            synthesized = result.is_synthesized(),
            chunks = result.chunk_count,
            report = %report_path.display(),
            "Analyzed"
        );
        run.finish(FileStatus::Analyzed {
            report_path,
            synthesized: result.is_synthesized(),
            chunks: result.chunk_count,
            failed_chunks: result.failed_chunks,
        })
    }

    /// Decide between one call and the chunked path, then run it.
    fn analyze_content(
        &self,
        run: &mut FileRun<'_>,
        text: &str,
        findings: Option<&str>,
    ) -> Result<AnalysisResult, FileFailure> {
        let rel_path = run.file.rel_path.clone();
        let budget = self.provider.token_budget().available_for_content();
        let estimated = self.provider.estimate_tokens(text);
        run.usage.estimated_tokens += estimated;
        run.advance(FileState::ChunkDecided);

        let chunks = if estimated <= budget {
            vec![text.to_string()]
        } else {
            let chunk_tokens = self.settings.chunk_size.clamp(1, budget);
            let overlap = self.settings.chunk_overlap.min(chunk_tokens / 2);
            TextChunker::from_tokens(chunk_tokens, overlap).split(text)
        };
        tracing::debug!(file = %rel_path, estimated, budget, chunks = chunks.len(), "Chunk decision");
        run.usage.chunks += chunks.len();

        if chunks.len() == 1 {
            run.advance(FileState::SinglePass);
            let record = self
                .call(run, "analyze", |p| p.analyze(&chunks[0], findings, &rel_path))
                .map_err(|e| FileFailure::new(FailureReason::from_provider(&e), e.to_string()))?;
            return Ok(AnalysisResult::single_pass(&rel_path, record));
        }

        run.advance(FileState::MultiPassAnalyzing);
        let total = chunks.len();
        let mut records: Vec<ChunkRecord> = Vec::with_capacity(total);
        let mut last_error = None;
        for (i, chunk) in chunks.iter().enumerate() {
            // Findings go with the first chunk only
            let chunk_findings = if i == 0 { findings } else { None };
            match self.call(run, "analyze", |p| p.analyze(chunk, chunk_findings, &rel_path)) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(file = %rel_path, chunk = i + 1, total, error = %e, "Chunk analysis failed");
                    last_error = Some(e.to_string());
                }
            }
        }

        if records.is_empty() {
            return Err(FileFailure::new(
                FailureReason::SynthesisError,
                format!(
                    "all {} chunks failed; last error: {}",
                    total,
                    last_error.unwrap_or_default()
                ),
            ));
        }
        let failed = total - records.len();

        run.advance(FileState::Synthesizing);
        let record = self
            .call(run, "summarize", |p| p.summarize(&records, &rel_path))
            .map_err(|e| {
                FileFailure::new(FailureReason::SynthesisError, format!("synthesis failed: {}", e))
            })?;
        Ok(AnalysisResult::synthesized(&rel_path, record, total, failed))
    }

    /// One logical provider call under the retry policy, with pacing.
    fn call<T>(
        &self,
        run: &mut FileRun<'_>,
        what: &str,
        op: impl Fn(&dyn Provider) -> ProviderResult<T>,
    ) -> ProviderResult<T> {
        if run.provider_calls > 0 && !self.settings.request_delay.is_zero() {
            std::thread::sleep(self.settings.request_delay);
        }
        run.provider_calls += 1;

        let provider = self.provider.as_ref();
        let outcome = self.settings.retry.run(|attempt| {
            tracing::debug!(file = %run.file.rel_path, call = what, attempt = attempt + 1, "Provider call");
            op(provider)
        });
        run.usage.calls += 1;
        run.usage.attempts += outcome.attempts;
        outcome.result
    }

    /// Record and persist the cache entry after a report is on disk.
    fn update_cache(&self, rel_path: &str, fingerprint: Fingerprint, report_path: PathBuf) {
        if fingerprint.is_error() {
            tracing::warn!(file = %rel_path, "File could not be fingerprinted; not caching");
            return;
        }
        self.cache.record(rel_path, fingerprint, report_path);
        if let Err(e) = self.cache.persist() {
            tracing::warn!(path = %self.cache.path().display(), error = %e, "Failed to persist cache");
        }
    }
}

/// End-of-run counts and failure details.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub analyzed: usize,
    /// Analyzed files that went through chunk synthesis
    pub synthesized: usize,
    pub skipped_unchanged: usize,
    pub cancelled: usize,
    /// Chunks left out of synthesis across all files
    pub failed_chunks: usize,
    /// (relative path, failure), ordered by path
    pub failures: Vec<(String, FileFailure)>,
    pub usage: Usage,
    pub elapsed: Duration,
    pub outcomes: Vec<FileOutcome>,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: Vec<FileOutcome>, elapsed: Duration) -> Self {
        let mut summary = RunSummary {
            elapsed,
            ..RunSummary::default()
        };
        for outcome in &outcomes {
            summary.usage.add(&outcome.usage);
            match &outcome.status {
                FileStatus::Analyzed {
                    synthesized,
                    failed_chunks,
                    ..
                } => {
                    summary.analyzed += 1;
                    summary.failed_chunks += failed_chunks;
                    if *synthesized {
                        summary.synthesized += 1;
                    }
                }
                FileStatus::Skipped(SkipReason::Unchanged) => summary.skipped_unchanged += 1,
                FileStatus::Skipped(SkipReason::Cancelled) => summary.cancelled += 1,
                FileStatus::Failed(failure) => summary
                    .failures
                    .push((outcome.rel_path.clone(), failure.clone())),
            }
        }
        summary.failures.sort_by(|a, b| a.0.cmp(&b.0));
        summary.outcomes = outcomes;
        summary
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Outcome for a relative path.
    pub fn outcome(&self, rel_path: &str) -> Option<&FileOutcome> {
        self.outcomes.iter().find(|o| o.rel_path == rel_path)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Analysis complete in {:.1}s: {} analyzed ({} synthesized), {} skipped, {} failed",
            self.elapsed.as_secs_f64(),
            self.analyzed,
            self.synthesized,
            self.skipped_unchanged + self.cancelled,
            self.failures.len()
        )?;
        if self.cancelled > 0 {
            writeln!(f, "  {} file(s) not started: run cancelled", self.cancelled)?;
        }
        if self.failed_chunks > 0 {
            writeln!(
                f,
                "  {} chunk(s) failed and were left out of synthesis",
                self.failed_chunks
            )?;
        }
        writeln!(
            f,
            "  Provider: {} call(s), {} attempt(s), {} chunk(s), ~{} tokens of content",
            self.usage.calls,
            self.usage.attempts,
            self.usage.chunks,
            super::progress::format_tokens(self.usage.estimated_tokens)
        )?;
        if !self.failures.is_empty() {
            writeln!(f, "Failures:")?;
            for (path, failure) in &self.failures {
                writeln!(f, "  {} [{}] {}", path, failure.reason, failure.message)?;
            }
        }
        Ok(())
    }
}
