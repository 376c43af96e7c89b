//! File analysis pipeline.
//!
//! Discovers source files, skips the ones whose fingerprint matches the
//! cache, and sends the rest to an LLM provider. Files that exceed the
//! provider's budget are split into chunks, analyzed chunk by chunk and
//! synthesized into one result. Each result becomes a report on disk.
//!
//! # Module Structure
//!
//! - [`discovery`] - file selection and content decoding
//! - [`fingerprint`] - content hashes for change detection
//! - [`cache`] - persisted fingerprint/report records
//! - [`chunk`] - token budgets and text splitting
//! - [`provider`] - provider trait and the OpenAI, Gemini, Hugging Face and
//!   Claude CLI backends
//! - [`orchestrator`] - per-file state machine and run driver
//! - [`report`] - report rendering in text, JSON and Markdown

pub mod cache;
pub mod chunk;
pub mod discovery;
pub mod error;
pub mod findings;
pub mod fingerprint;
pub mod orchestrator;
pub mod process;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod report;
pub mod result;
pub mod retry;
pub mod worker;

pub use cache::{AnalysisCache, CacheEntry};
pub use chunk::{TextChunker, TokenBudget, CHARS_PER_TOKEN};
pub use discovery::{discover_files, DiscoveryOptions, FileRecord};
pub use error::{FailureReason, FileFailure};
pub use findings::{FindingsSource, StaticAnalyzer};
pub use fingerprint::Fingerprint;
pub use orchestrator::{
    FileOrchestrator, FileOutcome, FileState, FileStatus, OrchestratorSettings, RunSummary,
    SkipReason, StopSignal, Usage,
};
pub use progress::RunProgress;
pub use prompt::PromptTemplates;
pub use provider::{
    create_provider, ChatBackend, ChunkRecord, LlmProvider, Provider, ProviderError, ProviderKind,
};
pub use report::ReportWriter;
pub use result::{AnalysisMode, AnalysisResult};
pub use retry::{RetryPolicy, Retryable};
pub use worker::{ParallelExecutor, ProgressReporter, WorkerScaler};
