//! Per-file failure records.
//!
//! A failed file never aborts a run. Its failure is kept as a
//! machine-readable reason code plus a human-readable message and shown
//! in the run summary.

use std::fmt;

use serde::Serialize;

use super::provider::ProviderError;

/// Machine-readable reason a file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// File could not be read
    IoError,
    /// File is not decodable text
    DecodeError,
    /// File is empty or whitespace only
    NoContent,
    /// Provider call failed after retries
    ProviderError,
    /// Provider refused on content-policy grounds
    ProviderBlocked,
    /// Every chunk failed, or the synthesis call failed
    SynthesisError,
    /// Report could not be written
    ReportWriteError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::IoError => "io_error",
            FailureReason::DecodeError => "decode_error",
            FailureReason::NoContent => "no_content",
            FailureReason::ProviderError => "provider_error",
            FailureReason::ProviderBlocked => "provider_blocked",
            FailureReason::SynthesisError => "synthesis_error",
            FailureReason::ReportWriteError => "report_write_error",
        }
    }

    /// Reason for a provider error that ended a single-pass analysis.
    pub fn from_provider(err: &ProviderError) -> Self {
        if err.is_blocked() {
            FailureReason::ProviderBlocked
        } else {
            FailureReason::ProviderError
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub reason: FailureReason,
    pub message: String,
}

impl FileFailure {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

impl std::error::Error for FileFailure {}
