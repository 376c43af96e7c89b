//! Source file discovery and content loading.
//!
//! Files are selected by extension allow-list, pruned by directory name and
//! glob patterns, and skipped when they look binary. Content is read only
//! when a file actually needs analysis.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

use super::error::FailureReason;
use super::fingerprint::{fingerprint_file, Fingerprint};
use crate::config::{Config, ConfigError};

/// Bytes inspected by the binary heuristic.
const SNIFF_LEN: usize = 1024;

/// Leading bytes of common binary formats.
const BINARY_MAGIC: &[&[u8]] = &[
    b"\x89PNG",
    b"GIF8",
    b"\xFF\xD8\xFF",
    b"%PDF",
    b"PK\x03\x04",
    b"\x7FELF",
    b"\xCA\xFE\xBA\xBE",
    b"\x1F\x8B",
    b"\x00asm",
    b"7z\xBC\xAF",
];

/// A candidate source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute (or root-joined) path used for I/O
    pub path: PathBuf,
    /// Path relative to the input root, `/`-separated; the cache key
    pub rel_path: String,
}

/// Text content of a file and the encoding it was decoded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub text: String,
    pub encoding: &'static str,
}

/// Why content could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("failed to read file: {0}")]
    Io(#[from] io::Error),
    #[error("content is not text (NUL byte at offset {0})")]
    Decode(usize),
}

impl ContentError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ContentError::Io(_) => FailureReason::IoError,
            ContentError::Decode(_) => FailureReason::DecodeError,
        }
    }
}

impl FileRecord {
    pub fn new(path: PathBuf, rel_path: impl Into<String>) -> Self {
        Self {
            path,
            rel_path: rel_path.into(),
        }
    }

    /// Read the raw bytes, fingerprinted together with the decoded text.
    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    /// Fingerprint of the current bytes on disk. Recomputed on every call.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint_file(&self.path)
    }

    /// Read and decode the file.
    pub fn read_content(&self) -> Result<FileContent, ContentError> {
        decode_text(&self.read_bytes()?)
    }
}

/// Decode bytes as UTF-8 (BOM stripped), falling back to Latin-1.
///
/// Bytes containing NUL are rejected as non-text.
pub fn decode_text(bytes: &[u8]) -> Result<FileContent, ContentError> {
    if let Some(pos) = bytes.iter().position(|b| *b == 0) {
        return Err(ContentError::Decode(pos));
    }
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(FileContent {
            text: text.to_string(),
            encoding: "utf-8",
        }),
        Err(_) => Ok(FileContent {
            // Every byte maps to the code point of the same value
            text: bytes.iter().map(|&b| b as char).collect(),
            encoding: "latin-1",
        }),
    }
}

/// Whether the head of a file looks binary.
pub fn looks_binary(head: &[u8]) -> bool {
    head.contains(&0) || BINARY_MAGIC.iter().any(|magic| head.starts_with(magic))
}

fn sniff(path: &Path) -> io::Result<bool> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(looks_binary(&head))
}

/// Filters applied while walking the input tree.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Lowercase extensions without the leading dot
    extensions: Vec<String>,
    exclude_dirs: Vec<String>,
    exclude_patterns: GlobSet,
    /// Absolute paths never descended into (the report directory)
    exclude_paths: Vec<PathBuf>,
}

impl DiscoveryOptions {
    pub fn new(
        extensions: &[String],
        exclude_dirs: &[String],
        exclude_patterns: &[String],
    ) -> Result<Self, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude_patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("bad exclude pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }
        let exclude_patterns = builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("bad exclude patterns: {}", e)))?;

        Ok(Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            exclude_dirs: exclude_dirs.to_vec(),
            exclude_patterns,
            exclude_paths: Vec::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut options = Self::new(
            &config.file_extensions,
            &config.exclude_dirs,
            &config.exclude_patterns,
        )?;
        options.exclude_paths.push(config.output_dir());
        Ok(options)
    }

    /// Never descend into `path`.
    pub fn exclude_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude_paths.push(path.into());
        self
    }

    fn extension_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    fn prune(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        self.exclude_dirs.iter().any(|d| *d == name)
            || self.exclude_paths.iter().any(|p| entry.path() == p)
    }
}

/// Walk `root` and return candidate files sorted by relative path.
pub fn discover_files(root: &Path, options: &DiscoveryOptions) -> io::Result<Vec<FileRecord>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("input directory not found: {}", root.display()),
        ));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !options.prune(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable path");
                continue;
            }
        };
        if !entry.file_type().is_file() || !options.extension_allowed(entry.path()) {
            continue;
        }

        let rel_path = relative_key(root, entry.path());
        if options.exclude_patterns.is_match(&rel_path) {
            tracing::debug!(file = %rel_path, "Excluded by pattern");
            continue;
        }

        match sniff(entry.path()) {
            Ok(true) => {
                tracing::debug!(file = %rel_path, "Skipping binary file");
                continue;
            }
            Ok(false) => {}
            // Unreadable now; content loading will record the failure
            Err(e) => tracing::debug!(file = %rel_path, error = %e, "Could not sniff file"),
        }

        files.push(FileRecord::new(entry.path().to_path_buf(), rel_path));
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    tracing::info!(root = %root.display(), count = files.len(), "Discovered files");
    Ok(files)
}

/// `/`-separated path of `path` below `root`.
fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
