//! Persistent analysis cache keyed by relative file path.
//!
//! # Design
//!
//! - One in-memory map behind a single `Mutex`; every mutation and every
//!   snapshot for `persist` goes through it
//! - `persist` rewrites the whole document through a temp file and rename,
//!   serialized by a second lock so concurrent saves never interleave
//! - A missing or corrupt cache file loads as empty; the cache never blocks
//!   analysis

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;
use crate::files::write_atomic;

/// Cache record for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fingerprint of the content that was analyzed
    pub fingerprint: Fingerprint,
    /// When the analysis finished
    pub analyzed_at: DateTime<Utc>,
    /// Report written for that analysis
    pub report_path: PathBuf,
}

/// On-disk document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
}

fn default_version() -> u32 {
    CACHE_VERSION
}

const CACHE_VERSION: u32 = 1;

/// Thread-safe analysis cache.
#[derive(Debug)]
pub struct AnalysisCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
    write_lock: Mutex<()>,
}

impl AnalysisCache {
    /// Empty cache that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(BTreeMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Load the cache from `path`.
    ///
    /// Missing, unreadable or corrupt files give an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let cache = Self::new(path);
        match fs::read_to_string(&cache.path) {
            Ok(contents) => match serde_json::from_str::<CacheDocument>(&contents) {
                Ok(doc) => {
                    tracing::debug!(
                        path = %cache.path.display(),
                        entries = doc.entries.len(),
                        "Cache loaded"
                    );
                    *cache.lock() = doc.entries;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %cache.path.display(),
                        error = %e,
                        "Cache file is corrupt, starting empty"
                    );
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %cache.path.display(), "No cache file, starting empty");
            }
            Err(e) => {
                tracing::warn!(
                    path = %cache.path.display(),
                    error = %e,
                    "Cache file unreadable, starting empty"
                );
            }
        }
        cache
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Mutations are single inserts or clears, so a poisoned map is still consistent
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Entry for a relative path, if any.
    pub fn lookup(&self, rel_path: &str) -> Option<CacheEntry> {
        self.lock().get(rel_path).cloned()
    }

    /// Whether `entry` lets the file be skipped.
    ///
    /// True only if the fingerprints match, neither is the error sentinel,
    /// and the report still exists.
    pub fn is_fresh(entry: &CacheEntry, current: &Fingerprint) -> bool {
        !current.is_error()
            && !entry.fingerprint.is_error()
            && entry.fingerprint == *current
            && entry.report_path.is_file()
    }

    /// Replace the entry for `rel_path`, stamped with the current time.
    pub fn record(&self, rel_path: &str, fingerprint: Fingerprint, report_path: PathBuf) {
        let entry = CacheEntry {
            fingerprint,
            analyzed_at: Utc::now(),
            report_path,
        };
        self.lock().insert(rel_path.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of all entries, ordered by path.
    pub fn snapshot(&self) -> BTreeMap<String, CacheEntry> {
        self.lock().clone()
    }

    /// Write the whole cache to disk.
    pub fn persist(&self) -> io::Result<()> {
        let _write = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let doc = CacheDocument {
            version: CACHE_VERSION,
            entries: self.snapshot(),
        };
        let json = serde_json::to_vec_pretty(&doc)?;
        write_atomic(&self.path, &json)?;
        tracing::debug!(path = %self.path.display(), entries = doc.entries.len(), "Cache persisted");
        Ok(())
    }

    /// Drop every entry and delete the cache file.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self) -> io::Result<usize> {
        let _write = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let removed = {
            let mut entries = self.lock();
            let count = entries.len();
            entries.clear();
            count
        };
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        tracing::info!(path = %self.path.display(), removed, "Cache cleared");
        Ok(removed)
    }
}
