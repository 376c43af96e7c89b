//! Content fingerprints used for change detection.
//!
//! A fingerprint is the lowercase hex SHA-256 of a file's raw bytes. It is
//! recomputed on every run and never stored anywhere except as the
//! "last seen" value inside a cache entry.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Marker stored in place of a digest when the file could not be read.
///
/// Not valid hex and not 64 characters long, so it can never collide
/// with a real digest.
const ERROR_SENTINEL: &str = "ERROR_HASH";

/// Read buffer size for streaming hashes.
const READ_BUF_SIZE: usize = 64 * 1024;

/// SHA-256 digest of a file's content, or the error sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The sentinel produced for unreadable files.
    pub fn error() -> Self {
        Self(ERROR_SENTINEL.to_string())
    }

    /// Whether this is the unreadable-file sentinel.
    pub fn is_error(&self) -> bool {
        self.0 == ERROR_SENTINEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint an in-memory byte slice.
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint(format!("{:x}", hasher.finalize()))
}

/// Fingerprint a file on disk.
///
/// Never fails: any I/O error yields [`Fingerprint::error`], which is never
/// considered fresh, so the file is re-analyzed instead of silently skipped.
pub fn fingerprint_file(path: &Path) -> Fingerprint {
    match hash_file(path) {
        Ok(fp) => fp,
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "failed to fingerprint file");
            Fingerprint::error()
        }
    }
}

fn hash_file(path: &Path) -> io::Result<Fingerprint> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint(format!("{:x}", hasher.finalize())))
}
