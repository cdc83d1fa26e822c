//! Content hashing and integrity checks
//!
//! Manifests carry lowercase hex MD5 digests. Hashing reads the file in fixed-size
//! chunks on the blocking pool so large game archives never sit in memory at once.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::manifest::ManifestEntry;

/// Chunk size for streaming hashes
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Result of comparing a local file against its manifest entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntegrityStatus {
    /// Size and hash match
    Intact,
    /// No regular file at the expected path
    Missing,
    /// File exists with the wrong length
    SizeMismatch {
        /// Length found on disk
        actual: u64,
    },
    /// File has the right length but different content
    HashMismatch {
        /// Digest found on disk
        actual: String,
    },
}

impl IntegrityStatus {
    /// Whether the local file matches its entry
    pub fn is_intact(&self) -> bool {
        matches!(self, IntegrityStatus::Intact)
    }

    /// Short description used when an entry stays broken
    pub fn describe(&self, entry: &ManifestEntry) -> String {
        match self {
            IntegrityStatus::Intact => "intact".to_string(),
            IntegrityStatus::Missing => "file is missing".to_string(),
            IntegrityStatus::SizeMismatch { actual } => {
                format!("size is {actual} bytes, expected {}", entry.size())
            }
            IntegrityStatus::HashMismatch { actual } => {
                format!("hash is {actual}, expected {}", entry.hash())
            }
        }
    }
}

/// Compute the lowercase hex MD5 digest of a byte slice
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Compute the lowercase hex MD5 digest of a file
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened or read.
pub async fn hash_file(path: &Path) -> Result<String> {
    let path: PathBuf = path.to_path_buf();

    tokio::task::spawn_blocking(move || hash_file_blocking(&path))
        .await
        .map_err(|e| Error::Other(format!("hashing task failed: {e}")))?
}

fn hash_file_blocking(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }

    Ok(format!("{:x}", context.compute()))
}

/// Compare the file at `path` against `entry`
///
/// The hash is only computed when the size already matches.
///
/// # Errors
///
/// Returns [`Error::Io`] for failures other than the file being absent.
pub async fn check_integrity(path: &Path, entry: &ManifestEntry) -> Result<IntegrityStatus> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(IntegrityStatus::Missing);
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_file() {
        return Ok(IntegrityStatus::Missing);
    }

    if metadata.len() != entry.size() {
        return Ok(IntegrityStatus::SizeMismatch {
            actual: metadata.len(),
        });
    }

    let actual = hash_file(path).await?;
    if actual != entry.hash() {
        return Ok(IntegrityStatus::HashMismatch { actual });
    }

    Ok(IntegrityStatus::Intact)
}
