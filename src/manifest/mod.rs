//! Manifest documents and local manifest state
//!
//! A manifest is a newline-delimited text document with one entry per line in the form
//! `relativePath:hash:size`. Order is the canonical download order.
//!
//! - [`ManifestEntry`] / [`Manifest`] - parsing and serialization
//! - [`hash`] - content hashing and integrity checks against an entry
//! - [`ManifestStore`] - current/previous manifest slots per module
//! - [`InstallCookie`] - crash-recovery marker for the entry being processed
//! - [`ManifestUpdatePolicy`] - selects the entries an update pass downloads

pub mod hash;

mod cookie;
mod plan;
mod store;

pub use cookie::InstallCookie;
pub use hash::{IntegrityStatus, check_integrity, hash_bytes, hash_file};
pub use plan::{ManifestUpdatePolicy, PlannedEntry};
pub use store::ManifestStore;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, ManifestError, Result};
use crate::utils::{join_relative, normalize_relative_path, strip_line_separators_and_nulls};

/// Field delimiter within a manifest line
pub const FIELD_DELIMITER: char = ':';

/// Length of a hex-encoded MD5 digest
const HASH_HEX_LEN: usize = 32;

/// One file the remote expects to exist locally
///
/// Full equality (`==`) compares path, hash and size. Use
/// [`is_same_file`](Self::is_same_file) to compare by path only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    relative_path: String,
    hash: String,
    size: u64,
}

impl ManifestEntry {
    /// Create an entry, normalizing the path separator and hash case
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::UnsafePath`] for absolute paths or paths containing `..`,
    /// and [`ManifestError::InvalidEntry`] for an empty path or a malformed hash.
    pub fn new(relative_path: &str, hash: &str, size: u64) -> Result<Self> {
        let relative_path = normalize_relative_path(relative_path);
        let hash = hash.trim().to_ascii_lowercase();

        if relative_path.is_empty() {
            return Err(invalid_entry(&relative_path, "empty path"));
        }
        if relative_path.starts_with('/') || has_parent_segment(&relative_path) {
            return Err(ManifestError::UnsafePath {
                path: PathBuf::from(relative_path),
            }
            .into());
        }
        if hash.len() != HASH_HEX_LEN || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid_entry(
                &relative_path,
                &format!("expected a {HASH_HEX_LEN}-character hex digest, got {hash:?}"),
            ));
        }

        Ok(Self {
            relative_path,
            hash,
            size,
        })
    }

    /// Parse one manifest line
    ///
    /// The last two `:`-separated fields are the hash and the size; everything before
    /// them is the path, so paths may themselves contain `:`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::InvalidEntry`] when the line does not have three fields
    /// or the size is not an unsigned integer.
    pub fn parse(line: &str) -> Result<Self> {
        let cleaned = strip_line_separators_and_nulls(line);
        let cleaned = cleaned.trim();

        let mut fields = cleaned.rsplitn(3, FIELD_DELIMITER);
        let (Some(size), Some(hash), Some(path)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(invalid_entry(cleaned, "expected path:hash:size"));
        };

        let size = size
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid_entry(cleaned, &format!("invalid size: {e}")))?;

        Self::new(path, hash, size)
    }

    /// Module-relative path with `/` separators
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Lowercase hex MD5 digest of the expected content
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Expected length in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Final path segment, used in progress messages
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    /// Whether both entries describe the same file, regardless of version
    pub fn is_same_file(&self, other: &ManifestEntry) -> bool {
        self.relative_path == other.relative_path
    }

    /// Local path of this entry under `root`
    pub fn local_path(&self, root: &Path) -> Result<PathBuf> {
        join_relative(root, &self.relative_path)
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}",
            self.relative_path, self.hash, self.size
        )
    }
}

impl FromStr for ManifestEntry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn has_parent_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment == "..")
}

fn invalid_entry(line: &str, reason: &str) -> Error {
    ManifestError::InvalidEntry {
        line: line.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Ordered list of manifest entries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest from entries in download order
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Parse a manifest document
    ///
    /// Blank lines are ignored. Lines that fail to parse are skipped with a warning so a
    /// single corrupt line does not block patching of every other file.
    pub fn parse(document: &str) -> Self {
        let mut entries = Vec::new();

        for (index, line) in document.lines().enumerate() {
            let line = strip_line_separators_and_nulls(line);
            if line.trim().is_empty() {
                continue;
            }

            match ManifestEntry::parse(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        line_number = index + 1,
                        error = %e,
                        "Skipping malformed manifest entry"
                    );
                }
            }
        }

        Self { entries }
    }

    /// Serialize back into the line-oriented document format
    pub fn to_document(&self) -> String {
        let mut document = String::new();
        for entry in &self.entries {
            document.push_str(&entry.to_string());
            document.push('\n');
        }
        document
    }

    /// Entries in download order
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Iterate entries in download order
    pub fn iter(&self) -> std::slice::Iter<'_, ManifestEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry with the given relative path
    pub fn find_by_path(&self, relative_path: &str) -> Option<&ManifestEntry> {
        let relative_path = normalize_relative_path(relative_path);
        self.entries
            .iter()
            .find(|entry| entry.relative_path == relative_path)
    }

    /// Position of the first entry fully equal to `entry`
    pub fn position(&self, entry: &ManifestEntry) -> Option<usize> {
        self.entries.iter().position(|candidate| candidate == entry)
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ManifestEntry;
    type IntoIter = std::slice::Iter<'a, ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<ManifestEntry> for Manifest {
    fn from_iter<I: IntoIterator<Item = ManifestEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
