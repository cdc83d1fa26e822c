//! Utility functions for text scrubbing and path manipulation

use crate::error::{ManifestError, Result};
use std::path::{Component, Path, PathBuf};

/// Strip line separators and null bytes from text read off a remote
///
/// Transports may append `\r\n` or pad small files with NUL bytes; checksum and version
/// files must be compared without them.
///
/// # Examples
///
/// ```
/// use manifest_patch::utils::strip_line_separators_and_nulls;
///
/// assert_eq!(strip_line_separators_and_nulls("1.2.3\r\n\0"), "1.2.3");
/// ```
pub fn strip_line_separators_and_nulls(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\0'))
        .collect()
}

/// Normalize a module-relative path to forward slashes
///
/// Manifests produced on Windows use backslashes; `/` is the canonical separator.
pub fn normalize_relative_path(path: &str) -> String {
    path.trim().replace('\\', "/")
}

/// Join a canonical `/`-separated relative path onto a local root
///
/// # Errors
///
/// Returns [`ManifestError::UnsafePath`] when the path is absolute or contains `..`,
/// since such a path would write outside `root`.
///
/// # Examples
///
/// ```
/// use manifest_patch::utils::join_relative;
/// use std::path::Path;
///
/// let path = join_relative(Path::new("/games/demo"), "data/maps/a.map").unwrap();
/// assert_eq!(path, Path::new("/games/demo/data/maps/a.map"));
///
/// assert!(join_relative(Path::new("/games/demo"), "../../etc/passwd").is_err());
/// ```
pub fn join_relative(root: &Path, relative_path: &str) -> Result<PathBuf> {
    let relative = Path::new(relative_path);
    let mut joined = root.to_path_buf();

    for component in relative.components() {
        match component {
            Component::Normal(segment) => joined.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ManifestError::UnsafePath {
                    path: relative.to_path_buf(),
                }
                .into());
            }
        }
    }

    Ok(joined)
}

/// Join a relative path onto a `/`-terminated remote directory
pub fn join_remote(base: &str, relative_path: &str) -> String {
    let relative = normalize_relative_path(relative_path);
    let relative = relative.trim_start_matches('/');
    if base.is_empty() || base.ends_with('/') {
        format!("{base}{relative}")
    } else {
        format!("{base}/{relative}")
    }
}
