//! Install-progress cookie
//!
//! A single-slot file holding the serialized [`ManifestEntry`] currently being processed.
//! It is written before an entry's work begins and emptied once the entry is done, so a
//! crash leaves the interrupted entry behind for the next run to resume from.
//!
//! Every write goes to its own sibling temp file that is then renamed over the cookie,
//! so a crash never leaves a truncated cookie and concurrent writers never share a
//! temp file.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::manifest::ManifestEntry;

/// File name of the cookie inside the launcher directory
pub const COOKIE_FILE_NAME: &str = ".install";

/// Crash-recovery marker for entry-level resumption
#[derive(Clone, Debug)]
pub struct InstallCookie {
    path: PathBuf,
}

impl InstallCookie {
    /// Cookie stored in `launcher_dir`
    pub fn new(launcher_dir: &Path) -> Self {
        Self {
            path: launcher_dir.join(COOKIE_FILE_NAME),
        }
    }

    /// Location of the cookie file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty cookie if none exists yet
    pub async fn ensure_exists(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }
        self.replace_contents("").await
    }

    /// Entry recorded in the cookie, if any
    ///
    /// An absent, empty or unparseable cookie means there is nothing to resume.
    pub async fn read(&self) -> Option<ManifestEntry> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read install cookie"
                );
                return None;
            }
        };

        let line = contents.lines().next().unwrap_or_default().trim();
        if line.is_empty() {
            return None;
        }

        match ManifestEntry::parse(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unparseable install cookie");
                None
            }
        }
    }

    /// Record `entry` as the entry being processed
    pub async fn write(&self, entry: &ManifestEntry) -> Result<()> {
        self.replace_contents(&entry.to_string()).await
    }

    /// Mark that no entry is in progress
    pub async fn clear(&self) -> Result<()> {
        self.replace_contents("").await
    }

    async fn replace_contents(&self, contents: &str) -> Result<()> {
        let path = self.path.clone();
        let contents = contents.to_owned();

        tokio::task::spawn_blocking(move || replace_contents_blocking(&path, &contents))
            .await
            .map_err(|e| Error::Other(format!("cookie write task failed: {e}")))?
    }
}

fn replace_contents_blocking(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(COOKIE_FILE_NAME)
        .suffix(".tmp")
        .tempfile_in(parent)?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::hash_bytes;
    use tempfile::tempdir;

    fn entry() -> ManifestEntry {
        ManifestEntry::new("data/big.pak", &hash_bytes(b"big"), 3).unwrap()
    }

    #[tokio::test]
    async fn test_read_absent_cookie() {
        let dir = tempdir().unwrap();
        let cookie = InstallCookie::new(dir.path());
        assert_eq!(cookie.read().await, None);
    }

    #[tokio::test]
    async fn test_written_entry_survives_a_crash() {
        let dir = tempdir().unwrap();
        let cookie = InstallCookie::new(dir.path());
        cookie.write(&entry()).await.unwrap();
        drop(cookie);

        // A fresh instance stands in for the restarted process
        let reopened = InstallCookie::new(dir.path());
        assert_eq!(reopened.read().await, Some(entry()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_do_not_collide() {
        let dir = tempdir().unwrap();
        let cookie = InstallCookie::new(dir.path());

        let writers: Vec<_> = (0..32)
            .map(|i| {
                let cookie = cookie.clone();
                tokio::spawn(async move {
                    let entry =
                        ManifestEntry::new(&format!("f{i}.bin"), &hash_bytes(b"x"), 1).unwrap();
                    cookie.write(&entry).await?;
                    cookie.clear().await
                })
            })
            .collect();

        for writer in writers {
            writer.await.unwrap().unwrap();
        }
        assert_eq!(cookie.read().await, None);
        // Only the cookie itself is left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_clear_empties_the_cookie() {
        let dir = tempdir().unwrap();
        let cookie = InstallCookie::new(dir.path());
        cookie.write(&entry()).await.unwrap();
        cookie.clear().await.unwrap();

        assert!(cookie.path().exists());
        assert_eq!(std::fs::read_to_string(cookie.path()).unwrap(), "");
        assert_eq!(cookie.read().await, None);
    }

    #[tokio::test]
    async fn test_ensure_exists_keeps_existing_contents() {
        let dir = tempdir().unwrap();
        let cookie = InstallCookie::new(dir.path());

        cookie.ensure_exists().await.unwrap();
        assert!(cookie.path().exists());

        cookie.write(&entry()).await.unwrap();
        cookie.ensure_exists().await.unwrap();
        assert_eq!(cookie.read().await, Some(entry()));
    }

    #[tokio::test]
    async fn test_garbage_cookie_reads_as_none() {
        let dir = tempdir().unwrap();
        let cookie = InstallCookie::new(dir.path());
        std::fs::write(cookie.path(), "not an entry").unwrap();
        assert_eq!(cookie.read().await, None);
    }
}
