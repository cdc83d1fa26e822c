//! Remote file provider backed by a local directory tree
//!
//! Serves a mirror of the remote layout from disk: removable media, a network share
//! mounted locally, or a scratch directory in tests.

use async_trait::async_trait;
use futures::StreamExt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncSeekExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, ProviderError, Result};
use crate::provider::traits::{RemoteFileProvider, RemoteStream};
use crate::utils::{join_relative, normalize_relative_path};

/// Serves files from a local directory
#[derive(Clone, Debug)]
pub struct LocalMirrorProvider {
    root: PathBuf,
    read_timeout: Duration,
}

impl LocalMirrorProvider {
    /// Mirror rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_timeout: Duration::from_secs(30),
        }
    }

    /// Mirror for a `file://` base URL
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is not a local file URL.
    pub fn from_config(config: &Config) -> Result<Self> {
        let url = url::Url::parse(&config.remote.base_url)
            .map_err(|e| Error::config("remote.base_url", format!("invalid URL: {e}")))?;
        if url.scheme() != "file" {
            return Err(Error::config(
                "remote.base_url",
                "a local mirror needs a file:// URL",
            ));
        }
        let root = url
            .to_file_path()
            .map_err(|()| Error::config("remote.base_url", "URL is not a local path"))?;

        Ok(Self {
            root,
            read_timeout: config.patching.read_timeout,
        })
    }

    /// Root directory of the mirror
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        join_relative(&self.root, &normalize_relative_path(path))
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

fn map_not_found(e: std::io::Error, path: &str) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        ProviderError::NotFound {
            path: path.to_string(),
        }
        .into()
    } else {
        e.into()
    }
}

#[async_trait]
impl RemoteFileProvider for LocalMirrorProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn chunk_timeout(&self) -> Duration {
        self.read_timeout
    }

    async fn connect(&self, cancel: &CancellationToken) -> Result<bool> {
        check_cancelled(cancel)?;
        match tokio::fs::metadata(&self.root).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) => {
                tracing::warn!(
                    root = %self.root.display(),
                    error = %e,
                    "Local mirror is not reachable"
                );
                Ok(false)
            }
        }
    }

    async fn exists(&self, path: &str, cancel: &CancellationToken) -> Result<bool> {
        check_cancelled(cancel)?;
        let resolved = self.resolve(path)?;
        Ok(tokio::fs::try_exists(resolved).await?)
    }

    async fn read_to_string(&self, path: &str, cancel: &CancellationToken) -> Result<String> {
        check_cancelled(cancel)?;
        let resolved = self.resolve(path)?;
        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|e| map_not_found(e, path))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn open_stream(
        &self,
        path: &str,
        offset: u64,
        _total_size: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<RemoteStream> {
        check_cancelled(cancel)?;
        let resolved = self.resolve(path)?;
        let mut file = tokio::fs::File::open(&resolved)
            .await
            .map_err(|e| map_not_found(e, path))?;

        let len = file.metadata().await?.len();
        if offset >= len {
            return Ok(RemoteStream {
                offset,
                body: Box::pin(futures::stream::empty::<Result<bytes::Bytes>>()),
            });
        }

        file.seek(SeekFrom::Start(offset)).await?;
        let body = ReaderStream::new(file).map(|chunk| chunk.map_err(Error::from));

        Ok(RemoteStream {
            offset,
            body: Box::pin(body),
        })
    }
}
