//! Traits and types for remote file transports

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::provider::copy::copy_stream_to_file;

/// Boxed stream of byte chunks read from a remote file
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Byte progress callback: `(bytes_on_disk, expected_total)`
pub type TransferCallback = dyn Fn(u64, Option<u64>) + Send + Sync;

/// A remote file opened for reading
pub struct RemoteStream {
    /// Byte position the stream actually starts at
    ///
    /// Equal to the requested offset unless the transport could not seek, in which
    /// case the stream starts at 0 and the local file is rewritten from the start.
    pub offset: u64,
    /// The remaining content
    pub body: ByteStream,
}

impl std::fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStream")
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

/// Parameters of a single file download
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Remote path, relative to the provider root
    pub remote_path: String,
    /// Destination on the local filesystem
    pub local_path: PathBuf,
    /// Byte offset to resume from; bytes before it are kept
    pub offset: u64,
    /// Expected final length, when known
    pub total_size: Option<u64>,
}

impl DownloadRequest {
    /// A download from byte 0
    pub fn fresh(remote_path: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            remote_path: remote_path.into(),
            local_path: local_path.into(),
            offset: 0,
            total_size: None,
        }
    }

    /// Resume from `offset`
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the expected final length
    pub fn with_total_size(mut self, total_size: u64) -> Self {
        self.total_size = Some(total_size);
        self
    }
}

/// Transport abstraction used by the patch engine
///
/// All paths are relative to the provider's root and use `/` separators. Every
/// operation takes a cancellation token; a cancelled call returns
/// [`Error::Cancelled`](crate::error::Error::Cancelled).
///
/// Implementations only need to provide [`open_stream`](Self::open_stream) for
/// downloads; the default [`download`](Self::download) writes the stream to disk with
/// resume semantics.
///
/// # Examples
///
/// ```no_run
/// use manifest_patch::provider::{DownloadRequest, LocalMirrorProvider, RemoteFileProvider};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = LocalMirrorProvider::new("/mnt/mirror");
/// let cancel = CancellationToken::new();
///
/// if provider.exists("launcher/LauncherVersion.txt", &cancel).await? {
///     let version = provider.read_to_string("launcher/LauncherVersion.txt", &cancel).await?;
///     println!("remote launcher version: {version}");
/// }
///
/// let request = DownloadRequest::fresh("launcher/banner.png", "/tmp/banner.png");
/// provider.download(&request, &cancel, None).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait RemoteFileProvider: Send + Sync {
    /// Short transport name for logs
    fn name(&self) -> &str;

    /// Read timeout applied to each chunk of a download
    fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// Establish or confirm a usable session
    ///
    /// Returns `Ok(false)` when the remote is unreachable.
    async fn connect(&self, cancel: &CancellationToken) -> Result<bool>;

    /// Whether a remote file exists
    async fn exists(&self, path: &str, cancel: &CancellationToken) -> Result<bool>;

    /// Read a small remote file as text, decoding invalid UTF-8 lossily
    async fn read_to_string(&self, path: &str, cancel: &CancellationToken) -> Result<String>;

    /// Open a remote file for reading from `offset`
    ///
    /// An offset at or past the end of the file yields an empty stream. `total_size`
    /// lets transports bound the requested range.
    async fn open_stream(
        &self,
        path: &str,
        offset: u64,
        total_size: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<RemoteStream>;

    /// Copy a remote file to disk, keeping any bytes before `request.offset`
    ///
    /// Returns the length of the local file afterwards.
    async fn download(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
        progress: Option<&TransferCallback>,
    ) -> Result<u64> {
        let stream = self
            .open_stream(
                &request.remote_path,
                request.offset,
                request.total_size,
                cancel,
            )
            .await?;

        copy_stream_to_file(stream, request, cancel, progress, self.chunk_timeout()).await
    }
}
