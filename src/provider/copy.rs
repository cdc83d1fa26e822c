//! Chunked copy from a remote stream into a local file
//!
//! Shared by every transport. The local file is opened without truncation, cut back to
//! the stream's start offset and written chunk by chunk. Cancellation is observed
//! between chunks only, so an interrupted copy leaves a file whose length is exactly the
//! number of bytes received and which can be resumed from there.

use futures::StreamExt;
use std::io::SeekFrom;
use std::time::Duration;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ProviderError, Result};
use crate::provider::traits::{DownloadRequest, RemoteStream, TransferCallback};

/// Write `stream` into `request.local_path` starting at the stream's offset
///
/// Bytes before the offset are kept; anything after it is replaced. Each chunk read is
/// bounded by `chunk_timeout`.
///
/// # Errors
///
/// - [`Error::Cancelled`] if `cancel` fires; the bytes written so far stay on disk.
/// - [`ProviderError::Timeout`] if a chunk does not arrive in time.
/// - [`Error::Io`] for local write failures.
pub async fn copy_stream_to_file(
    stream: RemoteStream,
    request: &DownloadRequest,
    cancel: &CancellationToken,
    progress: Option<&TransferCallback>,
    chunk_timeout: Duration,
) -> Result<u64> {
    let RemoteStream { offset, mut body } = stream;

    if offset != request.offset {
        tracing::debug!(
            path = %request.remote_path,
            requested = request.offset,
            actual = offset,
            "Remote could not resume, rewriting file from the start"
        );
    }

    if let Some(parent) = request.local_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&request.local_path)
        .await?;
    file.set_len(offset).await?;
    file.seek(SeekFrom::Start(offset)).await?;

    let mut position = offset;
    if let Some(callback) = progress {
        callback(position, request.total_size);
    }

    loop {
        if cancel.is_cancelled() {
            file.flush().await?;
            return Err(Error::Cancelled);
        }

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                file.flush().await?;
                return Err(Error::Cancelled);
            }
            next = tokio::time::timeout(chunk_timeout, body.next()) => next,
        };

        let chunk = match next {
            Ok(Some(chunk)) => chunk?,
            Ok(None) => break,
            Err(_) => {
                file.flush().await?;
                return Err(ProviderError::Timeout {
                    path: request.remote_path.clone(),
                    timeout_secs: chunk_timeout.as_secs(),
                }
                .into());
            }
        };

        file.write_all(&chunk).await?;
        position += chunk.len() as u64;

        if let Some(callback) = progress {
            callback(position, request.total_size);
        }
    }

    file.flush().await?;
    file.sync_all().await?;

    tracing::debug!(
        path = %request.remote_path,
        local = %request.local_path.display(),
        bytes = position - offset,
        "Download finished"
    );

    Ok(position)
}
