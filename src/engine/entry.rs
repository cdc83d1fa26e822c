//! Per-entry download-and-verify procedure
//!
//! Given an entry, the local file decides what happens:
//!
//! | Local file                  | Action                                   |
//! |-----------------------------|------------------------------------------|
//! | missing                     | fresh download                           |
//! | shorter than expected       | resume at the local length               |
//! | longer than expected        | delete, fresh download                   |
//! | right size, wrong hash      | delete, fresh download                   |
//! | right size, right hash      | skip                                     |
//!
//! Resumed bytes are not re-hashed here; the next verification pass catches a bad
//! prefix.

use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::ManifestPatchEngine;
use crate::error::{Error, Result};
use crate::manifest::{ManifestEntry, check_integrity, hash_file};
use crate::progress::ProgressReport;
use crate::provider::DownloadRequest;
use crate::retry::with_retry;
use crate::types::{Event, Module};
use crate::utils::join_remote;

/// What the per-entry procedure did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryAction {
    /// The local file was already correct
    Skipped,
    /// The file was downloaded from byte 0
    Downloaded,
    /// A partial file was continued from `offset`
    Resumed {
        /// Length of the partial file before resuming
        offset: u64,
    },
}

impl ManifestPatchEngine {
    /// Bring one entry's local file in line with the manifest
    ///
    /// The install cookie holds `entry` while work is in progress and is emptied once
    /// the entry is done. When `prior` is given and its file is still intact, that
    /// superseded version is deleted first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`], a transport error once retries are exhausted, or a
    /// local I/O error.
    pub async fn download_entry(
        &self,
        module: Module,
        entry: &ManifestEntry,
        prior: Option<&ManifestEntry>,
        cancel: &CancellationToken,
    ) -> Result<EntryAction> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let local_root = self.config.module_local_root(module);
        let local_path = entry.local_path(local_root)?;
        let remote_path = join_remote(
            &self.config.module_remote_root(module),
            entry.relative_path(),
        );

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.cookie.write(entry).await?;

        if let Some(prior) = prior {
            let prior_path = prior.local_path(local_root)?;
            if check_integrity(&prior_path, prior).await?.is_intact() {
                tracing::debug!(
                    module = %module,
                    path = %prior.relative_path(),
                    "Removing superseded version"
                );
                tokio::fs::remove_file(&prior_path).await?;
            }
        }

        let local_path_ref = local_path.as_path();
        let remote_path_ref = remote_path.as_str();
        let action = with_retry(&self.config.retry, cancel, move || {
            self.fetch_entry(module, entry, remote_path_ref, local_path_ref, cancel)
        })
        .await?;

        self.cookie.clear().await?;
        Ok(action)
    }

    async fn fetch_entry(
        &self,
        module: Module,
        entry: &ManifestEntry,
        remote_path: &str,
        local_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<EntryAction> {
        let local_len = match tokio::fs::metadata(local_path).await {
            Ok(metadata) => Some(metadata.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let (offset, action) = match local_len {
            None => (0, EntryAction::Downloaded),
            Some(len) if len < entry.size() && len > 0 => {
                tracing::info!(
                    module = %module,
                    path = %entry.relative_path(),
                    offset = len,
                    "Resuming interrupted file"
                );
                (len, EntryAction::Resumed { offset: len })
            }
            Some(len) if len < entry.size() => (0, EntryAction::Downloaded),
            Some(len) if len > entry.size() => {
                tracing::info!(
                    module = %module,
                    path = %entry.relative_path(),
                    actual = len,
                    expected = entry.size(),
                    "Restarting file larger than expected"
                );
                tokio::fs::remove_file(local_path).await?;
                (0, EntryAction::Downloaded)
            }
            Some(_) => {
                let local_hash = hash_file(local_path).await?;
                if local_hash == entry.hash() {
                    return Ok(EntryAction::Skipped);
                }
                tracing::info!(
                    module = %module,
                    path = %entry.relative_path(),
                    local = %local_hash,
                    expected = %entry.hash(),
                    "Redownloading file with hash mismatch"
                );
                tokio::fs::remove_file(local_path).await?;
                (0, EntryAction::Downloaded)
            }
        };

        let request = DownloadRequest::fresh(remote_path, local_path)
            .with_offset(offset)
            .with_total_size(entry.size());

        let event_tx = self.event_tx.clone();
        let file_name = entry.file_name().to_string();
        let report_transfer = move |written: u64, total: Option<u64>| {
            let report = ProgressReport::builder()
                .filename(file_name.as_str())
                .current(written as f64)
                .target(total.unwrap_or(written) as f64)
                .build();
            event_tx.send(Event::Transfer { module, report }).ok();
        };

        self.provider
            .download(&request, cancel, Some(&report_transfer))
            .await?;

        Ok(action)
    }
}
