//! Manifest refresh against the remote checksum

use tokio_util::sync::CancellationToken;

use super::ManifestPatchEngine;
use crate::error::Result;
use crate::provider::DownloadRequest;
use crate::retry::with_retry;
use crate::types::Module;
use crate::utils::strip_line_separators_and_nulls;

impl ManifestPatchEngine {
    /// Redownload the module manifest if it is missing or stale
    ///
    /// A local manifest is stale when its MD5 differs from the remote checksum file.
    /// Returns whether a new manifest was downloaded.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the checksum or manifest cannot be fetched, or
    /// [`Error::Cancelled`](crate::error::Error::Cancelled).
    pub async fn refresh_module_manifest(
        &self,
        module: Module,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if !self.is_manifest_outdated(module, cancel).await? {
            tracing::debug!(module = %module, "Local manifest is up to date");
            return Ok(false);
        }

        self.download_module_manifest(module, cancel).await?;
        Ok(true)
    }

    /// Whether the local manifest is missing or differs from the remote checksum
    pub async fn is_manifest_outdated(&self, module: Module, cancel: &CancellationToken) -> Result<bool> {
        let Some(local_hash) = self.store.local_manifest_hash(module).await? else {
            tracing::info!(module = %module, "No local manifest, downloading");
            return Ok(true);
        };

        let checksum_url = self.store.manifest_checksum_url(module);
        let remote_hash = self.read_remote(&checksum_url, cancel).await?;
        let remote_hash = strip_line_separators_and_nulls(&remote_hash)
            .trim()
            .to_ascii_lowercase();

        let outdated = remote_hash != local_hash;
        if outdated {
            tracing::info!(
                module = %module,
                local = %local_hash,
                remote = %remote_hash,
                "Local manifest is out of date"
            );
        }
        Ok(outdated)
    }

    /// Move the current manifest aside and download a fresh one
    ///
    /// A failed backup is logged and the download goes ahead; the missing backup only
    /// costs the update pass its replacement hints.
    async fn download_module_manifest(&self, module: Module, cancel: &CancellationToken) -> Result<()> {
        if let Err(e) = self.store.backup_current(module).await {
            tracing::warn!(
                module = %module,
                error = %e,
                "Failed to back up the current manifest, continuing without a backup"
            );
        }

        let local_path = self.store.manifest_local_path(module, false);
        let mut partial_name = local_path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        partial_name.push(".part");
        let partial_path = local_path.with_file_name(partial_name);

        let request = DownloadRequest::fresh(self.store.manifest_url(module), &partial_path);
        let provider = &self.provider;
        let request_ref = &request;
        with_retry(&self.config.retry, cancel, move || {
            provider.download(request_ref, cancel, None)
        })
        .await?;

        // Only a complete download becomes the current manifest
        tokio::fs::rename(&partial_path, &local_path).await?;

        self.store.reload_manifests(module).await;
        tracing::info!(module = %module, "Downloaded new manifest");
        Ok(())
    }
}
