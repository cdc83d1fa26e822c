//! Integrity scan and repair

use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::ManifestPatchEngine;
use crate::error::{Error, ManifestError, Result};
use crate::manifest::{IntegrityStatus, ManifestEntry, check_integrity};
use crate::progress::ProgressReport;
use crate::types::{Event, FailedEntry, Module, Operation, PatchOutcome};

/// Share of the verify progress bar taken by the scan; repairs fill the rest
const SCAN_SHARE: f64 = 0.5;

impl ManifestPatchEngine {
    /// Check every entry of a module and redownload broken ones
    ///
    /// Entries failing the size or hash check are queued, then each queued entry is
    /// redownloaded up to `patching.file_retries` times, re-checking after every attempt.
    /// Entries still broken afterwards are reported in [`PatchOutcome::Partial`]; a
    /// broken entry never stops the pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires.
    pub async fn verify_module(
        &self,
        module: Module,
        cancel: &CancellationToken,
    ) -> Result<PatchOutcome> {
        let operation = Operation::Verify;
        self.emit_started(module, operation);

        let Some(manifest) = self.store.get_manifest(module, false).await else {
            tracing::error!(
                module = %module,
                "No manifest was found when verifying; the server files may be inaccessible or missing"
            );
            let outcome = PatchOutcome::Failed {
                processed: 0,
                reason: ManifestError::Missing { module }.to_string(),
            };
            return Ok(self.finish(module, operation, outcome));
        };

        let local_root = self.config.module_local_root(module).clone();
        let total = manifest.len();
        let mut queued: Vec<(&ManifestEntry, String)> = Vec::new();

        for (index, entry) in manifest.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let name = entry.file_name();
            self.emit_progress(
                module,
                operation,
                ProgressReport::builder()
                    .filename(name)
                    .fraction(SCAN_SHARE * index as f64 / total as f64)
                    .indicator_message(format!("Verifying file {name} ({} of {total})", index + 1))
                    .build(),
            );

            let reason = match entry_status(entry, &local_root).await {
                Ok(IntegrityStatus::Intact) => continue,
                Ok(status) => status.describe(entry),
                Err(e) => e.to_string(),
            };

            tracing::info!(
                module = %module,
                path = %entry.relative_path(),
                reason = %reason,
                "File failed its integrity check and was queued for redownload"
            );
            self.emit(Event::EntryQueued {
                module,
                relative_path: entry.relative_path().to_string(),
            });
            queued.push((entry, reason));
        }

        let queued_count = queued.len();
        let file_retries = self.config.patching.file_retries;
        let mut failed = Vec::new();

        for (index, (entry, initial_reason)) in queued.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let name = entry.file_name();
            self.emit_progress(
                module,
                operation,
                ProgressReport::builder()
                    .filename(name)
                    .fraction(SCAN_SHARE + (1.0 - SCAN_SHARE) * index as f64 / queued_count as f64)
                    .indicator_message(format!(
                        "Downloading file {name} ({} of {queued_count})",
                        index + 1
                    ))
                    .build(),
            );

            match self
                .repair_entry(module, entry, &local_root, file_retries, cancel)
                .await?
            {
                None => {}
                Some(reason) => {
                    let reason = if file_retries == 0 { initial_reason } else { reason };
                    tracing::warn!(
                        module = %module,
                        path = %entry.relative_path(),
                        attempts = file_retries,
                        reason = %reason,
                        "File is still broken after exhausting redownload attempts"
                    );
                    self.emit_entry_failed(module, entry.relative_path(), reason.clone());
                    failed.push(FailedEntry {
                        relative_path: entry.relative_path().to_string(),
                        reason,
                    });
                }
            }
        }

        self.emit_progress(
            module,
            operation,
            ProgressReport::builder()
                .fraction(1.0)
                .indicator_message(format!("Verified {module} files"))
                .build(),
        );

        let outcome = if failed.is_empty() {
            PatchOutcome::Completed { processed: total }
        } else {
            PatchOutcome::Partial {
                processed: total,
                failed,
            }
        };
        Ok(self.finish(module, operation, outcome))
    }

    /// Redownload `entry` until it is intact or `attempts` are used up
    ///
    /// Returns `None` once the entry is intact, or the last reason it is still broken.
    async fn repair_entry(
        &self,
        module: Module,
        entry: &ManifestEntry,
        local_root: &Path,
        attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let mut reason = String::from("not attempted");

        for attempt in 1..=attempts {
            if let Err(e) = self.download_entry(module, entry, None, cancel).await {
                if e.is_cancelled() {
                    return Err(e);
                }
                tracing::warn!(
                    module = %module,
                    path = %entry.relative_path(),
                    attempt = attempt,
                    error = %e,
                    "Redownload attempt failed"
                );
                reason = e.to_string();
                continue;
            }

            match entry_status(entry, local_root).await {
                Ok(IntegrityStatus::Intact) => return Ok(None),
                Ok(status) => {
                    reason = status.describe(entry);
                    tracing::info!(
                        module = %module,
                        path = %entry.relative_path(),
                        attempt = attempt,
                        reason = %reason,
                        "File failed its integrity check again after redownloading"
                    );
                }
                Err(e) => reason = e.to_string(),
            }
        }

        Ok(Some(reason))
    }
}

async fn entry_status(entry: &ManifestEntry, local_root: &Path) -> Result<IntegrityStatus> {
    let path = entry.local_path(local_root)?;
    check_integrity(&path, entry).await
}
