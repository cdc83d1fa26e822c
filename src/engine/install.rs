//! Module download with cookie resumption, and game installation

use tokio_util::sync::CancellationToken;

use super::ManifestPatchEngine;
use crate::error::{Error, ManifestError, Result};
use crate::progress::ProgressReport;
use crate::types::{Module, Operation, PatchOutcome};

impl ManifestPatchEngine {
    /// Install the game: download every entry, then verify the result
    ///
    /// The install cookie is created first so an interrupted installation can be
    /// recognized and resumed by the next call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires; every other failure is reported
    /// through the returned [`PatchOutcome`].
    pub async fn install_game(&self, cancel: &CancellationToken) -> Result<PatchOutcome> {
        let module = Module::Game;
        self.emit_started(module, Operation::Install);

        if let Err(e) = self.cookie.ensure_exists().await {
            let outcome = PatchOutcome::Failed {
                processed: 0,
                reason: format!("failed to create install cookie: {e}"),
            };
            return Ok(self.finish(module, Operation::Install, outcome));
        }

        let downloaded = self.download_module(module, cancel).await?;
        if !downloaded.is_success() {
            return Ok(self.finish(module, Operation::Install, downloaded));
        }

        let verified = self.verify_module(module, cancel).await?;
        Ok(self.finish(module, Operation::Install, verified))
    }

    /// Download every entry of a module in manifest order
    ///
    /// The manifest is refreshed first. If the install cookie names an entry of the
    /// manifest, processing starts at that entry and skips everything before it. The
    /// first failing entry stops the pass; files already written stay in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires.
    pub async fn download_module(
        &self,
        module: Module,
        cancel: &CancellationToken,
    ) -> Result<PatchOutcome> {
        let operation = Operation::Download;
        self.emit_started(module, operation);

        match self.refresh_module_manifest(module, cancel).await {
            Ok(_) => {}
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                let outcome = PatchOutcome::Failed {
                    processed: 0,
                    reason: format!("manifest refresh failed: {e}"),
                };
                return Ok(self.finish(module, operation, outcome));
            }
        }

        let Some(manifest) = self.store.get_manifest(module, false).await else {
            tracing::error!(
                module = %module,
                "No manifest was found; the server files may be inaccessible or missing"
            );
            let outcome = PatchOutcome::Failed {
                processed: 0,
                reason: ManifestError::Missing { module }.to_string(),
            };
            return Ok(self.finish(module, operation, outcome));
        };

        let start = match self.cookie.read().await {
            Some(last) => match manifest.position(&last) {
                Some(position) => {
                    tracing::info!(
                        module = %module,
                        path = %last.relative_path(),
                        skipped = position,
                        "Resuming interrupted download pass"
                    );
                    position
                }
                None => 0,
            },
            None => 0,
        };

        let total = manifest.len();
        let mut processed = 0;

        for (index, entry) in manifest.entries().iter().enumerate().skip(start) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            self.emit_entry_progress(
                module,
                operation,
                "Downloading",
                entry.file_name(),
                index,
                total,
            );

            match self.download_entry(module, entry, None, cancel).await {
                Ok(action) => {
                    tracing::debug!(
                        module = %module,
                        path = %entry.relative_path(),
                        action = ?action,
                        "Entry processed"
                    );
                    processed += 1;
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::error!(
                        module = %module,
                        path = %entry.relative_path(),
                        error = %e,
                        "Download pass aborted"
                    );
                    self.emit_entry_failed(module, entry.relative_path(), e.to_string());
                    let outcome = PatchOutcome::Failed {
                        processed,
                        reason: format!("{}: {e}", entry.relative_path()),
                    };
                    return Ok(self.finish(module, operation, outcome));
                }
            }
        }

        self.emit_progress(
            module,
            operation,
            ProgressReport::builder()
                .current(total as f64)
                .target(total as f64)
                .indicator_message(format!("Downloaded {module} files"))
                .build(),
        );

        Ok(self.finish(module, operation, PatchOutcome::Completed { processed }))
    }
}
