//! Module update against the refreshed manifest

use tokio_util::sync::CancellationToken;

use super::ManifestPatchEngine;
use crate::error::{Error, ManifestError, Result};
use crate::progress::ProgressReport;
use crate::types::{Module, Operation, PatchOutcome};

impl ManifestPatchEngine {
    /// Bring a module up to date with its refreshed manifest
    ///
    /// Every entry of the current manifest goes through the per-entry procedure in
    /// manifest order; entries whose content changed since the previous manifest first
    /// drop the superseded file. The first failure stops the pass and nothing is rolled
    /// back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires.
    pub async fn update_module(
        &self,
        module: Module,
        cancel: &CancellationToken,
    ) -> Result<PatchOutcome> {
        let operation = Operation::Update;
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

        let Some(current) = self.store.get_manifest(module, false).await else {
            tracing::error!(
                module = %module,
                "No manifest was found when updating; the server files may be inaccessible or missing"
            );
            let outcome = PatchOutcome::Failed {
                processed: 0,
                reason: ManifestError::Missing { module }.to_string(),
            };
            return Ok(self.finish(module, operation, outcome));
        };
        let previous = self.store.get_manifest(module, true).await;

        let plan = self.policy.plan_update(&current, previous.as_ref());
        let replacing = plan.iter().filter(|p| p.replacing.is_some()).count();
        tracing::info!(
            module = %module,
            entries = plan.len(),
            replacing = replacing,
            "Updating module"
        );

        let total = plan.len();
        let mut processed = 0;

        for (index, planned) in plan.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let entry = &planned.entry;
            self.emit_entry_progress(module, operation, "Updating", entry.file_name(), index, total);

            match self
                .download_entry(module, entry, planned.replacing.as_ref(), cancel)
                .await
            {
                Ok(_) => processed += 1,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        module = %module,
                        path = %entry.relative_path(),
                        error = %e,
                        "Updating of module files failed"
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
                .indicator_message(format!("Updated {module} files"))
                .build(),
        );

        Ok(self.finish(module, operation, PatchOutcome::Completed { processed }))
    }
}
