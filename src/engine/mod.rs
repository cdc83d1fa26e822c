//! Manifest-based patch engine split into focused submodules.
//!
//! The `ManifestPatchEngine` struct and its methods are organized by domain:
//! - [`protocol`] - The [`PatchProtocol`] capability trait
//! - [`probe`] - Connectivity, platform, banner and version checks
//! - [`refresh`] - Manifest refresh against the remote checksum
//! - [`entry`] - The per-entry download-and-verify procedure
//! - [`install`] - Module download with cookie resumption, game installation
//! - [`update`] - Module update against the refreshed manifest
//! - [`verify`] - Integrity scan and repair

mod entry;
mod install;
mod probe;
mod protocol;
mod refresh;
mod update;
mod verify;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use entry::EntryAction;
pub use protocol::PatchProtocol;

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::config::Config;
use crate::error::Result;
use crate::manifest::{InstallCookie, ManifestStore, ManifestUpdatePolicy};
use crate::progress::ProgressReport;
use crate::provider::{RemoteFileProvider, provider_for_config};
use crate::types::{Event, Module, Operation, PatchOutcome};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Patch engine for one installation (cloneable - all fields are Arc-wrapped)
///
/// Operations on different modules may run concurrently. Operations on the same module
/// share the manifest files and the install cookie and must be serialized by the caller.
#[derive(Clone)]
pub struct ManifestPatchEngine {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Transport used for every remote access
    pub(crate) provider: Arc<dyn RemoteFileProvider>,
    /// Current/previous manifest slots
    pub(crate) store: Arc<ManifestStore>,
    /// Crash-recovery marker
    pub(crate) cookie: InstallCookie,
    /// Selects the entries an update downloads
    pub(crate) policy: ManifestUpdatePolicy,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl std::fmt::Debug for ManifestPatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestPatchEngine")
            .field("provider", &self.provider.name())
            .field("base_url", &self.config.remote.base_url)
            .field("system_target", &self.config.remote.system_target)
            .finish_non_exhaustive()
    }
}

impl ManifestPatchEngine {
    /// Create an engine over an explicit transport
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::error::Error::Config) if the configuration does
    /// not validate.
    pub fn new(config: Config, provider: Arc<dyn RemoteFileProvider>) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = Arc::new(ManifestStore::new(&config));
        let cookie = InstallCookie::new(&config.paths.launcher_dir);

        tracing::debug!(
            provider = provider.name(),
            base_url = %config.remote.base_url,
            system_target = %config.remote.system_target,
            "Created patch engine"
        );

        Ok(Self {
            config: Arc::new(config),
            provider,
            store,
            cookie,
            policy: ManifestUpdatePolicy,
            event_tx,
        })
    }

    /// Create an engine with the transport matching the base URL scheme
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::error::Error::Config) for invalid configuration
    /// or an unsupported scheme.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let provider = provider_for_config(&config)?;
        Self::new(config, provider)
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Engine events as a lazy stream
    ///
    /// Slow consumers see `Err(Lagged)` items when they fall behind by more than the
    /// channel capacity.
    pub fn events(&self) -> BroadcastStream<Event> {
        BroadcastStream::new(self.event_tx.subscribe())
    }

    /// The configuration the engine was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The manifest store
    pub fn manifests(&self) -> &ManifestStore {
        &self.store
    }

    /// The install-progress cookie
    pub fn install_cookie(&self) -> &InstallCookie {
        &self.cookie
    }

    /// The transport
    pub fn provider(&self) -> &Arc<dyn RemoteFileProvider> {
        &self.provider
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    pub(crate) fn emit_started(&self, module: Module, operation: Operation) {
        tracing::info!(module = %module, operation = %operation, "Operation started");
        self.emit(Event::OperationStarted { module, operation });
    }

    /// Emit operation-level progress for the entry at `index` (0-based) of `total`
    pub(crate) fn emit_entry_progress(
        &self,
        module: Module,
        operation: Operation,
        verb: &str,
        file_name: &str,
        index: usize,
        total: usize,
    ) {
        let report = ProgressReport::builder()
            .filename(file_name)
            .current(index as f64)
            .target(total as f64)
            .indicator_message(format!("{verb} file {file_name} ({} of {total})", index + 1))
            .build();
        self.emit(Event::Progress {
            module,
            operation,
            report,
        });
    }

    pub(crate) fn emit_progress(&self, module: Module, operation: Operation, report: ProgressReport) {
        self.emit(Event::Progress {
            module,
            operation,
            report,
        });
    }

    pub(crate) fn emit_entry_failed(&self, module: Module, relative_path: &str, error: String) {
        self.emit(Event::EntryFailed {
            module,
            relative_path: relative_path.to_string(),
            error,
        });
    }

    /// Log and broadcast the final state of an operation
    pub(crate) fn finish(
        &self,
        module: Module,
        operation: Operation,
        outcome: PatchOutcome,
    ) -> PatchOutcome {
        match &outcome {
            PatchOutcome::Completed { processed } => {
                tracing::info!(
                    module = %module,
                    operation = %operation,
                    processed = processed,
                    "Operation completed"
                );
            }
            PatchOutcome::Partial { processed, failed } => {
                tracing::warn!(
                    module = %module,
                    operation = %operation,
                    processed = processed,
                    failed = failed.len(),
                    "Operation finished with broken entries"
                );
            }
            PatchOutcome::Failed { processed, reason } => {
                tracing::error!(
                    module = %module,
                    operation = %operation,
                    processed = processed,
                    reason = %reason,
                    "Operation failed"
                );
            }
        }

        self.emit(Event::OperationFinished {
            module,
            operation,
            outcome: outcome.clone(),
        });
        outcome
    }
}
