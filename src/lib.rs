//! # manifest-patch
//!
//! Manifest-driven patch client for a launcher and its game.
//!
//! ## Design Philosophy
//!
//! manifest-patch is designed to be:
//! - **Resumable** - Interrupted installs continue at the entry and byte they stopped at
//! - **Transport-agnostic** - HTTP(S) and local mirrors sit behind one trait
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to progress events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use manifest_patch::{Config, ManifestPatchEngine, Module};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.remote.base_url = "https://patch.example.com/".to_string();
//!     config.remote.system_target = "Linux".to_string();
//!
//!     let engine = ManifestPatchEngine::from_config(config)?;
//!     let cancel = CancellationToken::new();
//!
//!     // Subscribe to events
//!     let mut events = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     if engine.can_patch(&cancel).await && engine.is_module_outdated(Module::Game, &cancel).await? {
//!         let outcome = engine.update_module(Module::Game, &cancel).await?;
//!         println!("Update finished: {:?}", outcome);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Patch engine and the protocol it implements (decomposed into focused submodules)
pub mod engine;
/// Error types
pub mod error;
/// Manifest model, storage and integrity checks
pub mod manifest;
/// Progress snapshots
pub mod progress;
/// Remote file transports
pub mod provider;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

use tokio_util::sync::CancellationToken;

// Re-export commonly used types
pub use config::Config;
pub use engine::{EntryAction, ManifestPatchEngine, PatchProtocol};
pub use error::{Error, ManifestError, ProviderError, Result};
pub use manifest::{InstallCookie, Manifest, ManifestEntry, ManifestStore};
pub use progress::ProgressReport;
pub use provider::{DownloadRequest, HttpRemoteFileProvider, LocalMirrorProvider, RemoteFileProvider};
pub use types::{Event, FailedEntry, Module, ModuleVersion, Operation, PatchOutcome};

/// Cancel `token` once the process receives a termination signal.
///
/// Running operations observe the token between chunks and entries, so every file on
/// disk is left resumable.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use manifest_patch::{Config, ManifestPatchEngine, cancel_on_shutdown};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = ManifestPatchEngine::from_config(Config::default())?;
///     let cancel = CancellationToken::new();
///     tokio::spawn(cancel_on_shutdown(cancel.clone()));
///
///     let outcome = engine.install_game(&cancel).await?;
///     println!("Install finished: {:?}", outcome);
///     Ok(())
/// }
/// ```
pub async fn cancel_on_shutdown(token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {}
        _ = wait_for_signal() => {
            tracing::info!("Cancelling running patch operations");
            token.cancel();
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register Unix signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
