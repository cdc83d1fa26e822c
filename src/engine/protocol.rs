//! The patch protocol capability trait

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::engine::ManifestPatchEngine;
use crate::error::Result;
use crate::types::{Module, PatchOutcome};

/// What a patch protocol can do for a launcher
///
/// Probes answer `false` instead of failing when the remote is unreachable. Module
/// operations return a [`PatchOutcome`]; `Err` is reserved for cancellation and
/// contract violations.
///
/// # Examples
///
/// ```no_run
/// use manifest_patch::{Config, ManifestPatchEngine, Module, PatchProtocol};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = ManifestPatchEngine::from_config(Config::default())?;
/// let cancel = CancellationToken::new();
///
/// if engine.can_patch(&cancel).await && engine.is_module_outdated(Module::Game, &cancel).await? {
///     let outcome = engine.update_module(Module::Game, &cancel).await?;
///     println!("update finished: {outcome:?}");
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait PatchProtocol: Send + Sync {
    /// Whether the remote can be reached within the probe timeout
    async fn can_patch(&self, cancel: &CancellationToken) -> bool;

    /// Whether the remote publishes a build for `target`
    async fn is_platform_available(&self, target: &str, cancel: &CancellationToken) -> bool;

    /// Whether the remote publishes a launcher banner
    async fn can_provide_banner(&self, cancel: &CancellationToken) -> bool;

    /// Download the launcher banner to `local_path`
    async fn download_banner(&self, local_path: &Path, cancel: &CancellationToken) -> Result<()>;

    /// Whether the local module version is older than the remote one
    async fn is_module_outdated(&self, module: Module, cancel: &CancellationToken) -> Result<bool>;

    /// Redownload the module manifest if it is missing or stale
    ///
    /// Returns whether a new manifest was downloaded.
    async fn refresh_module_manifest(
        &self,
        module: Module,
        cancel: &CancellationToken,
    ) -> Result<bool>;

    /// Install the game: download every entry, then verify
    async fn install_game(&self, cancel: &CancellationToken) -> Result<PatchOutcome>;

    /// Download every entry of a module, resuming from the install cookie
    async fn download_module(&self, module: Module, cancel: &CancellationToken)
    -> Result<PatchOutcome>;

    /// Bring a module up to date with its refreshed manifest
    async fn update_module(&self, module: Module, cancel: &CancellationToken) -> Result<PatchOutcome>;

    /// Check every entry of a module and redownload broken ones
    async fn verify_module(&self, module: Module, cancel: &CancellationToken) -> Result<PatchOutcome>;
}

#[async_trait]
impl PatchProtocol for ManifestPatchEngine {
    async fn can_patch(&self, cancel: &CancellationToken) -> bool {
        ManifestPatchEngine::can_patch(self, cancel).await
    }

    async fn is_platform_available(&self, target: &str, cancel: &CancellationToken) -> bool {
        ManifestPatchEngine::is_platform_available(self, target, cancel).await
    }

    async fn can_provide_banner(&self, cancel: &CancellationToken) -> bool {
        ManifestPatchEngine::can_provide_banner(self, cancel).await
    }

    async fn download_banner(&self, local_path: &Path, cancel: &CancellationToken) -> Result<()> {
        ManifestPatchEngine::download_banner(self, local_path, cancel).await
    }

    async fn is_module_outdated(&self, module: Module, cancel: &CancellationToken) -> Result<bool> {
        ManifestPatchEngine::is_module_outdated(self, module, cancel).await
    }

    async fn refresh_module_manifest(
        &self,
        module: Module,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        ManifestPatchEngine::refresh_module_manifest(self, module, cancel).await
    }

    async fn install_game(&self, cancel: &CancellationToken) -> Result<PatchOutcome> {
        ManifestPatchEngine::install_game(self, cancel).await
    }

    async fn download_module(
        &self,
        module: Module,
        cancel: &CancellationToken,
    ) -> Result<PatchOutcome> {
        ManifestPatchEngine::download_module(self, module, cancel).await
    }

    async fn update_module(&self, module: Module, cancel: &CancellationToken) -> Result<PatchOutcome> {
        ManifestPatchEngine::update_module(self, module, cancel).await
    }

    async fn verify_module(&self, module: Module, cancel: &CancellationToken) -> Result<PatchOutcome> {
        ManifestPatchEngine::verify_module(self, module, cancel).await
    }
}
