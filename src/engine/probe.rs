//! Connectivity, platform, banner and version checks

use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::ManifestPatchEngine;
use crate::error::{Error, Result};
use crate::provider::DownloadRequest;
use crate::retry::with_retry;
use crate::types::{Module, ModuleVersion};
use crate::utils::{join_remote, strip_line_separators_and_nulls};

/// Remote path of the launcher banner
pub(crate) const BANNER_PATH: &str = "launcher/banner.png";

/// Remote path of the launcher version file
pub(crate) const LAUNCHER_VERSION_PATH: &str = "launcher/LauncherVersion.txt";

/// Name of the game version file, both remotely (under the game binaries) and locally
pub(crate) const GAME_VERSION_FILE: &str = "GameVersion.txt";

impl ManifestPatchEngine {
    /// Whether the remote can be reached within the probe timeout
    ///
    /// Timeouts, unreachable remotes and cancellation all yield `false`.
    pub async fn can_patch(&self, cancel: &CancellationToken) -> bool {
        tracing::info!(
            provider = self.provider.name(),
            "Pinging remote patch server to determine if we can connect to it"
        );

        let probe_timeout = self.config.patching.probe_timeout;
        match tokio::time::timeout(probe_timeout, self.provider.connect(cancel)).await {
            Ok(Ok(reachable)) => reachable,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Unable to connect to remote patch server");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = probe_timeout.as_secs(),
                    "Remote patch server did not answer in time"
                );
                false
            }
        }
    }

    /// Whether the remote publishes a build for `target`
    pub async fn is_platform_available(&self, target: &str, cancel: &CancellationToken) -> bool {
        let marker = format!("game/{}/.provides", target.trim());
        self.probe_exists(&marker, cancel).await
    }

    /// Whether the remote publishes a launcher banner
    pub async fn can_provide_banner(&self, cancel: &CancellationToken) -> bool {
        self.probe_exists(BANNER_PATH, cancel).await
    }

    /// Download the launcher banner to `local_path`
    ///
    /// # Errors
    ///
    /// Returns the transport or I/O error once retries are exhausted.
    pub async fn download_banner(&self, local_path: &Path, cancel: &CancellationToken) -> Result<()> {
        let request = DownloadRequest::fresh(BANNER_PATH, local_path);
        let provider = &self.provider;
        let request_ref = &request;

        with_retry(&self.config.retry, cancel, move || {
            provider.download(request_ref, cancel, None)
        })
        .await?;

        tracing::debug!(path = %local_path.display(), "Downloaded launcher banner");
        Ok(())
    }

    /// Whether the local module version is older than the remote one
    ///
    /// Transport failures are logged and answer `false`; an unparseable remote version
    /// counts as `0.0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires.
    pub async fn is_module_outdated(&self, module: Module, cancel: &CancellationToken) -> Result<bool> {
        let local = self.local_version(module).await;
        let remote = match self.remote_version(module, cancel).await {
            Ok(remote) => remote,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!(
                    module = %module,
                    error = %e,
                    "Unable to determine whether the module is outdated"
                );
                return Ok(false);
            }
        };

        let outdated = local < remote;
        tracing::debug!(
            module = %module,
            local = %local,
            remote = %remote,
            outdated = outdated,
            "Compared module versions"
        );
        Ok(outdated)
    }

    /// Version of the module installed locally
    ///
    /// The launcher version comes from configuration; the game version from
    /// `GameVersion.txt` in the game directory. Missing or unparseable values are `0.0.0`.
    pub async fn local_version(&self, module: Module) -> ModuleVersion {
        match module {
            Module::Launcher => {
                ModuleVersion::parse_or_zero(&self.config.patching.launcher_version, "config")
            }
            Module::Game => {
                let path = self.config.paths.game_dir.join(GAME_VERSION_FILE);
                match tokio::fs::read_to_string(&path).await {
                    Ok(text) => ModuleVersion::parse_or_zero(
                        &strip_line_separators_and_nulls(&text),
                        "local game version file",
                    ),
                    Err(e) => {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            tracing::warn!(
                                path = %path.display(),
                                error = %e,
                                "Failed to read local game version"
                            );
                        }
                        ModuleVersion::zero()
                    }
                }
            }
        }
    }

    /// Version of the module published by the remote
    ///
    /// # Errors
    ///
    /// Returns the transport error once retries are exhausted.
    pub async fn remote_version(&self, module: Module, cancel: &CancellationToken) -> Result<ModuleVersion> {
        let path = match module {
            Module::Launcher => LAUNCHER_VERSION_PATH.to_string(),
            Module::Game => join_remote(&self.config.module_remote_root(Module::Game), GAME_VERSION_FILE),
        };

        let text = self.read_remote(&path, cancel).await?;
        Ok(ModuleVersion::parse_or_zero(
            &strip_line_separators_and_nulls(&text),
            &path,
        ))
    }

    /// Read a small remote text file with transient-failure retry
    pub(crate) async fn read_remote(&self, path: &str, cancel: &CancellationToken) -> Result<String> {
        let provider = &self.provider;
        with_retry(&self.config.retry, cancel, move || provider.read_to_string(path, cancel)).await
    }

    async fn probe_exists(&self, path: &str, cancel: &CancellationToken) -> bool {
        let probe_timeout = self.config.patching.probe_timeout;
        match tokio::time::timeout(probe_timeout, self.provider.exists(path, cancel)).await {
            Ok(Ok(exists)) => exists,
            Ok(Err(e)) => {
                tracing::warn!(path = path, error = %e, "Existence check failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    path = path,
                    timeout_secs = probe_timeout.as_secs(),
                    "Existence check timed out"
                );
                false
            }
        }
    }
}
