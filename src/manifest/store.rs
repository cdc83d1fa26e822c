//! Local manifest slots per module
//!
//! Each module has a "current" manifest and, after the first refresh that replaced one,
//! a "previous" manifest. Both live as files in the launcher directory and are cached
//! in memory until [`ManifestStore::reload_manifests`] is called.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::Result;
use crate::manifest::{Manifest, hash_file};
use crate::types::Module;

/// Suffix appended to a manifest file name for the previous slot
const PREVIOUS_SUFFIX: &str = ".old";

#[derive(Clone, Debug, Default)]
struct ManifestSlots {
    current: Option<Manifest>,
    previous: Option<Manifest>,
}

/// Loads, caches and rotates manifest files
#[derive(Debug)]
pub struct ManifestStore {
    launcher_dir: PathBuf,
    system_target: String,
    cache: RwLock<HashMap<Module, ManifestSlots>>,
}

impl ManifestStore {
    /// Create a store rooted at the configured launcher directory
    pub fn new(config: &Config) -> Self {
        Self {
            launcher_dir: config.paths.launcher_dir.clone(),
            system_target: config.remote.system_target.clone(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Manifest for a module, loading it from disk on first use
    ///
    /// Returns `None` when the file is absent or unreadable.
    pub async fn get_manifest(&self, module: Module, previous: bool) -> Option<Manifest> {
        {
            let cache = self.cache.read().await;
            if let Some(slots) = cache.get(&module) {
                return select(slots, previous);
            }
        }

        let slots = self.load_slots(module).await;
        let manifest = select(&slots, previous);
        self.cache.write().await.insert(module, slots);
        manifest
    }

    /// Re-read both manifest slots of a module from disk
    pub async fn reload_manifests(&self, module: Module) {
        let slots = self.load_slots(module).await;
        tracing::debug!(
            module = %module,
            current_entries = slots.current.as_ref().map(Manifest::len),
            previous_entries = slots.previous.as_ref().map(Manifest::len),
            "Reloaded manifests"
        );
        self.cache.write().await.insert(module, slots);
    }

    /// Remote path of the module's manifest, relative to the provider root
    pub fn manifest_url(&self, module: Module) -> String {
        format!("{}{}", self.remote_module_dir(module), manifest_file_name(module))
    }

    /// Remote path of the module's manifest checksum, relative to the provider root
    pub fn manifest_checksum_url(&self, module: Module) -> String {
        format!(
            "{}{}.checksum",
            self.remote_module_dir(module),
            manifest_stem(module)
        )
    }

    /// Local path of a manifest slot
    pub fn manifest_local_path(&self, module: Module, is_previous: bool) -> PathBuf {
        let name = if is_previous {
            format!("{}{PREVIOUS_SUFFIX}", manifest_file_name(module))
        } else {
            manifest_file_name(module).to_string()
        };
        self.launcher_dir.join(name)
    }

    /// Whether the current manifest file exists on disk
    pub async fn has_local_manifest(&self, module: Module) -> bool {
        tokio::fs::try_exists(self.manifest_local_path(module, false))
            .await
            .unwrap_or(false)
    }

    /// Hash of the current manifest file, or `None` if there is none
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read.
    pub async fn local_manifest_hash(&self, module: Module) -> Result<Option<String>> {
        let path = self.manifest_local_path(module, false);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        Ok(Some(hash_file(&path).await?))
    }

    /// Move the current manifest into the previous slot
    ///
    /// A stale previous manifest is deleted first. Moving leaves no current manifest
    /// behind, so an interrupted refresh is seen as "missing" on the next run.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the stale backup cannot be removed or the move fails.
    pub async fn backup_current(&self, module: Module) -> Result<()> {
        let current = self.manifest_local_path(module, false);
        let previous = self.manifest_local_path(module, true);

        remove_if_exists(&previous).await?;

        if tokio::fs::try_exists(&current).await? {
            tokio::fs::rename(&current, &previous).await?;
            tracing::debug!(
                module = %module,
                backup = %previous.display(),
                "Moved current manifest into previous slot"
            );
        }

        // Both slots changed on disk
        self.cache.write().await.remove(&module);
        Ok(())
    }

    fn remote_module_dir(&self, module: Module) -> String {
        match module {
            Module::Launcher => "launcher/".to_string(),
            Module::Game => format!("game/{}/", self.system_target),
        }
    }

    async fn load_slots(&self, module: Module) -> ManifestSlots {
        ManifestSlots {
            current: load_manifest_file(&self.manifest_local_path(module, false)).await,
            previous: load_manifest_file(&self.manifest_local_path(module, true)).await,
        }
    }
}

fn select(slots: &ManifestSlots, previous: bool) -> Option<Manifest> {
    if previous {
        slots.previous.clone()
    } else {
        slots.current.clone()
    }
}

fn manifest_stem(module: Module) -> &'static str {
    match module {
        Module::Launcher => "LauncherManifest",
        Module::Game => "GameManifest",
    }
}

fn manifest_file_name(module: Module) -> &'static str {
    match module {
        Module::Launcher => "LauncherManifest.txt",
        Module::Game => "GameManifest.txt",
    }
}

async fn load_manifest_file(path: &Path) -> Option<Manifest> {
    match tokio::fs::read_to_string(path).await {
        Ok(document) => Some(Manifest::parse(&document)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read manifest file, treating it as missing"
            );
            None
        }
    }
}

pub(crate) async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
