//! Shared test helpers for creating ManifestPatchEngine instances in tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::engine::ManifestPatchEngine;
use crate::error::{Error, ProviderError, Result};
use crate::manifest::{Manifest, ManifestEntry, hash_bytes};
use crate::provider::{
    DownloadRequest, RemoteFileProvider, RemoteStream, TransferCallback, copy_stream_to_file,
};
use crate::types::{Event, Module};

/// Chunk size the fake serves downloads in
const FAKE_CHUNK_SIZE: usize = 4;

/// A download the fake provider was asked to perform
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RecordedDownload {
    pub(crate) path: String,
    pub(crate) offset: u64,
    pub(crate) total: Option<u64>,
}

/// In-memory remote that records every download request
#[derive(Default)]
pub(crate) struct FakeProvider {
    files: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    downloads: Mutex<Vec<RecordedDownload>>,
    unreachable: AtomicBool,
}

impl FakeProvider {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn insert(&self, path: &str, content: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
    }

    /// Make every access to `path` fail with a transport error
    pub(crate) fn fail_path(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub(crate) fn downloads(&self) -> Vec<RecordedDownload> {
        self.downloads.lock().unwrap().clone()
    }

    /// Downloads of module files, leaving out manifest fetches
    pub(crate) fn file_downloads(&self) -> Vec<RecordedDownload> {
        self.downloads()
            .into_iter()
            .filter(|d| d.path.contains("/bin/"))
            .collect()
    }

    pub(crate) fn clear_downloads(&self) {
        self.downloads.lock().unwrap().clear();
    }

    fn lookup(&self, path: &str) -> Result<Vec<u8>> {
        if self.unreachable.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(path) {
            return Err(ProviderError::Unavailable {
                path: path.to_string(),
                reason: "simulated outage".to_string(),
            }
            .into());
        }
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                ProviderError::NotFound {
                    path: path.to_string(),
                }
                .into()
            })
    }
}

#[async_trait]
impl RemoteFileProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn connect(&self, cancel: &CancellationToken) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(!self.unreachable.load(Ordering::SeqCst))
    }

    async fn exists(&self, path: &str, _cancel: &CancellationToken) -> Result<bool> {
        match self.lookup(path) {
            Ok(_) => Ok(true),
            Err(Error::Provider(ProviderError::NotFound { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn read_to_string(&self, path: &str, _cancel: &CancellationToken) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.lookup(path)?).into_owned())
    }

    async fn open_stream(
        &self,
        path: &str,
        offset: u64,
        _total_size: Option<u64>,
        _cancel: &CancellationToken,
    ) -> Result<RemoteStream> {
        let data = self.lookup(path)?;
        let start = usize::try_from(offset).unwrap().min(data.len());
        let chunks: Vec<Result<Bytes>> = data[start..]
            .chunks(FAKE_CHUNK_SIZE)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();

        Ok(RemoteStream {
            offset,
            body: Box::pin(futures::stream::iter(chunks)),
        })
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
        progress: Option<&TransferCallback>,
    ) -> Result<u64> {
        self.downloads.lock().unwrap().push(RecordedDownload {
            path: request.remote_path.clone(),
            offset: request.offset,
            total: request.total_size,
        });

        let stream = self
            .open_stream(&request.remote_path, request.offset, request.total_size, cancel)
            .await?;
        copy_stream_to_file(stream, request, cancel, progress, Duration::from_secs(5)).await
    }
}

/// Configuration rooted in a scratch directory, with transport retries disabled
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.paths.launcher_dir = root.join("launcher");
    config.paths.game_dir = root.join("game");
    config.paths.launcher_download_dir = root.join("launcher-update");
    config.remote.system_target = "Linux".to_string();
    config.retry.max_attempts = 0;
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.jitter = false;
    config.patching.file_retries = 2;
    config.patching.probe_timeout = Duration::from_secs(1);
    config
}

/// Helper to create a test engine over a fake provider.
/// Returns the engine, the provider and the tempdir (which must be kept alive).
pub(crate) fn create_test_engine() -> (ManifestPatchEngine, Arc<FakeProvider>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let provider = FakeProvider::new();
    let engine = ManifestPatchEngine::new(config, provider.clone()).unwrap();
    (engine, provider, temp_dir)
}

pub(crate) fn entry_for(path: &str, content: &[u8]) -> ManifestEntry {
    ManifestEntry::new(path, &hash_bytes(content), content.len() as u64).unwrap()
}

/// Publish module files plus their manifest and checksum on the fake remote
pub(crate) fn publish(
    engine: &ManifestPatchEngine,
    provider: &FakeProvider,
    module: Module,
    files: &[(&str, &[u8])],
) -> Manifest {
    let manifest: Manifest = files
        .iter()
        .map(|(path, content)| entry_for(path, content))
        .collect();

    let remote_root = engine.config().module_remote_root(module);
    for (path, content) in files {
        provider.insert(&format!("{remote_root}{path}"), content);
    }

    let document = manifest.to_document();
    let store = engine.manifests();
    provider.insert(&store.manifest_url(module), document.as_bytes());
    provider.insert(
        &store.manifest_checksum_url(module),
        format!("{}\n", hash_bytes(document.as_bytes())).as_bytes(),
    );

    manifest
}

/// Write a module's local manifest directly, bypassing the remote
pub(crate) async fn install_local_manifest(
    engine: &ManifestPatchEngine,
    module: Module,
    manifest: &Manifest,
    previous: bool,
) {
    let path = engine.manifests().manifest_local_path(module, previous);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, manifest.to_document()).unwrap();
    engine.manifests().reload_manifests(module).await;
}

pub(crate) fn local_file(engine: &ManifestPatchEngine, module: Module, path: &str) -> std::path::PathBuf {
    engine.config().module_local_root(module).join(path)
}

pub(crate) fn write_local(engine: &ManifestPatchEngine, module: Module, path: &str, content: &[u8]) {
    let full = local_file(engine, module, path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, content).unwrap();
}

/// Drain every event currently buffered in a receiver
pub(crate) fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
