//! Test configuration helpers for creating engines over a local mirror

use manifest_patch::{Config, LocalMirrorProvider, ManifestPatchEngine};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// An engine wired to a mirror directory, with both trees kept alive
pub struct TestSetup {
    /// Engine under test
    pub engine: ManifestPatchEngine,
    /// Root of the remote mirror
    pub mirror: PathBuf,
    /// Directory the game is installed into
    pub game_dir: PathBuf,
    _temp_dir: TempDir,
}

/// Configuration with every local path under `root`
pub fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.remote.base_url = url::Url::from_directory_path(root.join("mirror"))
        .unwrap()
        .to_string();
    config.remote.system_target = "Linux".to_string();
    config.paths.launcher_dir = root.join("launcher");
    config.paths.game_dir = root.join("game");
    config.paths.launcher_download_dir = root.join("launcher-update");
    config.retry.max_attempts = 1;
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.jitter = false;
    config
}

/// Create an engine over an empty local mirror
pub fn create_mirror_engine() -> TestSetup {
    let temp_dir = tempfile::tempdir().unwrap();
    let mirror = temp_dir.path().join("mirror");
    std::fs::create_dir_all(&mirror).unwrap();

    let config = test_config(temp_dir.path());
    let game_dir = config.paths.game_dir.clone();
    let provider = Arc::new(LocalMirrorProvider::new(&mirror));
    let engine = ManifestPatchEngine::new(config, provider).unwrap();

    TestSetup {
        engine,
        mirror,
        game_dir,
        _temp_dir: temp_dir,
    }
}
