//! Configuration types for manifest-patch
//!
//! [`Config`] is a plain value object. The host application builds it once (from a
//! file, flags, or code) and hands it to
//! [`ManifestPatchEngine::new`](crate::engine::ManifestPatchEngine::new); nothing in the
//! library reads configuration from ambient state.

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};
use crate::types::Module;

/// Remote patch server settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Root of the remote patch tree (default: "http://localhost/patch")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Platform directory name under `game/` (default: "Linux")
    #[serde(default = "default_system_target")]
    pub system_target: String,

    /// Username for the file server, if it requires credentials
    #[serde(default)]
    pub username: Option<String>,

    /// Password for the file server
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            system_target: default_system_target(),
            username: None,
            password: None,
        }
    }
}

/// Local directory layout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Launcher data directory holding manifests and the install cookie (default: ".")
    #[serde(default = "default_launcher_dir")]
    pub launcher_dir: PathBuf,

    /// Game install root (default: "./game")
    #[serde(default = "default_game_dir")]
    pub game_dir: PathBuf,

    /// Staging directory that launcher updates are downloaded into (default: "./launcher-update")
    #[serde(default = "default_launcher_download_dir")]
    pub launcher_download_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            launcher_dir: default_launcher_dir(),
            game_dir: default_game_dir(),
            launcher_download_dir: default_launcher_download_dir(),
        }
    }
}

/// Patching behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatchingConfig {
    /// Redownload attempts per broken file during verification (default: 2)
    #[serde(default = "default_file_retries")]
    pub file_retries: u32,

    /// Timeout for the connectivity probe (default: 4 seconds)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,

    /// Timeout for establishing a connection (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Timeout for each read from the remote, including each download chunk (default: 30 seconds)
    #[serde(default = "default_read_timeout", with = "duration_serde")]
    pub read_timeout: Duration,

    /// Version of the running launcher (default: "0.0.0")
    #[serde(default = "default_launcher_version")]
    pub launcher_version: String,
}

impl Default for PatchingConfig {
    fn default() -> Self {
        Self {
            file_retries: default_file_retries(),
            probe_timeout: default_probe_timeout(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            launcher_version: default_launcher_version(),
        }
    }
}

/// Retry configuration for transient transport failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for ManifestPatchEngine
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote patch server settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local directory layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Patching behavior
    #[serde(default)]
    pub patching: PatchingConfig,

    /// Retry behavior for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Parse a JSON configuration document and validate it
    ///
    /// Omitted fields take their defaults. Reading the document from disk is left to
    /// the host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the document is not valid JSON for this
    /// shape, or [`Error::Config`] if it fails [`Config::validate`].
    pub fn from_json(document: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL does not parse as an http(s) or file URL,
    /// or if the system target is empty or contains a path separator.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.remote.base_url)
            .map_err(|e| Error::config("remote.base_url", format!("invalid URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https" | "file") {
            return Err(Error::config(
                "remote.base_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        let target = self.remote.system_target.trim();
        if target.is_empty() {
            return Err(Error::config(
                "remote.system_target",
                "system target must not be empty",
            ));
        }
        if target.contains(['/', '\\']) {
            return Err(Error::config(
                "remote.system_target",
                "system target must be a single path segment",
            ));
        }

        Ok(())
    }

    /// Remote directory holding the module's files, relative to the remote root
    pub fn module_remote_root(&self, module: Module) -> String {
        match module {
            Module::Launcher => "launcher/bin/".to_string(),
            Module::Game => format!("game/{}/bin/", self.remote.system_target),
        }
    }

    /// Local directory the module's files are written to
    pub fn module_local_root(&self, module: Module) -> &PathBuf {
        match module {
            Module::Launcher => &self.paths.launcher_download_dir,
            Module::Game => &self.paths.game_dir,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost/patch".to_string()
}

fn default_system_target() -> String {
    "Linux".to_string()
}

fn default_launcher_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_game_dir() -> PathBuf {
    PathBuf::from("./game")
}

fn default_launcher_download_dir() -> PathBuf {
    PathBuf::from("./launcher-update")
}

fn default_file_retries() -> u32 {
    2
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(4)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_launcher_version() -> String {
    "0.0.0".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Durations are stored as whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
