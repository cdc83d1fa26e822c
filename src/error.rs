//! Error types for manifest-patch
//!
//! This module provides the error taxonomy for the library:
//! - Transport failures raised by [`RemoteFileProvider`](crate::provider::RemoteFileProvider)
//!   implementations ([`ProviderError`])
//! - Manifest document problems ([`ManifestError`])
//! - Local I/O, configuration and cancellation at the top level ([`Error`])
//!
//! Integrity mismatches (wrong size, wrong hash) are not errors. They are reported as
//! [`IntegrityStatus`](crate::manifest::IntegrityStatus) and trigger a redownload.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::Module;

/// Result type alias for manifest-patch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for manifest-patch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "remote.base_url")
        key: Option<String>,
    },

    /// Local I/O error (disk full, permission denied, bad path)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote file provider error
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Manifest document error
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A module name that is neither `launcher` nor `game`
    #[error("invalid module: {0}")]
    InvalidModule(String),

    /// The operation was cancelled through its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised by remote file providers
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote file does not exist
    #[error("remote file not found: {path}")]
    NotFound {
        /// Remote path, relative to the provider root
        path: String,
    },

    /// The remote did not answer within the configured timeout
    #[error("timed out after {timeout_secs}s waiting for {path}")]
    Timeout {
        /// Remote path, relative to the provider root
        path: String,
        /// The timeout that elapsed
        timeout_secs: u64,
    },

    /// The remote could not be reached
    #[error("remote unavailable for {path}: {reason}")]
    Unavailable {
        /// Remote path, relative to the provider root
        path: String,
        /// Transport-specific reason
        reason: String,
    },

    /// The remote answered with an unexpected status
    #[error("unexpected status {status} for {path}")]
    Status {
        /// Remote path, relative to the provider root
        path: String,
        /// Status code returned by the server
        status: u16,
    },
}

/// Errors raised while reading manifest documents
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A manifest line could not be parsed into an entry
    #[error("invalid manifest entry {line:?}: {reason}")]
    InvalidEntry {
        /// The offending line
        line: String,
        /// Why it was rejected
        reason: String,
    },

    /// No manifest is available for the module
    #[error("no manifest available for module {module}")]
    Missing {
        /// The module whose manifest is missing
        module: Module,
    },

    /// A relative path escapes its install root
    #[error("unsafe relative path {path:?}")]
    UnsafePath {
        /// The rejected path
        path: PathBuf,
    },
}

impl Error {
    /// Create a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error represents cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
