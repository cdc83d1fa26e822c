//! Remote file transports
//!
//! The patch engine talks to the remote through the [`RemoteFileProvider`] trait. Two
//! implementations ship with the crate:
//!
//! - [`HttpRemoteFileProvider`]: HTTP(S) with byte-range resume
//! - [`LocalMirrorProvider`]: a directory tree on local disk
//!
//! Further transports only need to implement the trait; downloads then reuse the shared
//! chunked copy in [`copy_stream_to_file`], which gives them the same resume and
//! cancellation semantics.
//!
//! ## Usage
//!
//! ```no_run
//! use manifest_patch::Config;
//! use manifest_patch::provider::{HttpRemoteFileProvider, RemoteFileProvider};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::default();
//! config.remote.base_url = "https://patch.example.com/demo".to_string();
//!
//! let provider = HttpRemoteFileProvider::new(&config)?;
//! let reachable = provider.connect(&CancellationToken::new()).await?;
//! println!("patch server reachable: {reachable}");
//! # Ok(())
//! # }
//! ```

mod copy;
mod http;
mod local;
mod traits;

pub use copy::copy_stream_to_file;
pub use http::HttpRemoteFileProvider;
pub use local::LocalMirrorProvider;
pub use traits::{ByteStream, DownloadRequest, RemoteFileProvider, RemoteStream, TransferCallback};

use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};

/// Pick a provider for the configured base URL scheme
///
/// # Errors
///
/// Returns [`Error::Config`] for schemes no provider serves.
pub fn provider_for_config(config: &Config) -> Result<Arc<dyn RemoteFileProvider>> {
    let url = url::Url::parse(&config.remote.base_url)
        .map_err(|e| Error::config("remote.base_url", format!("invalid URL: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(Arc::new(HttpRemoteFileProvider::new(config)?)),
        "file" => Ok(Arc::new(LocalMirrorProvider::from_config(config)?)),
        other => Err(Error::config(
            "remote.base_url",
            format!("no remote file provider for scheme '{other}'"),
        )),
    }
}
