//! HTTP(S) remote file provider
//!
//! Existence checks use `HEAD`, reads use `GET`, and resumed downloads send a
//! `Range: bytes=<offset>-<end>` header. Servers that ignore the range answer `200`
//! with the full body; the download then restarts from byte 0.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, ProviderError, Result};
use crate::provider::traits::{RemoteFileProvider, RemoteStream};
use crate::utils::normalize_relative_path;

/// Remote file provider speaking plain HTTP(S)
#[derive(Clone, Debug)]
pub struct HttpRemoteFileProvider {
    client: reqwest::Client,
    base_url: url::Url,
    username: Option<String>,
    password: Option<String>,
    read_timeout: Duration,
}

impl HttpRemoteFileProvider {
    /// Build a provider from the remote and timeout settings
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is not http(s), or
    /// [`Error::Network`] if the HTTP client cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        // A trailing slash makes the base a directory that paths extend
        let base = format!("{}/", config.remote.base_url.trim_end_matches('/'));
        let url = url::Url::parse(&base)
            .map_err(|e| Error::config("remote.base_url", format!("invalid URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(
                "remote.base_url",
                format!("HTTP provider cannot serve '{}' URLs", url.scheme()),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.patching.connect_timeout)
            .user_agent(concat!("manifest-patch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: url,
            username: config.remote.username.clone(),
            password: config.remote.password.clone(),
            read_timeout: config.patching.read_timeout,
        })
    }

    /// Root URL every remote path is resolved against, ending in `/`
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Resolve a remote path, percent-encoding each segment
    ///
    /// Characters such as `#` and `?` are valid in file names and must stay in the path.
    fn url_for(&self, path: &str) -> Result<url::Url> {
        let path = normalize_relative_path(path);
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Other(format!("remote URL {} cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(path.trim_start_matches('/').split('/'));
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: url::Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.username {
            Some(username) => builder.basic_auth(username, self.password.as_deref()),
            None => builder,
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = tokio::time::timeout(self.read_timeout, builder.send()) => result,
        };

        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(self.classify(e, path)),
            Err(_) => Err(ProviderError::Timeout {
                path: path.to_string(),
                timeout_secs: self.read_timeout.as_secs(),
            }
            .into()),
        }
    }

    fn classify(&self, e: reqwest::Error, path: &str) -> Error {
        if e.is_timeout() {
            ProviderError::Timeout {
                path: path.to_string(),
                timeout_secs: self.read_timeout.as_secs(),
            }
            .into()
        } else if e.is_connect() {
            ProviderError::Unavailable {
                path: path.to_string(),
                reason: e.to_string(),
            }
            .into()
        } else {
            Error::Network(e)
        }
    }
}

fn status_error(status: StatusCode, path: &str) -> Error {
    if status == StatusCode::NOT_FOUND {
        ProviderError::NotFound {
            path: path.to_string(),
        }
        .into()
    } else {
        ProviderError::Status {
            path: path.to_string(),
            status: status.as_u16(),
        }
        .into()
    }
}

fn empty_stream(offset: u64) -> RemoteStream {
    RemoteStream {
        offset,
        body: Box::pin(futures::stream::empty::<Result<bytes::Bytes>>()),
    }
}

#[async_trait]
impl RemoteFileProvider for HttpRemoteFileProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn chunk_timeout(&self) -> Duration {
        self.read_timeout
    }

    async fn connect(&self, cancel: &CancellationToken) -> Result<bool> {
        let url = self.url_for("")?;
        let builder = self.request(reqwest::Method::GET, url);

        match self.send(builder, "", cancel).await {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                tracing::warn!(
                    base_url = %self.base_url,
                    status = response.status().as_u16(),
                    "Patch server answered with an error status"
                );
                Ok(false)
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!(base_url = %self.base_url, error = %e, "Unable to reach patch server");
                Ok(false)
            }
        }
    }

    async fn exists(&self, path: &str, cancel: &CancellationToken) -> Result<bool> {
        let url = self.url_for(path)?;
        let response = self
            .send(self.request(reqwest::Method::HEAD, url), path, cancel)
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status.is_server_error() {
            Err(status_error(status, path))
        } else {
            Ok(false)
        }
    }

    async fn read_to_string(&self, path: &str, cancel: &CancellationToken) -> Result<String> {
        let url = self.url_for(path)?;
        let response = self
            .send(self.request(reqwest::Method::GET, url), path, cancel)
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, path));
        }

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            body = tokio::time::timeout(self.read_timeout, response.bytes()) => body,
        };

        match body {
            Ok(Ok(bytes)) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Ok(Err(e)) => Err(self.classify(e, path)),
            Err(_) => Err(ProviderError::Timeout {
                path: path.to_string(),
                timeout_secs: self.read_timeout.as_secs(),
            }
            .into()),
        }
    }

    async fn open_stream(
        &self,
        path: &str,
        offset: u64,
        total_size: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<RemoteStream> {
        if matches!(total_size, Some(total) if offset >= total) {
            return Ok(empty_stream(offset));
        }

        let url = self.url_for(path)?;
        let mut builder = self.request(reqwest::Method::GET, url);
        if offset > 0 {
            let range = match total_size {
                Some(total) => format!("bytes={}-{}", offset, total - 1),
                None => format!("bytes={offset}-"),
            };
            builder = builder.header(reqwest::header::RANGE, range);
        }

        let response = self.send(builder, path, cancel).await?;
        let status = response.status();

        let start = match status {
            StatusCode::PARTIAL_CONTENT => offset,
            StatusCode::RANGE_NOT_SATISFIABLE => return Ok(empty_stream(offset)),
            status if status.is_success() => {
                if offset > 0 {
                    tracing::debug!(path = path, offset = offset, "Server ignored range request");
                }
                0
            }
            status => return Err(status_error(status, path)),
        };

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from));

        Ok(RemoteStream {
            offset: start,
            body: Box::pin(body),
        })
    }
}
