//! Transient-failure retry for transport calls
//!
//! Remote reads and entry downloads can fail for reasons that go away on their own: a
//! stalled chunk, a refused connection, a `503` from an overloaded mirror. [`with_retry`]
//! re-runs such a call while its error is [`IsRetryable`], waiting an exponentially
//! growing (and optionally jittered) delay between attempts. Cancelling the token ends
//! the wait at once with [`Error::Cancelled`].
//!
//! Retrying an entry download is safe: the per-entry procedure re-derives what to do
//! from the bytes already on disk, so a retried download resumes instead of restarting.
//!
//! # Example
//!
//! ```no_run
//! use manifest_patch::config::RetryConfig;
//! use manifest_patch::retry::with_retry;
//! use manifest_patch::{LocalMirrorProvider, RemoteFileProvider};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> manifest_patch::Result<()> {
//! let provider = LocalMirrorProvider::new("/srv/patch-mirror");
//! let cancel = CancellationToken::new();
//!
//! let version = with_retry(&RetryConfig::default(), &cancel, || {
//!     provider.read_to_string("launcher/LauncherVersion.txt", &cancel)
//! })
//! .await?;
//! println!("remote launcher version: {version}");
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, ProviderError, Result};
use rand::Rng;
use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Classifies an error as transient or permanent
///
/// Transient failures (timeouts, connection resets, 5xx answers) return `true`.
/// Permanent failures (missing file, disk full, cancellation) return `false`.
pub trait IsRetryable {
    /// Whether the failed call is worth repeating
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout { .. } | ProviderError::Unavailable { .. } => true,
            // Server-side trouble and throttling
            ProviderError::Status { status, .. } => *status >= 500 || *status == 429,
            ProviderError::NotFound { .. } => false,
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Provider(e) => e.is_retryable(),
            // Only connection-level kinds; local disk failures are permanent
            Error::Io(e) => matches!(
                e.kind(),
                ErrorKind::TimedOut
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::NotConnected
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ),
            Error::Cancelled
            | Error::Config { .. }
            | Error::Manifest(_)
            | Error::Serialization(_)
            | Error::InvalidModule(_)
            | Error::Other(_) => false,
        }
    }
}

/// Delay schedule for one retried call
#[derive(Debug)]
struct Backoff<'a> {
    config: &'a RetryConfig,
    next: Duration,
    retries: u32,
}

impl<'a> Backoff<'a> {
    fn new(config: &'a RetryConfig) -> Self {
        Self {
            config,
            next: config.initial_delay,
            retries: 0,
        }
    }

    /// Delay before the next attempt, or `None` once the retry budget is spent
    fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.config.max_attempts {
            return None;
        }
        self.retries += 1;

        let base = self.next;
        let grown = Duration::from_secs_f64(base.as_secs_f64() * self.config.backoff_multiplier);
        self.next = grown.min(self.config.max_delay);

        Some(if self.config.jitter {
            add_jitter(base)
        } else {
            base
        })
    }
}

/// Run `operation`, repeating it after transient failures
///
/// At most `config.max_attempts` retries follow the first attempt. The delay starts at
/// `initial_delay`, is multiplied by `backoff_multiplier` after each retry and capped at
/// `max_delay`.
///
/// Returns the first success, or the last error once it is permanent or the retry
/// budget is spent. Returns [`Error::Cancelled`] if `cancel` fires while a retry is
/// pending.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = Backoff::new(config);

    loop {
        let error = match operation().await {
            Ok(value) => {
                if backoff.retries > 0 {
                    tracing::info!(retries = backoff.retries, "Transport call succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            tracing::debug!(error = %error, "Transport call failed permanently");
            return Err(error);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let Some(delay) = backoff.next_delay() else {
            tracing::error!(
                error = %error,
                retries = backoff.retries,
                "Transport call still failing after every retry"
            );
            return Err(error);
        };

        tracing::warn!(
            error = %error,
            retry = backoff.retries,
            max_retries = config.max_attempts,
            delay_ms = delay.as_millis(),
            "Transport call failed, retrying"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Retry wait cancelled");
                return Err(Error::Cancelled);
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Stretch `delay` by a random factor in `[1, 2]`
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=2.0);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}
