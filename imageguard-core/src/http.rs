//! Shared HTTP client with retry, backoff and transient-error classification.
//!
//! Used by the image fetcher and the Cloud Vision oracle client.

use std::future::Future;
use std::time::Duration;

use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use tracing::warn;

use crate::error::{GuardError, Result};

/// Configuration for an HTTP client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
    /// Refuse plain-text HTTP.
    pub https_only: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 2,
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            https_only: false,
        }
    }
}

/// HTTP client wrapper that owns its retry policy.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
}

impl HttpClient {
    /// Create a new HTTP client. `make_err` selects the error kind reported
    /// if the underlying client cannot be built.
    pub fn new(config: HttpConfig, make_err: fn(String) -> GuardError) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .https_only(config.https_only)
            .user_agent(concat!("imageguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| make_err(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Run `operation` until it succeeds, fails permanently, or the retry
    /// budget runs out.
    pub async fn retry<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, backoff::Error<GuardError>>>,
    {
        retry_notify(
            self.build_backoff(),
            operation,
            |err: GuardError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries.max(1)),
            ..Default::default()
        }
    }
}

/// Classify a send error as transient or permanent.
pub fn classify_send_error(
    error: reqwest::Error,
    make_err: fn(String) -> GuardError,
) -> backoff::Error<GuardError> {
    if is_transient_error(&error) {
        warn!(error = %error, "Transient error, will retry");
        backoff::Error::transient(make_err(format!("Transient error (will retry): {error}")))
    } else {
        warn!(error = %error, "Permanent error, aborting");
        backoff::Error::permanent(make_err(format!("Request failed: {error}")))
    }
}

/// Classify a non-success HTTP status as transient or permanent.
pub fn classify_status(
    status: StatusCode,
    make_err: fn(String) -> GuardError,
) -> backoff::Error<GuardError> {
    let err = make_err(format!("Server returned status: {status}"));
    if is_transient_status(status) {
        warn!(status = %status, "Transient HTTP status, will retry");
        backoff::Error::transient(err)
    } else {
        warn!(status = %status, "Permanent HTTP error");
        backoff::Error::permanent(err)
    }
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_status_codes() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_create_client() {
        assert!(HttpClient::new(HttpConfig::default(), GuardError::Fetch).is_ok());
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let client = HttpClient::new(HttpConfig::default(), GuardError::Fetch).unwrap();
        let mut attempts = 0;
        let result: Result<()> = client
            .retry(|| {
                attempts += 1;
                async { Err(backoff::Error::permanent(GuardError::Fetch("gone".into()))) }
            })
            .await;
        assert!(matches!(result, Err(GuardError::Fetch(_))));
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let client = HttpClient::new(HttpConfig::default(), GuardError::Fetch).unwrap();
        let mut attempts = 0;
        let result = client
            .retry(|| {
                attempts += 1;
                let current = attempts;
                async move {
                    if current < 2 {
                        Err(backoff::Error::transient(GuardError::Fetch("flaky".into())))
                    } else {
                        Ok(current)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
    }
}
