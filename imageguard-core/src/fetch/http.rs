//! HTTP image fetcher with retry and a response size cap.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::ImageFetcher;
use crate::error::{GuardError, Result};
use crate::http::{classify_send_error, classify_status, HttpClient, HttpConfig};

/// Default cap on downloaded image size (25 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 25 * 1024 * 1024;

/// Configuration for [`HttpImageFetcher`].
#[derive(Debug, Clone)]
pub struct HttpImageFetcherConfig {
    pub http: HttpConfig,
    /// Responses larger than this are rejected.
    pub max_bytes: usize,
}

impl Default for HttpImageFetcherConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Downloads image bytes over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: HttpClient,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpImageFetcherConfig::default())
    }

    #[instrument(level = "debug", skip_all, fields(
        timeout_ms = config.http.timeout.as_millis() as u64,
        max_bytes = config.max_bytes
    ))]
    pub fn with_config(config: HttpImageFetcherConfig) -> Result<Self> {
        let client = HttpClient::new(config.http, GuardError::Fetch)?;
        debug!("Created image fetcher");
        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<Vec<u8>, backoff::Error<GuardError>> {
        let mut response = self
            .client
            .inner()
            .get(url)
            .send()
            .await
            .map_err(|e| classify_send_error(e, GuardError::Fetch))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, GuardError::Fetch));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(backoff::Error::permanent(GuardError::Fetch(format!(
                    "Image is {length} bytes, limit is {}",
                    self.max_bytes
                ))));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify_send_error(e, GuardError::Fetch))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(backoff::Error::permanent(GuardError::Fetch(format!(
                    "Image exceeds {} byte limit",
                    self.max_bytes
                ))));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let start = Instant::now();
        let result = self.client.retry(|| self.fetch_once(url)).await;

        let latency_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(body) => debug!(latency_ms, bytes = body.len(), "Fetched image"),
            Err(e) => warn!(latency_ms, error = %e, "Failed to fetch image"),
        }
        result
    }
}
