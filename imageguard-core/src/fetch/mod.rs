//! Retrieval of raw image bytes for a candidate URL.

#[cfg(feature = "network")]
mod http;
mod memory;

#[cfg(feature = "network")]
pub use http::{HttpImageFetcher, HttpImageFetcherConfig, DEFAULT_MAX_IMAGE_BYTES};
pub use memory::MemoryImageFetcher;

use async_trait::async_trait;

use crate::error::Result;

/// Source of image bytes.
///
/// Failures are reported as [`GuardError::Fetch`](crate::GuardError::Fetch).
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
