//! In-memory image fetcher for tests and offline runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::ImageFetcher;
use crate::error::{GuardError, Result};

/// Serves registered byte blobs by exact URL. Unknown URLs fail with a fetch
/// error, as does any URL registered with [`MemoryImageFetcher::fail`].
#[derive(Debug, Default)]
pub struct MemoryImageFetcher {
    images: RwLock<HashMap<String, Option<Vec<u8>>>>,
    requests: AtomicUsize,
}

impl MemoryImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.write().insert(url.into(), Some(bytes));
    }

    /// Make fetches of `url` fail.
    pub fn fail(&self, url: impl Into<String>) {
        self.write().insert(url.into(), None);
    }

    /// Total fetch calls served, successful or not.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Option<Vec<u8>>>> {
        self.images.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ImageFetcher for MemoryImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let images = self.images.read().unwrap_or_else(|e| e.into_inner());
        match images.get(url) {
            Some(Some(bytes)) => Ok(bytes.clone()),
            Some(None) => Err(GuardError::Fetch(format!("Simulated failure for {url}"))),
            None => Err(GuardError::Fetch(format!("No image registered for {url}"))),
        }
    }
}
