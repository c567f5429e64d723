//! In-memory fingerprint store for tests and dry runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{FingerprintStore, Snapshot};
use crate::error::{GuardError, Result};
use crate::fingerprint::Fingerprint;

/// Volatile fingerprint log. Keeps every appended entry, duplicates included,
/// so tests can observe growth.
#[derive(Debug, Default)]
pub struct MemoryFingerprintStore {
    entries: Mutex<Vec<Fingerprint>>,
    fail_loads: AtomicBool,
    fail_appends: AtomicBool,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fingerprints(fingerprints: impl IntoIterator<Item = Fingerprint>) -> Self {
        Self {
            entries: Mutex::new(fingerprints.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Number of log entries, duplicates included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the raw log, in append order.
    pub fn entries(&self) -> Vec<Fingerprint> {
        self.lock().clone()
    }

    /// Make subsequent loads fail with a store load error.
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent appends fail with a store write error.
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Fingerprint>> {
        // A poisoned log is still a valid log: entries are only ever pushed.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl FingerprintStore for MemoryFingerprintStore {
    async fn load_snapshot(&self) -> Result<Snapshot> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(GuardError::StoreLoad("Simulated load failure".into()));
        }
        Ok(self.lock().iter().copied().collect())
    }

    async fn append(&self, fingerprint: Fingerprint) -> Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(GuardError::StoreWrite("Simulated write failure".into()));
        }
        self.lock().push(fingerprint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_keeps_duplicates() {
        let store = MemoryFingerprintStore::new();
        let fp = Fingerprint::from_u64(9);
        store.append(fp).await.unwrap();
        store.append(fp).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.load_snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_simulated_failures() {
        let store = MemoryFingerprintStore::with_fingerprints([Fingerprint::from_u64(1)]);
        store.set_fail_loads(true);
        assert!(matches!(
            store.load_snapshot().await,
            Err(GuardError::StoreLoad(_))
        ));

        store.set_fail_appends(true);
        assert!(matches!(
            store.append(Fingerprint::from_u64(2)).await,
            Err(GuardError::StoreWrite(_))
        ));
        assert_eq!(store.len(), 1);
    }
}
