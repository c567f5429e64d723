//! Fingerprint store: the persisted, append-only blacklist.
//!
//! The store is the single source of truth for banned fingerprints. Readers
//! take a [`Snapshot`] at the start of every moderation or curation run and
//! never cache it across runs. Writers only ever append.
//!
//! Snapshots are allowed to be stale with respect to appends that happen
//! after they were taken. Matching is monotonic in the store contents, so a
//! stale snapshot can miss a block but never cause a false one.

mod file;
mod memory;

pub use file::{parse_log, FileFingerprintStore};
pub use memory::MemoryFingerprintStore;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::fingerprint::Fingerprint;

/// Read/append handle to the banned fingerprint log.
///
/// Implementations must be thread-safe and must serialize appends so that two
/// concurrent calls never produce a merged or torn entry.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Read the current contents as a set.
    ///
    /// A missing backing resource is an empty snapshot, not an error.
    /// Malformed entries are skipped.
    async fn load_snapshot(&self) -> Result<Snapshot>;

    /// Append one fingerprint. Does not deduplicate.
    async fn append(&self, fingerprint: Fingerprint) -> Result<()>;
}

/// Point-in-time view of the store, interpreted as a set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    fingerprints: HashSet<Fingerprint>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Number of distinct fingerprints.
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.fingerprints.iter()
    }

    pub fn insert(&mut self, fingerprint: Fingerprint) -> bool {
        self.fingerprints.insert(fingerprint)
    }
}

impl FromIterator<Fingerprint> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Fingerprint>>(iter: I) -> Self {
        Self {
            fingerprints: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Fingerprint;
    type IntoIter = std::collections::hash_set::Iter<'a, Fingerprint>;

    fn into_iter(self) -> Self::IntoIter {
        self.fingerprints.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_a_set() {
        let fp = Fingerprint::from_u64(42);
        let snapshot: Snapshot = [fp, fp, Fingerprint::from_u64(7)].into_iter().collect();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&fp));
        assert!(!snapshot.contains(&Fingerprint::from_u64(8)));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::new();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.iter().count(), 0);
    }
}
