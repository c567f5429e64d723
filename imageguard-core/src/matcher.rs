//! Near-duplicate matching against a store snapshot.

use tracing::{debug, trace};

use crate::fingerprint::Fingerprint;
use crate::store::Snapshot;

/// Default tolerance in bits (5 of 64, about 7.8%).
pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 5;

/// A stored fingerprint that fell within tolerance of the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub fingerprint: Fingerprint,
    pub distance: u32,
}

/// Decides whether a candidate fingerprint is banned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarityMatcher {
    threshold: u32,
}

impl Default for SimilarityMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl SimilarityMatcher {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// Matcher that only accepts bitwise-equal fingerprints.
    pub fn exact() -> Self {
        Self::new(0)
    }

    /// First stored fingerprint within `threshold` bits of `candidate`.
    ///
    /// Stops at the first hit. Which hit is returned depends on iteration
    /// order; whether one is returned does not.
    pub fn find_match(&self, candidate: &Fingerprint, snapshot: &Snapshot) -> Option<Match> {
        if self.threshold == 0 {
            return snapshot.contains(candidate).then_some(Match {
                fingerprint: *candidate,
                distance: 0,
            });
        }

        for stored in snapshot {
            let distance = candidate.distance(stored);
            trace!(stored = %stored, distance, "Compared fingerprint");
            if distance <= self.threshold {
                debug!(
                    candidate = %candidate,
                    stored = %stored,
                    distance,
                    threshold = self.threshold,
                    "Fingerprint within tolerance"
                );
                return Some(Match {
                    fingerprint: *stored,
                    distance,
                });
            }
        }
        None
    }

    pub fn is_banned(&self, candidate: &Fingerprint, snapshot: &Snapshot) -> bool {
        self.find_match(candidate, snapshot).is_some()
    }

    /// Smallest distance from `candidate` to any stored fingerprint, scanning
    /// the whole snapshot. `None` for an empty snapshot.
    pub fn closest(candidate: &Fingerprint, snapshot: &Snapshot) -> Option<Match> {
        snapshot
            .iter()
            .map(|stored| Match {
                fingerprint: *stored,
                distance: candidate.distance(stored),
            })
            .min_by_key(|m| m.distance)
    }
}

/// Free-function form of [`SimilarityMatcher::is_banned`].
pub fn is_banned(candidate: &Fingerprint, snapshot: &Snapshot, threshold: u32) -> bool {
    SimilarityMatcher::new(threshold).is_banned(candidate, snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(bits: &[u64]) -> Snapshot {
        bits.iter().copied().map(Fingerprint::from_u64).collect()
    }

    #[test]
    fn test_self_match_for_any_threshold() {
        let fp = Fingerprint::from_u64(0x0123_4567_89AB_CDEF);
        let store = snapshot(&[fp.as_u64()]);
        for threshold in [0, 1, 5, 64] {
            assert!(is_banned(&fp, &store, threshold));
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let store = snapshot(&[0]);
        let five_bits = Fingerprint::from_u64(0b11111);
        let six_bits = Fingerprint::from_u64(0b111111);
        assert!(is_banned(&five_bits, &store, 5));
        assert!(!is_banned(&six_bits, &store, 5));
    }

    #[test]
    fn test_empty_snapshot_never_matches() {
        let matcher = SimilarityMatcher::new(64);
        assert!(!matcher.is_banned(&Fingerprint::from_u64(0), &Snapshot::new()));
    }

    #[test]
    fn test_exact_matcher_uses_membership() {
        let store = snapshot(&[0xF0]);
        let matcher = SimilarityMatcher::exact();
        assert!(matcher.is_banned(&Fingerprint::from_u64(0xF0), &store));
        assert!(!matcher.is_banned(&Fingerprint::from_u64(0xF1), &store));
    }

    #[test]
    fn test_find_match_reports_distance() {
        let store = snapshot(&[u64::MAX, 0b1000]);
        let m = SimilarityMatcher::default()
            .find_match(&Fingerprint::from_u64(0), &store)
            .unwrap();
        assert_eq!(m.fingerprint, Fingerprint::from_u64(0b1000));
        assert_eq!(m.distance, 1);
    }

    #[test]
    fn test_closest_scans_everything() {
        let store = snapshot(&[0xFFFF, 0xFF, 0x1]);
        let closest = SimilarityMatcher::closest(&Fingerprint::from_u64(0), &store).unwrap();
        assert_eq!(closest.distance, 1);
        assert!(SimilarityMatcher::closest(&Fingerprint::from_u64(0), &Snapshot::new()).is_none());
    }

    #[test]
    fn test_adding_entries_is_monotonic() {
        let candidate = Fingerprint::from_u64(0xAAAA);
        let mut store = snapshot(&[0xFFFF_0000_0000_0000]);
        let before = is_banned(&candidate, &store, 5);
        store.insert(Fingerprint::from_u64(0x1234_5678));
        let after = is_banned(&candidate, &store, 5);
        assert!(!before || after);
    }
}
