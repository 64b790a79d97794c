//! Sparse symmetric cache of region-pair potentials.
//!
//! Only "hot" pairs are stored: a freshly merged region caches its potentials
//! against survivors when its member count exceeds the configured threshold.
//! Entries are keyed by the ordered id pair (min, max), so each unordered
//! pair is stored once. A tombstone distinguishes "known stale" from "never
//! computed"; lookups treat both as missing.

use std::collections::{HashMap, HashSet};

use crate::region::RegionId;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Entry {
    Value(f64),
    /// Formerly computed, now known stale. Kept distinct from deletion so a
    /// stale parent-era value is never read as a merged-era value.
    Tombstone,
}

/// Symmetric `(RegionId, RegionId) → potential` store with explicit
/// invalidation on merge.
#[derive(Debug, Default)]
pub struct PotentialCache {
    entries: HashMap<(RegionId, RegionId), Entry>,
    /// Which ids each id has entries against, for O(degree) invalidation.
    partners: HashMap<RegionId, HashSet<RegionId>>,
}

fn key(a: RegionId, b: RegionId) -> (RegionId, RegionId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl PotentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached potential for an unordered pair, or `None` when absent or
    /// tombstoned.
    pub fn get(&self, a: RegionId, b: RegionId) -> Option<f64> {
        match self.entries.get(&key(a, b)) {
            Some(Entry::Value(v)) => Some(*v),
            _ => None,
        }
    }

    /// Store a potential for an unordered pair, overwriting any previous
    /// value or tombstone.
    pub fn insert(&mut self, a: RegionId, b: RegionId, pot: f64) {
        self.entries.insert(key(a, b), Entry::Value(pot));
        self.partners.entry(a).or_default().insert(b);
        self.partners.entry(b).or_default().insert(a);
    }

    /// Mark every entry involving `id` as stale.
    ///
    /// Used for the id-inheriting parent of a merge: the merged region will
    /// reuse the same id, and a stale parent-era value must never satisfy a
    /// merged-era lookup.
    pub fn tombstone_all(&mut self, id: RegionId) {
        if let Some(others) = self.partners.get(&id) {
            for &other in others {
                self.entries.insert(key(id, other), Entry::Tombstone);
            }
        }
    }

    /// Drop every entry involving `id`.
    ///
    /// Used for the retiring parent whose id dies with it; nothing will ever
    /// look the id up again.
    pub fn purge(&mut self, id: RegionId) {
        if let Some(others) = self.partners.remove(&id) {
            for other in others {
                self.entries.remove(&key(id, other));
                if let Some(set) = self.partners.get_mut(&other) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.partners.remove(&other);
                    }
                }
            }
        }
    }

    /// Total entries, tombstones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tombstoned entries.
    pub fn tombstones(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e, Entry::Tombstone))
            .count()
    }
}
