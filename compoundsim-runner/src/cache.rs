//! In-memory snapshot cache keyed by parameter fingerprint.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use compoundsim_core::ParamsFingerprint;

use crate::session::Snapshot;

/// Default number of snapshots kept by a session.
pub const DEFAULT_CAPACITY: usize = 32;

/// Bounded cache of computed snapshots.
///
/// Evicts the oldest insertion once `capacity` is reached. A cache hit does
/// not refresh an entry's position.
#[derive(Debug)]
pub struct SnapshotCache {
    capacity: usize,
    entries: HashMap<ParamsFingerprint, Arc<Snapshot>>,
    order: VecDeque<ParamsFingerprint>,
}

impl SnapshotCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, fingerprint: &ParamsFingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn get(&self, fingerprint: &ParamsFingerprint) -> Option<Arc<Snapshot>> {
        self.entries.get(fingerprint).cloned()
    }

    /// Stores a snapshot under its own fingerprint, returning the evicted
    /// fingerprint if the cache was full.
    pub fn put(&mut self, snapshot: Arc<Snapshot>) -> Option<ParamsFingerprint> {
        let key = snapshot.fingerprint.clone();
        if self.entries.insert(key.clone(), snapshot).is_some() {
            return None;
        }
        self.order.push_back(key);

        if self.order.len() > self.capacity {
            let evicted = self.order.pop_front()?;
            self.entries.remove(&evicted);
            return Some(evicted);
        }
        None
    }

    pub fn remove(&mut self, fingerprint: &ParamsFingerprint) -> Option<Arc<Snapshot>> {
        let removed = self.entries.remove(fingerprint)?;
        self.order.retain(|k| k != fingerprint);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
