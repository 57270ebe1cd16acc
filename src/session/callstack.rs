use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHasher;

/// Content hash of a callstack, the key of [`CallstackTable`].
pub fn callstack_hash(frames: &[u64]) -> u64 {
    let mut hasher = FxHasher::default();
    frames.hash(&mut hasher);
    hasher.finish()
}

/// CallstackTable deduplicates callstacks by content hash.
///
/// Producers insert from their own threads while the session reads, so the
/// map sits behind a mutex. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct CallstackTable(Arc<Mutex<HashMap<u64, Vec<u64>>>>);

impl CallstackTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Vec<u64>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `frames` unless an equal callstack is already present.
    /// Returns the hash either way.
    pub fn insert(&self, frames: Vec<u64>) -> u64 {
        let hash = callstack_hash(&frames);
        self.insert_with_hash(hash, frames);
        hash
    }

    /// Stores `frames` under a hash computed elsewhere, e.g. read from a capture.
    pub fn insert_with_hash(&self, hash: u64, frames: Vec<u64>) {
        self.lock().entry(hash).or_insert(frames);
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.lock().contains_key(&hash)
    }

    /// Runs `f` on the frames stored under `hash`, innermost frame first.
    pub fn with_callstack<R>(&self, hash: u64, f: impl FnOnce(&[u64]) -> R) -> Option<R> {
        self.lock().get(&hash).map(|frames| f(frames))
    }

    /// Visits every callstack in ascending hash order.
    pub fn for_each(&self, mut f: impl FnMut(u64, &[u64])) {
        let table = self.lock();
        let mut hashes: Vec<_> = table.keys().copied().collect();
        hashes.sort_unstable();
        for hash in hashes {
            f(hash, &table[&hash]);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
