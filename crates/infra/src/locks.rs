//! Keyed mutex registry.
//!
//! One mutex per line serialises that line's mutations; one per period
//! serialises populate, add-line, close and reopen. Lock order is always
//! period before line.
//!
//! Entries nobody holds a handle to are pruned when a new key is inserted, so
//! the map tracks the keys in use rather than every key ever seen.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct LockRegistry<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for LockRegistry<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> LockRegistry<K>
where
    K: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex for `key`, created on first use.
    ///
    /// An entry whose only reference is the map's own is dropped before a new
    /// key goes in. Nobody can be waiting on it, and the next caller for that
    /// key simply gets a fresh mutex.
    pub fn handle(&self, key: K) -> Arc<Mutex<()>> {
        // Every update is a single insert or retain; a poisoned map is still consistent.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = locks.get(&key) {
            return existing.clone();
        }
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key).or_default().clone()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Acquire a handle's guard. The guarded value is `()`, so poisoning carries
/// no torn state and is ignored.
pub fn acquire(handle: &Mutex<()>) -> MutexGuard<'_, ()> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}
