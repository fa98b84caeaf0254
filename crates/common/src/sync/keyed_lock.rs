//! Per-key async mutexes.
//!
//! A [`KeyedLocks`] hands out one `tokio::sync::Mutex` per key. Work on the
//! same key is serialized, while distinct keys proceed in parallel. Entries
//! nobody holds are pruned lazily once the map grows past a threshold.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

const PRUNE_THRESHOLD: usize = 1024;

/// Registry of async mutexes keyed by `K`.
#[derive(Debug)]
pub struct KeyedLocks<K>
where
    K: Eq + Hash + Clone + Ord,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
}

/// Guard returned by [`KeyedLocks::lock`]; the key is released on drop.
#[derive(Debug)]
pub struct KeyedGuard<K> {
    key: K,
    _guard: OwnedMutexGuard<()>,
}

impl<K> KeyedGuard<K> {
    /// Key this guard holds.
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone + Ord,
{
    fn default() -> Self {
        Self { locks: DashMap::new() }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone + Ord,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let mutex = self.slot(&key);
        let guard = mutex.lock_owned().await;
        KeyedGuard { key, _guard: guard }
    }

    /// Take `key` only if nobody else holds it.
    pub fn try_lock(&self, key: K) -> Option<KeyedGuard<K>> {
        let mutex = self.slot(&key);
        mutex.try_lock_owned().ok().map(|guard| KeyedGuard { key, _guard: guard })
    }

    /// Lock a set of keys in ascending order so that two bulk callers can
    /// never deadlock against each other.
    pub async fn lock_many(&self, keys: impl IntoIterator<Item = K>) -> Vec<KeyedGuard<K>> {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(key).await);
        }
        guards
    }

    /// Number of keys currently tracked (held or not yet pruned).
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True when no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Drop entries that no caller currently holds.
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    fn slot(&self, key: &K) -> Arc<Mutex<()>> {
        if self.locks.len() > PRUNE_THRESHOLD {
            self.prune();
            tracing::trace!(remaining = self.locks.len(), "keyed_locks.pruned");
        }
        self.locks.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}
