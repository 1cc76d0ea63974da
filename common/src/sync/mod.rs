//! Per-key serialization primitive
//!
//! Trades touching the same account, and inventory mutations touching the
//! same instrument, must run strictly one at a time; unrelated keys proceed
//! in parallel. A `DashMap` of `tokio` mutexes gives exactly that without a
//! global lock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed asynchronous mutex
///
/// Locks are created lazily per key and never removed; the key space here
/// is logins and instrument names, which is small and bounded by the
/// account/instrument population.
pub struct KeyedMutex {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedMutex {
    /// Create an empty keyed mutex
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the lock for `key`, waiting behind earlier holders.
    ///
    /// The guard is owned so it can be held across awaits for the full
    /// duration of a trade, including the remote leg call.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

impl Default for KeyedMutex {
    fn default() -> Self {
        Self::new()
    }
}
