//! Process-wide TTL cache.
//!
//! Geolocation lookups (and similar out-of-core enrichments) are cached
//! here by the host process and injected as a collaborator, instead of
//! hiding a module-level map behind the lookup code. Entries expire
//! lazily on read; `purge_expired` reclaims the rest.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    inner: Mutex<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Fetch a live entry, dropping it if its TTL has lapsed.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut map = self.inner.lock();
        match map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert or refresh an entry with a full TTL.
    pub fn set(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.inner.lock().insert(key, entry);
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut map = self.inner.lock();
        let before = map.len();
        let now = Instant::now();
        map.retain(|_, entry| entry.expires_at > now);
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
