//! TTL-bounded result cache.
//!
//! One shared instance holds every cached payload: merged news results under
//! `news:<ids>` keys and the raw catalog documents under `feeds:json` /
//! `sources:json`. Entries carry their own TTL; an entry is never served past
//! `stored_at + ttl`. There is no single-flight: concurrent requests for the
//! same key may both miss, both recompute, and overwrite each other
//! (last writer wins). Callers must tolerate the duplicate work.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use metrics::counter;
use serde_json::Value;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) >= self.ttl
    }
}

#[derive(Debug, Default)]
pub struct ResultCache {
    inner: RwLock<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key` if present and unexpired.
    /// Expired entries are dropped on the spot.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        {
            let map = self.inner.read().expect("cache rwlock poisoned");
            match map.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    counter!("cache_hits_total").increment(1);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    counter!("cache_misses_total").increment(1);
                    return None;
                }
            }
        }
        // Entry exists but is stale; evict under the write lock.
        let mut map = self.inner.write().expect("cache rwlock poisoned");
        if map.get(key).map(|e| e.is_expired(now)).unwrap_or(false) {
            map.remove(key);
        }
        counter!("cache_misses_total").increment(1);
        None
    }

    pub fn put(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
            ttl,
        };
        let mut map = self.inner.write().expect("cache rwlock poisoned");
        map.insert(key.into(), entry);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.read().expect("cache rwlock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_then_get_round_trips() {
        let cache = ResultCache::new();
        cache.put("news:a", json!({"n": 1}), Duration::from_secs(60));
        assert_eq!(cache.get("news:a"), Some(json!({"n": 1})));
        assert_eq!(cache.get("news:b"), None);
    }

    #[test]
    fn expired_entries_are_not_served_and_get_evicted() {
        let cache = ResultCache::new();
        cache.put("k", json!("v"), Duration::from_millis(0));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn overwrite_is_last_writer_wins() {
        let cache = ResultCache::new();
        cache.put("k", json!(1), Duration::from_secs(60));
        cache.put("k", json!(2), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(json!(2)));
    }

    #[test]
    fn ttl_is_per_entry() {
        let cache = ResultCache::new();
        cache.put("short", json!("a"), Duration::from_millis(0));
        cache.put("long", json!("b"), Duration::from_secs(300));
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some(json!("b")));
    }
}
