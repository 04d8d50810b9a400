//! Time-bounded memoization of search results
//!
//! Entries are swept lazily after each write; the read path re-checks age, so an
//! expired entry is never served even if no sweep has run. Concurrent misses on the
//! same key may each compute; the last write wins.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::clock::Clock;
use crate::error::Result;
use crate::telemetry;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at_ms: i64,
}

/// TTL cache keyed by canonical request serialization
pub struct QueryCache<V> {
    name: &'static str,
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    clock: Arc<dyn Clock>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            entries: Arc::clone(&self.entries),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<V: Clone> QueryCache<V> {
    /// Empty cache; `name` labels its metrics
    pub fn new(name: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    fn ttl_ms(ttl: Duration) -> i64 {
        i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Fresh cached value for `key`, if any
    pub fn get(&self, key: &str, ttl: Duration) -> Option<V> {
        let now = self.clock.now_millis();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| now - entry.inserted_at_ms < Self::ttl_ms(ttl))
            .map(|entry| entry.value.clone())
    }

    /// Store `value` and sweep expired entries
    pub fn insert(&self, key: String, value: V, ttl: Duration) {
        let now = self.clock.now_millis();
        let mut entries = self.entries.write();
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at_ms: now,
            },
        );

        let before = entries.len();
        let ttl_ms = Self::ttl_ms(ttl);
        entries.retain(|_, entry| now - entry.inserted_at_ms < ttl_ms);
        telemetry::record_cache_evictions(self.name, before - entries.len());
    }

    /// Return the cached value for `key`, or run `compute` and cache its success.
    ///
    /// Errors are returned as-is and never cached. No lock is held while `compute`
    /// runs.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(key, ttl) {
            telemetry::record_cache_lookup(self.name, true);
            debug!(cache = self.name, "Cache hit");
            return Ok(value);
        }

        telemetry::record_cache_lookup(self.name, false);
        debug!(cache = self.name, "Cache miss");

        let value = compute().await?;
        self.insert(key.to_string(), value.clone(), ttl);
        Ok(value)
    }

    /// Entries held, expired or not
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no entries are held
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::Error;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_millis(300_000);

    fn cache() -> (QueryCache<u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap(),
        ));
        (QueryCache::new("test", clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_hit_within_ttl_skips_compute() {
        let (cache, clock) = cache();
        let calls = &AtomicUsize::new(0);
        let compute = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        };

        assert_eq!(cache.get_or_compute("k", TTL, compute).await.unwrap(), 7);
        clock.advance(chrono::Duration::milliseconds(299_999));
        assert_eq!(cache.get_or_compute("k", TTL, compute).await.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_recomputed() {
        let (cache, clock) = cache();
        let calls = &AtomicUsize::new(0);
        let compute = move || async move { Ok(calls.fetch_add(1, Ordering::SeqCst) as u32) };

        assert_eq!(cache.get_or_compute("k", TTL, compute).await.unwrap(), 0);
        clock.advance(chrono::Duration::milliseconds(300_000));
        assert_eq!(cache.get("k", TTL), None);
        assert_eq!(cache.get_or_compute("k", TTL, compute).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_not_cached() {
        let (cache, _clock) = cache();
        let failed = cache
            .get_or_compute("k", TTL, || async { Err(Error::backend("down")) })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_on_write() {
        let (cache, clock) = cache();
        cache.insert("old".into(), 1, TTL);
        clock.advance(chrono::Duration::minutes(6));
        cache.insert("new".into(), 2, TTL);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new", TTL), Some(2));
    }
}
