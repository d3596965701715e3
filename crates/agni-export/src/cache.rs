//! Memoization for repeated enrichment lookups.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

/// Marker for a fetch that produced no value. Never stored: the cell
/// stays empty so a later caller retries.
struct FetchFailed;

/// Thread-safe per-key memoization shared across enrichment workers.
///
/// Each key maps to a [`OnceCell`]: concurrent first-callers for the
/// same key coalesce onto a single in-flight fetch, and everyone
/// observes the one resulting value. A failed fetch leaves the cell
/// uninitialized, so transient failures do not poison the key.
///
/// The outer map lock is only held to look up or create a cell, never
/// across a fetch.
pub struct LookupCache<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> Default for LookupCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl<K, V> LookupCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, fetching it with `fetch` on
    /// a miss. Returns `None` when the fetch fails; the failure is not
    /// cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<V>>,
    {
        let cell = {
            let mut cells = self.cells.lock().unwrap();
            Arc::clone(cells.entry(key).or_default())
        };

        if let Some(value) = cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(value.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        match cell
            .get_or_try_init(move || async move { fetch().await.ok_or(FetchFailed) })
            .await
        {
            Ok(value) => Some(value.clone()),
            Err(FetchFailed) => None,
        }
    }

    /// Cache hits observed so far.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Cache misses (including failed fetches) observed so far.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of keys with a resolved value.
    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_second_lookup_hits_cache() {
        let cache: LookupCache<String, String> = LookupCache::new();
        let fetches = AtomicUsize::new(0);

        let first = cache
            .get_or_fetch("nad-1".to_string(), || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Some("sw-lobby".to_string())
            })
            .await;
        let second = cache
            .get_or_fetch("nad-1".to_string(), || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Some("unreached".to_string())
            })
            .await;

        assert_eq!(first.as_deref(), Some("sw-lobby"));
        assert_eq!(second.as_deref(), Some("sw-lobby"));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache: LookupCache<String, String> = LookupCache::new();

        let miss = cache
            .get_or_fetch("nad-2".to_string(), || async { None })
            .await;
        assert_eq!(miss, None);
        assert!(cache.is_empty());

        // A later fetch for the same key runs and succeeds.
        let hit = cache
            .get_or_fetch("nad-2".to_string(), || async {
                Some("sw-floor2".to_string())
            })
            .await;
        assert_eq!(hit.as_deref(), Some("sw-floor2"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_same_key_fetches_once() {
        let cache: Arc<LookupCache<String, String>> = Arc::new(LookupCache::new());
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let fetches = Arc::clone(&fetches);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("nad-3".to_string(), || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        Some("sw-core".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            // Every caller observes the same value.
            assert_eq!(handle.await.unwrap().as_deref(), Some("sw-core"));
        }
        // Concurrent first-callers coalesce onto one fetch, never 16.
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block_each_other() {
        let cache: LookupCache<String, u32> = LookupCache::new();

        let a = cache.get_or_fetch("a".to_string(), || async { Some(1) });
        let b = cache.get_or_fetch("b".to_string(), || async { Some(2) });
        let (a, b) = tokio::join!(a, b);

        assert_eq!(a, Some(1));
        assert_eq!(b, Some(2));
        assert_eq!(cache.len(), 2);
    }
}
