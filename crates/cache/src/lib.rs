//! Tag-aware response cache.
//!
//! Entries are serialized response bodies keyed by a string and labelled with
//! a tag. Writers invalidate a whole tag at once; readers go through
//! [`TagAwareCache::get_or_compute`]. Capacity is bounded with LRU eviction.

mod lock;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use lru::LruCache;

use lock::mutex_lock;

const SOURCE: &str = "cache";

struct Entry {
    value: Bytes,
    tag: String,
}

struct Inner {
    entries: LruCache<String, Entry>,
    /// tag -> keys currently stored under it
    tag_index: HashMap<String, HashSet<String>>,
    /// Bumped on every invalidation of a tag.
    generations: HashMap<String, u64>,
}

impl Inner {
    fn generation(&self, tag: &str) -> u64 {
        self.generations.get(tag).copied().unwrap_or(0)
    }

    fn unindex(&mut self, key: &str, tag: &str) {
        if let Some(keys) = self.tag_index.get_mut(tag) {
            keys.remove(key);
            if keys.is_empty() {
                self.tag_index.remove(tag);
            }
        }
    }
}

/// Point-in-time counters for a cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Keyed get-or-compute cache with tag-based bulk invalidation.
pub struct TagAwareCache {
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TagAwareCache {
    /// Create a cache holding at most `capacity` entries (minimum one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                tag_index: HashMap::new(),
                generations: HashMap::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, or run `compute`, store its output
    /// under `tag` and return it.
    ///
    /// The value is not stored if `tag` was invalidated while `compute` ran, so
    /// a write that lands mid-computation cannot be masked by stale data.
    /// Errors from `compute` are returned as-is and nothing is cached.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        tag: &str,
        compute: F,
    ) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
    {
        let generation = {
            let mut inner = mutex_lock(&self.inner, SOURCE, "get_or_compute.lookup");
            if let Some(entry) = inner.entries.get(key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(cache_key = key, "cache hit");
                return Ok(entry.value.clone());
            }
            inner.generation(tag)
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(cache_key = key, cache_tag = tag, "cache miss; computing");

        let value = compute().await?;

        let mut inner = mutex_lock(&self.inner, SOURCE, "get_or_compute.store");
        if inner.generation(tag) != generation {
            tracing::debug!(
                cache_key = key,
                cache_tag = tag,
                "tag invalidated during compute; not storing"
            );
            return Ok(value);
        }

        let entry = Entry {
            value: value.clone(),
            tag: tag.to_string(),
        };
        if let Some((evicted_key, evicted)) = inner.entries.push(key.to_string(), entry) {
            if evicted_key != key {
                tracing::debug!(cache_key = %evicted_key, "evicted by capacity");
            }
            inner.unindex(&evicted_key, &evicted.tag);
        }
        inner
            .tag_index
            .entry(tag.to_string())
            .or_default()
            .insert(key.to_string());

        Ok(value)
    }

    /// Remove every entry stored under `tag`; returns how many were removed.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut inner = mutex_lock(&self.inner, SOURCE, "invalidate_tag");
        *inner.generations.entry(tag.to_string()).or_insert(0) += 1;

        let keys = inner.tag_index.remove(tag).unwrap_or_default();
        let removed = keys
            .iter()
            .filter(|key| inner.entries.pop(key.as_str()).is_some())
            .count();

        tracing::info!(cache_tag = tag, removed, "invalidated cache tag");
        removed
    }

    /// Drop all entries regardless of tag.
    pub fn clear(&self) {
        let mut inner = mutex_lock(&self.inner, SOURCE, "clear");
        let tags: Vec<String> = inner.tag_index.keys().cloned().collect();
        for tag in tags {
            *inner.generations.entry(tag).or_insert(0) += 1;
        }
        inner.entries.clear();
        inner.tag_index.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: mutex_lock(&self.inner, SOURCE, "stats").entries.len(),
        }
    }
}

impl Default for TagAwareCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;

    fn cached(cache: &TagAwareCache, key: &str) -> bool {
        mutex_lock(&cache.inner, SOURCE, "test").entries.contains(key)
    }

    async fn fill(cache: &TagAwareCache, key: &str, tag: &str, body: &'static str) -> Bytes {
        cache
            .get_or_compute(key, tag, || async { Ok::<_, anyhow::Error>(Bytes::from(body)) })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = TagAwareCache::new(8);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .get_or_compute("getAllBooks-1-3", "booksCache", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(Bytes::from_static(b"[1,2,3]"))
                })
                .await
                .unwrap();
            assert_eq!(value, Bytes::from_static(b"[1,2,3]"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[tokio::test]
    async fn invalidate_tag_only_drops_that_tag() {
        let cache = TagAwareCache::new(8);
        fill(&cache, "a", "books", "1").await;
        fill(&cache, "b", "books", "2").await;
        fill(&cache, "c", "authors", "3").await;

        assert_eq!(cache.invalidate_tag("books"), 2);
        assert!(!cached(&cache, "a"));
        assert!(!cached(&cache, "b"));
        assert!(cached(&cache, "c"));
        assert_eq!(cache.invalidate_tag("books"), 0);
    }

    #[tokio::test]
    async fn compute_errors_are_not_cached() {
        let cache = TagAwareCache::new(8);
        let result = cache
            .get_or_compute("k", "t", || async { Err::<Bytes, _>(anyhow::anyhow!("db down")) })
            .await;
        assert!(result.is_err());
        assert!(!cached(&cache, "k"));

        fill(&cache, "k", "t", "ok").await;
        assert!(cached(&cache, "k"));
    }

    #[tokio::test]
    async fn invalidation_during_compute_skips_store() {
        let cache = Arc::new(TagAwareCache::new(8));
        let inner = Arc::clone(&cache);

        let value = cache
            .get_or_compute("k", "books", || async move {
                inner.invalidate_tag("books");
                Ok::<_, anyhow::Error>(Bytes::from_static(b"stale"))
            })
            .await
            .unwrap();

        assert_eq!(value, Bytes::from_static(b"stale"));
        assert!(!cached(&cache, "k"));
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used_and_unindexes() {
        let cache = TagAwareCache::new(2);
        fill(&cache, "one", "books", "1").await;
        fill(&cache, "two", "books", "2").await;
        fill(&cache, "three", "books", "3").await;

        assert!(!cached(&cache, "one"));
        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.invalidate_tag("books"), 2);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn clear_empties_everything() {
        let cache = TagAwareCache::new(4);
        fill(&cache, "a", "books", "1").await;
        fill(&cache, "b", "other", "2").await;

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
