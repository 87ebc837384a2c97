//! Bounded LRU caches for upstream pages and resolved entities

use crate::domain::{Entity, Page, ReferenceLink, ResourceKind};
use lru::LruCache;
use serde::Serialize;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Identifies one raw upstream page.
///
/// Local filters and sort order are not part of the key: raw pages are the
/// same for every local filter on a collection and are shared between them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub kind: ResourceKind,
    pub page: u32,
    pub search: Option<String>,
}

impl FetchKey {
    /// Search terms are matched case-insensitively upstream, so they are
    /// normalized here.
    pub fn new(kind: ResourceKind, page: u32, search: Option<&str>) -> Self {
        Self {
            kind,
            page,
            search: search
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
        }
    }
}

pub type PageCache = BoundedCache<FetchKey, Arc<Page>>;
pub type EntityCache = BoundedCache<ReferenceLink, Entity>;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

struct Slot<V> {
    value: V,
    stored_at: Instant,
}

/// Capacity-bounded LRU cache behind a single async mutex.
///
/// Both reads and writes refresh recency. With a TTL configured, an entry
/// older than the TTL is dropped when it is read and counts as a miss.
///
/// # Example
///
/// ```rust
/// use swapi_query_engine::cache::BoundedCache;
///
/// # #[tokio::main]
/// # async fn main() {
/// let cache: BoundedCache<u32, String> = BoundedCache::new("example", 2, None);
/// cache.put(1, "one".to_string()).await;
/// cache.put(2, "two".to_string()).await;
/// cache.get(&1).await;
/// cache.put(3, "three".to_string()).await;
///
/// assert!(cache.get(&2).await.is_none());
/// assert_eq!(cache.get(&1).await.as_deref(), Some("one"));
/// # }
/// ```
pub struct BoundedCache<K, V> {
    name: &'static str,
    entries: Mutex<LruCache<K, Slot<V>>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// `capacity` of zero is treated as one.
    pub fn new(name: &'static str, capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().await;
        let lookup = entries
            .get(key)
            .map(|slot| (self.is_expired(slot), slot.value.clone()));

        match lookup {
            Some((false, value)) => {
                self.record_hit();
                Some(value)
            }
            Some((true, _)) => {
                entries.pop(key);
                tracing::debug!(cache = self.name, "Dropped expired cache entry");
                self.record_miss();
                None
            }
            None => {
                self.record_miss();
                None
            }
        }
    }

    /// Inserts or replaces an entry, evicting the least recently used one
    /// when the cache is full.
    pub async fn put(&self, key: K, value: V) {
        let slot = Slot {
            value,
            stored_at: Instant::now(),
        };
        let mut entries = self.entries.lock().await;
        if entries.push(key, slot).is_some() {
            tracing::trace!(cache = self.name, "Cache entry evicted or replaced");
        }
    }

    pub async fn contains(&self, key: &K) -> bool {
        let entries = self.entries.lock().await;
        entries
            .peek(key)
            .is_some_and(|slot| !self.is_expired(slot))
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: entries.len(),
            capacity: entries.cap().get(),
        }
    }

    fn is_expired(&self, slot: &Slot<V>) -> bool {
        self.ttl
            .is_some_and(|ttl| slot.stored_at.elapsed() >= ttl)
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::increment_counter!("sqe_cache_hits_total", "cache" => self.name);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::increment_counter!("sqe_cache_misses_total", "cache" => self.name);
    }
}

impl<K, V> std::fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}
