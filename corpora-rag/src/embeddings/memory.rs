//! In-process key-value cache backend.
//!
//! The default cache for single-node deployments and tests; a networked
//! backend can replace it behind the same port without touching the
//! embedder.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use corpora_core::traits::KeyValueCache;
use corpora_core::Result;

const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
    last_accessed: Instant,
}

/// Bounded in-memory cache with TTL support.
#[derive(Debug)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    max_entries: usize,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl InMemoryCache {
    /// Create a cache bounded to `max_entries`.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Current number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) => {
                if entry.expires_at.is_some_and(|deadline| deadline <= Instant::now()) {
                    entries.remove(key);
                    return Ok(None);
                }
                entry.last_accessed = Instant::now();
                Ok(Some(entry.value.clone()))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.write();

        if entries.len() >= self.max_entries && !entries.contains_key(key) {
            // Evict the least recently touched entry.
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
                last_accessed: Instant::now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = InMemoryCache::default();
        cache.set("k", b"v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = InMemoryCache::default();
        cache
            .set("k", b"v", Some(Duration::from_millis(5)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_eviction_keeps_bound() {
        let cache = InMemoryCache::new(2);
        cache.set("a", b"1", None).await.unwrap();
        cache.set("b", b"2", None).await.unwrap();
        cache.set("c", b"3", None).await.unwrap();
        assert_eq!(cache.len(), 2);
    }
}
