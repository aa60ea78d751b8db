//! In-memory TTL cache for read-heavy catalog queries.
//!
//! Each value family gets its own `TtlCache`, so a hot family never holds a
//! lock other families wait on. Concurrent misses for the same key may both
//! run the fetch; the last writer wins.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: Duration,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    #[must_use]
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &K) -> Option<Arc<V>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| Arc::clone(&entry.value))
    }

    pub async fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let entry = Entry {
            value: Arc::clone(&value),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key, entry);
        value
    }

    /// Returns the cached value or runs `fetch`. `Ok(None)` from `fetch` is
    /// passed through without being cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<Option<Arc<V>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        if let Some(hit) = self.get(&key).await {
            metrics::counter!("kappalib_cache_hits_total", "cache" => self.name).increment(1);
            return Ok(Some(hit));
        }

        metrics::counter!("kappalib_cache_misses_total", "cache" => self.name).increment(1);

        match fetch().await? {
            Some(value) => Ok(Some(self.insert(key, value).await)),
            None => Ok(None),
        }
    }

    /// Drops expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
