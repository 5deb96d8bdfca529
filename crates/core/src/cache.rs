use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// A value read back from a cache together with the wall-clock time it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
    cached_at: DateTime<Utc>,
}

impl<V: Clone> Entry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            cached_at: Utc::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        Instant::now().duration_since(self.stored_at) < ttl
    }

    fn to_cached(&self) -> Cached<V> {
        Cached {
            value: self.value.clone(),
            cached_at: self.cached_at,
        }
    }
}

/// Single-slot cache with a fixed TTL.
///
/// Freshness is measured on the tokio clock so paused-time tests can advance it.
#[derive(Debug, Clone)]
pub struct CacheSlot<V> {
    ttl: Duration,
    inner: Arc<Mutex<Option<Entry<V>>>>,
}

impl<V> CacheSlot<V>
where
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the value only while `now - stored_at < ttl`.
    pub async fn get_fresh(&self) -> Option<Cached<V>> {
        let slot = self.inner.lock().await;
        match slot.as_ref() {
            Some(entry) if entry.is_fresh(self.ttl) => {
                debug!("Cache HIT");
                Some(entry.to_cached())
            }
            Some(_) => {
                debug!("Cache STALE");
                None
            }
            None => {
                debug!("Cache MISS");
                None
            }
        }
    }

    /// Returns whatever is stored, stale or not.
    pub async fn peek(&self) -> Option<Cached<V>> {
        self.inner.lock().await.as_ref().map(Entry::to_cached)
    }

    pub async fn set(&self, value: V) -> DateTime<Utc> {
        let entry = Entry::new(value);
        let cached_at = entry.cached_at;
        *self.inner.lock().await = Some(entry);
        debug!("Cache PUT");
        cached_at
    }

    /// Restarts the TTL of the stored value without replacing it.
    pub async fn touch(&self) -> Option<Cached<V>> {
        let mut slot = self.inner.lock().await;
        let entry = slot.as_mut()?;
        entry.stored_at = Instant::now();
        entry.cached_at = Utc::now();
        debug!("Cache TOUCH");
        Some(entry.to_cached())
    }
}

/// Keyed cache where every entry shares the same TTL.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    ttl: Duration,
    inner: Arc<Mutex<HashMap<K, Entry<V>>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get_fresh(&self, key: &K) -> Option<Cached<V>> {
        let mut map = self.inner.lock().await;
        match map.get(key) {
            Some(entry) if entry.is_fresh(self.ttl) => {
                debug!("Cache HIT");
                Some(entry.to_cached())
            }
            Some(_) => {
                debug!("Cache STALE; evicting");
                map.remove(key);
                None
            }
            None => {
                debug!("Cache MISS");
                None
            }
        }
    }

    pub async fn set(&self, key: K, value: V) {
        self.inner.lock().await.insert(key, Entry::new(value));
        debug!("Cache PUT");
    }
}
