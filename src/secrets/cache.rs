//! Secret cache for reducing provider calls
//!
//! An in-memory TTL map from secret name to value. Expired entries are
//! evicted lazily when read; there is no background sweeper. Concurrent
//! writers are last-writer-wins.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use super::types::SecretString;
use crate::observability::metrics::MetricsRecorder;

/// Default time-to-live for cached secrets (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CachedEntry {
    value: SecretString,
    expires_at: Instant,
    cached_at: DateTime<Utc>,
}

impl CachedEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// TTL cache of secret values keyed by name.
///
/// Cloning shares the underlying map, so a clone handed to another task sees
/// the same entries.
#[derive(Debug, Clone)]
pub struct SecretCache {
    inner: Arc<RwLock<HashMap<String, CachedEntry>>>,
    default_ttl: Duration,
    layer: &'static str,
}

impl SecretCache {
    /// Create a new cache with the given default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())), default_ttl, layer: "cache" }
    }

    /// Labels this cache in logs and metrics (`manager`, `vault`, ...).
    pub fn with_layer(mut self, layer: &'static str) -> Self {
        self.layer = layer;
        self
    }

    /// Returns the value if present and not expired.
    ///
    /// An expired entry is removed and reported as absent, so callers cannot
    /// tell "never cached" from "expired".
    pub async fn get(&self, name: &str) -> Option<SecretString> {
        let now = Instant::now();
        {
            let cache = self.inner.read().await;
            match cache.get(name) {
                Some(entry) if !entry.is_expired(now) => {
                    debug!(layer = self.layer, secret = %name, cached_at = %entry.cached_at, "Cache hit for secret");
                    MetricsRecorder::new().record_cache_lookup(self.layer, true);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    MetricsRecorder::new().record_cache_lookup(self.layer, false);
                    return None;
                }
            }
        }

        // Expired: re-check under the write lock, a concurrent set may have refreshed it.
        let mut cache = self.inner.write().await;
        let refreshed = match cache.get(name) {
            Some(entry) if !entry.is_expired(Instant::now()) => Some(entry.value.clone()),
            Some(_) => {
                debug!(layer = self.layer, secret = %name, "Evicting expired cache entry");
                cache.remove(name);
                None
            }
            None => None,
        };
        MetricsRecorder::new().record_cache_lookup(self.layer, refreshed.is_some());
        refreshed
    }

    /// Stores a value with an explicit TTL, replacing any existing entry.
    pub async fn set(&self, name: &str, value: SecretString, ttl: Duration) {
        let entry = CachedEntry { value, expires_at: Instant::now() + ttl, cached_at: Utc::now() };
        debug!(layer = self.layer, secret = %name, ttl_ms = ttl.as_millis() as u64, "Caching secret");
        self.inner.write().await.insert(name.to_string(), entry);
    }

    /// Stores a value with the cache's default TTL.
    pub async fn insert(&self, name: &str, value: SecretString) {
        self.set(name, value, self.default_ttl).await;
    }

    /// Drops the entry for `name`, if any.
    pub async fn invalidate(&self, name: &str) {
        if self.inner.write().await.remove(name).is_some() {
            debug!(layer = self.layer, secret = %name, "Invalidated cached secret");
        }
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        let mut cache = self.inner.write().await;
        let count = cache.len();
        cache.clear();
        debug!(layer = self.layer, count, "Cleared secret cache");
    }

    /// When the entry for `name` was stored, if it is still live.
    pub async fn cached_at(&self, name: &str) -> Option<DateTime<Utc>> {
        let now = Instant::now();
        self.inner.read().await.get(name).filter(|e| !e.is_expired(now)).map(|e| e.cached_at)
    }

    /// Number of stored entries, expired ones included until they are read.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for SecretCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = SecretCache::new(Duration::from_secs(60));
        cache.insert("JWT_SECRET", "value-1".into()).await;

        let cached = cache.get("JWT_SECRET").await;
        assert_eq!(cached.unwrap().expose_secret(), "value-1");
        assert!(cache.cached_at("JWT_SECRET").await.is_some());
    }

    #[tokio::test]
    async fn test_get_never_cached_is_absent() {
        let cache = SecretCache::default();
        assert!(cache.get("missing").await.is_none());
        assert_eq!(cache.default_ttl(), DEFAULT_CACHE_TTL);
    }

    #[tokio::test]
    async fn test_cache_expiration_evicts_on_read() {
        let cache = SecretCache::new(Duration::from_secs(60));
        cache.set("DB_PASSWORD", "value".into(), Duration::from_millis(50)).await;

        assert!(cache.get("DB_PASSWORD").await.is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.len().await, 1);
        assert!(cache.get("DB_PASSWORD").await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_never_served() {
        let cache = SecretCache::default();
        cache.set("K", "v".into(), Duration::ZERO).await;
        assert!(cache.get("K").await.is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_entry() {
        let cache = SecretCache::new(Duration::from_secs(60));
        cache.insert("K", "old".into()).await;
        cache.insert("K", "new".into()).await;

        assert_eq!(cache.get("K").await.unwrap().expose_secret(), "new");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_overwrite_extends_expired_entry() {
        let cache = SecretCache::new(Duration::from_secs(60));
        cache.set("K", "old".into(), Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.insert("K", "fresh".into()).await;

        assert_eq!(cache.get("K").await.unwrap().expose_secret(), "fresh");
    }

    #[tokio::test]
    async fn test_cache_invalidate() {
        let cache = SecretCache::new(Duration::from_secs(60));
        cache.insert("K", "v".into()).await;
        cache.invalidate("K").await;
        assert!(cache.get("K").await.is_none());

        // Invalidating an absent key is a no-op.
        cache.invalidate("K").await;
    }

    #[tokio::test]
    async fn test_cache_clear() {
        let cache = SecretCache::new(Duration::from_secs(60)).with_layer("manager");
        cache.insert("A", "1".into()).await;
        cache.insert("B", "2".into()).await;
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = SecretCache::new(Duration::from_secs(60));
        let clone = cache.clone();
        clone.insert("K", "shared".into()).await;
        assert_eq!(cache.get("K").await.unwrap().expose_secret(), "shared");
    }
}
