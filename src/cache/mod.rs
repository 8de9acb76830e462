//! Translation cache.
//!
//! [`CacheGateway`] sits in front of a pluggable [`CacheStore`]. The store is
//! optional: when it is missing or failing, lookups miss and writes are
//! dropped, and the pipeline never sees an error from here.

mod memory;
mod redis_store;
mod sqlite;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default lifetime of a cached translation.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);

const KEY_PREFIX: &str = "translation:";

/// A key-value store holding serialized cache entries.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Stores `value`, replacing any previous value; it expires after `ttl`.
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;

    async fn ping(&self) -> anyhow::Result<()>;

    fn backend_name(&self) -> &'static str;
}

/// What the cache remembers about one translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source_language: String,
    pub translated_text: String,
    pub created_at: DateTime<Utc>,
    pub model_id: String,
}

/// Computes the cache key for a validated `(text, target_lang)` pair.
///
/// Case-sensitive and exact: no normalization beyond what validation did.
pub fn cache_key(text: &str, target_lang: &str) -> String {
    let cache_input = serde_json::json!({
        "text": text,
        "target_lang": target_lang,
    });

    let mut hasher = Sha256::new();
    hasher.update(cache_input.to_string().as_bytes());
    format!("{KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}

/// Health of the cache backend as reported by `/api/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Connected,
    Disconnected,
    NotConfigured,
}

#[derive(Clone)]
pub struct CacheGateway {
    store: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store: Some(store),
            ttl,
        }
    }

    /// A gateway that always misses and never writes.
    pub const fn disabled() -> Self {
        Self {
            store: None,
            ttl: DEFAULT_TTL,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.store.as_ref().map(|s| s.backend_name())
    }

    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let store = self.store.as_ref()?;

        let raw = match store.get_raw(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss");
                return None;
            }
            Err(e) => {
                warn!(backend = store.backend_name(), "Cache read failed: {e:#}");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => {
                debug!("Cache hit");
                Some(entry)
            }
            Err(e) => {
                warn!("Ignoring undecodable cache entry: {e}");
                None
            }
        }
    }

    /// Writes `entry` under `key`. Returns whether the write reached the store.
    pub async fn set(&self, key: &str, entry: &CacheEntry) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };

        let raw = match serde_json::to_string(entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize cache entry: {e}");
                return false;
            }
        };

        match store.set_raw(key, &raw, self.ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = store.backend_name(), "Cache write failed: {e:#}");
                false
            }
        }
    }

    pub async fn status(&self) -> CacheStatus {
        match &self.store {
            None => CacheStatus::NotConfigured,
            Some(store) => match store.ping().await {
                Ok(()) => CacheStatus::Connected,
                Err(e) => {
                    warn!(backend = store.backend_name(), "Cache ping failed: {e:#}");
                    CacheStatus::Disconnected
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get_raw(&self, _key: &str) -> anyhow::Result<Option<String>> {
            bail!("connection refused")
        }

        async fn set_raw(&self, _key: &str, _value: &str, _ttl: Duration) -> anyhow::Result<()> {
            bail!("connection refused")
        }

        async fn ping(&self) -> anyhow::Result<()> {
            bail!("connection refused")
        }

        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    fn entry(text: &str) -> CacheEntry {
        CacheEntry {
            source_language: "EN".to_string(),
            translated_text: text.to_string(),
            created_at: Utc::now(),
            model_id: "test-model".to_string(),
        }
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        assert_eq!(
            cache_key("Hello world", "Spanish"),
            cache_key("Hello world", "Spanish")
        );
        assert!(cache_key("Hello world", "Spanish").starts_with("translation:"));
    }

    #[test]
    fn test_cache_key_is_case_sensitive_and_exact() {
        let base = cache_key("Hello", "Spanish");
        assert_ne!(base, cache_key("hello", "Spanish"));
        assert_ne!(base, cache_key("Hello", "spanish"));
        assert_ne!(base, cache_key("Hello ", "Spanish"));
    }

    #[test]
    fn test_cache_key_does_not_collide_on_separators() {
        assert_ne!(cache_key("a|b", "c"), cache_key("a", "b|c"));
    }

    #[tokio::test]
    async fn test_round_trip_through_memory_store() {
        let gateway = CacheGateway::new(Arc::new(MemoryStore::new()), DEFAULT_TTL);
        let key = cache_key("Hello world", "Spanish");

        assert!(gateway.get(&key).await.is_none());
        assert!(gateway.set(&key, &entry("Hola mundo")).await);

        let cached = gateway.get(&key).await.unwrap();
        assert_eq!(cached.translated_text, "Hola mundo");
        assert_eq!(cached.source_language, "EN");
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let gateway = CacheGateway::new(Arc::new(MemoryStore::new()), DEFAULT_TTL);
        let key = cache_key("Hello", "French");

        gateway.set(&key, &entry("Salut")).await;
        gateway.set(&key, &entry("Bonjour")).await;

        assert_eq!(gateway.get(&key).await.unwrap().translated_text, "Bonjour");
    }

    #[tokio::test]
    async fn test_disabled_gateway_misses_and_drops_writes() {
        let gateway = CacheGateway::disabled();
        let key = cache_key("Hello", "French");

        assert!(!gateway.is_enabled());
        assert!(!gateway.set(&key, &entry("Bonjour")).await);
        assert!(gateway.get(&key).await.is_none());
        assert_eq!(gateway.status().await, CacheStatus::NotConfigured);
    }

    #[tokio::test]
    async fn test_store_errors_are_swallowed() {
        let gateway = CacheGateway::new(Arc::new(BrokenStore), DEFAULT_TTL);
        let key = cache_key("Hello", "French");

        assert!(gateway.get(&key).await.is_none());
        assert!(!gateway.set(&key, &entry("Bonjour")).await);
        assert_eq!(gateway.status().await, CacheStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let key = cache_key("Hello", "French");
        store.set_raw(&key, "{not json", DEFAULT_TTL).await.unwrap();

        let gateway = CacheGateway::new(store, DEFAULT_TTL);
        assert!(gateway.get(&key).await.is_none());
    }
}
