use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use std::time::{Duration, Instant};

use super::CacheStore;

/// Entry limit for the in-process store; least recently used entries go first.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Longer lifetimes are clamped to this.
const MAX_ENTRY_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365);

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expires every entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Process-local store with per-entry expiry and a bounded size.
///
/// Expired entries are evicted by moka's housekeeping, not only when read.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Cache<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder()
                .name("translations")
                .max_capacity(max_entries)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    /// Number of live entries, after pending evictions have run.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).await.map(|entry| entry.value))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        let entry = Entry {
            value: value.to_string(),
            ttl: ttl.min(MAX_ENTRY_TTL),
        };
        self.entries.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let store = MemoryStore::new();
        store
            .set_raw("k", "v", Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(store.get_raw("k").await.unwrap(), Some("v".to_string()));

        sleep(Duration::from_millis(200)).await;
        assert_eq!(store.get_raw("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_resets_ttl() {
        let store = MemoryStore::new();
        store.set_raw("k", "old", Duration::from_millis(200)).await.unwrap();

        sleep(Duration::from_millis(120)).await;
        store.set_raw("k", "new", Duration::from_millis(200)).await.unwrap();

        sleep(Duration::from_millis(120)).await;
        assert_eq!(store.get_raw("k").await.unwrap(), Some("new".to_string()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_evicted_without_reads() {
        let store = MemoryStore::new();
        for i in 0..500 {
            store
                .set_raw(&format!("k{i}"), "v", Duration::from_millis(50))
                .await
                .unwrap();
        }

        sleep(Duration::from_millis(200)).await;
        store
            .set_raw("fresh", "v", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_size_is_bounded() {
        let store = MemoryStore::with_max_entries(10);
        for i in 0..100 {
            store
                .set_raw(&format!("k{i}"), "v", Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert!(store.len().await <= 10);
    }

    #[tokio::test]
    async fn test_huge_ttl_is_accepted() {
        let store = MemoryStore::new();
        store.set_raw("k", "v", Duration::MAX).await.unwrap();
        assert_eq!(store.get_raw("k").await.unwrap(), Some("v".to_string()));
    }
}
