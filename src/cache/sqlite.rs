use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::CacheStore;

/// Local-file store for single-node deployments.
///
/// Expired rows are never returned, and every write purges them.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let store = Self { db_path };
        store.init_db()?;

        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = connect(&self.db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS translations (
                cache_key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                expires_at INTEGER NOT NULL
            )",
            [],
        )
        .context("Failed to create translations table")?;

        Ok(())
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = connect(&db_path)?;
            f(&conn)
        })
        .await
        .context("Cache worker task failed")?
    }
}

fn connect(db_path: &Path) -> Result<Connection> {
    Connection::open(db_path)
        .with_context(|| format!("Failed to open cache database: {}", db_path.display()))
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.with_connection(move |conn| {
            conn.query_row(
                "SELECT value FROM translations WHERE cache_key = ?1 AND expires_at > ?2",
                params![key, Utc::now().timestamp()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read translation from cache")
        })
        .await
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        let now = Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_secs);

        self.with_connection(move |conn| {
            conn.execute(
                "DELETE FROM translations WHERE expires_at <= ?1",
                params![now],
            )
            .context("Failed to purge expired translations")?;
            conn.execute(
                "INSERT OR REPLACE INTO translations (cache_key, value, expires_at)
                 VALUES (?1, ?2, ?3)",
                params![key, value, expires_at],
            )
            .context("Failed to insert translation into cache")?;
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .context("Cache database is not readable")?;
            Ok(())
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
