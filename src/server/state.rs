use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::rate_limit::RateLimiter;
use crate::cache::{CacheGateway, MemoryStore, RedisStore, SqliteStore};
use crate::config::{DEFAULT_MAX_TOKENS, ResolvedConfig};
use crate::paths;
use crate::translation::{MAX_TEXT_LENGTH, TranslationPipeline, Translator, UpstreamClient};

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: TranslationPipeline,
    pub rate_limiter: RateLimiter,
    pub static_dir: Option<PathBuf>,
    pub max_text_length: usize,
    pub max_tokens_per_request: u32,
}

impl AppState {
    pub const fn new(pipeline: TranslationPipeline, rate_limiter: RateLimiter) -> Self {
        Self {
            pipeline,
            rate_limiter,
            static_dir: None,
            max_text_length: MAX_TEXT_LENGTH,
            max_tokens_per_request: DEFAULT_MAX_TOKENS,
        }
    }

    #[must_use]
    pub fn with_max_tokens_per_request(mut self, max_tokens: u32) -> Self {
        self.max_tokens_per_request = max_tokens;
        self
    }

    #[must_use]
    pub fn with_static_dir(mut self, static_dir: Option<PathBuf>) -> Self {
        self.static_dir = static_dir;
        self
    }

    /// Wires up the upstream client, cache and rate limiter from configuration.
    ///
    /// A missing API key or an unreachable cache does not prevent startup.
    pub async fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let translator: Option<Arc<dyn Translator>> = match config.upstream_settings() {
            Some(settings) => Some(Arc::new(UpstreamClient::new(settings)?)),
            None => {
                warn!("No upstream API key configured; translation requests will fail");
                None
            }
        };

        let (cache, redis_conn) = match config.cache_url.as_deref() {
            Some(url) => open_cache(url, config.cache_ttl).await,
            None => {
                info!("Cache disabled");
                (CacheGateway::disabled(), None)
            }
        };

        let rate_limiter = match redis_conn {
            Some(conn) => RateLimiter::redis(
                conn,
                config.rate_limit_window,
                config.rate_limit_max_requests,
            ),
            None => RateLimiter::local(config.rate_limit_window, config.rate_limit_max_requests),
        }
        .with_token_budget(config.token_budget);

        Ok(
            Self::new(TranslationPipeline::new(translator, cache), rate_limiter)
                .with_max_tokens_per_request(config.max_tokens)
                .with_static_dir(config.static_dir.clone()),
        )
    }
}

/// Opens the store named by `url`, falling back to a disabled cache on failure.
///
/// Also returns the Redis connection when there is one, so rate limiting can share it.
async fn open_cache(
    url: &str,
    ttl: Duration,
) -> (CacheGateway, Option<redis::aio::ConnectionManager>) {
    match url.split_once("://") {
        Some(("redis" | "rediss", _)) => match RedisStore::connect(url, REDIS_CONNECT_TIMEOUT).await
        {
            Ok(store) => {
                info!("Connected to Redis cache");
                let conn = store.connection();
                (CacheGateway::new(Arc::new(store), ttl), Some(conn))
            }
            Err(e) => {
                warn!("Redis unavailable, running without cache: {e:#}");
                (CacheGateway::disabled(), None)
            }
        },
        Some(("sqlite", path)) => {
            let db_path = if path.is_empty() {
                paths::default_cache_db()
            } else {
                PathBuf::from(path)
            };
            match SqliteStore::open(&db_path) {
                Ok(store) => {
                    info!(path = %db_path.display(), "Using SQLite cache");
                    (CacheGateway::new(Arc::new(store), ttl), None)
                }
                Err(e) => {
                    warn!("SQLite cache unavailable, running without cache: {e:#}");
                    (CacheGateway::disabled(), None)
                }
            }
        }
        Some(("memory", _)) => {
            info!("Using in-process cache");
            (CacheGateway::new(Arc::new(MemoryStore::new()), ttl), None)
        }
        _ => {
            warn!("Unsupported cache URL '{url}', running without cache");
            (CacheGateway::disabled(), None)
        }
    }
}
