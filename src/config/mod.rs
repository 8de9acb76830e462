mod manager;

pub use manager::{
    CacheConfig, ConfigFile, ConfigManager, DEFAULT_API_KEY_ENV, DEFAULT_BIND, DEFAULT_ENDPOINT,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_PORT, RateLimitConfig, ResolveOptions,
    ResolvedConfig, ServerConfig, UpstreamConfig, process_env, resolve_config,
};
