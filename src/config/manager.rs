use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::paths;
use crate::translation::{RetryPolicy, UpstreamSettings};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_API_KEY_ENV: &str = "GROQ_API_KEY";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 300;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 1;
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 1;

/// `[server]` section of config.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// Directory of static files served for unmatched GET requests.
    pub static_dir: Option<String>,
}

/// `[upstream]` section: the OpenAI-compatible translation provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    /// API key stored directly in config (not recommended).
    pub api_key: Option<String>,
    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

impl UpstreamConfig {
    /// Gets the API key, preferring the named environment variable over the config file.
    pub fn get_api_key(&self, env: &impl Fn(&str) -> Option<String>) -> Option<String> {
        let env_var = self.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV);
        env(env_var).or_else(|| self.api_key.clone().filter(|k| !k.is_empty()))
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// `redis://`, `rediss://`, `sqlite://<path>` or `memory://`.
    pub url: Option<String>,
    pub ttl_secs: Option<u64>,
}

/// `[rate_limit]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_secs: Option<u64>,
    pub max_requests: Option<u32>,
    /// Words a client may spend per day across requests and translations.
    /// Unset means unlimited.
    pub daily_token_budget: Option<u64>,
}

/// The complete configuration file structure.
///
/// Corresponds to `~/.config/tl-gateway/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Options for resolving configuration.
///
/// Contains CLI overrides that take precedence over environment and config file values.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub cache_url: Option<String>,
    /// Disable the cache even when a cache URL is configured.
    pub no_cache: bool,
}

/// Resolved configuration after merging CLI arguments, environment and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub bind: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
    pub endpoint: String,
    pub model: String,
    /// `None` leaves the server running with translation disabled.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub cache_url: Option<String>,
    pub cache_ttl: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: u32,
    pub token_budget: Option<u64>,
}

impl ResolvedConfig {
    /// Upstream client settings, or `None` without an API key.
    pub fn upstream_settings(&self) -> Option<UpstreamSettings> {
        self.api_key.as_ref().map(|api_key| UpstreamSettings {
            endpoint: self.endpoint.clone(),
            api_key: api_key.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: self.timeout,
            retry: self.retry,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Reads a non-empty variable from the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolves configuration by merging CLI options, environment variables and config file settings.
///
/// Priority: CLI options, then environment, then config file, then built-in defaults.
///
/// # Errors
///
/// Returns an error if a value is present but malformed or out of range.
pub fn resolve_config(
    options: &ResolveOptions,
    config_file: &ConfigFile,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let bind = options
        .bind
        .clone()
        .or_else(|| env("BIND_ADDR"))
        .or_else(|| config_file.server.bind.clone())
        .unwrap_or_else(|| DEFAULT_BIND.to_string());

    let port = match (options.port, env("PORT")) {
        (Some(port), _) => port,
        (None, Some(raw)) => raw
            .trim()
            .parse::<u16>()
            .with_context(|| format!("Invalid PORT value: '{raw}'"))?,
        (None, None) => config_file.server.port.unwrap_or(DEFAULT_PORT),
    };

    let static_dir = env("STATIC_DIR")
        .or_else(|| config_file.server.static_dir.clone())
        .map(PathBuf::from);

    let upstream = &config_file.upstream;

    let endpoint = env("UPSTREAM_ENDPOINT")
        .or_else(|| upstream.endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    let model = env("UPSTREAM_MODEL")
        .or_else(|| upstream.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let api_key = env("UPSTREAM_API_KEY").or_else(|| upstream.get_api_key(&env));

    let temperature = upstream.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    if !(0.0..=2.0).contains(&temperature) {
        bail!("Invalid upstream.temperature: {temperature} (expected 0.0 to 2.0)");
    }

    let max_tokens = upstream.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
    if max_tokens == 0 {
        bail!("Invalid upstream.max_tokens: must be at least 1");
    }

    let defaults = RetryPolicy::default();
    let max_attempts = upstream.max_attempts.unwrap_or(defaults.max_attempts);
    if max_attempts == 0 {
        bail!("Invalid upstream.max_attempts: must be at least 1");
    }
    let retry = RetryPolicy {
        max_attempts,
        base_delay: upstream
            .base_delay_ms
            .map_or(defaults.base_delay, Duration::from_millis),
    };

    let cache_url = if options.no_cache {
        None
    } else {
        options
            .cache_url
            .clone()
            .or_else(|| env("CACHE_URL"))
            .or_else(|| env("REDIS_URL"))
            .or_else(|| config_file.cache.url.clone())
    };

    let rate_limit_window = Duration::from_secs(
        config_file
            .rate_limit
            .window_secs
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS),
    );
    if rate_limit_window.is_zero() {
        bail!("Invalid rate_limit.window_secs: must be at least 1");
    }

    let token_budget = config_file.rate_limit.daily_token_budget;
    if token_budget == Some(0) {
        bail!("Invalid rate_limit.daily_token_budget: must be at least 1, or left unset");
    }

    Ok(ResolvedConfig {
        bind,
        port,
        static_dir,
        endpoint,
        model,
        api_key,
        temperature,
        max_tokens,
        timeout: Duration::from_secs(upstream.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        retry,
        cache_url,
        cache_ttl: config_file
            .cache
            .ttl_secs
            .map_or(DEFAULT_TTL, Duration::from_secs),
        rate_limit_window,
        rate_limit_max_requests: config_file
            .rate_limit
            .max_requests
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS),
        token_budget,
    })
}

/// Manages loading configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
    explicit: bool,
}

impl ConfigManager {
    /// Creates a config manager for the default location.
    ///
    /// Configuration is read from `$XDG_CONFIG_HOME/tl-gateway/config.toml`
    /// or `~/.config/tl-gateway/config.toml` if `XDG_CONFIG_HOME` is not set.
    pub fn new() -> Self {
        Self {
            config_path: paths::default_config_file(),
            explicit: false,
        }
    }

    /// Creates a config manager for a path given by the user; the file must exist.
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            explicit: true,
        }
    }

    pub const fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn load(&self) -> Result<ConfigFile> {
        let contents = fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;

        let config_file: ConfigFile = toml::from_str(&contents).with_context(|| {
            format!("Failed to parse config file: {}", self.config_path.display())
        })?;

        Ok(config_file)
    }

    /// Loads the file, treating a missing default file as an empty configuration.
    pub fn load_or_default(&self) -> Result<ConfigFile> {
        if !self.explicit && !self.config_path.exists() {
            return Ok(ConfigFile::default());
        }
        self.load()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
