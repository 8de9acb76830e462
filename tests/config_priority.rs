#![allow(clippy::unwrap_used)]
//! Config priority contract tests.
//!
//! These tests verify how CLI options, environment variables and config file
//! settings are layered.
//! Priority order (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults

use std::collections::HashMap;
use std::time::Duration;
use tl_gateway::config::{
    CacheConfig, ConfigFile, DEFAULT_MODEL, DEFAULT_PORT, RateLimitConfig, ResolveOptions,
    ServerConfig, UpstreamConfig, resolve_config,
};

fn make_config_with_defaults() -> ConfigFile {
    ConfigFile {
        server: ServerConfig {
            bind: Some("127.0.0.1".to_string()),
            port: Some(7000),
            static_dir: Some("config_public".to_string()),
        },
        upstream: UpstreamConfig {
            endpoint: Some("http://config.local".to_string()),
            model: Some("config_model".to_string()),
            api_key: Some("config_key".to_string()),
            api_key_env: Some("TEST_TRANSLATION_KEY".to_string()),
            ..UpstreamConfig::default()
        },
        cache: CacheConfig {
            url: Some("sqlite:///tmp/config.db".to_string()),
            ttl_secs: Some(60),
        },
        rate_limit: RateLimitConfig {
            window_secs: Some(2),
            max_requests: Some(3),
            daily_token_budget: Some(1000),
        },
    }
}

fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn test_config_file_overrides_defaults() {
    let config = make_config_with_defaults();
    let resolved = resolve_config(&ResolveOptions::default(), &config, env_from(&[])).unwrap();

    assert_eq!(resolved.bind, "127.0.0.1");
    assert_eq!(resolved.port, 7000);
    assert_eq!(resolved.model, "config_model");
    assert_eq!(resolved.endpoint, "http://config.local");
    assert_eq!(resolved.api_key, Some("config_key".to_string()));
    assert_eq!(resolved.cache_url, Some("sqlite:///tmp/config.db".to_string()));
    assert_eq!(resolved.cache_ttl, Duration::from_secs(60));
    assert_eq!(resolved.rate_limit_window, Duration::from_secs(2));
    assert_eq!(resolved.rate_limit_max_requests, 3);
    assert_eq!(resolved.token_budget, Some(1000));
}

#[test]
fn test_env_overrides_config_file() {
    let config = make_config_with_defaults();
    let env = env_from(&[
        ("BIND_ADDR", "0.0.0.0"),
        ("PORT", "9000"),
        ("UPSTREAM_MODEL", "env_model"),
        ("UPSTREAM_ENDPOINT", "http://env.local"),
        ("CACHE_URL", "memory://"),
        ("STATIC_DIR", "env_public"),
        ("TEST_TRANSLATION_KEY", "env_key"),
    ]);

    let resolved = resolve_config(&ResolveOptions::default(), &config, env).unwrap();

    assert_eq!(resolved.bind, "0.0.0.0");
    assert_eq!(resolved.port, 9000);
    assert_eq!(resolved.model, "env_model");
    assert_eq!(resolved.endpoint, "http://env.local");
    assert_eq!(resolved.cache_url, Some("memory://".to_string()));
    assert_eq!(
        resolved.static_dir.as_deref(),
        Some(std::path::Path::new("env_public"))
    );
    assert_eq!(resolved.api_key, Some("env_key".to_string()));
}

#[test]
fn test_cli_overrides_env_and_config_file() {
    let config = make_config_with_defaults();
    let env = env_from(&[
        ("BIND_ADDR", "0.0.0.0"),
        ("PORT", "9000"),
        ("CACHE_URL", "memory://"),
    ]);
    let options = ResolveOptions {
        bind: Some("::1".to_string()),
        port: Some(5555),
        cache_url: Some("redis://cli.local:6379".to_string()),
        no_cache: false,
    };

    let resolved = resolve_config(&options, &config, env).unwrap();

    assert_eq!(resolved.bind, "::1");
    assert_eq!(resolved.port, 5555);
    assert_eq!(resolved.cache_url, Some("redis://cli.local:6379".to_string()));
}

#[test]
fn test_no_cache_flag_wins_over_every_source() {
    let config = make_config_with_defaults();
    let env = env_from(&[("CACHE_URL", "memory://"), ("REDIS_URL", "redis://x")]);
    let options = ResolveOptions {
        cache_url: Some("memory://".to_string()),
        no_cache: true,
        ..ResolveOptions::default()
    };

    let resolved = resolve_config(&options, &config, env).unwrap();
    assert!(resolved.cache_url.is_none());
}

#[test]
fn test_builtin_defaults_without_any_source() {
    let resolved =
        resolve_config(&ResolveOptions::default(), &ConfigFile::default(), env_from(&[])).unwrap();

    assert_eq!(resolved.port, DEFAULT_PORT);
    assert_eq!(resolved.model, DEFAULT_MODEL);
    assert!(resolved.api_key.is_none());
    assert!(resolved.cache_url.is_none());
    assert!(resolved.upstream_settings().is_none());
}
