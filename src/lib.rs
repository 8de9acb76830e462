//! # tl-gateway - Translation HTTP Gateway
//!
//! `tl-gateway` exposes a small JSON API in front of an OpenAI-compatible
//! chat-completions endpoint. Requests are validated, the source language is
//! detected, results are cached, and every client is rate limited.
//!
//! ## Endpoints
//!
//! - `POST /api/translate`: translate, serving a cached result when available
//! - `POST /api/retranslate`: translate again and overwrite the cached result
//! - `GET /api/health`: liveness plus cache and upstream status
//!
//! ## Quick Start
//!
//! ```bash
//! export GROQ_API_KEY=...
//! tl-gateway --cache-url redis://localhost:6379
//!
//! curl -X POST localhost:5000/api/translate \
//!   -H 'Content-Type: application/json' \
//!   -d '{"text": "Hello world", "target_lang": "Spanish"}'
//! ```
//!
//! ## Configuration
//!
//! Settings are read from `~/.config/tl-gateway/config.toml`, then overridden
//! by environment variables and finally by command-line flags:
//!
//! ```toml
//! [server]
//! port = 5000
//!
//! [upstream]
//! endpoint = "https://api.groq.com/openai"
//! model = "llama-3.1-8b-instant"
//! api_key_env = "GROQ_API_KEY"
//!
//! [cache]
//! url = "sqlite://"
//!
//! [rate_limit]
//! window_secs = 1
//! max_requests = 1
//! ```

/// Translation cache backends (Redis, `SQLite`, in-process).
pub mod cache;

/// Command-line interface definitions and handlers.
pub mod cli;

/// Configuration file management and layered settings.
pub mod config;

/// Error types and their HTTP representation.
pub mod error;

/// XDG-style path utilities for configuration and cache.
pub mod paths;

/// HTTP routes, handlers and rate limiting.
pub mod server;

/// Validation, language detection and the upstream translation client.
pub mod translation;
