//! Fixed-window, per-client request limiting with an optional daily token budget.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use super::state::AppState;
use crate::error::GatewayError;

/// Local counters are swept once the map grows past this many clients.
const SWEEP_THRESHOLD: usize = 10_000;

/// A client's token tally is forgotten this long after its last update.
pub const TOKEN_WINDOW: Duration = Duration::from_secs(60 * 60 * 24);

/// Tokens a handler spent, attached to its response for the limiter to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokensUsed(pub u64);

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy)]
struct TokenTally {
    updated: Instant,
    used: u64,
}

#[derive(Clone)]
enum Backend {
    Local {
        requests: Arc<DashMap<String, WindowCounter>>,
        tokens: Arc<DashMap<String, TokenTally>>,
    },
    Redis(ConnectionManager),
}

/// Allows at most `max_requests` per client in each `window`.
#[derive(Clone)]
pub struct RateLimiter {
    backend: Backend,
    window: Duration,
    max_requests: u32,
    token_budget: Option<u64>,
}

impl RateLimiter {
    /// Counters kept in this process.
    pub fn local(window: Duration, max_requests: u32) -> Self {
        Self {
            backend: Backend::Local {
                requests: Arc::new(DashMap::new()),
                tokens: Arc::new(DashMap::new()),
            },
            window,
            max_requests,
            token_budget: None,
        }
    }

    /// Counters kept in Redis, shared by every gateway instance using it.
    pub const fn redis(conn: ConnectionManager, window: Duration, max_requests: u32) -> Self {
        Self {
            backend: Backend::Redis(conn),
            window,
            max_requests,
            token_budget: None,
        }
    }

    /// Caps the tokens a client may spend per [`TOKEN_WINDOW`]. `None` disables the cap.
    #[must_use]
    pub fn with_token_budget(mut self, budget: Option<u64>) -> Self {
        self.token_budget = budget;
        self
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    pub const fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub const fn token_budget(&self) -> Option<u64> {
        self.token_budget
    }

    /// Counts one request for `client_id`.
    ///
    /// Fails with `TokenLimit` once the client's budget is spent, without
    /// counting the request, and with `RateLimited` once the window is full.
    pub async fn check(&self, client_id: &str) -> Result<(), GatewayError> {
        if let Some(budget) = self.token_budget {
            let used = match &self.backend {
                Backend::Local { tokens, .. } => Self::tokens_local(tokens, client_id),
                Backend::Redis(conn) => match Self::tokens_redis(conn.clone(), client_id).await {
                    Ok(used) => used,
                    Err(e) => {
                        warn!("Token budget check failed, allowing request: {e}");
                        0
                    }
                },
            };
            if used >= budget {
                return Err(GatewayError::TokenLimit {
                    details: format!("Token limit reached ({used}/{budget})"),
                });
            }
        }

        let wait = match &self.backend {
            Backend::Local { requests, .. } => self.check_local(requests, client_id),
            Backend::Redis(conn) => match self.check_redis(conn.clone(), client_id).await {
                Ok(wait) => wait,
                Err(e) => {
                    // Store trouble must not lock clients out.
                    warn!("Rate limit check failed, allowing request: {e}");
                    None
                }
            },
        };

        match wait {
            None => Ok(()),
            Some(wait) => Err(GatewayError::RateLimited {
                details: format!(
                    "Wait {:.1} seconds before next request",
                    wait.as_secs_f64()
                ),
            }),
        }
    }

    /// Adds `tokens` to the client's tally. A no-op without a budget.
    pub async fn record_tokens(&self, client_id: &str, tokens: u64) {
        if self.token_budget.is_none() || tokens == 0 {
            return;
        }

        match &self.backend {
            Backend::Local { tokens: tallies, .. } => {
                let now = Instant::now();
                if tallies.len() > SWEEP_THRESHOLD {
                    tallies.retain(|_, t| now.duration_since(t.updated) < TOKEN_WINDOW);
                }

                let mut tally = tallies.entry(client_id.to_string()).or_insert(TokenTally {
                    updated: now,
                    used: 0,
                });
                if now.duration_since(tally.updated) >= TOKEN_WINDOW {
                    tally.used = 0;
                }
                tally.used = tally.used.saturating_add(tokens);
                tally.updated = now;
            }
            Backend::Redis(conn) => {
                if let Err(e) = Self::record_redis(conn.clone(), client_id, tokens).await {
                    warn!("Failed to record token usage: {e}");
                }
            }
        }
    }

    fn tokens_local(tallies: &DashMap<String, TokenTally>, client_id: &str) -> u64 {
        tallies
            .get(client_id)
            .filter(|t| t.updated.elapsed() < TOKEN_WINDOW)
            .map_or(0, |t| t.used)
    }

    async fn tokens_redis(mut conn: ConnectionManager, client_id: &str) -> redis::RedisResult<u64> {
        let used: Option<u64> = redis::cmd("GET")
            .arg(token_key(client_id))
            .query_async(&mut conn)
            .await?;
        Ok(used.unwrap_or(0))
    }

    async fn record_redis(
        mut conn: ConnectionManager,
        client_id: &str,
        tokens: u64,
    ) -> redis::RedisResult<()> {
        let key = token_key(client_id);
        let () = redis::pipe()
            .atomic()
            .cmd("INCRBY")
            .arg(&key)
            .arg(tokens)
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(TOKEN_WINDOW.as_secs())
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Returns how long the client has to wait, if it is over the limit.
    fn check_local(
        &self,
        counters: &DashMap<String, WindowCounter>,
        client_id: &str,
    ) -> Option<Duration> {
        let now = Instant::now();

        if counters.len() > SWEEP_THRESHOLD {
            counters.retain(|_, c| now.duration_since(c.started) < self.window);
        }

        let mut counter = counters
            .entry(client_id.to_string())
            .or_insert(WindowCounter {
                started: now,
                count: 0,
            });

        let elapsed = now.duration_since(counter.started);
        if elapsed >= self.window {
            counter.started = now;
            counter.count = 0;
        }

        if counter.count >= self.max_requests {
            return Some(self.window.saturating_sub(now.duration_since(counter.started)));
        }

        counter.count += 1;
        None
    }

    async fn check_redis(
        &self,
        mut conn: ConnectionManager,
        client_id: &str,
    ) -> redis::RedisResult<Option<Duration>> {
        let window_ms = self.window.as_millis().max(1);
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u128;
        let window_index = now_ms / window_ms;
        let key = format!("rate_limit:{client_id}:{window_index}");

        let (count,): (u32,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&key)
            .cmd("EXPIRE")
            .arg(&key)
            .arg(self.window.as_secs() + 1)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if count > self.max_requests {
            let remaining_ms = window_ms - (now_ms % window_ms);
            return Ok(Some(Duration::from_millis(remaining_ms as u64)));
        }
        Ok(None)
    }
}

fn token_key(client_id: &str) -> String {
    format!("token_limit:{client_id}")
}

/// Identifies the caller: first `X-Forwarded-For` entry, else the peer address.
pub fn client_identity(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware rejecting requests over the limit with 429.
///
/// Tokens reported by the handler through [`TokensUsed`] are charged to the
/// same client afterwards.
pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client_id = client_identity(request.headers(), peer);

    if let Err(err) = state.rate_limiter.check(&client_id).await {
        warn!(client = %client_id, error_type = err.error_type(), "Request limit exceeded");
        return err.into_response();
    }

    let response = next.run(request).await;

    if let Some(&TokensUsed(tokens)) = response.extensions().get::<TokensUsed>() {
        state.rate_limiter.record_tokens(&client_id, tokens).await;
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test(start_paused = true)]
    async fn test_second_request_in_window_is_rejected() {
        let limiter = RateLimiter::local(Duration::from_secs(1), 1);

        assert!(limiter.check("10.0.0.1").await.is_ok());
        let err = limiter.check("10.0.0.1").await.unwrap_err();
        assert_eq!(err.status_code().as_u16(), 429);
        assert!(err.details().unwrap().starts_with("Wait "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets() {
        let limiter = RateLimiter::local(Duration::from_secs(1), 1);

        assert!(limiter.check("10.0.0.1").await.is_ok());
        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(limiter.check("10.0.0.1").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clients_are_independent() {
        let limiter = RateLimiter::local(Duration::from_secs(1), 1);

        assert!(limiter.check("10.0.0.1").await.is_ok());
        assert!(limiter.check("10.0.0.2").await.is_ok());
        assert!(limiter.check("10.0.0.1").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejections_do_not_extend_window() {
        let limiter = RateLimiter::local(Duration::from_secs(1), 2);

        assert!(limiter.check("c").await.is_ok());
        assert!(limiter.check("c").await.is_ok());
        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(limiter.check("c").await.is_err());
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.check("c").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_budget_blocks_once_spent() {
        let limiter =
            RateLimiter::local(Duration::from_millis(10), 100).with_token_budget(Some(10));

        assert!(limiter.check("c").await.is_ok());
        limiter.record_tokens("c", 6).await;
        assert!(limiter.check("c").await.is_ok());
        limiter.record_tokens("c", 6).await;

        let err = limiter.check("c").await.unwrap_err();
        assert_eq!(err.status_code().as_u16(), 429);
        assert_eq!(err.error_type(), "token_limit_error");
        assert_eq!(err.details().unwrap(), "Token limit reached (12/10)");

        assert!(limiter.check("other").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_budget_resets_after_a_day() {
        let limiter = RateLimiter::local(Duration::from_secs(1), 100).with_token_budget(Some(5));

        limiter.record_tokens("c", 5).await;
        assert!(limiter.check("c").await.is_err());

        tokio::time::advance(TOKEN_WINDOW).await;
        assert!(limiter.check("c").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_are_ignored_without_budget() {
        let limiter = RateLimiter::local(Duration::from_millis(1), 100);

        limiter.record_tokens("c", u64::MAX).await;
        assert!(limiter.check("c").await.is_ok());
        assert!(limiter.token_budget().is_none());
    }

    #[test]
    fn test_client_identity_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"),
        );
        let peer = Some("127.0.0.1".parse().unwrap());

        assert_eq!(client_identity(&headers, peer), "203.0.113.7");
    }

    #[test]
    fn test_client_identity_falls_back_to_peer() {
        let peer = Some("192.0.2.4".parse().unwrap());
        assert_eq!(client_identity(&HeaderMap::new(), peer), "192.0.2.4");

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(client_identity(&headers, peer), "192.0.2.4");
    }

    #[test]
    fn test_client_identity_unknown() {
        assert_eq!(client_identity(&HeaderMap::new(), None), "unknown");
    }
}
