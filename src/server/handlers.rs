use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;

use super::rate_limit::TokensUsed;
use super::state::AppState;
use crate::cache::CacheStatus;
use crate::error::{GatewayError, ValidationError};
use crate::translation::{TranslateBody, TranslationRequest};

/// Largest request body the translation routes will buffer.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Rate limit settings echoed by the health check.
#[derive(Debug, Serialize)]
pub struct RateLimitInfo {
    pub window_seconds: f64,
    pub max_requests: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_token_budget: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache_backend_status: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_backend: Option<&'static str>,
    pub upstream_configured: bool,
    pub max_text_length: usize,
    pub max_tokens_per_request: u32,
    pub rate_limit: RateLimitInfo,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/translate
pub async fn translate(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, GatewayError> {
    run_translation(&state, &body?, false).await
}

/// POST /api/retranslate: same contract, but always bypasses the cached result.
pub async fn retranslate(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, GatewayError> {
    run_translation(&state, &body?, true).await
}

impl From<BytesRejection> for GatewayError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge {
                limit: MAX_BODY_BYTES,
            }
        } else {
            ValidationError::MalformedBody(rejection.body_text()).into()
        }
    }
}

async fn run_translation(
    state: &AppState,
    body: &[u8],
    force_refresh: bool,
) -> Result<Response, GatewayError> {
    let request = TranslationRequest::validate(parse_body(body)?, force_refresh)?;
    let result = state.pipeline.process_translation(&request).await?;

    // Handed to the rate limiter, which charges them to the caller.
    Ok(match result.tokens_used {
        Some(tokens) => {
            let tokens = TokensUsed(u64::try_from(tokens).unwrap_or(u64::MAX));
            (Extension(tokens), Json(result)).into_response()
        }
        None => Json(result).into_response(),
    })
}

/// An empty body or a JSON `null` is a missing body; anything else must be an object.
fn parse_body(body: &[u8]) -> Result<Option<TranslateBody>, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body).map_err(|e| ValidationError::MalformedBody(e.to_string()))
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache = state.pipeline.cache();

    Json(HealthResponse {
        status: "healthy",
        cache_backend_status: cache.status().await,
        cache_backend: cache.backend_name(),
        upstream_configured: state.pipeline.is_configured(),
        max_text_length: state.max_text_length,
        max_tokens_per_request: state.max_tokens_per_request,
        rate_limit: RateLimitInfo {
            window_seconds: state.rate_limiter.window().as_secs_f64(),
            max_requests: state.rate_limiter.max_requests(),
            daily_token_budget: state.rate_limiter.token_budget(),
        },
        timestamp: Utc::now(),
    })
}

pub async fn not_found() -> GatewayError {
    GatewayError::NotFound
}

pub async fn method_not_allowed() -> GatewayError {
    GatewayError::MethodNotAllowed
}

/// Turns a panic inside a handler into the usual 500 error body.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = message, "Request handler panicked");

    GatewayError::Internal("The server hit an unexpected condition".to_string()).into_response()
}
