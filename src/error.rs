//! Error taxonomy for the gateway and its mapping onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Client-correctable problems with a translation request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Empty request body")]
    MissingBody,

    #[error("Invalid request format")]
    MalformedBody(String),

    #[error("Text field is required")]
    EmptyText,

    #[error("Text exceeds maximum length of {max} characters")]
    TextTooLong { length: usize, max: usize },

    #[error("Target language is required")]
    EmptyTargetLang,

    #[error("Invalid target language format")]
    InvalidTargetLangFormat,

    #[error("Invalid source language format")]
    InvalidSourceLangFormat,
}

impl ValidationError {
    /// Human-readable hint on how to fix the request.
    pub fn details(&self) -> String {
        match self {
            Self::MissingBody => "Request body must contain valid JSON data".to_string(),
            Self::MalformedBody(reason) => format!("Failed to parse request: {reason}"),
            Self::EmptyText => "Provide text to translate in the 'text' field".to_string(),
            Self::TextTooLong { length, .. } => {
                format!("Current length: {length} characters. Please shorten your text.")
            }
            Self::EmptyTargetLang => {
                "Provide target language in the 'target_lang' field".to_string()
            }
            Self::InvalidTargetLangFormat => {
                "Target language can only contain letters, spaces, and hyphens".to_string()
            }
            Self::InvalidSourceLangFormat => {
                "Source language can only contain letters, spaces, and hyphens".to_string()
            }
        }
    }
}

/// Every failure the translation pipeline and HTTP layer can report.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Configuration {
        message: String,
        details: Option<String>,
    },

    #[error("{message}")]
    Upstream {
        status_code: u16,
        message: String,
        detail: String,
    },

    #[error("Empty translation result")]
    EmptyTranslation,

    #[error("Rate limit exceeded")]
    RateLimited { details: String },

    #[error("Token limit exceeded")]
    TokenLimit { details: String },

    #[error("Request body too large")]
    PayloadTooLarge { limit: usize },

    #[error("Endpoint not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal server error")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn missing_api_key() -> Self {
        Self::Configuration {
            message: "API key not configured".to_string(),
            details: Some(
                "Set UPSTREAM_API_KEY (or the variable named by upstream.api_key_env)".to_string(),
            ),
        }
    }

    pub fn upstream(
        status_code: u16,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Upstream {
            status_code,
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::EmptyTranslation => StatusCode::BAD_REQUEST,
            Self::Configuration { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status_code, .. } => StatusCode::from_u16(*status_code)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::RateLimited { .. } | Self::TokenLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Configuration { .. } => "configuration_error",
            Self::Upstream { .. } => "upstream_error",
            Self::EmptyTranslation => "empty_translation",
            Self::RateLimited { .. } => "rate_limit_error",
            Self::TokenLimit { .. } => "token_limit_error",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::NotFound => "not_found_error",
            Self::MethodNotAllowed => "method_error",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn details(&self) -> Option<String> {
        match self {
            Self::Validation(e) => Some(e.details()),
            Self::Configuration { details, .. } => details.clone(),
            Self::Upstream { detail, .. } => Some(detail.clone()),
            Self::EmptyTranslation => Some("The model returned no usable output".to_string()),
            Self::RateLimited { details } | Self::TokenLimit { details } => Some(details.clone()),
            Self::PayloadTooLarge { limit } => {
                Some(format!("Request bodies are limited to {limit} bytes"))
            }
            Self::NotFound => Some("The requested API endpoint does not exist".to_string()),
            Self::MethodNotAllowed => {
                Some("The HTTP method is not supported for this endpoint".to_string())
            }
            Self::Internal(message) => Some(message.clone()),
        }
    }
}

/// JSON body returned for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: Option<String>,
    pub error_type: &'static str,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
}

impl From<&GatewayError> for ErrorBody {
    fn from(err: &GatewayError) -> Self {
        Self {
            error: err.to_string(),
            details: err.details(),
            error_type: err.error_type(),
            status_code: err.status_code().as_u16(),
            timestamp: Utc::now(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error_type = self.error_type(), details = ?self.details(), "{}", self);
        }
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_request() {
        let err = GatewayError::from(ValidationError::EmptyText);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_type(), "validation_error");
    }

    #[test]
    fn test_text_too_long_reports_length() {
        let err = GatewayError::from(ValidationError::TextTooLong {
            length: 2001,
            max: 2000,
        });
        let body = ErrorBody::from(&err);
        assert_eq!(body.status_code, 400);
        assert!(body.error.contains("2000"));
        assert!(body.details.unwrap().contains("2001"));
    }

    #[test]
    fn test_upstream_status_is_mirrored() {
        let err = GatewayError::upstream(429, "Upstream rate limit exceeded", "slow down");
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let err = GatewayError::upstream(503, "Network error", "connection refused");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_upstream_unknown_status_falls_back_to_500() {
        let err = GatewayError::upstream(200, "odd", "");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = GatewayError::upstream(0, "odd", "");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_empty_translation_is_bad_request() {
        assert_eq!(
            GatewayError::EmptyTranslation.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_error_carries_message_in_details() {
        let body = ErrorBody::from(&GatewayError::Internal("boom".to_string()));
        assert_eq!(body.status_code, 500);
        assert_eq!(body.error, "Internal server error");
        assert_eq!(body.details.as_deref(), Some("boom"));
    }

    #[test]
    fn test_error_body_serializes_required_fields() {
        let err = GatewayError::RateLimited {
            details: "Wait 0.5 seconds before next request".to_string(),
        };
        let json = serde_json::to_value(ErrorBody::from(&err)).unwrap();
        assert_eq!(json["status_code"], 429);
        assert_eq!(json["error"], "Rate limit exceeded");
        assert!(json["details"].is_string());
    }

    #[test]
    fn test_token_limit_is_too_many_requests() {
        let err = GatewayError::TokenLimit {
            details: "Token limit reached (310/300)".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.error_type(), "token_limit_error");
    }

    #[test]
    fn test_payload_too_large_reports_limit() {
        let body = ErrorBody::from(&GatewayError::PayloadTooLarge { limit: 65_536 });
        assert_eq!(body.status_code, 413);
        assert_eq!(body.error_type, "payload_too_large");
        assert!(body.details.unwrap().contains("65536"));
    }
}
