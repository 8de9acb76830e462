use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;
use tracing::debug;

use super::prompt::build_system_prompt;
use super::retry::RetryPolicy;
use crate::error::{GatewayError, Result};

/// A service that turns text into its translation.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates `text` from the hinted source language into `target_language`.
    async fn translate(
        &self,
        source_language: &str,
        target_language: &str,
        text: &str,
    ) -> Result<String>;

    /// Identifier of the model producing translations, stored with cache entries.
    fn model_id(&self) -> &str;
}

/// Connection and sampling settings for the upstream chat-completions API.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

// Use Cow to avoid cloning strings that are only borrowed for serialization
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Cow<'a, str>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Client for OpenAI-compatible chat-completions endpoints.
pub struct UpstreamClient {
    client: Client,
    settings: UpstreamSettings,
}

impl UpstreamClient {
    pub fn new(settings: UpstreamSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build HTTP client for upstream API")?;

        Ok(Self { client, settings })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.settings.endpoint.trim_end_matches('/')
        )
    }

    async fn attempt(&self, url: &str, request: &ChatCompletionRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.settings.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(&e, self.settings.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&e, self.settings.timeout))?;

        parse_completion(&body)
    }
}

#[async_trait]
impl Translator for UpstreamClient {
    async fn translate(
        &self,
        source_language: &str,
        target_language: &str,
        text: &str,
    ) -> Result<String> {
        let url = self.completions_url();

        // Build system prompt once (returns owned String)
        let system_prompt = build_system_prompt(source_language, target_language);

        let request = ChatCompletionRequest {
            model: &self.settings.model,
            messages: vec![
                Message {
                    role: "system",
                    content: Cow::Owned(system_prompt),
                },
                Message {
                    role: "user",
                    content: Cow::Borrowed(text),
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        self.settings
            .retry
            .run(|attempt| {
                debug!(attempt, model = %self.settings.model, "Calling upstream API");
                self.attempt(&url, &request)
            })
            .await
    }

    fn model_id(&self) -> &str {
        &self.settings.model
    }
}

/// Extracts the translation from a chat-completions response body.
///
/// The first choice with non-empty content (after trimming) wins.
fn parse_completion(body: &str) -> Result<String> {
    let response: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        GatewayError::upstream(
            502,
            "Invalid response from upstream API",
            format!("Failed to parse response: {e}"),
        )
    })?;

    if response.choices.is_empty() {
        return Err(GatewayError::upstream(
            502,
            "Invalid response format from upstream API",
            "No choices returned in response",
        ));
    }

    response
        .choices
        .into_iter()
        .filter_map(|choice| choice.message.and_then(|m| m.content))
        .map(|content| content.trim().to_string())
        .find(|content| !content.is_empty())
        .ok_or(GatewayError::EmptyTranslation)
}

fn status_error(status: u16, body: &str) -> GatewayError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        401 => GatewayError::Configuration {
            message: "Invalid upstream API key".to_string(),
            details: Some("Check the configured upstream API key".to_string()),
        },
        429 => GatewayError::upstream(
            429,
            "Upstream rate limit exceeded",
            format!("Too many requests to upstream API: {message}"),
        ),
        _ => GatewayError::upstream(status, format!("Upstream API error (HTTP {status})"), message),
    }
}

fn transport_error(err: &reqwest::Error, timeout: Duration) -> GatewayError {
    if err.is_timeout() {
        GatewayError::upstream(
            504,
            "Upstream API timeout",
            format!("Request timed out after {} seconds", timeout.as_secs()),
        )
    } else {
        GatewayError::upstream(
            503,
            "Network error connecting to upstream API",
            format!("Request failed: {err}"),
        )
    }
}
