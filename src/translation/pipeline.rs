//! The translate / retranslate pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::client::Translator;
use super::language::detect_language;
use super::validate::TranslationRequest;
use crate::cache::{CacheEntry, CacheGateway, cache_key};
use crate::error::{GatewayError, Result};

/// How a result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStatus {
    Cached,
    Generated,
    Regenerated,
}

/// Response body of a successful translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationResult {
    pub source_language: String,
    pub target_language: String,
    pub translated_text: String,
    pub status: TranslationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    /// Whitespace-separated words in the request plus the translation.
    /// Only set when the upstream was called.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<usize>,
    /// Whether the fresh translation was written to the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_available: Option<bool>,
}

/// Rough token count billed against a client's budget.
pub fn count_tokens(text: &str, translated_text: &str) -> usize {
    text.split_whitespace().count() + translated_text.split_whitespace().count()
}

/// Composes detection, caching and the upstream call.
#[derive(Clone)]
pub struct TranslationPipeline {
    translator: Option<Arc<dyn Translator>>,
    cache: CacheGateway,
}

impl TranslationPipeline {
    /// `translator` is `None` when no upstream credentials are configured.
    pub fn new(translator: Option<Arc<dyn Translator>>, cache: CacheGateway) -> Self {
        Self { translator, cache }
    }

    pub const fn is_configured(&self) -> bool {
        self.translator.is_some()
    }

    pub const fn cache(&self) -> &CacheGateway {
        &self.cache
    }

    pub async fn process_translation(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResult> {
        let translator = self
            .translator
            .as_ref()
            .ok_or_else(GatewayError::missing_api_key)?;

        let source_language = request.source_lang.as_ref().map_or_else(
            || detect_language(&request.text),
            |lang| lang.to_uppercase(),
        );
        let key = cache_key(&request.text, &request.target_lang);

        if !request.force_refresh
            && let Some(cached) = self.cache.get(&key).await
        {
            info!(target_lang = %request.target_lang, "Serving cached translation");
            return Ok(TranslationResult {
                source_language: cached.source_language,
                target_language: request.target_lang.clone(),
                translated_text: cached.translated_text,
                status: TranslationStatus::Cached,
                cached_at: Some(cached.created_at),
                tokens_used: None,
                cache_available: None,
            });
        }

        let translated_text = translator
            .translate(&source_language, &request.target_lang, &request.text)
            .await?;

        let entry = CacheEntry {
            source_language: source_language.clone(),
            translated_text: translated_text.clone(),
            created_at: Utc::now(),
            model_id: translator.model_id().to_string(),
        };
        let cache_available = self.cache.set(&key, &entry).await;
        let tokens_used = count_tokens(&request.text, &translated_text);

        let status = if request.force_refresh {
            TranslationStatus::Regenerated
        } else {
            TranslationStatus::Generated
        };
        info!(
            source_language = %source_language,
            target_lang = %request.target_lang,
            ?status,
            tokens_used,
            cache_available,
            "Translation produced"
        );

        Ok(TranslationResult {
            source_language,
            target_language: request.target_lang.clone(),
            translated_text,
            status,
            cached_at: None,
            tokens_used: Some(tokens_used),
            cache_available: Some(cache_available),
        })
    }
}
