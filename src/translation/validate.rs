//! Input validation for incoming translation requests.

use serde::Deserialize;

use crate::error::ValidationError;

/// Maximum accepted text length, in characters.
pub const MAX_TEXT_LENGTH: usize = 2000;

/// Raw request body as it arrives over the wire.
///
/// Every field is optional so that missing fields surface as validation
/// errors rather than deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslateBody {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub target_lang: Option<String>,
    #[serde(default)]
    pub source_lang: Option<String>,
}

/// A translation request that has passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub target_lang: String,
    pub source_lang: Option<String>,
    pub force_refresh: bool,
}

impl TranslationRequest {
    /// Validates a raw body, trimming `text` and the language fields.
    pub fn validate(
        body: Option<TranslateBody>,
        force_refresh: bool,
    ) -> Result<Self, ValidationError> {
        let body = body.ok_or(ValidationError::MissingBody)?;

        let text = body.text.as_deref().unwrap_or_default().trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyText);
        }

        let length = text.chars().count();
        if length > MAX_TEXT_LENGTH {
            return Err(ValidationError::TextTooLong {
                length,
                max: MAX_TEXT_LENGTH,
            });
        }

        let target_lang = body.target_lang.as_deref().unwrap_or_default().trim();
        if target_lang.is_empty() {
            return Err(ValidationError::EmptyTargetLang);
        }
        if !is_language_name(target_lang) {
            return Err(ValidationError::InvalidTargetLangFormat);
        }

        let source_lang = match body.source_lang.as_deref().map(str::trim) {
            Some(lang) if !lang.is_empty() => {
                if !is_language_name(lang) {
                    return Err(ValidationError::InvalidSourceLangFormat);
                }
                Some(lang.to_string())
            }
            _ => None,
        };

        Ok(Self {
            text: text.to_string(),
            target_lang: target_lang.to_string(),
            source_lang,
            force_refresh,
        })
    }
}

/// Letters, whitespace and hyphens only.
fn is_language_name(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace() || c == '-')
}
