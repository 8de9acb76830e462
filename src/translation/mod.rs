mod client;
mod language;
mod pipeline;
mod prompt;
mod retry;
mod validate;

pub use client::{Translator, UpstreamClient, UpstreamSettings};
pub use language::{KNOWN_LANGUAGES, UNKNOWN_LANGUAGE, detect_language, print_languages};
pub use pipeline::{TranslationPipeline, TranslationResult, TranslationStatus};
pub use retry::RetryPolicy;
pub use validate::{MAX_TEXT_LENGTH, TranslateBody, TranslationRequest};
