//! Source-language detection.
//!
//! The detected code is a hint only: it is shown to clients, stored with the
//! cache entry and named in the upstream prompt, but the model decides the
//! real source language on its own.

/// Returned when the detector cannot classify the text.
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

/// ISO 639-3 codes with a well-known two-letter display code.
pub const KNOWN_LANGUAGES: &[(&str, &str, &str)] = &[
    ("eng", "EN", "English"),
    ("spa", "ES", "Spanish"),
    ("fra", "FR", "French"),
    ("deu", "DE", "German"),
    ("ita", "IT", "Italian"),
    ("por", "PT", "Portuguese"),
    ("rus", "RU", "Russian"),
    ("jpn", "JA", "Japanese"),
    ("kor", "KO", "Korean"),
    ("cmn", "ZH", "Chinese"),
    ("ara", "AR", "Arabic"),
];

/// Detects the language of `text` and returns its display code.
///
/// Known languages map to two-letter codes, anything else passes through as
/// the upper-cased ISO 639-3 code.
///
/// Guesses the detector itself marks as unreliable, which is common for
/// inputs of a few words, count as undetectable.
pub fn detect_language(text: &str) -> String {
    whatlang::detect(text)
        .filter(whatlang::Info::is_reliable)
        .map_or_else(
            || UNKNOWN_LANGUAGE.to_string(),
            |info| display_code(info.lang().code()),
        )
}

/// Maps an ISO 639-3 code onto the code reported to clients.
pub fn display_code(iso_639_3: &str) -> String {
    KNOWN_LANGUAGES
        .iter()
        .find(|(code, _, _)| *code == iso_639_3)
        .map_or_else(|| iso_639_3.to_uppercase(), |(_, short, _)| (*short).to_string())
}

/// Prints the known language mapping to stdout.
pub fn print_languages() {
    println!("Detected language codes (ISO 639-3 -> display code)");
    for (code, short, name) in KNOWN_LANGUAGES {
        println!("  {code:5} {short:3} {name}");
    }
    println!("Other languages are reported as their upper-cased ISO 639-3 code.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_code_known() {
        assert_eq!(display_code("eng"), "EN");
        assert_eq!(display_code("cmn"), "ZH");
        assert_eq!(display_code("ara"), "AR");
    }

    #[test]
    fn test_display_code_passthrough_uppercased() {
        assert_eq!(display_code("nld"), "NLD");
        assert_eq!(display_code("ukr"), "UKR");
    }

    #[test]
    fn test_detect_english() {
        assert_eq!(
            detect_language(
                "Hello world, this is a longer sentence written in plain English so that \
                 the detector has enough words to be confident about it."
            ),
            "EN"
        );
    }

    #[test]
    fn test_detect_spanish() {
        assert_eq!(
            detect_language(
                "Hola, ¿cómo estás? Espero que tengas un buen día con tu familia y que \
                 todos ustedes disfruten mucho del fin de semana en la playa."
            ),
            "ES"
        );
    }

    #[test]
    fn test_detect_japanese() {
        assert_eq!(detect_language("こんにちは、今日はいい天気ですね。"), "JA");
    }

    #[test]
    fn test_detect_is_deterministic() {
        let text = "Guten Morgen, wie geht es dir heute?";
        assert_eq!(detect_language(text), detect_language(text));
    }

    #[test]
    fn test_short_ambiguous_text_is_not_misreported() {
        for text in ["Hello world", "Hi", "ok thanks"] {
            let detected = detect_language(text);
            assert!(
                detected == "EN" || detected == UNKNOWN_LANGUAGE,
                "{text:?} detected as {detected}"
            );
        }
    }

    #[test]
    fn test_detect_unclassifiable() {
        assert_eq!(detect_language(""), UNKNOWN_LANGUAGE);
        assert_eq!(detect_language("12345 !!! ..."), UNKNOWN_LANGUAGE);
    }
}
