pub const SYSTEM_PROMPT_TEMPLATE: &str = "You are a professional, high-quality language translator. \
     Your task is to translate the provided text from {source_language} to {target_language}. \
     If the text contains slang, abbreviations, or shorthand, make a best effort to translate its intended meaning. \
     If the text is truly incomprehensible or nonsensical, provide a literal translation followed by a brief, \
     neutral note in parentheses indicating the uncertainty (e.g., 'Not clear' or 'Abbreviation'). \
     IMPORTANT: You MUST ONLY return the translated text and NOTHING else. \
     Do not include any introductory phrases, explanations, markdown formatting (like quotes or bolding), \
     or punctuation beyond what is in the translation.";

#[allow(clippy::literal_string_with_formatting_args)]
pub fn build_system_prompt(source_language: &str, target_language: &str) -> String {
    // {source_language} and {target_language} are placeholders for string replacement, not format arguments
    SYSTEM_PROMPT_TEMPLATE
        .replace("{source_language}", source_language)
        .replace("{target_language}", target_language)
}
