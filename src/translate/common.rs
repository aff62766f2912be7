/// Build the fixed instruction sent for every subtitle block.
pub fn build_instruction(text: &str, source_language: &str, target_language: &str) -> String {
    let source = language_code_to_name(source_language);
    let target = language_code_to_name(target_language);

    format!(
        "Translate the following {} subtitle text to {}.\n\
         Return ONLY the translated text, with no explanations, notes, quotes or additional commentary.\n\
         Keep the same number of lines as the source text.\n\
         \n\
         {}",
        source, target, text
    )
}

/// Strip wrapping the model sometimes adds around an otherwise clean answer.
pub fn clean_response(response: &str) -> String {
    let trimmed = response.trim();

    let unfenced = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
        .map(|inner| match inner.split_once('\n') {
            Some((tag, body)) if tag.chars().all(|c| c.is_ascii_alphanumeric()) => body.trim(),
            _ => inner.trim(),
        })
        .unwrap_or(trimmed);

    let unprefixed = unfenced
        .strip_prefix("Translation:")
        .map(str::trim_start)
        .unwrap_or(unfenced);

    unprefixed.trim().to_string()
}

/// Convert language code to full language name for clearer prompts
pub fn language_code_to_name(code: &str) -> String {
    let name = match code.to_lowercase().as_str() {
        "en" => "English",
        "zh" | "zh-cn" | "zh-hans" => "Simplified Chinese",
        "zh-tw" | "zh-hant" => "Traditional Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "pt" => "Portuguese",
        "it" => "Italian",
        "ru" => "Russian",
        "uk" => "Ukrainian",
        "pl" => "Polish",
        "nl" => "Dutch",
        "sv" => "Swedish",
        "tr" => "Turkish",
        "ar" => "Arabic",
        "he" => "Hebrew",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "id" => "Indonesian",
        _ => return code.to_string(),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_names_languages_and_keeps_text() {
        let prompt = build_instruction("Hello\nthere", "en", "zh");
        assert!(prompt.contains("English"));
        assert!(prompt.contains("Simplified Chinese"));
        assert!(prompt.ends_with("Hello\nthere"));
    }

    #[test]
    fn test_unknown_language_code_passes_through() {
        assert_eq!(language_code_to_name("Klingon"), "Klingon");
        assert_eq!(language_code_to_name("JA"), "Japanese");
    }

    #[test]
    fn test_clean_response() {
        assert_eq!(clean_response("  你好\n"), "你好");
        assert_eq!(clean_response("```text\n你好\n```"), "你好");
        assert_eq!(clean_response("Translation: 你好"), "你好");
        assert_eq!(clean_response("第一行\n第二行"), "第一行\n第二行");
    }
}
