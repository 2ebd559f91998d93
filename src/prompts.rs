//! Prompt text for the LLM rewrite of extracted Arabic text.
//!
//! Callers can override the rules via [`crate::config::PipelineConfig::rules`];
//! [`DEFAULT_RULES`] is used only when no override is provided.

/// Default cleanup rules for OCR'd Arabic text.
pub const DEFAULT_RULES: &str = r#"1. Correct any OCR errors in the Arabic text (misread letters, broken or merged words, misplaced dots and diacritics).
2. Apply proper Arabic script formatting: correct letter joining and ligatures, Arabic punctuation, and right-to-left reading order.
3. Remove headers, footers, page numbers and other running artefacts that are not part of the body text.
4. Structure the text into logical paragraphs, one paragraph per line.
5. Maintain the original meaning; do not summarise, translate, or add content.
6. Represent tables using tab-separated columns or simple markdown tables."#;

/// Preamble placed before the rules.
const INSTRUCTION: &str = "You are an expert editor of Arabic documents. The following text was extracted from a PDF, possibly by OCR. Rewrite it according to these rules:";

/// Trailer telling the model what to return.
const OUTPUT_FORMAT: &str = "Output ONLY the corrected Arabic text. Do not add commentary, explanations, or code fences.";

/// Build the single prompt sent for one file.
///
/// An empty `rules` string yields a prompt carrying only the text.
pub fn build_prompt(rules: &str, text: &str) -> String {
    let rules = rules.trim();
    if rules.is_empty() {
        return text.to_string();
    }
    format!("{INSTRUCTION}\n\n{rules}\n\n{OUTPUT_FORMAT}\n\nText:\n\"\"\"\n{text}\n\"\"\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_has_six_items() {
        let items = DEFAULT_RULES
            .lines()
            .filter(|l| l.chars().next().is_some_and(|c| c.is_ascii_digit()))
            .count();
        assert_eq!(items, 6);
    }

    #[test]
    fn prompt_contains_rules_and_text() {
        let p = build_prompt(DEFAULT_RULES, "مرحبا");
        assert!(p.contains("OCR errors"));
        assert!(p.contains("مرحبا"));
        assert!(p.find("OCR errors") < p.find("مرحبا"));
    }

    #[test]
    fn empty_rules_sends_text_only() {
        assert_eq!(build_prompt("  ", "نص"), "نص");
    }
}
