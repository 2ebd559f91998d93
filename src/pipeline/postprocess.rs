//! Post-processing: deterministic cleanup of LLM-rewritten text.
//!
//! Even when told to return only the text, models occasionally wrap it in
//! code fences, open with a one-line English preamble, or sprinkle in
//! invisible Unicode. These rules strip such artefacts without touching
//! content.
//!
//! ## Rule Order
//!
//! Fences are stripped before the preamble rule so a preamble inside the
//! fence is seen at the start of the text. Line endings are normalised before
//! any per-line rule.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to the raw LLM output.
///
/// Rules (applied in order):
/// 1. Strip outer code fences (any or no language tag)
/// 2. Drop a leading "Here is the corrected text:" style preamble
/// 3. Normalise line endings (CRLF / CR → LF)
/// 4. Strip invisible formatting characters, keeping ZWJ / ZWNJ
/// 5. Trim trailing whitespace per line
/// 6. Collapse runs of blank lines down to one
/// 7. Trim the whole text
///
/// Returns an empty string when nothing but artefacts was produced.
pub fn clean_output(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = strip_preamble(&s);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Drop an English preamble line ────────────────────────────────────

static RE_PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:here is|here's|below is|sure[,!]?)[^\n]{0,120}:[ \t]*\r?\n").unwrap()
});

fn strip_preamble(input: &str) -> String {
    RE_PREAMBLE.replace(input, "").into_owned()
}

// ── Rule 3: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 4: Strip invisible characters ───────────────────────────────────────
//
// ZWNJ (U+200C) and ZWJ (U+200D) control Arabic-script joining and are kept.
// Directional marks and embeddings are dropped: the document sets direction
// on every paragraph and run.

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{2060}', '\u{200E}', '\u{200F}', '\u{202A}',
            '\u{202B}', '\u{202C}', '\u{202D}', '\u{202E}', '\u{2066}', '\u{2067}', '\u{2068}',
            '\u{2069}',
        ],
        "",
    )
}

// ── Rule 5: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 6: Collapse blank-line runs ─────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_with_language() {
        assert_eq!(strip_code_fences("```arabic\nنص\n```"), "نص");
        assert_eq!(strip_code_fences("```\nنص\nسطر\n```\n"), "نص\nسطر");
    }

    #[test]
    fn test_inner_fences_untouched() {
        let s = "قبل\n```\ncode\n```\nبعد";
        assert_eq!(strip_code_fences(s), s);
    }

    #[test]
    fn test_strip_preamble() {
        assert_eq!(
            strip_preamble("Here is the corrected text:\nالنص"),
            "النص"
        );
        assert_eq!(strip_preamble("النص: مقدمة\nثم"), "النص: مقدمة\nثم");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible_keeps_joiners() {
        let s = "\u{FEFF}می\u{200C}خواهم\u{200F} \u{200B}x\u{200D}";
        assert_eq!(remove_invisible_chars(s), "می\u{200C}خواهم x\u{200D}");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_output_end_to_end() {
        let raw = "```\r\nHere is the corrected text:\r\nالسطر الأول   \r\n\r\n\r\n\r\nالسطر الثاني\r\n```";
        assert_eq!(clean_output(raw), "السطر الأول\n\nالسطر الثاني");
    }

    #[test]
    fn test_clean_output_of_only_artefacts_is_empty() {
        assert_eq!(clean_output("```\n\u{200B}\n```"), "");
        assert_eq!(clean_output("  \n "), "");
    }
}
