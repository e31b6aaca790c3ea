//! Parses the human-readable train display name into category/line/label
//! (spec §4.6.1 "Transport line carry-over", §9 "train name parser").
//!
//! The source data carries two incompatible parsing strategies; per the
//! spec's resolved open question we adopt the regex/tokenizer form and
//! leave ambiguous tokens absent rather than guessing.

use std::sync::OnceLock;

use regex::Regex;

fn category_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{3}$").unwrap())
}

fn line_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9]*\d[A-Z0-9]*$").unwrap())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedName {
    pub category: Option<String>,
    pub line: Option<String>,
    pub label: Option<String>,
}

pub fn parse(display_name: &str) -> ParsedName {
    let tokens: Vec<String> = display_name
        .split(['-', '\u{2013}'])
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect();

    let category = tokens
        .iter()
        .find(|token| category_pattern().is_match(token))
        .or_else(|| tokens.first())
        .cloned();

    let label = tokens
        .iter()
        .find(|token| token.starts_with('"') && token.ends_with('"') && token.len() >= 2)
        .map(|token| token.trim_matches('"').to_string());

    let line = tokens
        .iter()
        .find(|token| line_pattern().is_match(token))
        .cloned();

    ParsedName { category, line, label }
}

/// Only these transport types keep a parsed line; everything else has it
/// cleared regardless of what was parsed (spec §4.6.1).
pub fn retains_line(transport_type: &str) -> bool {
    matches!(transport_type, "REGIONAL_TRAIN" | "REGIONAL_FAST_TRAIN")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_category_line_and_label() {
        let parsed = parse(r#"REG - "Podhalanski" - R12 - 12345"#);
        assert_eq!(parsed.category.as_deref(), Some("REG"));
        assert_eq!(parsed.label.as_deref(), Some("Podhalanski"));
        assert_eq!(parsed.line.as_deref(), Some("R12"));
    }

    #[test]
    fn falls_back_to_first_token_for_category() {
        let parsed = parse("ic 1234");
        assert_eq!(parsed.category.as_deref(), Some("ic 1234"));
        assert!(parsed.line.is_none());
    }
}
