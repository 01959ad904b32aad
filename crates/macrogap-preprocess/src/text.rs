//! Text normalization and tokenization.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Anything outside letters (accented included), digits, whitespace and `_ . , ! ? -`.
static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s_.,!?\-]").unwrap());

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").unwrap());

/// Collapse whitespace, blank out disallowed characters, collapse again and trim.
pub fn normalize_text(text: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text, " ");
    let cleaned = DISALLOWED.replace_all(&collapsed, " ");
    WHITESPACE.replace_all(&cleaned, " ").trim().to_string()
}

/// Lowercase alphanumeric runs, in order, duplicates kept.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Distinct tokens of `text`.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}
