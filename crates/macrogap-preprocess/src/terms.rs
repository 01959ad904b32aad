//! Exclusion phrasing ("no X", "without X", "X-free") and required-ingredient inference.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::text::{token_set, tokenize};

/// Words (hyphenated compounds kept whole) so that "nut-free" survives as one unit.
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+(?:-[\p{L}\p{N}]+)*").unwrap());

const NEGATION_MARKERS: &[&str] = &[
    "no", "without", "not", "kein", "keine", "keinen", "keiner", "ohne", "nicht",
];

/// Skipped between a marker and the excluded term.
const FILLERS: &[&str] = &[
    "any", "the", "a", "an", "added", "extra", "too", "so", "very", "much", "more", "want",
    "like", "use", "using", "include", "including", "containing", "with", "mit", "zu", "viel",
];

const CONJUNCTIONS: &[&str] = &["or", "and", "nor", "oder", "und", "noch"];

fn is_marker(word: &str) -> bool {
    NEGATION_MARKERS.contains(&word)
}

fn is_filler(word: &str) -> bool {
    FILLERS.contains(&word)
}

fn strip_free(word: &str) -> Option<&str> {
    word.strip_suffix("-free").or_else(|| word.strip_suffix("-frei"))
}

/// Excluded terms, lowercased, deduplicated, in order of first mention.
///
/// "No mango smoothie bowl without nuts" yields `["mango", "nuts"]`; a marker
/// followed by "X or Y" excludes both.
pub fn extract_negative_terms(message: &str) -> Vec<String> {
    let lower = message.to_lowercase();
    let words: Vec<&str> = WORD.find_iter(&lower).map(|m| m.as_str()).collect();

    let mut terms: Vec<String> = Vec::new();
    let mut push = |term: &str| {
        let term = term.trim_matches('-');
        if !term.is_empty() && !terms.iter().any(|t| t == term) {
            terms.push(term.to_string());
        }
    };

    let mut i = 0;
    while i < words.len() {
        let word = words[i];

        if let Some(stem) = strip_free(word) {
            push(stem);
            i += 1;
            continue;
        }

        if !is_marker(word) {
            i += 1;
            continue;
        }

        // Marker: skip fillers, take the next content word, follow conjunctions.
        let mut j = i + 1;
        loop {
            while j < words.len() && is_filler(words[j]) {
                j += 1;
            }
            if j >= words.len() || is_marker(words[j]) || CONJUNCTIONS.contains(&words[j]) {
                break;
            }
            push(strip_free(words[j]).unwrap_or(words[j]));
            j += 1;
            if j < words.len() && CONJUNCTIONS.contains(&words[j]) {
                j += 1;
                continue;
            }
            break;
        }
        i = j.max(i + 1);
    }

    terms
}

/// Food names whose every token appears in the message and none of whose tokens is excluded.
///
/// First spelling wins for names that differ only in case.
pub fn infer_required_ingredients(
    message: &str,
    food_names: &[String],
    negative_terms: &[String],
) -> Vec<String> {
    let message_tokens = token_set(message);
    if message_tokens.is_empty() {
        return Vec::new();
    }
    let negative_tokens: HashSet<String> =
        negative_terms.iter().flat_map(|t| tokenize(t)).collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut required = Vec::new();
    for name in food_names {
        let name_tokens = tokenize(name);
        if name_tokens.is_empty() {
            continue;
        }
        if !name_tokens.iter().all(|t| message_tokens.contains(t)) {
            continue;
        }
        if name_tokens.iter().any(|t| negative_tokens.contains(t)) {
            continue;
        }
        if seen.insert(name.trim().to_lowercase()) {
            required.push(name.trim().to_string());
        }
    }
    required
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_takes_next_word() {
        assert_eq!(
            extract_negative_terms("No mango smoothie bowl without nuts"),
            vec!["mango", "nuts"]
        );
    }

    #[test]
    fn test_repeated_term_dedup() {
        assert_eq!(extract_negative_terms("no mango, no mango please"), vec!["mango"]);
    }

    #[test]
    fn test_fillers_skipped() {
        assert_eq!(
            extract_negative_terms("a shake but without any added sugar"),
            vec!["sugar"]
        );
        assert_eq!(extract_negative_terms("I do not want eggs"), vec!["eggs"]);
    }

    #[test]
    fn test_free_suffix_and_conjunction() {
        assert_eq!(extract_negative_terms("gluten-free pasta"), vec!["gluten"]);
        assert_eq!(
            extract_negative_terms("without peanuts or dairy, and lactose-free"),
            vec!["peanuts", "dairy", "lactose"]
        );
    }

    #[test]
    fn test_german_markers() {
        assert_eq!(
            extract_negative_terms("Frühstück ohne Zucker, kein Schweinefleisch"),
            vec!["zucker", "schweinefleisch"]
        );
    }

    #[test]
    fn test_no_markers() {
        assert!(extract_negative_terms("High protein oatmeal").is_empty());
        assert!(extract_negative_terms("no").is_empty());
        assert!(extract_negative_terms("").is_empty());
    }

    #[test]
    fn test_required_ingredients_all_tokens() {
        let foods = vec![
            "Chicken Breast".to_string(),
            "Chicken".to_string(),
            "chicken".to_string(),
            "Brown Rice".to_string(),
        ];
        let required = infer_required_ingredients("chicken breast bowl with rice", &foods, &[]);
        assert_eq!(required, vec!["Chicken Breast", "Chicken"]);
    }

    #[test]
    fn test_required_ingredients_skip_negated() {
        let foods = vec!["Banana".to_string(), "Skyr".to_string()];
        let negatives = extract_negative_terms("skyr bowl, no banana");
        let required = infer_required_ingredients("skyr bowl, no banana", &foods, &negatives);
        assert_eq!(required, vec!["Skyr"]);
    }
}
