//! Macrogap Preprocess: text normalization, recipe documents, query text and term inference.

pub mod document;
pub mod terms;
pub mod text;

pub use document::{build_document, build_query_text, format_grams};
pub use terms::{extract_negative_terms, infer_required_ingredients};
pub use text::{normalize_text, tokenize, token_set};

use macrogap_core::QueryContext;
use serde::Serialize;
use tracing::debug;

/// Everything the ranking stages need from a request, derived once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedQuery {
    pub query_text: String,
    pub negative_terms: Vec<String>,
    pub required_ingredients: Vec<String>,
}

/// Derive query text and term lists for a request.
///
/// Explicit terms on the context are kept first; inferred ones are appended.
/// Required ingredients are only inferred when the caller supplied none.
pub fn prepare_query(ctx: &QueryContext, food_names: &[String]) -> PreparedQuery {
    let query_text = build_query_text(
        &ctx.message,
        &ctx.preferences,
        &ctx.constraints,
        ctx.servings,
    );

    let mut negative_terms: Vec<String> = Vec::new();
    for term in ctx
        .negative_terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .chain(extract_negative_terms(&ctx.message))
    {
        if !term.is_empty() && !negative_terms.contains(&term) {
            negative_terms.push(term);
        }
    }

    let required_ingredients = if ctx.required_ingredients.is_empty() {
        infer_required_ingredients(&ctx.message, food_names, &negative_terms)
    } else {
        ctx.required_ingredients
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    debug!(
        "Prepared query '{}': negative={:?}, required={:?}",
        query_text,
        negative_terms,
        required_ingredients
    );

    PreparedQuery {
        query_text,
        negative_terms,
        required_ingredients,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_merges_explicit_and_inferred_negatives() {
        let mut ctx = QueryContext::new("Quick dinner without mushrooms");
        ctx.negative_terms = vec!["Peanut".into(), "mushrooms".into()];
        let prepared = prepare_query(&ctx, &[]);
        assert_eq!(prepared.negative_terms, vec!["peanut", "mushrooms"]);
        assert!(prepared.query_text.contains("dinner"));
        assert!(prepared.query_text.contains("servings 1"));
    }

    #[test]
    fn test_prepare_infers_required_only_when_absent() {
        let foods = vec!["Chicken Breast".to_string(), "Rice".to_string()];
        let ctx = QueryContext::new("chicken breast with rice");
        let prepared = prepare_query(&ctx, &foods);
        assert_eq!(prepared.required_ingredients, vec!["Chicken Breast", "Rice"]);

        let mut explicit = QueryContext::new("chicken breast with rice");
        explicit.required_ingredients = vec!["Tofu".into()];
        assert_eq!(prepare_query(&explicit, &foods).required_ingredients, vec!["Tofu"]);
    }
}
