//! Flattened recipe documents and query text used for embedding and keyword matching.

use macrogap_core::{Constraints, Preferences};
use macrogap_store::Recipe;

use crate::text::normalize_text;

/// Render a number with at most one decimal and no trailing `.0`.
pub fn format_grams(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    format!("{}", rounded)
}

/// Flatten a recipe: title, tags, instructions, ingredient lines, then macro fragments.
///
/// Absent fields are skipped, never rendered as placeholders.
pub fn build_document(recipe: &Recipe) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !recipe.title.trim().is_empty() {
        parts.push(recipe.title.trim().to_string());
    }
    if !recipe.tags.is_empty() {
        parts.push(recipe.tags.join(", "));
    }
    if !recipe.instructions.is_empty() {
        parts.push(recipe.instructions.join(" "));
    }
    for item in &recipe.ingredients {
        match item.grams {
            Some(g) => parts.push(format!("{} {}g", item.name.trim(), format_grams(g))),
            None => parts.push(item.name.trim().to_string()),
        }
    }

    let m = &recipe.macros;
    if let Some(kcal) = m.kcal {
        parts.push(format!("{} kcal", format_grams(kcal)));
    }
    for (value, label) in [
        (m.protein_g, "protein"),
        (m.carbs_g, "carbs"),
        (m.fat_g, "fat"),
        (m.fiber_g, "fiber"),
    ] {
        if let Some(v) = value {
            parts.push(format!("{} g {}", format_grams(v), label));
        }
    }

    normalize_text(&parts.join(" "))
}

/// Query text: message, servings, then the set preference and constraint fields.
pub fn build_query_text(
    message: &str,
    preferences: &Preferences,
    constraints: &Constraints,
    servings: u32,
) -> String {
    let mut parts = vec![normalize_text(message)];
    if servings > 0 {
        parts.push(format!("servings {}", servings));
    }
    for json in [
        serde_json::to_string(preferences).ok(),
        serde_json::to_string(constraints).ok(),
    ]
    .into_iter()
    .flatten()
    {
        if json != "{}" {
            parts.push(json);
        }
    }
    normalize_text(&parts.join(" "))
}
