//! Scoring inputs and outputs.

use macrogap_core::Constraints;
use macrogap_store::Recipe;
use serde::Serialize;

/// A recipe under consideration, with its flattened document and cached vector.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub recipe: &'a Recipe,
    pub document: &'a str,
    pub vector: Option<&'a [f32]>,
}

/// Request-wide scoring inputs.
#[derive(Debug, Clone, Copy)]
pub struct ScoreQuery<'a> {
    pub query_text: &'a str,
    pub query_vector: Option<&'a [f32]>,
    pub constraints: &'a Constraints,
    pub negative_terms: &'a [String],
    /// Use keyword overlap even when vectors are present.
    pub force_keyword: bool,
}

/// Individual score terms before weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Cosine similarity or keyword overlap, depending on mode.
    pub relevance: f64,
    pub nutrition_fit: f64,
    pub ingredient_overlap: f64,
    pub used_vectors: bool,
}

/// One ranked candidate. `position` indexes the input slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredRecipe {
    pub position: usize,
    pub recipe_id: i64,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Result of scoring a whole pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoredBatch {
    /// Non-vetoed candidates, best first; ties keep input order.
    pub ranked: Vec<ScoredRecipe>,
    /// Recipe ids excluded by a negative term.
    pub vetoed: Vec<i64>,
}
