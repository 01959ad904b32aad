//! Candidate scorer.
//!
//! score = semantic·relevance + nutrition·fit + ingredient·overlap, where
//! relevance is cosine similarity when both vectors exist and keyword overlap
//! otherwise. A negative term anywhere in the candidate is a veto, not a penalty.

use std::cmp::Ordering;
use std::collections::HashSet;

use ndarray::ArrayView1;
use tracing::debug;

use crate::types::*;
use macrogap_core::{Constraints, MacroSummary, ScoringWeights};
use macrogap_preprocess::token_set;
use macrogap_store::Recipe;

const COSINE_EPS: f64 = 1e-9;

/// dot(a,b) / (|a|·|b| + ε). 0 when either is empty or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let a = ArrayView1::from(a).mapv(f64::from);
    let b = ArrayView1::from(b).mapv(f64::from);
    let dot = a.dot(&b);
    let norm = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    dot / (norm + COSINE_EPS)
}

/// How well the candidate's energy fits the request, in [0, 1].
pub fn nutrition_fit_score(macros: &MacroSummary, constraints: &Constraints) -> f64 {
    let Some(kcal) = macros.kcal else {
        return 0.0;
    };

    let mut score = 0.0;
    if let Some(target) = constraints.remaining.kcal {
        let target = target.max(0.0);
        score += (1.0 - (kcal - target).abs() / target.max(1.0)).max(0.0);
    }
    if let Some(max_kcal) = constraints.max_kcal {
        if kcal <= max_kcal {
            score += 0.3;
        } else {
            score -= ((kcal - max_kcal) / max_kcal.max(1.0)).min(1.0);
        }
    }
    score.clamp(0.0, 1.0)
}

/// Share of distinct query tokens that occur in the recipe's ingredient names.
pub fn ingredient_overlap_score(recipe: &Recipe, query_text: &str) -> f64 {
    let query_tokens = token_set(query_text);
    ingredient_overlap(recipe, &query_tokens)
}

fn ingredient_overlap(recipe: &Recipe, query_tokens: &HashSet<String>) -> f64 {
    let ingredient_tokens: HashSet<String> = recipe
        .ingredient_names()
        .flat_map(|name| token_set(name))
        .collect();
    keyword_overlap_score(query_tokens, &ingredient_tokens)
}

/// |query ∩ doc| / |query|. 0 when either side is empty.
pub fn keyword_overlap_score(query_tokens: &HashSet<String>, doc_tokens: &HashSet<String>) -> f64 {
    if query_tokens.is_empty() || doc_tokens.is_empty() {
        return 0.0;
    }
    let hits = query_tokens.intersection(doc_tokens).count();
    hits as f64 / query_tokens.len() as f64
}

/// Suffixes that turn a mention into its absence ("gluten-free", "glutenfrei").
const FREE_SUFFIXES: &[&str] = &["-free", " free", "free", "-frei", "frei"];

/// Whether lowercase `text` mentions lowercase `term`, ignoring "term-free" mentions.
pub fn mentions_term(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    text.match_indices(term).any(|(at, _)| {
        let rest = &text[at + term.len()..];
        !FREE_SUFFIXES.iter().any(|s| rest.starts_with(s))
    })
}

/// First negative term mentioned by any of `texts` (case-insensitive).
pub fn vetoing_term<'t>(texts: &[&str], negative_terms: &'t [String]) -> Option<&'t str> {
    let texts: Vec<String> = texts.iter().map(|t| t.to_lowercase()).collect();
    negative_terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .find(|term| {
            let term = term.to_lowercase();
            texts.iter().any(|text| mentions_term(text, &term))
        })
}

/// Whether a negative term appears in the ingredient names or the document.
pub fn is_vetoed(recipe: &Recipe, document: &str, negative_terms: &[String]) -> bool {
    if negative_terms.is_empty() {
        return false;
    }
    let mut texts: Vec<&str> = recipe.ingredient_names().collect();
    texts.push(document);
    vetoing_term(&texts, negative_terms).is_some()
}

/// Weighted candidate scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Score one candidate. `None` means vetoed.
    pub fn score_recipe(&self, candidate: &Candidate<'_>, query: &ScoreQuery<'_>) -> Option<f64> {
        let query_tokens = token_set(query.query_text);
        self.score_with_tokens(candidate, query, &query_tokens)
            .map(|(score, _)| score)
    }

    fn score_with_tokens(
        &self,
        candidate: &Candidate<'_>,
        query: &ScoreQuery<'_>,
        query_tokens: &HashSet<String>,
    ) -> Option<(f64, ScoreBreakdown)> {
        if is_vetoed(candidate.recipe, candidate.document, query.negative_terms) {
            return None;
        }

        let vectors = match (query.query_vector, candidate.vector) {
            (Some(q), Some(r)) if !query.force_keyword => Some((q, r)),
            _ => None,
        };
        let relevance = match vectors {
            Some((q, r)) => cosine_similarity(q, r),
            None => keyword_overlap_score(query_tokens, &token_set(candidate.document)),
        };

        let breakdown = ScoreBreakdown {
            relevance,
            nutrition_fit: nutrition_fit_score(&candidate.recipe.macros, query.constraints),
            ingredient_overlap: ingredient_overlap(candidate.recipe, query_tokens),
            used_vectors: vectors.is_some(),
        };
        let score = self.weights.semantic * breakdown.relevance
            + self.weights.nutrition * breakdown.nutrition_fit
            + self.weights.ingredient * breakdown.ingredient_overlap;
        Some((score, breakdown))
    }

    /// Score every candidate and sort best first. Ties keep input order.
    pub fn score_batch(&self, candidates: &[Candidate<'_>], query: &ScoreQuery<'_>) -> ScoredBatch {
        let query_tokens = token_set(query.query_text);
        let mut batch = ScoredBatch::default();

        for (position, candidate) in candidates.iter().enumerate() {
            match self.score_with_tokens(candidate, query, &query_tokens) {
                Some((score, breakdown)) => batch.ranked.push(ScoredRecipe {
                    position,
                    recipe_id: candidate.recipe.id,
                    score,
                    breakdown,
                }),
                None => batch.vetoed.push(candidate.recipe.id),
            }
        }

        batch
            .ranked
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        debug!(
            "Scored {} candidates: {} ranked, {} vetoed",
            candidates.len(),
            batch.ranked.len(),
            batch.vetoed.len()
        );
        batch
    }

    /// Best `limit` candidates.
    pub fn rerank(
        &self,
        candidates: &[Candidate<'_>],
        query: &ScoreQuery<'_>,
        limit: usize,
    ) -> Vec<ScoredRecipe> {
        let mut ranked = self.score_batch(candidates, query).ranked;
        ranked.truncate(limit);
        ranked
    }
}
