//! Runtime types.

use serde::Serialize;

use macrogap_core::{CatalogReason, MacroSummary, Provenance, TierReport};
use macrogap_generate::RecipeIdea;
use macrogap_store::{NewRecipe, Recipe, RecipeIngredient};

/// One suggestion of a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// Catalog row backing this suggestion, once persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<i64>,
    pub title: String,
    /// Per-serving estimate.
    pub macros: MacroSummary,
    pub ingredients: Vec<RecipeIngredient>,
    pub instructions: Vec<String>,
    pub tags: Vec<String>,
    pub provenance: Provenance,
    /// Set for ranked catalog hits only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

impl Suggestion {
    /// Project a ranked catalog recipe.
    pub fn from_recipe(recipe: &Recipe, score: f64) -> Self {
        Self {
            recipe_id: Some(recipe.id),
            title: recipe.title.clone(),
            macros: recipe.macros,
            ingredients: recipe.ingredients.clone(),
            instructions: recipe.instructions.clone(),
            tags: recipe.tags.clone(),
            provenance: Provenance::Catalog,
            score: Some(score),
            time_minutes: recipe.time_minutes,
            difficulty: recipe.difficulty.clone(),
        }
    }

    /// Project a parsed generative idea.
    pub fn from_idea(idea: RecipeIdea) -> Self {
        Self {
            recipe_id: None,
            title: idea.title,
            macros: idea.macros,
            ingredients: idea
                .ingredients
                .into_iter()
                .map(|i| RecipeIngredient {
                    name: i.name,
                    grams: i.grams,
                    note: None,
                })
                .collect(),
            instructions: idea.instructions,
            tags: idea.tags,
            provenance: Provenance::Generative,
            score: None,
            time_minutes: idea.time_minutes,
            difficulty: idea.difficulty,
        }
    }

    /// Case-insensitive dedup key.
    pub fn title_key(&self) -> String {
        self.title.trim().to_lowercase()
    }

    /// Append tags not already present (case-insensitive).
    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                self.tags.push(tag);
            }
        }
    }

    /// Catalog row for a persisted idea.
    pub fn to_new_recipe(&self, request_message: &str) -> NewRecipe {
        NewRecipe {
            title: self.title.clone(),
            tags: self.tags.clone(),
            ingredients: self.ingredients.clone(),
            instructions: self.instructions.clone(),
            macros: self.macros,
            provenance: self.provenance,
            time_minutes: self.time_minutes,
            difficulty: self.difficulty.clone(),
            request_message: Some(request_message.to_string()),
            created_at: None,
        }
    }
}

/// How the catalog tier went, plus request-level diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalMeta {
    pub candidates_total: usize,
    pub candidates_filtered: usize,
    pub used_embeddings: bool,
    pub negative_terms: Vec<String>,
    pub required_ingredients: Vec<String>,
    /// Candidates excluded by a negative term.
    pub vetoed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_reason: Option<CatalogReason>,
    pub tiers: Vec<TierReport>,
}

/// Response envelope of one retrieval request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub suggestions: Vec<Suggestion>,
    pub meta: RetrievalMeta,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Outcome of one idea tier.
#[derive(Debug, Clone, PartialEq)]
pub struct TierAttempt {
    pub suggestions: Vec<Suggestion>,
    pub report: TierReport,
}

impl TierAttempt {
    /// A tier that produced nothing, with its status already decided.
    pub fn nothing(report: TierReport) -> Self {
        Self {
            suggestions: Vec::new(),
            report,
        }
    }
}
