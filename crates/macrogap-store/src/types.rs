//! Data types for recipes, foods and cached embeddings.

use macrogap_core::{MacroSummary, Provenance};
use serde::{Deserialize, Serialize};

/// One ingredient line of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grams: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RecipeIngredient {
    pub fn new(name: impl Into<String>, grams: f64) -> Self {
        Self {
            name: name.into(),
            grams: Some(grams),
            note: None,
        }
    }
}

/// A recipe row with its ingredient lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub tags: Vec<String>,
    pub ingredients: Vec<RecipeIngredient>,
    pub instructions: Vec<String>,
    pub macros: MacroSummary,
    pub provenance: Provenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_message: Option<String>,
    pub created_at: i64,
}

impl Recipe {
    /// Case-insensitive tag membership.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.trim().eq_ignore_ascii_case(tag.trim()))
    }

    /// Ingredient names in recipe order.
    pub fn ingredient_names(&self) -> impl Iterator<Item = &str> {
        self.ingredients.iter().map(|i| i.name.as_str())
    }
}

/// Input for [`crate::SqliteStore::insert_recipe`]. Also the JSON import shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecipe {
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub macros: MacroSummary,
    #[serde(default = "default_provenance")]
    pub provenance: Provenance,
    #[serde(default)]
    pub time_minutes: Option<u32>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub request_message: Option<String>,
    /// Unix millis. Defaults to now.
    #[serde(default)]
    pub created_at: Option<i64>,
}

fn default_provenance() -> Provenance {
    Provenance::Catalog
}

impl NewRecipe {
    pub fn new(title: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            title: title.into(),
            tags: Vec::new(),
            ingredients: Vec::new(),
            instructions: Vec::new(),
            macros: MacroSummary::default(),
            provenance,
            time_minutes: None,
            difficulty: None,
            request_message: None,
            created_at: None,
        }
    }
}

/// Nutrient values per 100 g.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub kcal: f64,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub carbs_g: f64,
    #[serde(default)]
    pub fat_g: f64,
    #[serde(default)]
    pub fiber_g: f64,
}

impl Food {
    /// Nutrients are per 100 g; fiber starts at zero.
    pub fn new(
        name: impl Into<String>,
        kcal: f64,
        protein_g: f64,
        carbs_g: f64,
        fat_g: f64,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            kcal,
            protein_g,
            carbs_g,
            fat_g,
            fiber_g: 0.0,
        }
    }

    /// Protein grams per kcal; 0 for zero-energy foods.
    pub fn protein_density(&self) -> f64 {
        if self.kcal <= 0.0 {
            0.0
        } else {
            self.protein_g / self.kcal
        }
    }
}

/// A cached recipe vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingEntry {
    pub recipe_id: i64,
    pub vector: Vec<f32>,
    /// Document the vector was computed from.
    pub document_text: String,
    pub document_hash: String,
    pub model_id: String,
    pub updated_at: i64,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_recipes: i64,
    pub catalog_recipes: i64,
    pub generative_recipes: i64,
    pub heuristic_recipes: i64,
    pub foods: i64,
    pub embeddings_stored: i64,
    pub db_path: String,
    pub db_size_mb: f64,
}
