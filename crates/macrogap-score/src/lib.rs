//! Macrogap Score: multi-factor candidate scoring, vetoes and hard filters.

pub mod filters;
pub mod scorer;
pub mod types;

pub use filters::{
    filter_by_constraints, food_matches_preferences, has_required_ingredients, matches_preferences,
};
pub use scorer::{
    cosine_similarity, ingredient_overlap_score, is_vetoed, keyword_overlap_score,
    mentions_term, nutrition_fit_score, vetoing_term, Scorer,
};
pub use types::*;
