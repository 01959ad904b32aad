//! Structured reasons attached to retrieval results and failures.

use serde::{Deserialize, Serialize};

use crate::capabilities::Provenance;

/// Why the catalog tier produced fewer hits than requested (or none).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogReason {
    /// The catalog holds no recipes at all.
    CatalogEmpty,
    /// Diet, cuisine, budget or kcal filters removed every candidate.
    NoRecipeMatchingPreferences,
    /// Required ingredients matched no candidate.
    RequiredIngredientsMissing,
    /// Every remaining candidate contained an excluded ingredient.
    NegativeIngredientsVetoed,
    /// Candidates survived filtering but nothing ranked.
    NoRankedHits,
    /// Some hits ranked, fewer than the requested limit.
    InsufficientHits,
    /// Keyword scoring was used because no usable vectors came back.
    EmbeddingsUnavailable,
    /// Keyword scoring was used because vector dimensions disagreed.
    EmbeddingSizeMismatch,
}

impl CatalogReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CatalogEmpty => "catalog_empty",
            Self::NoRecipeMatchingPreferences => "no_recipe_matching_preferences",
            Self::RequiredIngredientsMissing => "required_ingredients_missing",
            Self::NegativeIngredientsVetoed => "negative_ingredients_vetoed",
            Self::NoRankedHits => "no_ranked_hits",
            Self::InsufficientHits => "insufficient_hits",
            Self::EmbeddingsUnavailable => "embeddings_unavailable",
            Self::EmbeddingSizeMismatch => "embedding_size_mismatch",
        }
    }
}

impl std::fmt::Display for CatalogReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one tier of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierStatus {
    /// Produced at least one suggestion.
    Produced,
    /// Ran and produced nothing.
    Empty,
    /// Not attempted: capability off or no slots left.
    Skipped,
    /// Collaborator missing, unreachable or timed out.
    Unavailable,
    /// Collaborator answered with nothing usable.
    Failed,
}

impl TierStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Produced => "produced",
            Self::Empty => "empty",
            Self::Skipped => "skipped",
            Self::Unavailable => "unavailable",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TierStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tier line of a retrieval report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierReport {
    pub tier: Provenance,
    pub status: TierStatus,
    /// Suggestions this tier contributed after dedup.
    pub produced: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TierReport {
    pub fn new(tier: Provenance, status: TierStatus) -> Self {
        Self {
            tier,
            status,
            produced: 0,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Aggregated explanation for an empty final result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub catalog_reason: Option<CatalogReason>,
    pub candidates_total: usize,
    pub candidates_filtered: usize,
    pub negative_terms: Vec<String>,
    pub tiers: Vec<TierReport>,
}

impl std::fmt::Display for FailureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.catalog_reason {
            Some(reason) => write!(f, "catalog: {}", reason)?,
            None => write!(f, "catalog: no match")?,
        }
        for tier in self.tiers.iter().filter(|t| t.tier != Provenance::Catalog) {
            write!(f, "; {}: {}", tier.tier, tier.status)?;
            if let Some(detail) = &tier.detail {
                write!(f, " ({})", detail)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_serializes_snake_case() {
        let json = serde_json::to_string(&CatalogReason::NegativeIngredientsVetoed).unwrap();
        assert_eq!(json, "\"negative_ingredients_vetoed\"");
        assert_eq!(
            CatalogReason::RequiredIngredientsMissing.to_string(),
            "required_ingredients_missing"
        );
    }

    #[test]
    fn test_tier_status_display_matches_wire_name() {
        for status in [
            TierStatus::Produced,
            TierStatus::Empty,
            TierStatus::Skipped,
            TierStatus::Unavailable,
            TierStatus::Failed,
        ] {
            let wire = serde_json::to_string(&status).unwrap();
            assert_eq!(wire, format!("\"{}\"", status));
        }
    }

    #[test]
    fn test_failure_report_display() {
        let report = FailureReport {
            catalog_reason: Some(CatalogReason::NoRankedHits),
            candidates_total: 4,
            candidates_filtered: 2,
            negative_terms: vec!["banana".into()],
            tiers: vec![
                TierReport::new(Provenance::Catalog, TierStatus::Empty),
                TierReport::new(Provenance::Generative, TierStatus::Unavailable)
                    .with_detail("connection refused"),
                TierReport::new(Provenance::Heuristic, TierStatus::Empty),
            ],
        };
        assert_eq!(
            report.to_string(),
            "catalog: no_ranked_hits; generative: unavailable (connection refused); \
             heuristic: empty"
        );
    }
}
