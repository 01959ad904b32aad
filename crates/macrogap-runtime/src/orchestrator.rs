//! Orchestrator: one retrieval request from catalog load to final suggestions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::nutrition::{respect_max_kcal, tighten_macros};
use crate::providers::{GenerativeProvider, HeuristicProvider, IdeaProvider};
use crate::types::*;
use macrogap_core::{
    AdvisorSettings, Capabilities, CatalogReason, Error, FailureReport, Provenance, QueryContext,
    Result, TierReport, TierStatus,
};
use macrogap_generate::CompletionService;
use macrogap_infer::{EmbeddingCache, EmbeddingService};
use macrogap_preprocess::{build_document, prepare_query, PreparedQuery};
use macrogap_score::{
    filter_by_constraints, has_required_ingredients, matches_preferences, Candidate, ScoreQuery,
    Scorer,
};
use macrogap_store::{Recipe, SqliteStore};

/// Vectors chosen for one request. Either every candidate has one or none is used.
struct ScoringMode {
    query_vector: Option<Vec<f32>>,
    vectors: HashMap<i64, Vec<f32>>,
    /// Why keyword scoring was used, if it was.
    keyword_reason: Option<CatalogReason>,
}

impl ScoringMode {
    fn keyword(reason: Option<CatalogReason>) -> Self {
        Self {
            query_vector: None,
            vectors: HashMap::new(),
            keyword_reason: reason,
        }
    }

    fn semantic(&self) -> bool {
        self.query_vector.is_some()
    }
}

/// Running result list with case-insensitive title dedup. First occurrence wins.
#[derive(Default)]
struct Merged {
    suggestions: Vec<Suggestion>,
    titles: HashSet<String>,
}

impl Merged {
    fn push(&mut self, suggestion: Suggestion) -> bool {
        if self.titles.insert(suggestion.title_key()) {
            self.suggestions.push(suggestion);
            true
        } else {
            debug!("Dropping duplicate title '{}'", suggestion.title);
            false
        }
    }

    fn contains(&self, suggestion: &Suggestion) -> bool {
        self.titles.contains(&suggestion.title_key())
    }

    fn len(&self) -> usize {
        self.suggestions.len()
    }
}

/// Top-level retrieval orchestrator.
///
/// Holds the shared store, the embedding cache, the scorer and the ordered
/// fallback chain. [`Capabilities`] are fixed at construction.
pub struct RetrievalOrchestrator {
    store: Arc<SqliteStore>,
    embeddings: EmbeddingCache,
    scorer: Scorer,
    providers: Vec<Box<dyn IdeaProvider>>,
    capabilities: Capabilities,
    settings: AdvisorSettings,
}

impl RetrievalOrchestrator {
    /// Create an orchestrator with the standard generative → heuristic chain.
    ///
    /// The generative tier is only part of the chain when a completion
    /// service is given and generation is enabled.
    pub fn new(
        store: Arc<SqliteStore>,
        embedder: Arc<dyn EmbeddingService>,
        completion: Option<Arc<dyn CompletionService>>,
        settings: AdvisorSettings,
    ) -> Self {
        let retrieval = &settings.retrieval;
        let capabilities = Capabilities {
            catalog: true,
            embeddings: embedder.is_available(),
            generation: retrieval.generation_enabled && completion.is_some(),
            heuristic: retrieval.heuristic_enabled,
        };

        let mut providers: Vec<Box<dyn IdeaProvider>> = Vec::new();
        if let Some(service) = completion.filter(|_| capabilities.generation) {
            providers.push(Box::new(GenerativeProvider::new(
                service,
                store.clone(),
                retrieval.generative_max_slots,
                settings.bounds,
                settings.portions,
            )));
        }
        if capabilities.heuristic {
            providers.push(Box::new(HeuristicProvider::new(
                store.clone(),
                retrieval.heuristic_pool_size,
                retrieval.default_slot_kcal,
                settings.portions,
            )));
        }

        info!(
            "Orchestrator initialized: embeddings={}, generation={}, heuristic={}",
            capabilities.embeddings, capabilities.generation, capabilities.heuristic
        );

        Self {
            embeddings: EmbeddingCache::new(store.clone(), embedder),
            scorer: Scorer::new(settings.scoring),
            store,
            providers,
            capabilities,
            settings,
        }
    }

    /// Replace the fallback chain. Providers run in the given order.
    pub fn with_providers(mut self, providers: Vec<Box<dyn IdeaProvider>>) -> Self {
        self.providers = providers;
        self
    }

    /// Which tiers and services are active.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    /// The recipe and query vector cache.
    pub fn embeddings(&self) -> &EmbeddingCache {
        &self.embeddings
    }

    /// Embed every catalog recipe that has no cached vector (all of them when `force`).
    ///
    /// Returns how many recipes have a vector afterwards.
    pub fn index_catalog(&self, force: bool) -> Result<usize> {
        let recipes = self.store.list_recipes(None)?;
        let documents: Vec<String> = recipes.iter().map(build_document).collect();
        let vectors = self.embeddings.batch_index(&recipes, &documents, force)?;
        info!("{} of {} recipes have vectors", vectors.len(), recipes.len());
        Ok(vectors.len())
    }

    /// Run one retrieval request.
    ///
    /// Fails with `ConstraintUnsatisfiable` when required ingredients match no
    /// catalog recipe, and with `NoResultsAfterFallback` when every tier came
    /// up empty. Service outages only degrade the result.
    pub fn recommend(&self, ctx: &QueryContext) -> Result<Recommendation> {
        let limit = ctx
            .limit
            .unwrap_or(self.settings.retrieval.default_limit)
            .max(1);
        let food_names = self.store.food_names()?;
        let prepared = prepare_query(ctx, &food_names);

        let mut meta = RetrievalMeta {
            negative_terms: prepared.negative_terms.clone(),
            required_ingredients: prepared.required_ingredients.clone(),
            ..Default::default()
        };
        let mut notes: Vec<String> = Vec::new();
        let mut merged = Merged::default();

        // Catalog tier
        let catalog_report = if self.capabilities.catalog {
            self.catalog_tier(ctx, &prepared, limit, &mut meta, &mut merged, &mut notes)?
        } else {
            TierReport::new(Provenance::Catalog, TierStatus::Skipped).with_detail("disabled")
        };
        meta.tiers.push(catalog_report);

        // Fallback tiers
        let fallback_ctx = QueryContext {
            limit: Some(limit),
            negative_terms: prepared.negative_terms.clone(),
            required_ingredients: prepared.required_ingredients.clone(),
            ..ctx.clone()
        };
        for provider in &self.providers {
            let report = self.run_provider(provider.as_ref(), limit, &fallback_ctx, &mut merged);
            if matches!(report.status, TierStatus::Unavailable | TierStatus::Failed) {
                notes.push(match &report.detail {
                    Some(detail) => format!("{} tier {}: {}", report.tier, report.status, detail),
                    None => format!("{} tier {}", report.tier, report.status),
                });
            }
            meta.tiers.push(report);
        }
        for tier in [Provenance::Generative, Provenance::Heuristic] {
            if !meta.tiers.iter().any(|t| t.tier == tier) {
                meta.tiers
                    .push(TierReport::new(tier, TierStatus::Skipped).with_detail("disabled"));
            }
        }
        meta.tiers.sort_by_key(|t| t.tier);

        if merged.suggestions.is_empty() {
            let report = FailureReport {
                catalog_reason: meta.catalog_reason,
                candidates_total: meta.candidates_total,
                candidates_filtered: meta.candidates_filtered,
                negative_terms: meta.negative_terms,
                tiers: meta.tiers,
            };
            warn!("No suggestions for '{}': {}", ctx.message, report);
            return Err(Error::NoResultsAfterFallback(report));
        }

        info!(
            "Recommendation: {} suggestion(s), candidates {}/{}, embeddings={}, vetoed={}",
            merged.len(),
            meta.candidates_filtered,
            meta.candidates_total,
            meta.used_embeddings,
            meta.vetoed
        );

        Ok(Recommendation {
            suggestions: merged.suggestions,
            meta,
            notes,
        })
    }

    /// Steps load → filter → score → rank. Fills `merged` with at most `limit` hits.
    fn catalog_tier(
        &self,
        ctx: &QueryContext,
        prepared: &PreparedQuery,
        limit: usize,
        meta: &mut RetrievalMeta,
        merged: &mut Merged,
        notes: &mut Vec<String>,
    ) -> Result<TierReport> {
        let max_recipes = self.settings.retrieval.max_recipes;
        let pool = self.store.list_recipes((max_recipes > 0).then_some(max_recipes))?;
        meta.candidates_total = pool.len();

        let filtered: Vec<Recipe> = filter_by_constraints(&pool, &ctx.constraints)
            .into_iter()
            .filter(|r| matches_preferences(r, &ctx.preferences))
            .filter(|r| has_required_ingredients(r, &prepared.required_ingredients))
            .cloned()
            .collect();
        meta.candidates_filtered = filtered.len();
        debug!("Catalog pool {} → {} after filters", pool.len(), filtered.len());

        if filtered.is_empty() && !prepared.required_ingredients.is_empty() {
            info!(
                "Required ingredients {:?} match no catalog recipe",
                prepared.required_ingredients
            );
            return Err(Error::ConstraintUnsatisfiable {
                required: prepared.required_ingredients.clone(),
            });
        }

        if pool.is_empty() {
            meta.catalog_reason = Some(CatalogReason::CatalogEmpty);
            return Ok(empty_catalog(CatalogReason::CatalogEmpty));
        }
        if filtered.is_empty() {
            meta.catalog_reason = Some(CatalogReason::NoRecipeMatchingPreferences);
            return Ok(empty_catalog(CatalogReason::NoRecipeMatchingPreferences));
        }

        let documents: Vec<String> = filtered.iter().map(build_document).collect();
        let mode = self.scoring_mode(&filtered, &documents, &prepared.query_text);
        meta.used_embeddings = mode.semantic();
        if let Some(reason) = mode.keyword_reason {
            notes.push(format!("keyword scoring used: {}", reason));
        }

        let candidates: Vec<Candidate<'_>> = filtered
            .iter()
            .zip(&documents)
            .map(|(recipe, document)| Candidate {
                recipe,
                document: document.as_str(),
                vector: mode.vectors.get(&recipe.id).map(Vec::as_slice),
            })
            .collect();
        let query = ScoreQuery {
            query_text: &prepared.query_text,
            query_vector: mode.query_vector.as_deref(),
            constraints: &ctx.constraints,
            negative_terms: &prepared.negative_terms,
            force_keyword: !mode.semantic(),
        };
        let batch = self.scorer.score_batch(&candidates, &query);
        meta.vetoed = batch.vetoed.len();

        for scored in &batch.ranked {
            if merged.len() >= limit {
                break;
            }
            let recipe = &filtered[scored.position];
            let mut suggestion = Suggestion::from_recipe(recipe, scored.score);
            if merged.contains(&suggestion) {
                continue;
            }
            self.adjust_macros(&mut suggestion, ctx, notes);
            merged.push(suggestion);
        }
        let produced = merged.len();

        let reason = if batch.ranked.is_empty() && meta.vetoed > 0 {
            Some(CatalogReason::NegativeIngredientsVetoed)
        } else if batch.ranked.is_empty() {
            Some(CatalogReason::NoRankedHits)
        } else if produced < limit {
            Some(CatalogReason::InsufficientHits)
        } else {
            None
        };
        meta.catalog_reason = reason;

        if produced == 0 {
            return Ok(empty_catalog(reason.unwrap_or(CatalogReason::NoRankedHits)));
        }
        let mut report = TierReport::new(Provenance::Catalog, TierStatus::Produced);
        report.produced = produced;
        if let Some(reason) = reason {
            report = report.with_detail(reason.as_str());
        }
        Ok(report)
    }

    /// Semantic only when the query and every candidate have vectors of one dimension.
    fn scoring_mode(
        &self,
        recipes: &[Recipe],
        documents: &[String],
        query_text: &str,
    ) -> ScoringMode {
        if !self.capabilities.embeddings {
            return ScoringMode::keyword(Some(CatalogReason::EmbeddingsUnavailable));
        }
        let Some(query_vector) = self.embeddings.embed_query(query_text) else {
            return ScoringMode::keyword(Some(CatalogReason::EmbeddingsUnavailable));
        };
        let vectors = match self.embeddings.batch_index(recipes, documents, false) {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!("Embedding cache failed, using keyword scoring: {}", e);
                return ScoringMode::keyword(Some(CatalogReason::EmbeddingsUnavailable));
            }
        };

        let dim = query_vector.len();
        let mut missing = 0usize;
        let mut mismatched = 0usize;
        for recipe in recipes {
            match vectors.get(&recipe.id) {
                None => missing += 1,
                Some(v) if v.len() != dim => mismatched += 1,
                Some(_) => {}
            }
        }
        if missing > 0 {
            debug!("{} candidates lack vectors, using keyword scoring", missing);
            return ScoringMode::keyword(Some(CatalogReason::EmbeddingsUnavailable));
        }
        if mismatched > 0 {
            warn!(
                "{} cached vectors differ from query dimension {}, using keyword scoring",
                mismatched, dim
            );
            return ScoringMode::keyword(Some(CatalogReason::EmbeddingSizeMismatch));
        }

        ScoringMode {
            query_vector: Some(query_vector),
            vectors,
            keyword_reason: None,
        }
    }

    /// Re-derive macros from foods, then shrink portions to the kcal ceiling.
    fn adjust_macros(
        &self,
        suggestion: &mut Suggestion,
        ctx: &QueryContext,
        notes: &mut Vec<String>,
    ) {
        let result = tighten_macros(&self.store, suggestion).and_then(|_| {
            respect_max_kcal(
                &self.store,
                suggestion,
                ctx.constraints.max_kcal,
                &self.settings.portions,
            )
        });
        match result {
            Ok(true) => notes.push(format!(
                "portions of '{}' scaled toward the kcal limit",
                suggestion.title
            )),
            Ok(false) => {}
            Err(e) => warn!("Macro lookup failed for '{}': {}", suggestion.title, e),
        }
    }

    fn run_provider(
        &self,
        provider: &dyn IdeaProvider,
        limit: usize,
        ctx: &QueryContext,
        merged: &mut Merged,
    ) -> TierReport {
        let tier = provider.tier();
        let remaining = limit.saturating_sub(merged.len());
        if remaining == 0 {
            return TierReport::new(tier, TierStatus::Skipped).with_detail("no slots");
        }
        if !ctx.required_ingredients.is_empty() {
            return TierReport::new(tier, TierStatus::Skipped).with_detail("required ingredients");
        }
        if !self.capabilities.allows(tier) {
            return TierReport::new(tier, TierStatus::Skipped).with_detail("disabled");
        }

        let attempt = provider.attempt(remaining, ctx, &merged.titles);
        let mut report = attempt.report;
        for mut suggestion in attempt.suggestions {
            if report.produced >= remaining {
                break;
            }
            if merged.contains(&suggestion) {
                debug!("Dropping duplicate title '{}'", suggestion.title);
                continue;
            }
            suggestion.provenance = tier;
            self.persist(&mut suggestion, &ctx.message);
            merged.push(suggestion);
            report.produced += 1;
        }
        if report.status == TierStatus::Produced && report.produced == 0 {
            report.status = TierStatus::Empty;
            report.detail = Some("duplicates only".into());
        }
        report
    }

    /// Store an idea as a catalog recipe unless (title, provenance) already exists.
    ///
    /// The check and the insert are separate steps; two concurrent requests
    /// may both insert the same idea.
    fn persist(&self, suggestion: &mut Suggestion, message: &str) {
        match self
            .store
            .find_recipe_by_title(&suggestion.title, suggestion.provenance)
        {
            Ok(Some(existing)) => {
                debug!("'{}' already stored as recipe {}", suggestion.title, existing.id);
                suggestion.recipe_id = Some(existing.id);
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to look up '{}': {}", suggestion.title, e);
                return;
            }
        }
        match self.store.insert_recipe(&suggestion.to_new_recipe(message)) {
            Ok(id) => {
                debug!(
                    "Persisted {} idea '{}' as recipe {}",
                    suggestion.provenance, suggestion.title, id
                );
                suggestion.recipe_id = Some(id);
            }
            Err(e) => warn!("Failed to persist '{}': {}", suggestion.title, e),
        }
    }
}

fn empty_catalog(reason: CatalogReason) -> TierReport {
    TierReport::new(Provenance::Catalog, TierStatus::Empty).with_detail(reason.as_str())
}
