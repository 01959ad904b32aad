//! Idea tiers that fill slots the catalog could not.
//!
//! Providers run in order and each sees only the slots still open. A provider
//! never fails the request: every outcome is folded into its [`TierReport`].

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::nutrition::{
    add_food, respect_max_kcal, round1, rounded, scale_portions, tighten_macros,
};
use crate::types::{Suggestion, TierAttempt};
use macrogap_core::{
    Error, MacroBounds, MacroSummary, PortionSettings, Provenance, QueryContext, TierReport,
    TierStatus,
};
use macrogap_generate::{build_prompts, parse_ideas, CompletionService};
use macrogap_score::{food_matches_preferences, vetoing_term};
use macrogap_store::{Food, RecipeIngredient, SqliteStore};

/// One tier of the fallback chain.
pub trait IdeaProvider: Send + Sync {
    fn tier(&self) -> Provenance;

    /// Produce at most `remaining_slots` suggestions for the request.
    ///
    /// `taken` holds the lowercase titles already in the result. Ideas with
    /// those titles would be dropped, so a provider should not spend slots on them.
    fn attempt(
        &self,
        remaining_slots: usize,
        ctx: &QueryContext,
        taken: &HashSet<String>,
    ) -> TierAttempt;
}

// ---------------------------------------------------------------
// Generative tier
// ---------------------------------------------------------------

/// Ideas from the completion service, validated and clamped.
pub struct GenerativeProvider {
    service: Arc<dyn CompletionService>,
    store: Arc<SqliteStore>,
    max_slots: usize,
    bounds: MacroBounds,
    portions: PortionSettings,
}

impl GenerativeProvider {
    pub fn new(
        service: Arc<dyn CompletionService>,
        store: Arc<SqliteStore>,
        max_slots: usize,
        bounds: MacroBounds,
        portions: PortionSettings,
    ) -> Self {
        Self {
            service,
            store,
            max_slots,
            bounds,
            portions,
        }
    }

    fn report(status: TierStatus) -> TierReport {
        TierReport::new(Provenance::Generative, status)
    }
}

impl IdeaProvider for GenerativeProvider {
    fn tier(&self) -> Provenance {
        Provenance::Generative
    }

    fn attempt(
        &self,
        remaining_slots: usize,
        ctx: &QueryContext,
        _taken: &HashSet<String>,
    ) -> TierAttempt {
        let slots = remaining_slots.min(self.max_slots);
        if slots == 0 {
            return TierAttempt::nothing(Self::report(TierStatus::Skipped).with_detail("no slots"));
        }
        if !self.service.is_available() {
            warn!("Completion service {} not reachable", self.service.name());
            return TierAttempt::nothing(
                Self::report(TierStatus::Unavailable)
                    .with_detail(format!("{} not reachable", self.service.name())),
            );
        }

        let prompt = build_prompts(ctx, slots);
        let raw = match self.service.complete(&prompt.system, &prompt.user) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Generation failed: {}", e);
                let status = match e {
                    Error::ExternalServiceUnavailable(_) | Error::Http(_) => {
                        TierStatus::Unavailable
                    }
                    _ => TierStatus::Failed,
                };
                return TierAttempt::nothing(Self::report(status).with_detail(e.to_string()));
            }
        };

        let parsed = match parse_ideas(&raw, slots, &self.bounds) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Discarding completion: {}", e);
                return TierAttempt::nothing(
                    Self::report(TierStatus::Failed).with_detail(e.to_string()),
                );
            }
        };

        let dropped = parsed.dropped;
        let mut vetoed = 0usize;
        let implied = ctx.preferences.implied_tags();
        let mut suggestions = Vec::with_capacity(parsed.ideas.len());
        for idea in parsed.ideas {
            let mut texts: Vec<&str> = idea.ingredients.iter().map(|i| i.name.as_str()).collect();
            texts.push(&idea.title);
            if let Some(term) = vetoing_term(&texts, &ctx.negative_terms) {
                debug!("Idea '{}' contains excluded '{}'", idea.title, term);
                vetoed += 1;
                continue;
            }
            let mut suggestion = Suggestion::from_idea(idea);
            suggestion.add_tags([Provenance::Generative.as_str()]);
            suggestion.add_tags(implied.iter().cloned());
            let max_kcal = ctx.constraints.max_kcal;
            let adjusted = tighten_macros(&self.store, &mut suggestion).and_then(|_| {
                respect_max_kcal(&self.store, &mut suggestion, max_kcal, &self.portions)
            });
            if let Err(e) = adjusted {
                warn!("Macro lookup failed for '{}': {}", suggestion.title, e);
            }
            suggestions.push(suggestion);
        }

        let status = if suggestions.is_empty() {
            TierStatus::Empty
        } else {
            TierStatus::Produced
        };
        let mut details = Vec::new();
        if dropped > 0 {
            details.push(format!("{} malformed idea(s) dropped", dropped));
        }
        if vetoed > 0 {
            details.push(format!("{} idea(s) with excluded ingredients dropped", vetoed));
        }
        let mut report = Self::report(status);
        if !details.is_empty() {
            report = report.with_detail(details.join("; "));
        }
        info!(
            "Generative tier: {} idea(s) accepted, {} malformed, {} vetoed (asked for {})",
            suggestions.len(),
            dropped,
            vetoed,
            slots
        );
        TierAttempt { suggestions, report }
    }
}

// ---------------------------------------------------------------
// Heuristic tier
// ---------------------------------------------------------------

/// Deterministic food combinations: a protein-dense main plus up to two sides.
pub struct HeuristicProvider {
    store: Arc<SqliteStore>,
    pool_size: usize,
    default_slot_kcal: f64,
    portions: PortionSettings,
}

impl HeuristicProvider {
    pub fn new(
        store: Arc<SqliteStore>,
        pool_size: usize,
        default_slot_kcal: f64,
        portions: PortionSettings,
    ) -> Self {
        Self {
            store,
            pool_size: pool_size.max(1),
            default_slot_kcal,
            portions,
        }
    }

    fn report(status: TierStatus) -> TierReport {
        TierReport::new(Provenance::Heuristic, status)
    }

    /// Preference-filtered foods, best protein density first, ties by name.
    fn food_pool(&self, foods: Vec<Food>, ctx: &QueryContext) -> Vec<Food> {
        let mut pool: Vec<Food> = foods
            .into_iter()
            .filter(|f| f.kcal > 0.0)
            .filter(|f| food_matches_preferences(&f.name, &ctx.preferences))
            .filter(|f| vetoing_term(&[f.name.as_str()], &ctx.negative_terms).is_none())
            .collect();
        pool.sort_by(|a, b| {
            b.protein_density()
                .total_cmp(&a.protein_density())
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        pool.truncate(self.pool_size);
        pool
    }

    /// Energy each suggestion should land near.
    fn slot_target(&self, remaining_slots: usize, ctx: &QueryContext) -> f64 {
        let slots = ctx.limit.unwrap_or(remaining_slots).max(1) as f64;
        let target = ctx
            .constraints
            .remaining
            .kcal
            .filter(|k| *k > 0.0)
            .map(|k| k / slots)
            .unwrap_or(self.default_slot_kcal);
        match ctx.constraints.max_kcal {
            Some(max) if max > 0.0 => target.min(max),
            _ => target,
        }
    }

    fn build(&self, idx: usize, pool: &[Food], target_kcal: f64, ctx: &QueryContext) -> Suggestion {
        let main = &pool[idx];
        let sides: Vec<&Food> = (1..pool.len())
            .map(|offset| &pool[(idx + offset) % pool.len()])
            .take(2)
            .collect();

        let mut parts: Vec<(&Food, f64)> = Vec::with_capacity(1 + sides.len());
        parts.push((main, if main.protein_g >= 20.0 { 180.0 } else { 200.0 }));
        for side in &sides {
            parts.push((side, if side.carbs_g >= side.protein_g { 120.0 } else { 90.0 }));
        }

        let mut ingredients: Vec<RecipeIngredient> = parts
            .iter()
            .map(|(food, grams)| RecipeIngredient::new(food.name.clone(), *grams))
            .collect();
        let kcal: f64 = parts.iter().map(|(food, grams)| food.kcal * grams / 100.0).sum();
        if kcal > 0.0 {
            let factor =
                (target_kcal / kcal).clamp(self.portions.min_scale, self.portions.max_scale);
            scale_portions(&mut ingredients, factor, self.portions.min_grams);
        }

        let mut macros = MacroSummary::default();
        for ((food, _), ingredient) in parts.iter().zip(&ingredients) {
            add_food(&mut macros, food, ingredient.grams.unwrap_or(0.0));
        }

        let mut suggestion = Suggestion {
            recipe_id: None,
            title: heuristic_title(&main.name, &ctx.message),
            macros: rounded(macros),
            ingredients,
            instructions: heuristic_instructions(main, &sides),
            tags: Vec::new(),
            provenance: Provenance::Heuristic,
            score: None,
            time_minutes: Some(20),
            difficulty: Some("easy".into()),
        };
        suggestion.add_tags([Provenance::Heuristic.as_str()]);
        suggestion.add_tags(ctx.preferences.implied_tags());
        suggestion
    }
}

fn heuristic_title(main: &str, message: &str) -> String {
    let main = main.trim();
    let hint = message.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| hint.contains(w));
    if has(&["breakfast", "frühstück", "fruehstueck"]) {
        format!("Protein Breakfast with {}", main)
    } else if has(&["salad", "salat"]) {
        format!("{} Salad Bowl", main)
    } else if has(&["snack"]) {
        format!("Quick Snack: {}", main)
    } else if has(&["lunch", "mittag"]) {
        format!("Quick Lunch: {}", main)
    } else if has(&["dinner", "abend"]) {
        format!("Dinner: {}", main)
    } else {
        format!("{} Plate", main)
    }
}

fn heuristic_instructions(main: &Food, sides: &[&Food]) -> Vec<String> {
    let mut steps = vec![format!(
        "Prepare the {} in a portion-sized amount (pan-fry, bake or steam).",
        main.name.trim()
    )];
    if !sides.is_empty() {
        let names: Vec<&str> = sides.iter().map(|s| s.name.trim()).collect();
        steps.push(format!("Cook or freshly plate {} and season to taste.", names.join(" and ")));
    }
    steps.push("Arrange everything together, adjust the seasoning and serve.".into());
    steps
}

impl IdeaProvider for HeuristicProvider {
    fn tier(&self) -> Provenance {
        Provenance::Heuristic
    }

    fn attempt(
        &self,
        remaining_slots: usize,
        ctx: &QueryContext,
        taken: &HashSet<String>,
    ) -> TierAttempt {
        if remaining_slots == 0 {
            return TierAttempt::nothing(Self::report(TierStatus::Skipped).with_detail("no slots"));
        }
        let foods = match self.store.list_foods() {
            Ok(foods) => foods,
            Err(e) => {
                warn!("Heuristic tier cannot read foods: {}", e);
                return TierAttempt::nothing(
                    Self::report(TierStatus::Failed).with_detail(e.to_string()),
                );
            }
        };

        let pool = self.food_pool(foods, ctx);
        if pool.is_empty() {
            return TierAttempt::nothing(
                Self::report(TierStatus::Empty).with_detail("no food matches the preferences"),
            );
        }

        // Each food may serve as the main; mains whose title is taken are skipped.
        let target = self.slot_target(remaining_slots, ctx);
        let mut suggestions: Vec<Suggestion> = Vec::with_capacity(remaining_slots);
        let mut skipped = 0usize;
        for idx in 0..pool.len() {
            if suggestions.len() >= remaining_slots {
                break;
            }
            let suggestion = self.build(idx, &pool, target, ctx);
            let key = suggestion.title_key();
            if taken.contains(&key) || suggestions.iter().any(|s| s.title_key() == key) {
                skipped += 1;
                continue;
            }
            suggestions.push(suggestion);
        }
        debug!(
            "Heuristic tier: {} idea(s) from {} foods at ~{} kcal, {} taken skipped",
            suggestions.len(),
            pool.len(),
            round1(target),
            skipped
        );

        if suggestions.is_empty() {
            return TierAttempt::nothing(
                Self::report(TierStatus::Empty).with_detail("every combination already suggested"),
            );
        }
        TierAttempt {
            suggestions,
            report: Self::report(TierStatus::Produced),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrogap_core::{Constraints, MacroTargets, Preferences};
    use tempfile::TempDir;

    fn store_with_foods() -> (Arc<SqliteStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        for food in [
            Food::new("Chicken Breast", 165.0, 31.0, 0.0, 3.6),
            Food::new("Tofu", 144.0, 15.0, 3.0, 9.0),
            Food::new("Rice", 130.0, 2.7, 28.0, 0.3),
            Food::new("Broccoli", 34.0, 2.8, 7.0, 0.4),
        ] {
            store.upsert_food(&food).unwrap();
        }
        (Arc::new(store), dir)
    }

    fn heuristic(store: &Arc<SqliteStore>) -> HeuristicProvider {
        HeuristicProvider::new(store.clone(), 36, 550.0, PortionSettings::default())
    }

    struct FixedReply(String);

    impl CompletionService for FixedReply {
        fn complete(&self, _system: &str, _user: &str) -> macrogap_core::Result<String> {
            Ok(self.0.clone())
        }

        fn name(&self) -> String {
            "fixed/test".into()
        }
    }

    fn generative(store: &Arc<SqliteStore>, reply: &str) -> GenerativeProvider {
        GenerativeProvider::new(
            Arc::new(FixedReply(reply.to_string())),
            store.clone(),
            2,
            MacroBounds::default(),
            PortionSettings::default(),
        )
    }

    #[test]
    fn test_heuristic_fills_exactly_remaining_slots() {
        let (store, _dir) = store_with_foods();
        let attempt = heuristic(&store).attempt(2, &QueryContext::new("dinner"), &HashSet::new());
        assert_eq!(attempt.report.status, TierStatus::Produced);
        assert_eq!(attempt.suggestions.len(), 2);
        // Chicken has the best protein density, tofu the second best.
        assert_eq!(attempt.suggestions[0].title, "Dinner: Chicken Breast");
        assert_eq!(attempt.suggestions[1].title, "Dinner: Tofu");
        for s in &attempt.suggestions {
            assert_eq!(s.provenance, Provenance::Heuristic);
            assert!(s.tags.contains(&"heuristic".to_string()));
            assert!((2..=3).contains(&s.ingredients.len()));
            assert!(s.ingredients.iter().all(|i| i.grams.unwrap() >= 40.0));
        }
    }

    #[test]
    fn test_heuristic_respects_preferences_and_vetoes() {
        let (store, _dir) = store_with_foods();
        let mut ctx = QueryContext::new("lunch").with_preferences(Preferences {
            vegan: true,
            ..Default::default()
        });
        ctx.negative_terms = vec!["broccoli".into()];

        let attempt = heuristic(&store).attempt(3, &ctx, &HashSet::new());
        // Chicken and broccoli are out: two foods remain, so two ideas.
        assert_eq!(attempt.suggestions.len(), 2);
        for s in &attempt.suggestions {
            assert!(s
                .ingredients
                .iter()
                .all(|i| i.name != "Chicken Breast" && i.name != "Broccoli"));
            assert!(s.tags.contains(&"vegan".to_string()));
        }
    }

    #[test]
    fn test_heuristic_scales_toward_slot_target() {
        let (store, _dir) = store_with_foods();
        let ctx = QueryContext::new("dinner")
            .with_limit(2)
            .with_constraints(Constraints {
                remaining: MacroTargets {
                    kcal: Some(800.0),
                    ..Default::default()
                },
                ..Default::default()
            });
        let attempt = heuristic(&store).attempt(1, &ctx, &HashSet::new());
        let kcal = attempt.suggestions[0].macros.kcal.unwrap();
        assert!((kcal - 400.0).abs() < 25.0, "kcal {} not near 400", kcal);
    }

    #[test]
    fn test_heuristic_without_foods_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path()).unwrap());
        let attempt = heuristic(&store).attempt(2, &QueryContext::new("anything"), &HashSet::new());
        assert!(attempt.suggestions.is_empty());
        assert_eq!(attempt.report.status, TierStatus::Empty);

        let skipped = heuristic(&store).attempt(0, &QueryContext::new("anything"), &HashSet::new());
        assert_eq!(skipped.report.status, TierStatus::Skipped);
    }

    #[test]
    fn test_heuristic_skips_taken_titles() {
        let (store, _dir) = store_with_foods();
        let taken: HashSet<String> = ["dinner: chicken breast".to_string()].into();
        let attempt = heuristic(&store).attempt(2, &QueryContext::new("dinner"), &taken);
        let titles: Vec<&str> = attempt.suggestions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Dinner: Tofu", "Dinner: Broccoli"]);

        let all: HashSet<String> = ["Chicken Breast", "Tofu", "Broccoli", "Rice"]
            .iter()
            .map(|f| format!("dinner: {}", f.to_lowercase()))
            .collect();
        let exhausted = heuristic(&store).attempt(1, &QueryContext::new("dinner"), &all);
        assert!(exhausted.suggestions.is_empty());
        assert_eq!(exhausted.report.status, TierStatus::Empty);
    }

    #[test]
    fn test_generative_drops_ideas_with_excluded_ingredients() {
        let (store, _dir) = store_with_foods();
        let reply = r#"{"ideas": [
            {"title": "Satay Bowl", "ingredients": [{"name": "Peanut Sauce", "grams": 40}],
             "instructions": ["Mix."]},
            {"title": "Tofu Stir Fry", "ingredients": [{"name": "Tofu", "grams": 150}],
             "instructions": ["Fry."]}]}"#;
        let mut ctx = QueryContext::new("dinner without peanuts");
        ctx.negative_terms = vec!["peanut".into()];

        let attempt = generative(&store, reply).attempt(2, &ctx, &HashSet::new());
        assert_eq!(attempt.suggestions.len(), 1);
        assert_eq!(attempt.suggestions[0].title, "Tofu Stir Fry");
        assert_eq!(attempt.report.status, TierStatus::Produced);
        assert_eq!(
            attempt.report.detail.as_deref(),
            Some("1 idea(s) with excluded ingredients dropped")
        );
        // Tofu resolves in the food table, so macros are re-derived.
        assert_eq!(attempt.suggestions[0].macros.kcal, Some(216.0));
    }

    #[test]
    fn test_title_hints() {
        assert_eq!(heuristic_title("Skyr", "Frühstück bitte"), "Protein Breakfast with Skyr");
        assert_eq!(heuristic_title("Tuna", "a salad"), "Tuna Salad Bowl");
        assert_eq!(heuristic_title("Tofu", "something"), "Tofu Plate");
    }
}
