//! Subcommand implementations. Output is JSON on stdout.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use macrogap_core::{
    AdvisorConfig, BudgetLevel, Capabilities, CatalogReason, Constraints, Error, MacroTargets,
    Preferences, QueryContext,
};
use macrogap_generate::{create_completion_service, GeneratorConfig};
use macrogap_runtime::RetrievalOrchestrator;
use macrogap_store::{CatalogStats, Food, NewRecipe, SqliteStore};

/// Exit code for a request that ran but could not be satisfied.
const EXIT_UNSATISFIED: i32 = 2;

#[derive(Args, Debug, Default)]
pub struct RecommendArgs {
    /// Free-text request, e.g. "high protein dinner without mushrooms"
    pub message: String,
    #[arg(long)]
    pub vegan: bool,
    #[arg(long)]
    pub vegetarian: bool,
    #[arg(long)]
    pub no_pork: bool,
    #[arg(long)]
    pub lactose_free: bool,
    #[arg(long)]
    pub gluten_free: bool,
    #[arg(long)]
    pub cuisine: Option<String>,
    /// low, mid or high
    #[arg(long)]
    pub budget: Option<BudgetLevel>,
    /// Allergen to avoid (repeatable)
    #[arg(long = "avoid")]
    pub avoid: Vec<String>,
    /// Ingredient to exclude in addition to those named in the message (repeatable)
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,
    /// Ingredient every catalog hit must contain (repeatable)
    #[arg(long = "require")]
    pub require: Vec<String>,
    /// Hard per-suggestion energy ceiling
    #[arg(long)]
    pub max_kcal: Option<f64>,
    #[arg(long)]
    pub remaining_kcal: Option<f64>,
    #[arg(long)]
    pub remaining_protein: Option<f64>,
    #[arg(long)]
    pub remaining_carbs: Option<f64>,
    #[arg(long)]
    pub remaining_fat: Option<f64>,
    #[arg(long, default_value_t = 1)]
    pub servings: u32,
    #[arg(long)]
    pub limit: Option<usize>,
}

impl RecommendArgs {
    /// Request context; a zero servings count becomes one.
    pub fn to_query(&self) -> QueryContext {
        let preferences = Preferences {
            vegan: self.vegan,
            vegetarian: self.vegetarian,
            no_pork: self.no_pork,
            lactose_free: self.lactose_free,
            gluten_free: self.gluten_free,
            allergens_avoid: self.avoid.clone(),
            cuisine_bias: self.cuisine.clone().filter(|c| !c.trim().is_empty()),
            budget_level: self.budget,
        };
        let constraints = Constraints {
            max_kcal: self.max_kcal,
            remaining: MacroTargets {
                kcal: self.remaining_kcal,
                protein_g: self.remaining_protein,
                carbs_g: self.remaining_carbs,
                fat_g: self.remaining_fat,
            },
        };
        QueryContext {
            message: self.message.clone(),
            preferences,
            constraints,
            servings: self.servings.max(1),
            limit: self.limit,
            required_ingredients: self.require.clone(),
            negative_terms: self.exclude.clone(),
        }
    }
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    #[serde(flatten)]
    catalog: CatalogStats,
    capabilities: Capabilities,
    embedding_model: &'a str,
    generator: Option<String>,
}

/// Structured body for requests that could not be satisfied; `None` for other errors.
pub fn failure_body(err: &Error) -> Option<serde_json::Value> {
    match err {
        Error::ConstraintUnsatisfiable { required } => Some(json!({
            "error": CatalogReason::RequiredIngredientsMissing.as_str(),
            "required": required,
        })),
        Error::NoResultsAfterFallback(report) => Some(json!({
            "error": "no_results_after_fallback",
            "reason": report.catalog_reason,
            "summary": report.to_string(),
            "report": report,
        })),
        _ => None,
    }
}

pub struct App {
    store: Arc<SqliteStore>,
    orchestrator: RetrievalOrchestrator,
    generator: Option<String>,
}

impl App {
    /// Load configuration, open the catalog and wire the optional services.
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let config = AdvisorConfig::load(data_dir)
            .with_context(|| format!("Failed to load configuration from {}", data_dir.display()))?;
        let store = Arc::new(
            SqliteStore::open(&config.data_paths.catalog)
                .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?,
        );

        let embedder = macrogap_infer::create_embedder(&config.settings.embedding);
        let completion = if config.settings.retrieval.generation_enabled {
            let generator_config = GeneratorConfig::load(&config.data_paths.generator_config_file);
            create_completion_service(&generator_config)
        } else {
            info!("Generation disabled by configuration");
            None
        };
        let generator = completion.as_ref().map(|c| c.name());

        let orchestrator =
            RetrievalOrchestrator::new(store.clone(), embedder, completion, config.settings);
        Ok(Self {
            store,
            orchestrator,
            generator,
        })
    }

    /// Print the recommendation, or the structured failure with a non-zero code.
    pub fn recommend(&self, args: &RecommendArgs) -> anyhow::Result<i32> {
        match self.orchestrator.recommend(&args.to_query()) {
            Ok(recommendation) => {
                print_json(&recommendation)?;
                Ok(0)
            }
            Err(err) => match failure_body(&err) {
                Some(body) => {
                    print_json(&body)?;
                    Ok(EXIT_UNSATISFIED)
                }
                None => Err(err.into()),
            },
        }
    }

    pub fn index(&self, force: bool) -> anyhow::Result<()> {
        if !self.orchestrator.capabilities().embeddings {
            warn!("No embedding service configured; nothing to index");
        }
        let indexed = self.orchestrator.index_catalog(force)?;
        let total = self.store.count_recipes()?;
        print_json(&json!({ "indexed": indexed, "recipes": total, "force": force }))
    }

    pub fn stats(&self) -> anyhow::Result<()> {
        let output = StatsOutput {
            catalog: self.store.get_stats()?,
            capabilities: self.orchestrator.capabilities(),
            embedding_model: self.orchestrator.embeddings().model_id(),
            generator: self.generator.clone(),
        };
        print_json(&output)
    }

    pub fn import_foods(&self, file: &Path) -> anyhow::Result<()> {
        let foods: Vec<Food> = read_json(file)?;
        let mut imported = 0usize;
        for food in &foods {
            if food.name.trim().is_empty() {
                warn!("Skipping food without a name");
                continue;
            }
            self.store.upsert_food(food)?;
            imported += 1;
        }
        info!("Imported {} foods from {}", imported, file.display());
        print_json(&json!({ "imported": imported, "foods": self.store.count_foods()? }))
    }

    /// Insert recipes from a JSON array, skipping titles already stored.
    pub fn import_recipes(&self, file: &Path) -> anyhow::Result<()> {
        let recipes: Vec<NewRecipe> = read_json(file)?;
        let mut imported = 0usize;
        let mut skipped = 0usize;
        for recipe in &recipes {
            if recipe.title.trim().is_empty() {
                warn!("Skipping recipe without a title");
                skipped += 1;
                continue;
            }
            if self
                .store
                .find_recipe_by_title(&recipe.title, recipe.provenance)?
                .is_some()
            {
                skipped += 1;
                continue;
            }
            self.store.insert_recipe(recipe)?;
            imported += 1;
        }
        info!(
            "Imported {} recipes from {} ({} skipped)",
            imported,
            file.display(),
            skipped
        );
        print_json(&json!({
            "imported": imported,
            "skipped": skipped,
            "recipes": self.store.count_recipes()?,
        }))
    }

    /// Drop stored vectors and the in-memory query cache.
    pub fn clear_embeddings(&self) -> anyhow::Result<()> {
        let removed = self.orchestrator.embeddings().clear()?;
        print_json(&json!({ "removed": removed }))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(file: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", file.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
