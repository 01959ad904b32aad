//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Paths to all Macrogap data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Catalog database directory (`data/catalog/`).
    pub catalog: PathBuf,
    /// Advisor settings (`data/advisor.json`).
    pub advisor_config_file: PathBuf,
    /// Generator provider configuration (`data/generator-config.json`).
    pub generator_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            catalog: root.join("catalog"),
            advisor_config_file: root.join("advisor.json"),
            generator_config_file: root.join("generator-config.json"),
            root,
        };
        std::fs::create_dir_all(&paths.catalog)?;
        Ok(paths)
    }
}

/// Embedding service endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `POST {texts} -> {vectors}` endpoint. `None` disables semantic scoring.
    pub url: Option<String>,
    pub timeout_secs: u64,
    /// Recorded next to every cached vector.
    pub model_id: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 15,
            model_id: "remote-embedder".into(),
        }
    }
}

/// Candidate pool and fallback sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Only the N most recent catalog recipes are considered. 0 = unbounded.
    pub max_recipes: usize,
    /// Suggestions returned when the request does not say.
    pub default_limit: usize,
    /// Upper bound on ideas requested from the completion service per call.
    pub generative_max_slots: usize,
    pub generation_enabled: bool,
    pub heuristic_enabled: bool,
    /// Foods considered as heuristic mains, best protein density first.
    pub heuristic_pool_size: usize,
    /// Per-slot energy target when the request gives no kcal figure.
    pub default_slot_kcal: f64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            max_recipes: 0,
            default_limit: 3,
            generative_max_slots: 2,
            generation_enabled: true,
            heuristic_enabled: true,
            heuristic_pool_size: 36,
            default_slot_kcal: 550.0,
        }
    }
}

/// Weights of the three scoring terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub semantic: f64,
    pub nutrition: f64,
    pub ingredient: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            semantic: 1.0,
            nutrition: 0.5,
            ingredient: 0.3,
        }
    }
}

/// Upper clamps for macro values coming back from the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroBounds {
    pub kcal: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
}

impl Default for MacroBounds {
    fn default() -> Self {
        Self {
            kcal: 1400.0,
            protein_g: 200.0,
            carbs_g: 250.0,
            fat_g: 120.0,
            fiber_g: 80.0,
        }
    }
}

/// Limits applied when portions are scaled toward a calorie target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortionSettings {
    pub min_scale: f64,
    pub max_scale: f64,
    /// No scaled ingredient drops below this many grams.
    pub min_grams: f64,
}

impl Default for PortionSettings {
    fn default() -> Self {
        Self {
            min_scale: 0.4,
            max_scale: 2.0,
            min_grams: 40.0,
        }
    }
}

/// Everything read from `advisor.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorSettings {
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub scoring: ScoringWeights,
    pub bounds: MacroBounds,
    pub portions: PortionSettings,
}

impl AdvisorSettings {
    /// Apply environment overrides on top of file values.
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("RAG_EMBED_URL") {
            let url = url.trim().to_string();
            self.embedding.url = if url.is_empty() { None } else { Some(url) };
        }
        if let Some(secs) = env_parse::<u64>("RAG_EMBED_TIMEOUT") {
            self.embedding.timeout_secs = secs;
        }
        if let Ok(model) = std::env::var("RAG_EMBED_MODEL") {
            self.embedding.model_id = model;
        }
        if let Some(max) = env_parse::<usize>("RAG_MAX_RECIPES") {
            self.retrieval.max_recipes = max;
        }
        if let Some(enabled) = env_flag("ADVISOR_LLM_ENABLED") {
            self.retrieval.generation_enabled = enabled;
        }
        if let Some(limit) = env_parse::<usize>("MACROGAP_DEFAULT_LIMIT") {
            self.retrieval.default_limit = limit.max(1);
        }
    }
}

/// Top-level Macrogap configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Data directory paths.
    pub data_paths: DataPaths,
    pub settings: AdvisorSettings,
}

impl AdvisorConfig {
    /// Load `advisor.json` from the data directory (if present), then apply env overrides.
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_paths = DataPaths::new(data_dir)?;

        let mut settings = if data_paths.advisor_config_file.exists() {
            let raw = std::fs::read_to_string(&data_paths.advisor_config_file)?;
            serde_json::from_str::<AdvisorSettings>(&raw).map_err(|e| {
                Error::Config(format!(
                    "{}: {}",
                    data_paths.advisor_config_file.display(),
                    e
                ))
            })?
        } else {
            debug!("No advisor.json found, using defaults");
            AdvisorSettings::default()
        };
        settings.apply_env();

        if settings.retrieval.default_limit == 0 {
            warn!("default_limit of 0 is not usable, raising to 1");
            settings.retrieval.default_limit = 1;
        }

        Ok(Self {
            data_paths,
            settings,
        })
    }

    /// Persist the current settings to `advisor.json`.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&self.data_paths.advisor_config_file, json)?;
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
