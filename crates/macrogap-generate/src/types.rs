//! Generator provider identifiers and parsed recipe ideas.

use macrogap_core::MacroSummary;
use serde::{Deserialize, Serialize};

/// Completion backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorProvider {
    Ollama,
    OpenAI,
    Anthropic,
}

impl std::fmt::Display for GeneratorProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorProvider::Ollama => write!(f, "ollama"),
            GeneratorProvider::OpenAI => write!(f, "openai"),
            GeneratorProvider::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Provider, model and credentials picked by [`crate::GeneratorConfig::resolve_provider`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProvider {
    pub provider: GeneratorProvider,
    pub model: String,
    /// Base URL without a trailing slash.
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// One ingredient line of a generated idea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaIngredient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grams: Option<f64>,
}

/// A validated, clamped recipe idea returned by the completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIdea {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<IdeaIngredient>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub macros: MacroSummary,
    #[serde(default)]
    pub tags: Vec<String>,
}
