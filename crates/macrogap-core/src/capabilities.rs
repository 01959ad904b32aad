//! Retrieval tiers and the per-orchestrator capability set.

use serde::{Deserialize, Serialize};

/// Where a candidate came from. Doubles as the ordered tier of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Persisted catalog recipe, ranked against the query.
    Catalog,
    /// Idea returned by the generative completion service.
    Generative,
    /// Deterministic food-combination idea.
    Heuristic,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Generative => "generative",
            Self::Heuristic => "heuristic",
        }
    }

    /// Parse a stored provenance tag. Unknown tags read as catalog entries.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "generative" | "llm" => Self::Generative,
            "heuristic" | "fallback" => Self::Heuristic,
            _ => Self::Catalog,
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which optional collaborators a retrieval run may use.
///
/// Computed once when the orchestrator is built and consulted on every
/// degraded branch. There is no process-global switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Catalog tier enabled.
    pub catalog: bool,
    /// An embedding service is configured (it may still fail per call).
    pub embeddings: bool,
    /// The generative tier is enabled and a completion service is present.
    pub generation: bool,
    /// The heuristic tier is enabled.
    pub heuristic: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            catalog: true,
            embeddings: false,
            generation: false,
            heuristic: true,
        }
    }
}

impl Capabilities {
    /// Whether the given idea tier may run at all.
    pub fn allows(&self, tier: Provenance) -> bool {
        match tier {
            Provenance::Catalog => self.catalog,
            Provenance::Generative => self.generation,
            Provenance::Heuristic => self.heuristic,
        }
    }
}
