//! Macrogap Core: errors, configuration, capabilities and the shared query model.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod report;
pub mod types;

pub use capabilities::{Capabilities, Provenance};
pub use config::{
    AdvisorConfig, AdvisorSettings, DataPaths, EmbeddingSettings, MacroBounds, PortionSettings,
    RetrievalSettings, ScoringWeights,
};
pub use error::{Error, Result};
pub use report::{CatalogReason, FailureReport, TierReport, TierStatus};
pub use types::*;
