//! Macrogap Runtime: the retrieval orchestrator.
//!
//! One request runs load → filter → score → tiered fallback → dedup. The
//! catalog tier ranks stored recipes; generative and heuristic providers fill
//! any remaining slots and their ideas are persisted for later requests.

pub mod nutrition;
pub mod orchestrator;
pub mod providers;
pub mod types;

pub use orchestrator::RetrievalOrchestrator;
pub use providers::{GenerativeProvider, HeuristicProvider, IdeaProvider};
pub use types::*;
