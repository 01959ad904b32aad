//! Generative idea tier.
//!
//! A completion service (local Ollama by default, OpenAI-compatible or
//! Anthropic when configured) is asked for recipe ideas as JSON. Replies are
//! parsed leniently: malformed ideas are dropped, macro values are clamped.

pub mod config;
pub mod parse;
pub mod prompt;
pub mod providers;
pub mod types;

pub use config::GeneratorConfig;
pub use parse::{extract_json_payload, parse_ideas, ParsedIdeas};
pub use prompt::{build_prompts, IdeaPrompt};
pub use providers::{create_completion_service, CompletionService, HttpCompletionService};
pub use types::*;
