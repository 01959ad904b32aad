//! Macrogap Infer: embedding services and the persistent recipe vector cache.
//!
//! Provides the `EmbeddingService` trait. `HttpEmbedder` talks to a remote
//! `{texts} -> {vectors}` endpoint; without one configured, `NoopEmbedder`
//! is used and ranking falls back to keyword overlap.

pub mod cache;
pub mod embedder;
pub mod http;
pub mod query_cache;

pub use cache::EmbeddingCache;
pub use embedder::{validate_vectors, EmbeddingService, NoopEmbedder};
pub use http::HttpEmbedder;
pub use query_cache::QueryVectorCache;

use std::sync::Arc;
use std::time::Duration;

use macrogap_core::EmbeddingSettings;

/// Create the embedding service described by the settings.
///
/// Uses the HTTP embedder when a URL is configured, `NoopEmbedder` otherwise.
pub fn create_embedder(settings: &EmbeddingSettings) -> Arc<dyn EmbeddingService> {
    if let Some(url) = settings.url.as_deref().filter(|u| !u.trim().is_empty()) {
        match HttpEmbedder::new(
            url,
            Duration::from_secs(settings.timeout_secs.max(1)),
            &settings.model_id,
        ) {
            Ok(embedder) => {
                tracing::info!("Using HTTP embedder at {} (model={})", url, settings.model_id);
                return Arc::new(embedder);
            }
            Err(e) => {
                tracing::warn!(
                    "HTTP embedder unavailable: {}. Falling back to keyword scoring.",
                    e
                );
            }
        }
    } else {
        tracing::info!("No embedding service configured. Using keyword scoring.");
    }

    Arc::new(NoopEmbedder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_embedder_without_url_is_noop() {
        let embedder = create_embedder(&EmbeddingSettings::default());
        assert!(!embedder.is_available());
    }

    #[test]
    fn test_create_embedder_with_url() {
        let settings = EmbeddingSettings {
            url: Some("http://127.0.0.1:9/embed".into()),
            ..Default::default()
        };
        let embedder = create_embedder(&settings);
        assert!(embedder.is_available());
        assert_eq!(embedder.model_id(), "remote-embedder");
    }
}
