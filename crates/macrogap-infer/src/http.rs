//! HTTP embedding client: `POST {"texts": [...]}` returning `{"vectors": [[...]]}`.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedder::{validate_vectors, EmbeddingService};
use macrogap_core::{Error, Result};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    vectors: Vec<Vec<f32>>,
}

/// Blocking client with a bounded timeout. A timeout counts as unavailable; there is no retry.
pub struct HttpEmbedder {
    client: Client,
    url: String,
    model_id: String,
}

impl HttpEmbedder {
    /// Client for a POST endpoint taking `{"texts": [...]}`; `model_id` keys the vector cache.
    pub fn new(url: &str, timeout: Duration, model_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            url: url.trim().to_string(),
            model_id: model_id.to_string(),
        })
    }
}

impl EmbeddingService for HttpEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Embedding {} texts via {}", texts.len(), self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { texts })
            .send()
            .map_err(|e| {
                Error::ExternalServiceUnavailable(format!("embedding request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(Error::ExternalServiceUnavailable(format!(
                "embedding service returned {}",
                response.status()
            )));
        }

        let body: EmbedResponse = response
            .json()
            .map_err(|e| Error::MalformedExternalResponse(format!("embedding body: {}", e)))?;
        validate_vectors(body.vectors, texts.len())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn is_available(&self) -> bool {
        true
    }
}
