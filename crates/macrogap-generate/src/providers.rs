//! Blocking completion clients.
//!
//! Ollama uses `/api/chat` with `format: json`. OpenAI-compatible servers use
//! `/chat/completions`. Anthropic uses the Messages API with a separate
//! `system` field. A timeout or transport error is reported as unavailable;
//! nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::GeneratorConfig;
use crate::types::{GeneratorProvider, ResolvedProvider};
use macrogap_core::{Error, Result};

/// Liveness checks must not hold up a request for the full completion timeout.
const LIVENESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Text completion from a (system, user) instruction pair.
pub trait CompletionService: Send + Sync {
    /// Raw completion text. Parsing is the caller's job.
    fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Short label for logs, e.g. `ollama/llama3.1`.
    fn name(&self) -> String;

    /// Cheap reachability check made before a generation attempt.
    fn is_available(&self) -> bool {
        true
    }
}

/// One client for all three providers; the request shape follows `provider`.
pub struct HttpCompletionService {
    client: Client,
    resolved: ResolvedProvider,
    temperature: f64,
    max_tokens: usize,
}

impl HttpCompletionService {
    /// Fails only if the HTTP client cannot be built; reachability is checked per call.
    pub fn new(
        resolved: ResolvedProvider,
        timeout: Duration,
        temperature: f64,
        max_tokens: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            resolved,
            temperature,
            max_tokens,
        })
    }

    fn send(&self, request: RequestBuilder, body: &Value) -> Result<Value> {
        let response = request
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .map_err(|e| {
                Error::ExternalServiceUnavailable(format!(
                    "{} request failed: {}",
                    self.resolved.provider, e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::ExternalServiceUnavailable(format!(
                "{} API error {}: {}",
                self.resolved.provider, status, body
            )));
        }

        response.json::<Value>().map_err(|e| {
            Error::MalformedExternalResponse(format!("{} body: {}", self.resolved.provider, e))
        })
    }

    fn complete_ollama(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.resolved.endpoint);
        let body = json!({
            "model": self.resolved.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "stream": false,
            "format": "json",
            "options": {"temperature": self.temperature},
        });
        let parsed = self.send(self.client.post(&url), &body)?;
        content_at(&parsed["message"]["content"], "ollama")
    }

    fn complete_openai(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.resolved.endpoint);
        let body = json!({
            "model": self.resolved.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        let request = self.client.post(&url).header(
            "Authorization",
            format!("Bearer {}", self.resolved.api_key.as_deref().unwrap_or_default()),
        );
        let parsed = self.send(request, &body)?;
        content_at(&parsed["choices"][0]["message"]["content"], "openai")
    }

    fn complete_anthropic(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/messages", self.resolved.endpoint);
        let body = json!({
            "model": self.resolved.model,
            "system": system,
            "messages": [{"role": "user", "content": user}],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        let request = self
            .client
            .post(&url)
            .header("x-api-key", self.resolved.api_key.as_deref().unwrap_or_default())
            .header("anthropic-version", "2023-06-01");
        let parsed = self.send(request, &body)?;
        content_at(&parsed["content"][0]["text"], "anthropic")
    }
}

fn content_at(value: &Value, provider: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            Error::MalformedExternalResponse(format!("{} reply has no text content", provider))
        })
}

impl CompletionService for HttpCompletionService {
    fn complete(&self, system: &str, user: &str) -> Result<String> {
        debug!(
            "Requesting completion from {} with model {}",
            self.resolved.provider, self.resolved.model
        );
        match self.resolved.provider {
            GeneratorProvider::Ollama => self.complete_ollama(system, user),
            GeneratorProvider::OpenAI => self.complete_openai(system, user),
            GeneratorProvider::Anthropic => self.complete_anthropic(system, user),
        }
    }

    fn name(&self) -> String {
        format!("{}/{}", self.resolved.provider, self.resolved.model)
    }

    fn is_available(&self) -> bool {
        match self.resolved.provider {
            GeneratorProvider::Ollama => {
                let url = format!("{}/api/tags", self.resolved.endpoint);
                match self.client.get(&url).timeout(LIVENESS_TIMEOUT).send() {
                    Ok(r) => r.status().is_success(),
                    Err(e) => {
                        debug!("Ollama liveness check failed: {}", e);
                        false
                    }
                }
            }
            GeneratorProvider::OpenAI | GeneratorProvider::Anthropic => {
                self.resolved.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
            }
        }
    }
}

/// Build the completion service the config resolves to, if any.
pub fn create_completion_service(config: &GeneratorConfig) -> Option<Arc<dyn CompletionService>> {
    let resolved = match config.resolve_provider() {
        Some(r) => r,
        None => {
            info!(
                "No completion provider configured (preferred: {}), generative tier disabled",
                config.preferred_provider
            );
            return None;
        }
    };

    match HttpCompletionService::new(
        resolved,
        Duration::from_secs(config.timeout_secs.max(1)),
        config.temperature,
        config.max_tokens,
    ) {
        Ok(service) => {
            info!("Completion service: {}", service.name());
            Some(Arc::new(service))
        }
        Err(e) => {
            warn!("Failed to build completion client: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable(provider: GeneratorProvider) -> HttpCompletionService {
        // Port 9 (discard) is not expected to serve HTTP.
        HttpCompletionService::new(
            ResolvedProvider {
                provider,
                model: "test-model".into(),
                endpoint: "http://127.0.0.1:9".into(),
                api_key: Some("key".into()),
            },
            Duration::from_millis(300),
            0.3,
            256,
        )
        .unwrap()
    }

    #[test]
    fn test_unreachable_ollama_is_unavailable() {
        let service = unreachable(GeneratorProvider::Ollama);
        assert!(!service.is_available());
        let err = service.complete("sys", "user").unwrap_err();
        assert!(matches!(err, Error::ExternalServiceUnavailable(_)));
        assert!(err.is_degradable());
    }

    #[test]
    fn test_hosted_availability_follows_key() {
        let service = unreachable(GeneratorProvider::Anthropic);
        assert!(service.is_available());
        assert_eq!(service.name(), "anthropic/test-model");
        assert!(matches!(
            service.complete("sys", "user"),
            Err(Error::ExternalServiceUnavailable(_))
        ));
    }

    #[test]
    fn test_content_extraction() {
        let reply = json!({"message": {"content": "{\"ideas\": []}"}});
        assert_eq!(content_at(&reply["message"]["content"], "ollama").unwrap(), "{\"ideas\": []}");
        assert!(matches!(
            content_at(&reply["choices"][0]["message"]["content"], "openai"),
            Err(Error::MalformedExternalResponse(_))
        ));
    }

    #[test]
    fn test_factory_without_key_disables_tier() {
        let config = GeneratorConfig {
            preferred_provider: "openai".into(),
            openai_api_key: None,
            ..Default::default()
        };
        assert!(create_completion_service(&config).is_none());
    }
}
