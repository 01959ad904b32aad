//! Generator configuration persistence and provider selection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{GeneratorProvider, ResolvedProvider};

pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Stored generator configuration (persisted to generator-config.json).
///
/// Ollama settings default to `OLLAMA_HOST`, `OLLAMA_PORT`, `OLLAMA_MODEL`
/// and `OLLAMA_TIMEOUT`; values in the file win.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// `ollama`, `openai`, `anthropic` or `auto`.
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default = "default_ollama_host")]
    pub ollama_host: String,
    #[serde(default = "default_ollama_port")]
    pub ollama_port: u16,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Any OpenAI-compatible chat completions server.
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Path to config file for saving.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_preferred() -> String {
    "ollama".into()
}
fn default_ollama_host() -> String {
    std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "127.0.0.1".into())
}
fn default_ollama_port() -> u16 {
    std::env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(11434)
}
fn default_ollama_model() -> String {
    std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_OLLAMA_MODEL.into())
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_timeout_secs() -> u64 {
    std::env::var("OLLAMA_TIMEOUT")
        .ok()
        .and_then(|t| t.trim().parse().ok())
        .unwrap_or(100)
}
fn default_temperature() -> f64 {
    0.3
}
fn default_max_tokens() -> usize {
    1500
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            preferred_provider: default_preferred(),
            ollama_host: default_ollama_host(),
            ollama_port: default_ollama_port(),
            ollama_model: default_ollama_model(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            openai_base_url: default_openai_base_url(),
            anthropic_api_key: None,
            anthropic_model: default_anthropic_model(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            config_path: PathBuf::new(),
        }
    }
}

impl GeneratorConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: GeneratorConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        config.config_path = config_path.to_path_buf();

        // Env vars as fallback for API keys
        if config.openai_api_key.is_none() {
            config.openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if config.anthropic_api_key.is_none() {
            config.anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        }

        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved generator config to {}", self.config_path.display());
        Ok(())
    }

    /// `http://host:port` of the Ollama server.
    pub fn ollama_endpoint(&self) -> String {
        let host = self.ollama_host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, self.ollama_port)
        } else {
            format!("http://{}:{}", host, self.ollama_port)
        }
    }

    fn ollama(&self) -> ResolvedProvider {
        ResolvedProvider {
            provider: GeneratorProvider::Ollama,
            model: self.ollama_model.clone(),
            endpoint: self.ollama_endpoint(),
            api_key: None,
        }
    }

    fn openai(&self) -> Option<ResolvedProvider> {
        self.openai_api_key.as_ref().map(|k| ResolvedProvider {
            provider: GeneratorProvider::OpenAI,
            model: self.openai_model.clone(),
            endpoint: self.openai_base_url.trim_end_matches('/').to_string(),
            api_key: Some(k.clone()),
        })
    }

    fn anthropic(&self) -> Option<ResolvedProvider> {
        self.anthropic_api_key.as_ref().map(|k| ResolvedProvider {
            provider: GeneratorProvider::Anthropic,
            model: self.anthropic_model.clone(),
            endpoint: ANTHROPIC_BASE_URL.to_string(),
            api_key: Some(k.clone()),
        })
    }

    /// Resolve which provider and model to use.
    pub fn resolve_provider(&self) -> Option<ResolvedProvider> {
        match self.preferred_provider.trim().to_lowercase().as_str() {
            "ollama" => Some(self.ollama()),
            "openai" => self.openai(),
            "anthropic" => self.anthropic(),
            // Auto mode: Anthropic > OpenAI > local Ollama
            "auto" => self
                .anthropic()
                .or_else(|| self.openai())
                .or_else(|| Some(self.ollama())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(preferred: &str) -> GeneratorConfig {
        GeneratorConfig {
            preferred_provider: preferred.into(),
            ollama_host: "127.0.0.1".into(),
            ollama_port: 11434,
            openai_api_key: None,
            anthropic_api_key: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_resolves_to_local_ollama() {
        let resolved = config("ollama").resolve_provider().unwrap();
        assert_eq!(resolved.provider, GeneratorProvider::Ollama);
        assert_eq!(resolved.endpoint, "http://127.0.0.1:11434");
        assert!(resolved.api_key.is_none());
    }

    #[test]
    fn test_explicit_provider_requires_key() {
        assert!(config("openai").resolve_provider().is_none());
        assert!(config("anthropic").resolve_provider().is_none());
        assert!(config("mistral").resolve_provider().is_none());

        let mut cfg = config("openai");
        cfg.openai_api_key = Some("sk-test".into());
        cfg.openai_base_url = "http://localhost:8000/v1/".into();
        let resolved = cfg.resolve_provider().unwrap();
        assert_eq!(resolved.provider, GeneratorProvider::OpenAI);
        assert_eq!(resolved.endpoint, "http://localhost:8000/v1");
    }

    #[test]
    fn test_auto_prefers_hosted_keys() {
        let mut cfg = config("auto");
        assert_eq!(cfg.resolve_provider().unwrap().provider, GeneratorProvider::Ollama);

        cfg.openai_api_key = Some("sk-test".into());
        assert_eq!(cfg.resolve_provider().unwrap().provider, GeneratorProvider::OpenAI);

        cfg.anthropic_api_key = Some("ak-test".into());
        assert_eq!(cfg.resolve_provider().unwrap().provider, GeneratorProvider::Anthropic);
    }

    #[test]
    fn test_ollama_endpoint_keeps_scheme() {
        let mut cfg = config("ollama");
        cfg.ollama_host = "https://gpu-box/".into();
        cfg.ollama_port = 8443;
        assert_eq!(cfg.ollama_endpoint(), "https://gpu-box:8443");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("generator-config.json");

        let mut cfg = config("auto");
        cfg.timeout_secs = 42;
        cfg.ollama_model = "qwen2.5".into();
        cfg.config_path = path.clone();
        cfg.save().unwrap();

        let loaded = GeneratorConfig::load(&path);
        assert_eq!(loaded.preferred_provider, "auto");
        assert_eq!(loaded.timeout_secs, 42);
        assert_eq!(loaded.ollama_model, "qwen2.5");
        assert_eq!(loaded.config_path, path);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let loaded = GeneratorConfig::load(&dir.path().join("absent.json"));
        assert_eq!(loaded.preferred_provider, "ollama");
        assert!((loaded.temperature - 0.3).abs() < 1e-9);
    }
}
