//! Runtime configuration.
//!
//! Loaded from YAML, with durations written as humantime strings:
//!
//! ```yaml
//! provider:
//!   type: ollama
//!   model: llama3.2
//! stage_timeout: 30s
//! retry:
//!   max_attempts: 3
//!   min_delay: 500ms
//! cache:
//!   ttl: 1h
//! registry_path: registry.yaml
//! ```
//!
//! Every key is optional. `DOCFLOW_PROVIDER`, `DOCFLOW_MODEL`,
//! `DOCFLOW_BASE_URL` and `DOCFLOW_REGISTRY` override the file.

use docflow_core::{DocumentTypeRegistry, RegistryError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::resilience::CircuitBreakerConfig;

pub const PROVIDER_ENV: &str = "DOCFLOW_PROVIDER";
pub const MODEL_ENV: &str = "DOCFLOW_MODEL";
pub const BASE_URL_ENV: &str = "DOCFLOW_BASE_URL";
pub const REGISTRY_ENV: &str = "DOCFLOW_REGISTRY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Registered provider type, e.g. "ollama" or "openai"
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Model name; the provider's default when unset
    pub model: Option<String>,

    pub base_url: Option<String>,

    pub temperature: f32,

    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: "ollama".to_string(),
            model: None,
            base_url: None,
            temperature: 0.0,
            max_tokens: 500,
        }
    }
}

impl ProviderConfig {
    /// JSON handed to the provider factory.
    pub fn to_json(&self) -> JsonValue {
        let mut json = serde_json::json!({});
        if let Some(url) = &self.base_url {
            json["base_url"] = JsonValue::String(url.clone());
        }
        if let Some(model) = &self.model {
            json["model"] = JsonValue::String(model.clone());
        }
        json
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total tries per completion, first call included
    pub max_attempts: usize,

    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_tokens: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: ProviderConfig,

    /// Per-call completion timeout
    #[serde(with = "humantime_serde")]
    pub stage_timeout: Duration,

    pub retry: RetryConfig,

    pub circuit_breaker: CircuitBreakerConfig,

    pub budget: BudgetConfig,

    pub cache: CacheConfig,

    /// Registry file; the built-in table when unset
    pub registry_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            stage_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            budget: BudgetConfig::default(),
            cache: CacheConfig::default(),
            registry_path: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Apply `DOCFLOW_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `DOCFLOW_*` overrides from `lookup`.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(provider) = lookup(PROVIDER_ENV) {
            self.provider.provider_type = provider;
        }
        if let Some(model) = lookup(MODEL_ENV) {
            self.provider.model = Some(model);
        }
        if let Some(url) = lookup(BASE_URL_ENV) {
            self.provider.base_url = Some(url);
        }
        if let Some(path) = lookup(REGISTRY_ENV) {
            self.registry_path = Some(PathBuf::from(path));
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.provider_type.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.type must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::Invalid(format!(
                "provider.temperature must be within 0..=2, got {}",
                self.provider.temperature
            )));
        }
        if self.provider.max_tokens == 0 {
            return Err(ConfigError::Invalid("provider.max_tokens must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.stage_timeout.is_zero() {
            return Err(ConfigError::Invalid("stage_timeout must be positive".into()));
        }
        if self.circuit_breaker.failure_threshold == 0 || self.circuit_breaker.success_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker thresholds must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The configured registry, or the built-in table.
    pub fn load_registry(&self) -> Result<Arc<DocumentTypeRegistry>, RegistryError> {
        match &self.registry_path {
            Some(path) => DocumentTypeRegistry::from_file(path).map(Arc::new),
            None => Ok(DocumentTypeRegistry::builtin()),
        }
    }
}
