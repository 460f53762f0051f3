//! The text completion collaborator.
//!
//! Stage agents only see [`CompletionService`]: prompt in, text out. The
//! production implementation, [`ProviderCompletion`], puts a provider behind
//! a response cache, a token budget, a circuit breaker, and a per-call
//! timeout retried with exponential backoff.
//!
//! The token budget belongs to a single pipeline run: the orchestrator asks
//! for a [`CompletionService::for_run`] view at the start of every run.
//! Breaker, cache, and usage totals are shared between those views.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use docflow_core::StageError;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{CacheKey, CompletionCache};
use crate::config::{RetryConfig, RuntimeConfig};
use crate::providers::{
    ChatMessage, CompletionConfig, LlmProvider, ProviderError, ProviderRegistry,
};
use crate::resilience::{BudgetTracker, CircuitBreaker, LlmUsage};

#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("Circuit open, completion provider unavailable")]
    CircuitOpen,

    #[error("Token budget exceeded: need ~{estimated}, {remaining} remaining")]
    BudgetExceeded { estimated: u32, remaining: u32 },

    #[error("Completion service not configured: {0}")]
    NotConfigured(String),
}

impl From<ProviderError> for ServiceError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Timeout(d) => ServiceError::Timeout(d),
            ProviderError::NotConfigured(msg) => ServiceError::NotConfigured(msg),
            other => ServiceError::Provider(other),
        }
    }
}

impl From<ServiceError> for StageError {
    fn from(e: ServiceError) -> Self {
        StageError::Service(e.to_string())
    }
}

/// Prompt in, text out.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError>;

    /// Usage accumulated so far, across all runs.
    fn usage(&self) -> LlmUsage {
        LlmUsage::default()
    }

    /// A view of this service scoped to one pipeline run. `None` when the
    /// service keeps no per-run state and can be shared as is.
    fn for_run(&self) -> Option<Arc<dyn CompletionService>> {
        None
    }
}

/// [`CompletionService`] backed by an [`LlmProvider`].
pub struct ProviderCompletion {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
    retry: RetryConfig,
    breaker: Arc<CircuitBreaker>,
    cache: Option<Arc<CompletionCache>>,
    /// Allowance of the current run
    budget: BudgetTracker,
    totals: Arc<RwLock<LlmUsage>>,
}

impl ProviderCompletion {
    /// Wrap a provider with default resilience settings.
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        let defaults = RuntimeConfig::default();
        Self {
            provider,
            config,
            retry: defaults.retry,
            breaker: Arc::new(CircuitBreaker::new(defaults.circuit_breaker)),
            cache: None,
            budget: BudgetTracker::new(defaults.budget.max_tokens),
            totals: Arc::new(RwLock::new(LlmUsage::default())),
        }
    }

    /// Build the provider named in `config` and wrap it as configured.
    pub fn from_config(
        config: &RuntimeConfig,
        providers: &ProviderRegistry,
    ) -> Result<Self, ServiceError> {
        let provider_type = config.provider.provider_type.as_str();
        let provider = providers.create(provider_type, &config.provider.to_json())?;
        let model = config
            .provider
            .model
            .clone()
            .or_else(|| {
                providers
                    .default_config(provider_type)
                    .and_then(|d| d["model"].as_str().map(str::to_string))
            })
            .ok_or_else(|| {
                ServiceError::NotConfigured(format!("no model set for provider '{}'", provider_type))
            })?;

        tracing::info!(provider = provider.name(), model = %model, "Completion provider ready");

        let mut service = Self::new(
            provider,
            CompletionConfig {
                model,
                max_tokens: config.provider.max_tokens,
                temperature: config.provider.temperature,
                timeout: config.stage_timeout,
            },
        )
        .with_retry(config.retry.clone())
        .with_circuit_breaker(CircuitBreaker::new(config.circuit_breaker.clone()))
        .with_budget(BudgetTracker::new(config.budget.max_tokens));

        if config.cache.enabled {
            service = service.with_cache(CompletionCache::new(
                config.cache.max_entries,
                config.cache.ttl,
            ));
        }
        Ok(service)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Arc::new(breaker);
        self
    }

    /// Per-run token allowance. Every [`for_run`](CompletionService::for_run)
    /// view starts with a fresh tracker of the same size.
    pub fn with_budget(mut self, budget: BudgetTracker) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_cache(mut self, cache: CompletionCache) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.retry.min_delay)
            .with_max_times(self.retry.max_attempts.saturating_sub(1))
    }

    async fn call_provider(&self, prompt: &str) -> Result<String, ServiceError> {
        let provider = &self.provider;
        let config = &self.config;
        let messages = vec![ChatMessage::user(prompt)];
        let messages = &messages;

        let attempt = || async move {
            match tokio::time::timeout(config.timeout, provider.complete(messages.clone(), config))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(config.timeout)),
            }
        };

        let response = attempt
            .retry(self.backoff())
            .when(ProviderError::is_transient)
            .notify(|err: &ProviderError, delay: Duration| {
                tracing::warn!(
                    provider = provider.name(),
                    error = %err,
                    retry_in = %humantime::format_duration(delay),
                    "Completion failed, retrying"
                );
            })
            .await?;

        self.budget.record_usage(&response.usage, &response.model);
        self.totals.write().add(&response.usage, &response.model);
        tracing::debug!(
            provider = provider.name(),
            tokens = response.usage.total(),
            stop_reason = ?response.stop_reason,
            "Completion received"
        );
        Ok(response.content)
    }
}

#[async_trait]
impl CompletionService for ProviderCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let key = CacheKey::new(&self.config.model, prompt);
        if let Some(cache) = &self.cache {
            if let Some(answer) = cache.get(&key).await {
                tracing::debug!("Completion served from cache");
                self.budget.record_cache_hit();
                self.totals.write().add_cache_hit();
                return Ok(answer);
            }
        }

        if self.breaker.is_open() {
            return Err(ServiceError::CircuitOpen);
        }

        let estimated = self.provider.estimate_tokens(prompt) + self.config.max_tokens;
        if !self.budget.can_afford(estimated) {
            return Err(ServiceError::BudgetExceeded {
                estimated,
                remaining: self.budget.remaining(),
            });
        }

        match self.call_provider(prompt).await {
            Ok(answer) => {
                self.breaker.record_success();
                if let Some(cache) = &self.cache {
                    cache.insert(key, answer.clone()).await;
                }
                Ok(answer)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }

    fn usage(&self) -> LlmUsage {
        self.totals.read().clone()
    }

    fn for_run(&self) -> Option<Arc<dyn CompletionService>> {
        Some(Arc::new(Self {
            provider: Arc::clone(&self.provider),
            config: self.config.clone(),
            retry: self.retry.clone(),
            breaker: Arc::clone(&self.breaker),
            cache: self.cache.clone(),
            budget: BudgetTracker::new(self.budget.max_tokens()),
            totals: Arc::clone(&self.totals),
        }))
    }
}
