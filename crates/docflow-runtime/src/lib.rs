//! # docflow-runtime
//!
//! Model-backed half of the DocFlow pipeline.
//!
//! `docflow-core` owns the state, the registry, and every deterministic
//! policy. This crate adds what needs a language model:
//! - [`CompletionService`], the prompt-in/text-out collaborator, with a
//!   provider-backed implementation ([`ProviderCompletion`]) guarded by
//!   timeout, retry, circuit breaker, token budget, and response cache
//! - Providers for a local Ollama server (`local` feature, default) and
//!   OpenAI-compatible APIs (`openai` feature)
//! - The four [`StageAgent`]s and the [`PipelineOrchestrator`] that walks the graph
//!
//! ## Example
//!
//! ```rust,ignore
//! use docflow_runtime::{PipelineOrchestrator, RunRequest, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_file("docflow.yaml")?.with_env_overrides();
//! let orchestrator = PipelineOrchestrator::from_config(&config)?;
//!
//! let state = orchestrator
//!     .run(RunRequest::new(invoice_text).with_name("invoice.txt"))
//!     .await;
//! println!("{:?}", state.routing_result);
//! ```

pub mod agents;
pub mod cache;
pub mod completion;
pub mod config;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;

pub use agents::{ClassifyAgent, ExtractAgent, RouteAgent, StageAgent, ValidateAgent};
pub use completion::{CompletionService, ProviderCompletion, ServiceError};
pub use config::{ConfigError, RuntimeConfig};
pub use orchestrator::{
    PipelineOrchestrator, PipelineOrchestratorBuilder, RunOutcome, RunRequest, RuntimeError,
};
pub use providers::{LlmProvider, ProviderError, ProviderRegistry};
pub use resilience::LlmUsage;
