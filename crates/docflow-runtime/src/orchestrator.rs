//! Pipeline orchestrator.
//!
//! Walks the graph from `docflow_core::graph`: classify, extract, validate,
//! then route or stop for human review. Each stage agent receives the state,
//! returns it, and the edge function picks the next node. Stage failures are
//! already contained in the state by the time the orchestrator sees them.
//!
//! Every run gets its own view of the completion service, so a token budget
//! spent by one document never starves the next.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

use docflow_core::{
    next_node, DocumentState, DocumentTypeRegistry, Node, RegistryError, StageKind, Terminal,
    ENTRY,
};

use crate::agents::{ClassifyAgent, ExtractAgent, RouteAgent, StageAgent, ValidateAgent};
use crate::completion::{CompletionService, ProviderCompletion, ServiceError};
use crate::config::{ConfigError, RuntimeConfig};
use crate::providers::ProviderRegistry;
use crate::resilience::LlmUsage;

/// Errors raised while assembling an orchestrator. Runs themselves never fail.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Completion service not set")]
    CompletionNotConfigured,

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Completion service error: {0}")]
    Service(#[from] ServiceError),
}

/// What a caller hands the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub document_content: String,
    pub document_type_hint: Option<String>,
    pub human_review_required: bool,
    pub error_count: u32,
    pub document_id: Option<String>,
    pub document_name: Option<String>,
}

impl RunRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            document_content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_type_hint(mut self, hint: impl Into<String>) -> Self {
        self.document_type_hint = Some(hint.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    /// Initial state for this request.
    pub fn into_state(self) -> DocumentState {
        let mut state = DocumentState::new(self.document_content);
        if let Some(id) = self.document_id {
            state = state.with_id(id);
        }
        if let Some(name) = self.document_name {
            state = state.with_name(name);
        }
        if let Some(hint) = self.document_type_hint {
            state = state.with_type_hint(hint);
        }
        state.human_review_required = self.human_review_required;
        state.error_count = self.error_count;
        state
    }
}

/// Final state plus the terminal node reached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub terminal: Terminal,
    pub state: DocumentState,
}

pub struct PipelineOrchestrator {
    registry: Arc<DocumentTypeRegistry>,
    completion: Arc<dyn CompletionService>,
    validate: Arc<dyn StageAgent>,
    route: Arc<dyn StageAgent>,
}

/// The four agents of one run.
struct RunAgents {
    classify: Arc<dyn StageAgent>,
    extract: Arc<dyn StageAgent>,
    validate: Arc<dyn StageAgent>,
    route: Arc<dyn StageAgent>,
}

impl RunAgents {
    fn get(&self, stage: StageKind) -> &Arc<dyn StageAgent> {
        match stage {
            StageKind::Classify => &self.classify,
            StageKind::Extract => &self.extract,
            StageKind::Validate => &self.validate,
            StageKind::Route => &self.route,
        }
    }
}

impl PipelineOrchestrator {
    pub fn builder() -> PipelineOrchestratorBuilder {
        PipelineOrchestratorBuilder::new()
    }

    /// Assemble everything from configuration: registry, provider, resilience.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let registry = config.load_registry()?;
        let completion =
            ProviderCompletion::from_config(config, &ProviderRegistry::with_defaults())?;

        Self::builder()
            .registry(registry)
            .completion(Arc::new(completion))
            .build()
    }

    pub fn registry(&self) -> &Arc<DocumentTypeRegistry> {
        &self.registry
    }

    fn agents_for_run(&self) -> RunAgents {
        let completion = self
            .completion
            .for_run()
            .unwrap_or_else(|| Arc::clone(&self.completion));

        RunAgents {
            classify: Arc::new(ClassifyAgent::new(
                Arc::clone(&completion),
                Arc::clone(&self.registry),
            )),
            extract: Arc::new(ExtractAgent::new(completion, Arc::clone(&self.registry))),
            validate: Arc::clone(&self.validate),
            route: Arc::clone(&self.route),
        }
    }

    /// Run the pipeline to a terminal node and return the final state.
    pub async fn run(&self, request: RunRequest) -> DocumentState {
        self.run_to_end(request).await.state
    }

    /// Run with default request fields.
    pub async fn process(&self, content: impl Into<String>) -> DocumentState {
        self.run(RunRequest::new(content)).await
    }

    /// Run the pipeline and report which terminal was reached.
    pub async fn run_to_end(&self, request: RunRequest) -> RunOutcome {
        let state = request.into_state();
        let agents = self.agents_for_run();
        let span = tracing::info_span!("pipeline", document_id = %state.document_id);

        async move {
            tracing::info!(
                document_name = %state.document_name,
                chars = state.document_content.len(),
                "Processing document"
            );

            let mut state = state;
            let mut node = ENTRY;
            let terminal = loop {
                match node {
                    Node::Stage(stage) => {
                        state = agents.get(stage).run(state).await;
                        node = next_node(stage, &state);
                    }
                    Node::End(terminal) => break terminal,
                }
            };

            match terminal {
                Terminal::Done => tracing::info!(
                    reference_id = state.routing_result.as_ref().map(|r| r.reference_id.as_str()),
                    "Pipeline complete"
                ),
                Terminal::HumanReview => tracing::info!(
                    stage = %state.processing_stage,
                    "Pipeline stopped for human review"
                ),
                Terminal::Halted => tracing::warn!(
                    stage = %state.processing_stage,
                    error_count = state.error_count,
                    "Pipeline halted on error"
                ),
            }

            RunOutcome { terminal, state }
        }
        .instrument(span)
        .await
    }

    /// Completion usage across all runs so far.
    pub fn usage(&self) -> LlmUsage {
        self.completion.usage()
    }
}

pub struct PipelineOrchestratorBuilder {
    registry: Option<Arc<DocumentTypeRegistry>>,
    completion: Option<Arc<dyn CompletionService>>,
}

impl PipelineOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            completion: None,
        }
    }

    /// Registry shared by every stage. Defaults to the built-in table.
    pub fn registry(mut self, registry: Arc<DocumentTypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn completion(mut self, completion: Arc<dyn CompletionService>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn build(self) -> Result<PipelineOrchestrator, RuntimeError> {
        let completion = self
            .completion
            .ok_or(RuntimeError::CompletionNotConfigured)?;
        let registry = self.registry.unwrap_or_else(DocumentTypeRegistry::builtin);

        Ok(PipelineOrchestrator {
            validate: Arc::new(ValidateAgent::new(Arc::clone(&registry))),
            route: Arc::new(RouteAgent::new(Arc::clone(&registry))),
            registry,
            completion,
        })
    }
}

impl Default for PipelineOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
