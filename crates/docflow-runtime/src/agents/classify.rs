use async_trait::async_trait;
use docflow_core::stages::{apply_classification, Classification};
use docflow_core::{DocumentState, DocumentType, DocumentTypeRegistry, StageError, StageKind};
use std::sync::Arc;

use super::StageAgent;
use crate::completion::CompletionService;
use crate::prompts::classification_prompt;

/// Asks the model for the document type, falling back to keywords when the
/// answer does not name a registered type.
pub struct ClassifyAgent {
    completion: Arc<dyn CompletionService>,
    registry: Arc<DocumentTypeRegistry>,
}

impl ClassifyAgent {
    pub fn new(completion: Arc<dyn CompletionService>, registry: Arc<DocumentTypeRegistry>) -> Self {
        Self {
            completion,
            registry,
        }
    }
}

#[async_trait]
impl StageAgent for ClassifyAgent {
    fn stage(&self) -> StageKind {
        StageKind::Classify
    }

    async fn execute(&self, state: &mut DocumentState) -> Result<(), StageError> {
        let hint = state
            .document_type_hint
            .as_deref()
            .and_then(|h| h.parse::<DocumentType>().ok())
            .filter(|t| self.registry.is_registered(*t));

        let prompt = classification_prompt(&state.document_content, hint);
        let answer = self.completion.complete(&prompt).await?;
        tracing::debug!(answer = %answer.trim(), "Classification answer");

        let classification = Classification::decide(&answer, &state.document_content, &self.registry);
        apply_classification(state, classification);
        Ok(())
    }
}
