use async_trait::async_trait;
use docflow_core::stages::{apply_extraction, parse_extraction_response};
use docflow_core::{
    DocumentState, DocumentTypeRegistry, ExtractedData, StageError, StageKind,
};
use std::sync::Arc;

use super::StageAgent;
use crate::completion::CompletionService;
use crate::prompts::extraction_prompt;

/// Asks the model for the registry's fields as a JSON object.
pub struct ExtractAgent {
    completion: Arc<dyn CompletionService>,
    registry: Arc<DocumentTypeRegistry>,
}

impl ExtractAgent {
    pub fn new(completion: Arc<dyn CompletionService>, registry: Arc<DocumentTypeRegistry>) -> Self {
        Self {
            completion,
            registry,
        }
    }
}

#[async_trait]
impl StageAgent for ExtractAgent {
    fn stage(&self) -> StageKind {
        StageKind::Extract
    }

    async fn execute(&self, state: &mut DocumentState) -> Result<(), StageError> {
        let doc_type = state.document_type.ok_or(StageError::MissingInput {
            stage: StageKind::Extract,
            field: "document_type",
        })?;
        let fields = self.registry.fields(doc_type);

        // Nothing to ask for
        if fields.is_empty() {
            tracing::info!(document_type = %doc_type, "No fields registered, skipping extraction call");
            apply_extraction(state, ExtractedData::new());
            return Ok(());
        }

        tracing::info!(document_type = %doc_type, fields = fields.len(), "Extracting fields");
        let prompt = extraction_prompt(doc_type, fields, &state.document_content);
        let answer = self.completion.complete(&prompt).await?;

        apply_extraction(state, parse_extraction_response(&answer, fields));
        Ok(())
    }
}
