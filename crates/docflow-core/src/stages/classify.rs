//! Classification policy.
//!
//! A model answer naming a registered type is accepted at 0.9. Anything
//! else falls back to keyword matching (0.7 on a hit, `unknown` at 0.3 on
//! a miss), and a fallback result below 0.8 sends the run to human review.

use serde::{Deserialize, Serialize};

use crate::patterns::keyword_match;
use crate::registry::DocumentTypeRegistry;
use crate::types::{DocumentState, DocumentType, Message, NextAction, ProcessingStage};

/// Confidence for a model answer naming a registered type.
pub const MODEL_CONFIDENCE: f64 = 0.9;
/// Confidence for a keyword hit.
pub const KEYWORD_CONFIDENCE: f64 = 0.7;
/// Confidence when nothing matched.
pub const NO_MATCH_CONFIDENCE: f64 = 0.3;
/// Fallback results below this go to human review.
pub const REVIEW_CONFIDENCE_FLOOR: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    Model,
    Keywords,
}

/// A classification decision, before it is written to the state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub document_type: DocumentType,
    pub confidence: f64,
    pub source: ClassificationSource,
}

impl Classification {
    /// Decide from the raw model answer, falling back to keywords.
    pub fn decide(raw_answer: &str, content: &str, registry: &DocumentTypeRegistry) -> Self {
        match interpret_response(raw_answer, registry) {
            Some(document_type) => Self {
                document_type,
                confidence: MODEL_CONFIDENCE,
                source: ClassificationSource::Model,
            },
            None => classify_by_keywords(content),
        }
    }
}

/// Normalize a model answer and accept it only if it names a registered type.
pub fn interpret_response(raw: &str, registry: &DocumentTypeRegistry) -> Option<DocumentType> {
    let normalized = raw.trim().to_lowercase();
    let doc_type: DocumentType = normalized.parse().ok()?;
    registry.is_registered(doc_type).then_some(doc_type)
}

/// Case-insensitive keyword classification of the raw content.
pub fn classify_by_keywords(content: &str) -> Classification {
    match keyword_match(content) {
        Some(document_type) => Classification {
            document_type,
            confidence: KEYWORD_CONFIDENCE,
            source: ClassificationSource::Keywords,
        },
        None => Classification {
            document_type: DocumentType::Unknown,
            confidence: NO_MATCH_CONFIDENCE,
            source: ClassificationSource::Keywords,
        },
    }
}

/// Write a classification into the state.
pub fn apply_classification(state: &mut DocumentState, classification: Classification) {
    state.document_type = Some(classification.document_type);
    state.confidence_score = Some(classification.confidence);
    state.advance_stage(ProcessingStage::Classified);

    match classification.source {
        ClassificationSource::Model => {
            state.next_action = Some(NextAction::ExtractData);
        }
        ClassificationSource::Keywords => {
            if classification.confidence < REVIEW_CONFIDENCE_FLOOR {
                state.request_human_review();
            } else {
                state.next_action = Some(NextAction::ExtractData);
            }
        }
    }

    tracing::info!(
        document_type = %classification.document_type,
        confidence = classification.confidence,
        source = ?classification.source,
        "Document classified"
    );
    state.log(Message::assistant(format!(
        "Classified as {}",
        classification.document_type
    )));
}
