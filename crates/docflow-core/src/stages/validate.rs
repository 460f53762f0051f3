//! Validation scoring.
//!
//! Each required field gets a plausibility score; the overall score is
//! their mean. Scores at or above 0.6 proceed to routing, anything lower
//! goes to human review.

use std::sync::Arc;

use super::{StageError, StageKind};
use crate::patterns::{is_date, is_plausible_amount};
use crate::registry::DocumentTypeRegistry;
use crate::types::{
    DocumentState, DocumentType, ExtractedData, FieldValue, Message, NextAction, ProcessingStage,
    ValidationResults,
};

/// Overall scores at or above this route without caution.
pub const HIGH_QUALITY: f64 = 0.8;
/// Overall scores below this require human review.
pub const ROUTING_FLOOR: f64 = 0.6;

const AMOUNT_FIELDS: [&str; 2] = ["amount", "value"];
const DATE_FIELDS: [&str; 2] = ["date", "effective_date"];
const NUMBER_FIELDS: [&str; 2] = ["invoice_number", "contract_number"];

/// Quality band of an overall score. Only logged; routing branches on the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityBand {
    High,
    Moderate,
    Low,
}

impl QualityBand {
    pub fn of(score: f64) -> Self {
        if score >= HIGH_QUALITY {
            QualityBand::High
        } else if score >= ROUTING_FLOOR {
            QualityBand::Moderate
        } else {
            QualityBand::Low
        }
    }
}

/// Score a single field. Returns 0.0 for missing or blank values.
pub fn score_field(name: &str, value: &FieldValue) -> f64 {
    let text = match value {
        FieldValue::NotFound => return 0.0,
        FieldValue::Found(text) if text.trim().is_empty() => return 0.0,
        FieldValue::Found(text) => text,
    };
    let length = text.chars().count();

    if AMOUNT_FIELDS.contains(&name) {
        if is_plausible_amount(text) { 1.0 } else { 0.3 }
    } else if DATE_FIELDS.contains(&name) {
        if is_date(text) { 1.0 } else { 0.4 }
    } else if NUMBER_FIELDS.contains(&name) {
        if length >= 3 { 1.0 } else { 0.5 }
    } else if (2..=200).contains(&length) {
        1.0
    } else {
        0.6
    }
}

fn describe_issue(name: &str, value: &FieldValue) -> String {
    if AMOUNT_FIELDS.contains(&name) {
        format!("{}: '{}' is not an amount between 0.01 and 1,000,000", name, value)
    } else if DATE_FIELDS.contains(&name) {
        format!("{}: '{}' is not a recognised date", name, value)
    } else if NUMBER_FIELDS.contains(&name) {
        format!("{}: '{}' is shorter than 3 characters", name, value)
    } else {
        format!("{}: length outside 2-200 characters", name)
    }
}

/// Score every required field of `doc_type` in `data`.
pub fn score_fields(
    doc_type: DocumentType,
    data: &ExtractedData,
    registry: &DocumentTypeRegistry,
) -> ValidationResults {
    let mut results = ValidationResults::default();
    let fields = registry.fields(doc_type);

    for field in fields {
        let value = data.get(field).cloned().unwrap_or(FieldValue::NotFound);
        let score = score_field(field, &value);

        if score == 0.0 {
            results.missing_fields.push(field.clone());
            results.issues.push(format!("{}: missing", field));
            tracing::debug!(field = %field, "Missing");
        } else {
            if score < 1.0 {
                results.issues.push(describe_issue(field, &value));
            }
            tracing::debug!(field = %field, value = %value, score, "Field scored");
        }

        results.field_scores.insert(field.clone(), score);
    }

    results.overall_score = if fields.is_empty() {
        0.0
    } else {
        fields
            .iter()
            .filter_map(|f| results.field_scores.get(f))
            .sum::<f64>()
            / fields.len() as f64
    };

    results
}

/// The validation stage: scores extracted data and picks the next action.
#[derive(Debug, Clone)]
pub struct ValidationStage {
    registry: Arc<DocumentTypeRegistry>,
}

impl ValidationStage {
    pub fn new(registry: Arc<DocumentTypeRegistry>) -> Self {
        Self { registry }
    }

    pub fn apply(&self, state: &mut DocumentState) -> Result<(), StageError> {
        let doc_type = state.document_type.ok_or(StageError::MissingInput {
            stage: StageKind::Validate,
            field: "document_type",
        })?;
        let data = state.extracted_data.as_ref().ok_or(StageError::MissingInput {
            stage: StageKind::Validate,
            field: "extracted_data",
        })?;

        let results = score_fields(doc_type, data, &self.registry);
        let overall = results.overall_score;

        state.validation_results = Some(results);
        state.advance_stage(ProcessingStage::Validated);

        match QualityBand::of(overall) {
            QualityBand::High => {
                tracing::info!(score = overall, "High quality, routing");
                state.next_action = Some(NextAction::RouteDocument);
            }
            QualityBand::Moderate => {
                tracing::info!(score = overall, "Moderate quality, routing with caution");
                state.next_action = Some(NextAction::RouteDocument);
            }
            QualityBand::Low => {
                tracing::info!(score = overall, "Low quality, human review");
                state.request_human_review();
            }
        }

        state.log(Message::assistant(format!(
            "Validation: {:.1}% quality",
            overall * 100.0
        )));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(s: &str) -> FieldValue {
        FieldValue::Found(s.to_string())
    }

    fn invoice_state(data: &[(&str, FieldValue)]) -> DocumentState {
        let mut state = DocumentState::new("");
        state.document_type = Some(DocumentType::Invoice);
        state.extracted_data = Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        );
        state
    }

    #[test]
    fn test_field_rules() {
        assert_eq!(score_field("amount", &found("$ 12,500.00")), 1.0);
        assert_eq!(score_field("amount", &found("lots")), 0.3);
        assert_eq!(score_field("effective_date", &found("January 15, 2025")), 1.0);
        assert_eq!(score_field("date", &found("soon")), 0.4);
        assert_eq!(score_field("invoice_number", &found("#1")), 0.5);
        assert_eq!(score_field("contract_number", &found("SLA-2025-012")), 1.0);
        assert_eq!(score_field("vendor", &found("X")), 0.6);
        assert_eq!(score_field("vendor", &found(&"a".repeat(201))), 0.6);
        assert_eq!(score_field("vendor", &found("   ")), 0.0);
        assert_eq!(score_field("vendor", &FieldValue::NotFound), 0.0);
    }

    #[test]
    fn test_all_fields_good() {
        let mut state = invoice_state(&[
            ("invoice_number", found("#12345")),
            ("date", found("2024-06-01")),
            ("amount", found("$ 1000.00")),
            ("vendor", found("TechSupply Corp")),
        ]);
        let stage = ValidationStage::new(DocumentTypeRegistry::builtin());
        stage.apply(&mut state).unwrap();

        let results = state.validation_results.as_ref().unwrap();
        assert_eq!(results.overall_score, 1.0);
        assert!(results.missing_fields.is_empty());
        assert!(results.issues.is_empty());
        assert_eq!(state.next_action, Some(NextAction::RouteDocument));
        assert_eq!(state.processing_stage, ProcessingStage::Validated);
        assert_eq!(state.messages.last().unwrap().content, "Validation: 100.0% quality");
    }

    #[test]
    fn test_missing_fields_lower_score() {
        let mut state = invoice_state(&[
            ("invoice_number", found("#12345")),
            ("amount", found("$ 100")),
        ]);
        let stage = ValidationStage::new(DocumentTypeRegistry::builtin());
        stage.apply(&mut state).unwrap();

        let results = state.validation_results.as_ref().unwrap();
        assert_eq!(results.overall_score, 0.5);
        assert_eq!(results.missing_fields, vec!["date", "vendor"]);
        assert!(state.human_review_required);
        assert_eq!(state.next_action, Some(NextAction::HumanReview));
    }

    #[test]
    fn test_moderate_quality_still_routes() {
        // 1.0 + 1.0 + 0.3 + 0.6 = 2.9 / 4 = 0.725
        let mut state = invoice_state(&[
            ("invoice_number", found("#12345")),
            ("date", found("2024-06-01")),
            ("amount", found("a lot")),
            ("vendor", found("X")),
        ]);
        let stage = ValidationStage::new(DocumentTypeRegistry::builtin());
        stage.apply(&mut state).unwrap();

        assert!(!state.human_review_required);
        assert_eq!(state.next_action, Some(NextAction::RouteDocument));
        assert_eq!(state.validation_results.unwrap().issues.len(), 2);
    }

    #[test]
    fn test_unregistered_type_scores_zero() {
        let mut state = DocumentState::new("");
        state.document_type = Some(DocumentType::Unknown);
        state.extracted_data = Some(ExtractedData::new());
        let stage = ValidationStage::new(DocumentTypeRegistry::builtin());
        stage.apply(&mut state).unwrap();

        assert_eq!(state.validation_results.unwrap().overall_score, 0.0);
        assert!(state.human_review_required);
    }

    #[test]
    fn test_missing_extracted_data_is_an_error() {
        let mut state = DocumentState::new("");
        state.document_type = Some(DocumentType::Receipt);
        let stage = ValidationStage::new(DocumentTypeRegistry::builtin());

        let err = stage.apply(&mut state).unwrap_err();
        assert_eq!(
            err,
            StageError::MissingInput {
                stage: StageKind::Validate,
                field: "extracted_data"
            }
        );
        assert!(state.validation_results.is_none());
    }
}
