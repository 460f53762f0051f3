//! Routing policy.
//!
//! Approval is required when any of these hold:
//! 1. The overall validation score is below 0.8
//! 2. An invoice or contract amount exceeds the type's threshold, or does
//!    not parse at all
//! 3. The document is a contract
//!
//! Failing to parse the amount counts as "requires approval", never as a
//! reason to skip the check.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{StageError, StageKind};
use crate::patterns::parse_amount;
use crate::registry::DocumentTypeRegistry;
use crate::types::{
    DocumentState, DocumentType, ExtractedData, IntegrationStatus, Message, NextAction,
    ProcessingStage, RoutingPriority, RoutingResult,
};

/// Validation scores below this always need approval.
pub const AUTO_APPROVAL_SCORE: f64 = 0.8;

/// Decides target system, approval, and priority for validated documents.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    registry: Arc<DocumentTypeRegistry>,
}

impl RoutingPolicy {
    pub fn new(registry: Arc<DocumentTypeRegistry>) -> Self {
        Self { registry }
    }

    /// Whether a document needs human approval before integration.
    pub fn requires_approval(
        &self,
        doc_type: DocumentType,
        overall_score: f64,
        data: Option<&ExtractedData>,
    ) -> bool {
        let mut requires_approval = overall_score < AUTO_APPROVAL_SCORE;

        if let Some(raw) = monetary_value(doc_type, data) {
            match parse_amount(raw) {
                Some(amount) if amount > self.registry.threshold(doc_type) => {
                    requires_approval = true;
                }
                Some(_) => {}
                None => {
                    tracing::debug!(value = raw, "Amount did not parse, defaulting to approval");
                    requires_approval = true;
                }
            }
        }

        if doc_type == DocumentType::Contract {
            requires_approval = true;
        }

        requires_approval
    }

    /// Build the routing result for `state` at instant `now`.
    pub fn route_at(
        &self,
        state: &DocumentState,
        now: DateTime<Utc>,
    ) -> Result<RoutingResult, StageError> {
        let doc_type = state.document_type.ok_or(StageError::MissingInput {
            stage: StageKind::Route,
            field: "document_type",
        })?;
        let overall_score = state
            .validation_results
            .as_ref()
            .map(|r| r.overall_score)
            .unwrap_or(0.0);

        let requires_approval =
            self.requires_approval(doc_type, overall_score, state.extracted_data.as_ref());

        Ok(RoutingResult {
            target_system: self.registry.target_system(doc_type).to_string(),
            requires_approval,
            routing_priority: if requires_approval {
                RoutingPriority::High
            } else {
                RoutingPriority::Medium
            },
            reference_id: reference_id(doc_type, now),
            routing_timestamp: now,
            integration_status: IntegrationStatus::Success,
        })
    }

    /// Route the document now and record the result.
    pub fn apply(&self, state: &mut DocumentState) -> Result<(), StageError> {
        self.apply_at(state, Utc::now())
    }

    pub fn apply_at(&self, state: &mut DocumentState, now: DateTime<Utc>) -> Result<(), StageError> {
        let result = self.route_at(state, now)?;

        tracing::info!(
            target_system = %result.target_system,
            priority = ?result.routing_priority,
            requires_approval = result.requires_approval,
            reference_id = %result.reference_id,
            "Document routed"
        );
        state.log(Message::assistant(format!(
            "Routed to {} - {}",
            result.target_system, result.reference_id
        )));

        state.routing_result = Some(result);
        state.advance_stage(ProcessingStage::Routed);
        state.processing_complete = true;
        state.next_action = Some(NextAction::Complete);
        Ok(())
    }
}

/// The amount-like value checked against the threshold, if the type has one.
fn monetary_value(doc_type: DocumentType, data: Option<&ExtractedData>) -> Option<&str> {
    let data = data?;
    let candidates: &[&str] = match doc_type {
        DocumentType::Invoice => &["amount"],
        DocumentType::Contract => &["amount", "value"],
        _ => return None,
    };
    candidates
        .iter()
        .find_map(|key| data.get(*key))
        .map(|v| v.as_str())
}

/// `REF-<TYPE>-<nnnn>` from wall-clock seconds modulo 10000.
///
/// Runs within the same second (or 10000 seconds apart) collide.
pub fn reference_id(doc_type: DocumentType, now: DateTime<Utc>) -> String {
    format!(
        "REF-{}-{:04}",
        doc_type.as_str().to_uppercase(),
        now.timestamp().rem_euclid(10_000)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldValue, ValidationResults};
    use chrono::TimeZone;

    fn state_with(doc_type: DocumentType, score: f64, amount: Option<&str>) -> DocumentState {
        let mut state = DocumentState::new("");
        state.document_type = Some(doc_type);
        state.validation_results = Some(ValidationResults {
            overall_score: score,
            ..Default::default()
        });
        let mut data = ExtractedData::new();
        if let Some(amount) = amount {
            data.insert("amount".to_string(), FieldValue::from_text(amount));
        }
        state.extracted_data = Some(data);
        state
    }

    fn policy() -> RoutingPolicy {
        RoutingPolicy::new(DocumentTypeRegistry::builtin())
    }

    #[test]
    fn test_invoice_auto_approved() {
        let mut state = state_with(DocumentType::Invoice, 1.0, Some("$ 1000.00"));
        policy().apply(&mut state).unwrap();

        let result = state.routing_result.as_ref().unwrap();
        assert_eq!(result.target_system, "accounting_erp");
        assert!(!result.requires_approval);
        assert_eq!(result.routing_priority, RoutingPriority::Medium);
        assert_eq!(state.processing_stage, ProcessingStage::Routed);
        assert_eq!(state.next_action, Some(NextAction::Complete));
        assert!(state.processing_complete);
    }

    #[test]
    fn test_invoice_over_threshold() {
        let state = state_with(DocumentType::Invoice, 1.0, Some("$ 12,500.00"));
        let result = policy().route_at(&state, Utc::now()).unwrap();
        assert!(result.requires_approval);
        assert_eq!(result.routing_priority, RoutingPriority::High);
    }

    #[test]
    fn test_low_score_requires_approval() {
        let state = state_with(DocumentType::Invoice, 0.7, Some("$ 100"));
        assert!(policy().route_at(&state, Utc::now()).unwrap().requires_approval);
    }

    #[test]
    fn test_unparseable_amount_requires_approval() {
        let state = state_with(DocumentType::Invoice, 1.0, Some("NOT_FOUND"));
        assert!(policy().route_at(&state, Utc::now()).unwrap().requires_approval);
    }

    #[test]
    fn test_receipt_amount_not_checked() {
        let state = state_with(DocumentType::Receipt, 1.0, Some("$ 900"));
        let result = policy().route_at(&state, Utc::now()).unwrap();
        assert!(!result.requires_approval);
        assert_eq!(result.target_system, "expense_management");
    }

    #[test]
    fn test_contract_always_requires_approval() {
        let state = state_with(DocumentType::Contract, 1.0, None);
        let result = policy().route_at(&state, Utc::now()).unwrap();
        assert!(result.requires_approval);
        assert_eq!(result.routing_priority, RoutingPriority::High);
        assert_eq!(result.target_system, "legal_management");
    }

    #[test]
    fn test_unregistered_type_goes_to_manual_review() {
        let state = state_with(DocumentType::Unknown, 1.0, None);
        let result = policy().route_at(&state, Utc::now()).unwrap();
        assert_eq!(result.target_system, "manual_review");
    }

    #[test]
    fn test_reference_id_format() {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
        // 1736899200 % 10000 = 9200
        assert_eq!(reference_id(DocumentType::Invoice, now), "REF-INVOICE-9200");

        let early = Utc.timestamp_opt(42, 0).unwrap();
        assert_eq!(reference_id(DocumentType::Report, early), "REF-REPORT-0042");
    }

    #[test]
    fn test_missing_type_is_an_error() {
        let mut state = DocumentState::new("");
        let err = policy().apply(&mut state).unwrap_err();
        assert!(matches!(err, StageError::MissingInput { stage: StageKind::Route, .. }));
        assert!(state.routing_result.is_none());
    }
}
