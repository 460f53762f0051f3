//! End-to-end pipeline runs against a scripted completion service.

use async_trait::async_trait;
use docflow_core::{
    DocumentType, DocumentTypeRegistry, FieldValue, NextAction, ProcessingStage, RoutingPriority,
    Terminal, NOT_FOUND,
};
use docflow_runtime::prompts::CLASSIFICATION_INSTRUCTION;
use docflow_runtime::{CompletionService, PipelineOrchestrator, RunRequest, ServiceError};
use proptest::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Answers classification and extraction prompts from a script.
struct ScriptedService {
    classification: Result<String, ServiceError>,
    extraction: Result<String, ServiceError>,
    classify_calls: AtomicU32,
    extract_calls: AtomicU32,
}

impl ScriptedService {
    fn new(classification: &str, extraction: &str) -> Arc<Self> {
        Self::scripted(Ok(classification.to_string()), Ok(extraction.to_string()))
    }

    fn scripted(
        classification: Result<String, ServiceError>,
        extraction: Result<String, ServiceError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            classification,
            extraction,
            classify_calls: AtomicU32::new(0),
            extract_calls: AtomicU32::new(0),
        })
    }

    fn extract_calls(&self) -> u32 {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        if prompt.starts_with(CLASSIFICATION_INSTRUCTION) {
            self.classify_calls.fetch_add(1, Ordering::SeqCst);
            self.classification.clone()
        } else {
            self.extract_calls.fetch_add(1, Ordering::SeqCst);
            self.extraction.clone()
        }
    }
}

fn orchestrator(service: Arc<ScriptedService>) -> PipelineOrchestrator {
    PipelineOrchestrator::builder()
        .completion(service)
        .build()
        .unwrap()
}

const INVOICE: &str = "\
INVOICE #INV-2025-045
Date: 01/15/2025
Vendor: TechSupplies Inc.
Amount: $ 12,500.00";

const INVOICE_FIELDS: &str = r#"{
    "invoice_number": "INV-2025-045",
    "date": "01/15/2025",
    "amount": "$ 12,500.00",
    "vendor": "TechSupplies Inc."
}"#;

#[tokio::test]
async fn invoice_over_threshold_requires_approval() {
    let service = ScriptedService::new("invoice", INVOICE_FIELDS);
    let outcome = orchestrator(service)
        .run_to_end(RunRequest::new(INVOICE).with_name("inv-045.txt"))
        .await;
    let state = outcome.state;

    assert_eq!(outcome.terminal, Terminal::Done);
    assert_eq!(state.document_type, Some(DocumentType::Invoice));
    assert!(state.confidence_score.unwrap() >= 0.7);

    let data = state.extracted_data.as_ref().unwrap();
    assert_eq!(data["amount"], FieldValue::Found("$ 12,500.00".into()));

    let validation = state.validation_results.as_ref().unwrap();
    assert_eq!(validation.field_scores["amount"], 1.0);
    assert_eq!(validation.overall_score, 1.0);

    let routing = state.routing_result.as_ref().unwrap();
    assert!(routing.requires_approval);
    assert_eq!(routing.target_system, "accounting_erp");
    assert_eq!(routing.routing_priority, RoutingPriority::High);
    assert!(routing.reference_id.starts_with("REF-INVOICE-"));
    assert_eq!(routing.reference_id.len(), "REF-INVOICE-".len() + 4);

    assert_eq!(state.processing_stage, ProcessingStage::Routed);
    assert_eq!(state.next_action, Some(NextAction::Complete));
    assert!(state.processing_complete);
    assert!(!state.human_review_required);
    assert_eq!(state.document_name, "inv-045.txt");

    let log: Vec<&str> = state.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(log[0], "Classified as invoice");
    assert_eq!(log[1], "Extracted 4 fields");
    assert_eq!(log[2], "Validation: 100.0% quality");
    assert!(log[3].starts_with("Routed to accounting_erp - REF-INVOICE-"));
}

#[tokio::test]
async fn unknown_type_stops_before_extraction() {
    let service = ScriptedService::new("I am not sure.", "{}");
    let outcome = orchestrator(service.clone())
        .run_to_end(RunRequest::new("Random text with no keywords."))
        .await;
    let state = outcome.state;

    assert_eq!(outcome.terminal, Terminal::HumanReview);
    assert_eq!(state.document_type, Some(DocumentType::Unknown));
    assert_eq!(state.confidence_score, Some(0.3));
    assert!(state.human_review_required);
    assert_eq!(state.next_action, Some(NextAction::HumanReview));
    assert_eq!(state.processing_stage, ProcessingStage::Classified);

    assert_eq!(service.extract_calls(), 0);
    assert!(state.extracted_data.is_none());
    assert!(state.validation_results.is_none());
    assert!(state.routing_result.is_none());
}

#[tokio::test]
async fn malformed_extraction_json_is_not_an_error() {
    let service = ScriptedService::new("invoice", "Sorry, I cannot help with that.");
    let outcome = orchestrator(service).run_to_end(RunRequest::new(INVOICE)).await;
    let state = outcome.state;

    assert_eq!(state.error_count, 0);
    let data = state.extracted_data.as_ref().unwrap();
    assert_eq!(data.len(), 4);
    assert!(data.values().all(|v| *v == FieldValue::NotFound));

    let validation = state.validation_results.as_ref().unwrap();
    assert!(validation.field_scores.values().all(|s| *s == 0.0));
    assert_eq!(validation.missing_fields.len(), 4);

    // Extraction was reached; the low score then forks to review
    assert!(state.processing_stage >= ProcessingStage::Extracted);
    assert_eq!(outcome.terminal, Terminal::HumanReview);
    assert!(state.routing_result.is_none());
}

#[tokio::test]
async fn perfect_contract_still_requires_approval() {
    let service = ScriptedService::new(
        "contract",
        r#"{"contract_number": "SLA-2025-012", "parties": "DocuFlow Inc. and CloudTech Corp",
            "effective_date": "January 1, 2025", "value": "$ 48,000"}"#,
    );
    let outcome = orchestrator(service)
        .run_to_end(RunRequest::new("SERVICE AGREEMENT SLA-2025-012"))
        .await;

    assert_eq!(outcome.terminal, Terminal::Done);
    let state = outcome.state;
    assert_eq!(state.validation_results.unwrap().overall_score, 1.0);

    let routing = state.routing_result.unwrap();
    assert!(routing.requires_approval);
    assert_eq!(routing.routing_priority, RoutingPriority::High);
    assert_eq!(routing.target_system, "legal_management");
}

#[tokio::test]
async fn small_receipt_is_auto_approved() {
    let service = ScriptedService::new(
        "receipt",
        r#"{"date": "2025-03-04", "amount": "$42.00", "vendor": "Corner Cafe"}"#,
    );
    let state = orchestrator(service)
        .process("RECEIPT Corner Cafe 2025-03-04 Total $42.00")
        .await;

    let routing = state.routing_result.unwrap();
    assert!(!routing.requires_approval);
    assert_eq!(routing.routing_priority, RoutingPriority::Medium);
    assert_eq!(routing.target_system, "expense_management");
}

#[tokio::test]
async fn extraction_failure_halts_with_partial_state() {
    let service = ScriptedService::scripted(
        Ok("invoice".to_string()),
        Err(ServiceError::Timeout(Duration::from_secs(30))),
    );
    let request = RunRequest {
        error_count: 2,
        ..RunRequest::new(INVOICE)
    };
    let outcome = orchestrator(service).run_to_end(request).await;
    let state = outcome.state;

    assert_eq!(outcome.terminal, Terminal::Halted);
    assert_eq!(state.error_count, 3);
    assert_eq!(state.next_action, Some(NextAction::ErrorHandling));
    assert_eq!(state.processing_stage, ProcessingStage::Classified);
    assert_eq!(state.document_type, Some(DocumentType::Invoice));
    assert!(state.extracted_data.is_none());
    assert!(state
        .messages
        .last()
        .unwrap()
        .content
        .starts_with("Extraction error"));
}

#[tokio::test]
async fn classification_failure_halts_immediately() {
    let service = ScriptedService::scripted(Err(ServiceError::CircuitOpen), Ok("{}".into()));
    let outcome = orchestrator(service.clone())
        .run_to_end(RunRequest::new(INVOICE))
        .await;

    assert_eq!(outcome.terminal, Terminal::Halted);
    assert_eq!(outcome.state.error_count, 1);
    assert_eq!(outcome.state.processing_stage, ProcessingStage::Initial);
    assert_eq!(service.extract_calls(), 0);
}

#[tokio::test]
async fn caller_requested_review_skips_routing() {
    let service = ScriptedService::new("invoice", INVOICE_FIELDS);
    let request = RunRequest {
        human_review_required: true,
        ..RunRequest::new(INVOICE)
    };
    let outcome = orchestrator(service).run_to_end(request).await;

    assert_eq!(outcome.terminal, Terminal::HumanReview);
    assert_eq!(outcome.state.processing_stage, ProcessingStage::Validated);
    assert!(outcome.state.routing_result.is_none());
    assert!(!outcome.state.processing_complete);
}

#[tokio::test]
async fn custom_registry_drives_fields_and_thresholds() {
    let registry = DocumentTypeRegistry::from_yaml(
        r#"
document_types:
  receipt:
    fields: [amount, vendor]
    system: petty_cash
    threshold: 10
"#,
    )
    .unwrap();

    let service = ScriptedService::new(
        "receipt",
        r#"{"amount": "$42.00", "vendor": "Corner Cafe", "date": "2025-03-04"}"#,
    );
    let orchestrator = PipelineOrchestrator::builder()
        .registry(Arc::new(registry))
        .completion(service)
        .build()
        .unwrap();

    let state = orchestrator.process("RECEIPT Corner Cafe $42.00").await;
    let data = state.extracted_data.as_ref().unwrap();
    assert_eq!(data.len(), 2);
    assert!(!data.contains_key("date"));

    let routing = state.routing_result.unwrap();
    assert_eq!(routing.target_system, "petty_cash");
    // Receipts are not amount-checked; the perfect score auto-approves
    assert!(!routing.requires_approval);
}

#[tokio::test]
async fn final_state_serializes_with_sentinel() {
    let service = ScriptedService::new("report", r#"{"title": "Q1 Review", "date": null}"#);
    let state = orchestrator(service).process("QUARTERLY REPORT").await;

    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["extracted_data"]["date"], NOT_FOUND);
    assert_eq!(json["extracted_data"]["author"], NOT_FOUND);
    assert_eq!(json["document_type"], "report");
    assert!(json["messages"].as_array().unwrap().len() >= 2);

    let restored: docflow_core::DocumentState = serde_json::from_value(json).unwrap();
    assert_eq!(restored.extracted_data, state.extracted_data);
    assert_eq!(restored.messages, state.messages);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn review_and_routing_are_exclusive(
        answer in prop_oneof![Just("invoice"), Just("receipt"), Just("report"), Just("??")],
        extraction in ".{0,80}",
        review in any::<bool>(),
        baseline in 0u32..5,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let service = ScriptedService::new(answer, &extraction);
        let request = RunRequest {
            human_review_required: review,
            error_count: baseline,
            ..RunRequest::new("Monthly report: invoice totals")
        };
        let outcome = runtime.block_on(orchestrator(service).run_to_end(request));
        let state = outcome.state;

        if state.human_review_required {
            prop_assert!(state.routing_result.is_none());
        }
        prop_assert!(state.error_count >= baseline);
        prop_assert_eq!(state.routing_result.is_some(), outcome.terminal == Terminal::Done);
    }
}
