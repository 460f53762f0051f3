//! Property tests for the deterministic stages.

use docflow_core::stages::{parse_extraction_response, score_fields};
use docflow_core::{
    DocumentState, DocumentType, DocumentTypeRegistry, ExtractedData, FieldValue,
    ProcessingStage, ValidationStage,
};
use proptest::prelude::*;

fn doc_type_strategy() -> impl Strategy<Value = DocumentType> {
    prop_oneof![
        Just(DocumentType::Invoice),
        Just(DocumentType::Contract),
        Just(DocumentType::Receipt),
        Just(DocumentType::Report),
        Just(DocumentType::Unknown),
    ]
}

fn field_value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        Just(FieldValue::NotFound),
        ".{0,40}".prop_map(FieldValue::Found),
        "\\$ ?[0-9]{1,3}(,[0-9]{3}){0,2}(\\.[0-9]{2})?".prop_map(FieldValue::Found),
        "[0-9]{4}-[0-9]{2}-[0-9]{2}".prop_map(FieldValue::Found),
    ]
}

fn extracted_for(doc_type: DocumentType) -> impl Strategy<Value = ExtractedData> {
    let fields: Vec<String> = DocumentTypeRegistry::builtin().fields(doc_type).to_vec();
    proptest::collection::vec(field_value_strategy(), fields.len()).prop_map(move |values| {
        fields.iter().cloned().zip(values).collect()
    })
}

proptest! {
    #[test]
    fn validation_is_idempotent(
        (doc_type, data) in doc_type_strategy().prop_flat_map(|t| (Just(t), extracted_for(t)))
    ) {
        let registry = DocumentTypeRegistry::builtin();
        let first = score_fields(doc_type, &data, &registry);
        let second = score_fields(doc_type, &data, &registry);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn scores_stay_in_unit_interval(
        (doc_type, data) in doc_type_strategy().prop_flat_map(|t| (Just(t), extracted_for(t)))
    ) {
        let registry = DocumentTypeRegistry::builtin();
        let results = score_fields(doc_type, &data, &registry);

        prop_assert!((0.0..=1.0).contains(&results.overall_score));
        for score in results.field_scores.values() {
            prop_assert!((0.0..=1.0).contains(score));
        }
        for missing in &results.missing_fields {
            prop_assert_eq!(results.field_scores[missing], 0.0);
        }
    }

    #[test]
    fn extraction_yields_exactly_required_fields(
        doc_type in doc_type_strategy(),
        raw in ".{0,200}",
    ) {
        let registry = DocumentTypeRegistry::builtin();
        let fields = registry.fields(doc_type);
        let data = parse_extraction_response(&raw, fields);

        prop_assert_eq!(data.len(), fields.len());
        for field in fields {
            prop_assert!(data.contains_key(field));
        }
    }

    #[test]
    fn stage_never_regresses(stages in proptest::collection::vec(0usize..5, 1..20)) {
        const ORDER: [ProcessingStage; 5] = [
            ProcessingStage::Initial,
            ProcessingStage::Classified,
            ProcessingStage::Extracted,
            ProcessingStage::Validated,
            ProcessingStage::Routed,
        ];
        let mut state = DocumentState::new("");
        let mut highest = ProcessingStage::Initial;
        for i in stages {
            state.advance_stage(ORDER[i]);
            highest = highest.max(ORDER[i]);
            prop_assert_eq!(state.processing_stage, highest);
        }
    }
}

#[test]
fn well_formed_fields_score_perfectly() {
    let registry = DocumentTypeRegistry::builtin();
    let mut data = ExtractedData::new();
    data.insert("contract_number".into(), FieldValue::from_text("SLA-2025-012"));
    data.insert("parties".into(), FieldValue::from_text("DocuFlow Inc. & CloudTech Corp"));
    data.insert("effective_date".into(), FieldValue::from_text("January 1, 2025"));
    data.insert("value".into(), FieldValue::from_text("$ 48,000"));

    let results = score_fields(DocumentType::Contract, &data, &registry);
    assert_eq!(results.overall_score, 1.0);
    assert!(results.field_scores.values().all(|s| *s == 1.0));
}

#[test]
fn unregistered_type_extracts_nothing_and_scores_zero() {
    let registry = DocumentTypeRegistry::builtin();
    let data = parse_extraction_response(r#"{"title": "Q1"}"#, registry.fields(DocumentType::Unknown));
    assert!(data.is_empty());

    let mut state = DocumentState::new("Random text");
    state.document_type = Some(DocumentType::Unknown);
    state.extracted_data = Some(data);
    ValidationStage::new(registry).apply(&mut state).unwrap();
    assert_eq!(state.validation_results.unwrap().overall_score, 0.0);
}
