//! Extraction response parsing.
//!
//! The model is asked for a JSON object keyed by the registry's fields.
//! Whatever it returns, the result holds exactly those fields.

use serde_json::Value as JsonValue;

use crate::types::{DocumentState, ExtractedData, FieldValue, Message, NextAction, ProcessingStage};

/// Parse a model response into one value per required field.
///
/// Decodes the span between the first `{` and the last `}`. A missing span,
/// a decode failure, or a non-object leaves every field `NotFound`. Keys
/// outside `fields` are dropped and absent ones are backfilled.
pub fn parse_extraction_response(raw: &str, fields: &[String]) -> ExtractedData {
    let decoded = json_span(raw)
        .and_then(|span| serde_json::from_str::<JsonValue>(span).ok())
        .and_then(|value| match value {
            JsonValue::Object(map) => Some(map),
            _ => None,
        });

    if decoded.is_none() && !fields.is_empty() {
        tracing::warn!("Model returned malformed JSON, marking all fields as NOT_FOUND");
    }
    let object = decoded.unwrap_or_default();

    fields
        .iter()
        .map(|field| {
            let value = object
                .get(field)
                .map(to_field_value)
                .unwrap_or(FieldValue::NotFound);
            (field.clone(), value)
        })
        .collect()
}

fn json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn to_field_value(value: &JsonValue) -> FieldValue {
    match value {
        JsonValue::String(s) => FieldValue::from_text(s.as_str()),
        JsonValue::Null => FieldValue::NotFound,
        other => FieldValue::Found(other.to_string()),
    }
}

/// Write extracted data into the state.
pub fn apply_extraction(state: &mut DocumentState, data: ExtractedData) {
    let found = data.values().filter(|v| v.is_found()).count();

    tracing::info!(found, total = data.len(), "Fields extracted");
    for (field, value) in &data {
        let status = if value.is_found() { "Found" } else { "Missing" };
        tracing::debug!(field = %field, value = %value, "{}", status);
    }

    state.extracted_data = Some(data);
    state.advance_stage(ProcessingStage::Extracted);
    state.next_action = Some(NextAction::ValidateData);
    state.log(Message::assistant(format!("Extracted {} fields", found)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice_fields() -> Vec<String> {
        ["invoice_number", "date", "amount", "vendor"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_parse_wrapped_json() {
        let raw = r##"Sure! Here it is:
{"invoice_number": "#12345", "date": "2024-06-01", "amount": "$ 1000.00", "vendor": "TechSupply Corp"}
Let me know if you need more."##;
        let data = parse_extraction_response(raw, &invoice_fields());

        assert_eq!(data["invoice_number"], FieldValue::Found("#12345".to_string()));
        assert_eq!(data["amount"], FieldValue::Found("$ 1000.00".to_string()));
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn test_malformed_json_is_all_not_found() {
        let data = parse_extraction_response("{invoice_number: oops", &invoice_fields());
        assert_eq!(data.len(), 4);
        assert!(data.values().all(|v| *v == FieldValue::NotFound));

        let data = parse_extraction_response("no braces at all", &invoice_fields());
        assert!(data.values().all(|v| *v == FieldValue::NotFound));
    }

    #[test]
    fn test_backfill_and_drop_extra_keys() {
        let raw = r#"{"amount": 1500, "vendor": null, "notes": "extra", "date": "NOT_FOUND"}"#;
        let data = parse_extraction_response(raw, &invoice_fields());

        assert_eq!(data["amount"], FieldValue::Found("1500".to_string()));
        assert_eq!(data["vendor"], FieldValue::NotFound);
        assert_eq!(data["date"], FieldValue::NotFound);
        assert_eq!(data["invoice_number"], FieldValue::NotFound);
        assert!(!data.contains_key("notes"));
    }

    #[test]
    fn test_empty_field_list() {
        let data = parse_extraction_response(r#"{"title": "x"}"#, &[]);
        assert!(data.is_empty());
    }

    #[test]
    fn test_apply_extraction_counts_found() {
        let mut state = DocumentState::new("INVOICE");
        let data = parse_extraction_response(r#"{"invoice_number": "INV-1"}"#, &invoice_fields());
        apply_extraction(&mut state, data);

        assert_eq!(state.processing_stage, ProcessingStage::Extracted);
        assert_eq!(state.next_action, Some(NextAction::ValidateData));
        assert_eq!(state.messages.last().unwrap().content, "Extracted 1 fields");
    }
}
