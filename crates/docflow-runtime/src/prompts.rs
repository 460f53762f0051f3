//! Prompt text sent to the completion service.
//!
//! Both prompts are plain single-turn text. The document content is inserted
//! verbatim; answers are interpreted by the deterministic parsers in
//! `docflow_core::stages`.

use docflow_core::DocumentType;

/// Instruction line of the classification prompt.
pub const CLASSIFICATION_INSTRUCTION: &str =
    "Classify this document type. Return only one of: invoice, contract, receipt, or report.";

/// Build the classification prompt.
///
/// A caller hint is included as a suggestion only; the model still decides.
pub fn classification_prompt(content: &str, type_hint: Option<DocumentType>) -> String {
    let mut prompt = String::with_capacity(content.len() + 160);
    prompt.push_str(CLASSIFICATION_INSTRUCTION);
    if let Some(hint) = type_hint {
        prompt.push_str(&format!(
            "\nThe sender suggests this may be a {}; verify against the content.",
            hint
        ));
    }
    prompt.push_str("\n\nDocument:\n");
    prompt.push_str(content);
    prompt.push_str("\n\nType:");
    prompt
}

/// Build the extraction prompt for `fields` of a `doc_type` document.
pub fn extraction_prompt(doc_type: DocumentType, fields: &[String], content: &str) -> String {
    let template = fields
        .iter()
        .map(|f| format!("\"{}\": \"value\"", f))
        .collect::<Vec<_>>()
        .join(",\n    ");

    format!(
        "Extract these fields from the {doc_type}:\n{fields}\n\n\
         Document:\n{content}\n\n\
         Return JSON format. Use \"NOT_FOUND\" for missing fields:\n{{\n    {template}\n}}",
        doc_type = doc_type,
        fields = fields.join(", "),
        content = content,
        template = template,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_prompt_layout() {
        let prompt = classification_prompt("INVOICE #1", None);
        assert!(prompt.starts_with(CLASSIFICATION_INSTRUCTION));
        assert!(prompt.contains("\n\nDocument:\nINVOICE #1\n\nType:"));
        assert!(prompt.ends_with("Type:"));
        assert!(!prompt.contains("suggests"));
    }

    #[test]
    fn test_classification_prompt_with_hint() {
        let prompt = classification_prompt("...", Some(DocumentType::Receipt));
        assert!(prompt.contains("may be a receipt"));
    }

    #[test]
    fn test_extraction_prompt_lists_fields() {
        let fields = vec!["date".to_string(), "amount".to_string(), "vendor".to_string()];
        let prompt = extraction_prompt(DocumentType::Receipt, &fields, "Coffee $4.50");

        assert!(prompt.starts_with("Extract these fields from the receipt:\ndate, amount, vendor"));
        assert!(prompt.contains("Coffee $4.50"));
        assert!(prompt.contains("Use \"NOT_FOUND\" for missing fields"));
        assert!(prompt.contains("\"vendor\": \"value\""));
    }
}
