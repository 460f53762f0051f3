//! Document State and the value types that flow through the pipeline.
//!
//! One `DocumentState` exists per run. Stages take it by value and hand it
//! back; optional sections stay `None` until the stage that owns them runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::stages::{StageError, StageKind};

/// Literal used at the external boundary for a field the source text lacks.
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Closed set of document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Invoice,
    Contract,
    Receipt,
    Report,
    Unknown,
}

impl DocumentType {
    /// Every type that can appear in a registry.
    pub const REGISTRABLE: [DocumentType; 4] = [
        DocumentType::Invoice,
        DocumentType::Contract,
        DocumentType::Receipt,
        DocumentType::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::Contract => "contract",
            DocumentType::Receipt => "receipt",
            DocumentType::Report => "report",
            DocumentType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no document type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognised document type: '{0}'")]
pub struct ParseDocumentTypeError(pub String);

impl FromStr for DocumentType {
    type Err = ParseDocumentTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "invoice" => Ok(DocumentType::Invoice),
            "contract" => Ok(DocumentType::Contract),
            "receipt" => Ok(DocumentType::Receipt),
            "report" => Ok(DocumentType::Report),
            "unknown" => Ok(DocumentType::Unknown),
            _ => Err(ParseDocumentTypeError(s.to_string())),
        }
    }
}

/// How far a document has travelled. Ordered; never regresses within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStage {
    #[default]
    Initial,
    Classified,
    Extracted,
    Validated,
    Routed,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessingStage::Initial => "initial",
            ProcessingStage::Classified => "classified",
            ProcessingStage::Extracted => "extracted",
            ProcessingStage::Validated => "validated",
            ProcessingStage::Routed => "routed",
        };
        f.write_str(s)
    }
}

/// Hint left by the last stage for the next transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    ExtractData,
    HumanReview,
    ValidateData,
    RouteDocument,
    Complete,
    ErrorHandling,
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NextAction::ExtractData => "extract_data",
            NextAction::HumanReview => "human_review",
            NextAction::ValidateData => "validate_data",
            NextAction::RouteDocument => "route_document",
            NextAction::Complete => "complete",
            NextAction::ErrorHandling => "error_handling",
        };
        f.write_str(s)
    }
}

/// An extracted field value, or the explicit absence of one.
///
/// Serializes `NotFound` as `"NOT_FOUND"` so downstream consumers that
/// match on the literal keep working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Found(String),
    NotFound,
}

impl FieldValue {
    /// Build from raw text, mapping the sentinel literal to `NotFound`.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text == NOT_FOUND {
            FieldValue::NotFound
        } else {
            FieldValue::Found(text)
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldValue::Found(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Found(s) => s,
            FieldValue::NotFound => NOT_FOUND,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(FieldValue::from_text(text))
    }
}

/// Field name to extracted value.
pub type ExtractedData = BTreeMap<String, FieldValue>;

/// Output of the validation stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationResults {
    /// Mean of the per-field scores, in [0, 1]
    pub overall_score: f64,

    /// Score per required field
    pub field_scores: BTreeMap<String, f64>,

    /// Required fields with no usable value, in registry order
    pub missing_fields: Vec<String>,

    /// Human-readable notes on fields that scored below 1.0
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingPriority {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Success,
}

/// Output of the routing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub target_system: String,
    pub requires_approval: bool,
    pub routing_priority: RoutingPriority,
    /// `REF-<TYPE>-<nnnn>`; best-effort unique only
    pub reference_id: String,
    pub routing_timestamp: DateTime<Utc>,
    pub integration_status: IntegrationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry in the run's append-only message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// The record threaded through every stage of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    pub document_id: String,
    pub document_name: String,
    pub document_content: String,

    /// Caller's guess at the type; only ever a prompt hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type_hint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<ExtractedData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_results: Option<ValidationResults>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_result: Option<RoutingResult>,

    #[serde(default)]
    pub processing_stage: ProcessingStage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<NextAction>,

    #[serde(default)]
    pub error_count: u32,

    #[serde(default)]
    pub human_review_required: bool,

    #[serde(default)]
    pub processing_complete: bool,

    #[serde(default)]
    pub messages: Vec<Message>,
}

impl DocumentState {
    /// Create a fresh state for `content` with defaulted identifiers.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            document_id: format!("DOC-{}", Utc::now().timestamp_millis()),
            document_name: "untitled".to_string(),
            document_content: content.into(),
            document_type_hint: None,
            document_type: None,
            confidence_score: None,
            extracted_data: None,
            validation_results: None,
            routing_result: None,
            processing_stage: ProcessingStage::Initial,
            next_action: None,
            error_count: 0,
            human_review_required: false,
            processing_complete: false,
            messages: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = name.into();
        self
    }

    pub fn with_type_hint(mut self, hint: impl Into<String>) -> Self {
        self.document_type_hint = Some(hint.into());
        self
    }

    /// Move the stage forward. Requests to move backwards are ignored.
    pub fn advance_stage(&mut self, stage: ProcessingStage) {
        if stage > self.processing_stage {
            self.processing_stage = stage;
        }
    }

    /// Flag the run for human review. The flag is never cleared.
    pub fn request_human_review(&mut self) {
        self.human_review_required = true;
        self.next_action = Some(NextAction::HumanReview);
    }

    pub fn log(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Contain a stage failure in the state.
    pub fn record_failure(&mut self, stage: StageKind, error: &StageError) {
        self.error_count = self.error_count.saturating_add(1);
        self.next_action = Some(NextAction::ErrorHandling);
        self.log(Message::system(format!("{} error: {}", stage.label(), error)));
    }

    /// True once the run has left the happy path because of a failure.
    pub fn is_halted(&self) -> bool {
        self.next_action == Some(NextAction::ErrorHandling)
    }
}
