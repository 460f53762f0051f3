//! Deterministic halves of the four pipeline stages.
//!
//! Classification and extraction depend on a completion service, which
//! lives in `docflow-runtime`; what is here is everything around that call.
//! Validation and routing are fully deterministic.

pub mod classify;
pub mod extract;
pub mod route;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use classify::{apply_classification, classify_by_keywords, interpret_response, Classification};
pub use extract::{apply_extraction, parse_extraction_response};
pub use route::RoutingPolicy;
pub use validate::{score_field, score_fields, ValidationStage};

/// The four stages of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Classify,
    Extract,
    Validate,
    Route,
}

impl StageKind {
    /// Noun used in log lines and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Classify => "Classification",
            StageKind::Extract => "Extraction",
            StageKind::Validate => "Validation",
            StageKind::Route => "Routing",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageKind::Classify => "classify",
            StageKind::Extract => "extract",
            StageKind::Validate => "validate",
            StageKind::Route => "route",
        };
        f.write_str(s)
    }
}

/// Failures a stage contains at its own boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    /// The completion service failed or timed out.
    #[error("completion service failed: {0}")]
    Service(String),

    /// A precondition on the incoming state was not met.
    #[error("{stage} requires {field}")]
    MissingInput { stage: StageKind, field: &'static str },
}
