//! # docflow-core
//!
//! Deterministic core of the DocFlow document pipeline.
//!
//! A document moves through four stages (classify, extract, validate,
//! route) carried by a single [`DocumentState`]. This crate owns:
//! - The state record and its value types
//! - The [`DocumentTypeRegistry`] (required fields, target system, threshold)
//! - The deterministic policy of every stage
//! - The pipeline [`graph`] with its single conditional fork after validation
//!
//! ## Key Guarantees
//!
//! 1. **No LLM calls**: model access lives in `docflow-runtime`
//! 2. **Monotonic**: `processing_stage` never regresses, `error_count` never decreases
//! 3. **Contained failures**: stage errors are recorded in the state, never raised past it
//!
//! ## Example
//!
//! ```rust,ignore
//! use docflow_core::{validate_and_route, DocumentState, DocumentType, DocumentTypeRegistry};
//!
//! let registry = DocumentTypeRegistry::builtin();
//! let mut state = DocumentState::new("...");
//! state.document_type = Some(DocumentType::Receipt);
//! state.extracted_data = Some(data);
//!
//! match validate_and_route(&mut state, &registry) {
//!     Terminal::Done => println!("Routed: {:?}", state.routing_result),
//!     Terminal::HumanReview => println!("Needs review"),
//!     Terminal::Halted => println!("Failed: {:?}", state.messages.last()),
//! }
//! ```

pub mod graph;
pub mod patterns;
pub mod registry;
pub mod stages;
pub mod types;

// Re-export main types at crate root
pub use graph::{next_node, Node, Terminal, ENTRY};
pub use registry::{DocumentTypeConfig, DocumentTypeRegistry, RegistryError};
pub use stages::{
    Classification, RoutingPolicy, StageError, StageKind, ValidationStage,
};
pub use types::{
    DocumentState, DocumentType, ExtractedData, FieldValue, Message, NextAction,
    ProcessingStage, Role, RoutingPriority, RoutingResult, ValidationResults, NOT_FOUND,
};

use std::sync::Arc;

/// Run the deterministic tail of the graph: validate, then route unless
/// the fork sends the document to human review.
pub fn validate_and_route(state: &mut DocumentState, registry: &Arc<DocumentTypeRegistry>) -> Terminal {
    let validation = ValidationStage::new(Arc::clone(registry));
    if let Err(e) = validation.apply(state) {
        tracing::warn!(error = %e, "Validation failed");
        state.record_failure(StageKind::Validate, &e);
    }

    match next_node(StageKind::Validate, state) {
        Node::Stage(StageKind::Route) => {
            let routing = RoutingPolicy::new(Arc::clone(registry));
            if let Err(e) = routing.apply(state) {
                tracing::warn!(error = %e, "Routing failed");
                state.record_failure(StageKind::Route, &e);
            }
            match next_node(StageKind::Route, state) {
                Node::End(terminal) => terminal,
                Node::Stage(_) => Terminal::Halted,
            }
        }
        Node::End(terminal) => terminal,
        Node::Stage(_) => Terminal::Halted,
    }
}
