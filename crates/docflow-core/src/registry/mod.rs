//! Document Type Registry.
//!
//! Maps each document type to its required fields, target system, and
//! approval threshold. Registries are immutable once built and are shared
//! by reference between stages.

mod parser;
mod schema;

pub use parser::{DocumentTypeConfig, DocumentTypeRegistry, RegistryError, MANUAL_REVIEW_SYSTEM};
pub use schema::validate_registry_schema;
