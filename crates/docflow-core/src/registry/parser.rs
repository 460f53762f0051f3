//! Registry parsing from YAML/JSON and the built-in table.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use super::schema::validate_registry_schema;
use crate::types::DocumentType;

/// Target system for types the registry does not know.
pub const MANUAL_REVIEW_SYSTEM: &str = "manual_review";

/// Errors that can occur when loading a registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read registry file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Registry does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Registry validation failed: {0}")]
    ValidationError(String),
}

/// What the pipeline knows about one document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTypeConfig {
    /// Fields to extract, in prompt order
    pub fields: Vec<String>,

    /// Downstream system that receives routed documents
    pub system: String,

    /// Amount above which approval is required; `None` means no cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl DocumentTypeConfig {
    fn new(fields: &[&str], system: &str, threshold: Option<f64>) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            system: system.to_string(),
            threshold,
        }
    }

    /// Threshold as a number, with `+inf` standing in for "no cap".
    pub fn approval_threshold(&self) -> f64 {
        self.threshold.unwrap_or(f64::INFINITY)
    }
}

/// On-disk shape of a registry file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryFile {
    document_types: BTreeMap<String, DocumentTypeConfig>,
}

/// Immutable mapping from document type to its configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTypeRegistry {
    types: BTreeMap<DocumentType, DocumentTypeConfig>,
}

static BUILTIN: OnceLock<Arc<DocumentTypeRegistry>> = OnceLock::new();

impl DocumentTypeRegistry {
    /// The built-in registry, initialised once per process.
    pub fn builtin() -> Arc<DocumentTypeRegistry> {
        BUILTIN
            .get_or_init(|| {
                let mut types = BTreeMap::new();
                types.insert(
                    DocumentType::Invoice,
                    DocumentTypeConfig::new(
                        &["invoice_number", "date", "amount", "vendor"],
                        "accounting_erp",
                        Some(5000.0),
                    ),
                );
                types.insert(
                    DocumentType::Contract,
                    DocumentTypeConfig::new(
                        &["contract_number", "parties", "effective_date", "value"],
                        "legal_management",
                        Some(0.0),
                    ),
                );
                types.insert(
                    DocumentType::Receipt,
                    DocumentTypeConfig::new(
                        &["date", "amount", "vendor"],
                        "expense_management",
                        Some(500.0),
                    ),
                );
                types.insert(
                    DocumentType::Report,
                    DocumentTypeConfig::new(
                        &["title", "date", "author"],
                        "document_repository",
                        None,
                    ),
                );
                Arc::new(DocumentTypeRegistry { types })
            })
            .clone()
    }

    /// Parse a registry from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, RegistryError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a registry from JSON.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a registry from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a registry from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load a file, picking the format from its extension (YAML unless `.json`).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_yaml_file(path),
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, RegistryError> {
        validate_registry_schema(&value).map_err(RegistryError::SchemaError)?;
        let file: RegistryFile = serde_json::from_value(value)?;

        let mut types = BTreeMap::new();
        for (name, config) in file.document_types {
            let doc_type: DocumentType = name
                .parse()
                .map_err(|e: crate::types::ParseDocumentTypeError| {
                    RegistryError::ValidationError(e.to_string())
                })?;
            types.insert(doc_type, config);
        }

        let registry = Self { types };
        registry.validate()?;
        Ok(registry)
    }

    /// Structural checks the schema cannot express.
    fn validate(&self) -> Result<(), RegistryError> {
        if self.types.contains_key(&DocumentType::Unknown) {
            return Err(RegistryError::ValidationError(
                "'unknown' cannot be registered".to_string(),
            ));
        }

        for (doc_type, config) in &self.types {
            if config.fields.is_empty() {
                return Err(RegistryError::ValidationError(format!(
                    "{} must declare at least one field",
                    doc_type
                )));
            }

            if config.system.trim().is_empty() {
                return Err(RegistryError::ValidationError(format!(
                    "{} has an empty target system",
                    doc_type
                )));
            }

            if let Some(threshold) = config.threshold {
                if !threshold.is_finite() || threshold < 0.0 {
                    return Err(RegistryError::ValidationError(format!(
                        "{} threshold must be a non-negative number",
                        doc_type
                    )));
                }
            }

            let mut seen = HashSet::new();
            for field in &config.fields {
                if !seen.insert(field) {
                    return Err(RegistryError::ValidationError(format!(
                        "Duplicate field '{}' in {}",
                        field, doc_type
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn get(&self, doc_type: DocumentType) -> Option<&DocumentTypeConfig> {
        self.types.get(&doc_type)
    }

    /// Required fields for a type; empty when it is not registered.
    pub fn fields(&self, doc_type: DocumentType) -> &[String] {
        self.types
            .get(&doc_type)
            .map(|c| c.fields.as_slice())
            .unwrap_or(&[])
    }

    /// Target system for a type, `manual_review` when it is not registered.
    pub fn target_system(&self, doc_type: DocumentType) -> &str {
        self.types
            .get(&doc_type)
            .map(|c| c.system.as_str())
            .unwrap_or(MANUAL_REVIEW_SYSTEM)
    }

    /// Approval threshold for a type. Unregistered types get 0.
    pub fn threshold(&self, doc_type: DocumentType) -> f64 {
        self.types
            .get(&doc_type)
            .map(|c| c.approval_threshold())
            .unwrap_or(0.0)
    }

    pub fn is_registered(&self, doc_type: DocumentType) -> bool {
        self.types.contains_key(&doc_type)
    }

    pub fn known_types(&self) -> Vec<DocumentType> {
        self.types.keys().copied().collect()
    }

    /// Serialize back to the file shape, for display.
    pub fn to_value(&self) -> serde_json::Value {
        let document_types: BTreeMap<String, DocumentTypeConfig> = self
            .types
            .iter()
            .map(|(t, c)| (t.to_string(), c.clone()))
            .collect();
        serde_json::to_value(RegistryFile { document_types }).unwrap_or_default()
    }
}

impl Default for DocumentTypeRegistry {
    fn default() -> Self {
        Self::builtin().as_ref().clone()
    }
}
