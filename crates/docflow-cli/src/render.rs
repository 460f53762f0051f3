//! Output formatting for `docflow` commands.

use anyhow::Result;
use clap::ValueEnum;
use std::fmt::Write;

use docflow_core::{DocumentState, DocumentTypeRegistry};

#[derive(Clone, Copy, ValueEnum)]
pub enum RegistryFormat {
    Json,
    Yaml,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    /// Human-readable summary
    Text,
}

pub fn render_state(state: &DocumentState, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(state)?,
        OutputFormat::Yaml => serde_yaml::to_string(state)?,
        OutputFormat::Text => summary(state)?,
    })
}

pub fn render_registry(registry: &DocumentTypeRegistry, format: RegistryFormat) -> Result<String> {
    let value = registry.to_value();
    Ok(match format {
        RegistryFormat::Json => serde_json::to_string_pretty(&value)?,
        RegistryFormat::Yaml => serde_yaml::to_string(&value)?,
    })
}

fn summary(state: &DocumentState) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "Document:   {} ({})", state.document_name, state.document_id)?;

    match (state.document_type, state.confidence_score) {
        (Some(doc_type), Some(confidence)) => {
            writeln!(out, "Type:       {} ({:.0}% confidence)", doc_type, confidence * 100.0)?
        }
        _ => writeln!(out, "Type:       -")?,
    }
    writeln!(out, "Stage:      {}", state.processing_stage)?;

    if let Some(data) = &state.extracted_data {
        writeln!(out, "Fields:")?;
        for (field, value) in data {
            writeln!(out, "  {:<16} {}", field, value)?;
        }
    }

    if let Some(validation) = &state.validation_results {
        writeln!(out, "Quality:    {:.1}%", validation.overall_score * 100.0)?;
        for issue in &validation.issues {
            writeln!(out, "  - {}", issue)?;
        }
    }

    if let Some(routing) = &state.routing_result {
        writeln!(
            out,
            "Routed:     {} as {} (approval {}, priority {:?})",
            routing.target_system,
            routing.reference_id,
            if routing.requires_approval { "required" } else { "not required" },
            routing.routing_priority
        )?;
    }

    let status = if state.processing_complete {
        "complete"
    } else if state.is_halted() {
        "halted on error"
    } else if state.human_review_required {
        "awaiting human review"
    } else {
        "incomplete"
    };
    write!(out, "Status:     {} ({} errors)", status, state.error_count)?;
    Ok(out)
}
