//! `docflow` command line.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use docflow_core::stages::parse_extraction_response;
use docflow_core::{
    validate_and_route, DocumentState, DocumentType, DocumentTypeRegistry, ProcessingStage,
    Terminal,
};
use docflow_runtime::{PipelineOrchestrator, RunRequest, RuntimeConfig};

mod render;

use render::{render_registry, render_state, OutputFormat, RegistryFormat};

/// Classify, extract, validate and route business documents
#[derive(Parser)]
#[command(name = "docflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a document through the pipeline
    Process {
        /// Document text file, or `-` for stdin
        file: PathBuf,

        /// Suggested document type, passed to the classifier
        #[arg(long, value_name = "TYPE")]
        type_hint: Option<String>,

        /// Send the document to human review even if it validates
        #[arg(long)]
        require_review: bool,

        /// Errors already recorded for this document upstream
        #[arg(long, default_value = "0")]
        error_count: u32,

        /// Runtime config file (YAML)
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Provider type, e.g. ollama or openai
        #[arg(long)]
        provider: Option<String>,

        /// Model name
        #[arg(long)]
        model: Option<String>,

        /// Document type registry file (YAML or JSON)
        #[arg(long)]
        registry: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Print the effective document type registry
    Registry {
        /// Registry file; the built-in table when omitted
        #[arg(long)]
        registry: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "yaml")]
        format: RegistryFormat,
    },

    /// Validate a registry file
    CheckRegistry {
        file: PathBuf,
    },

    /// Validate and route already-extracted fields, without a model
    Score {
        /// Document type of the fields
        doc_type: String,

        /// JSON object of field name to value
        json_file: PathBuf,

        /// Registry file; the built-in table when omitted
        #[arg(long)]
        registry: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Process {
            file,
            type_hint,
            require_review,
            error_count,
            config,
            provider,
            model,
            registry,
            format,
        } => {
            let mut runtime_config = match &config {
                Some(path) => RuntimeConfig::from_file(path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => RuntimeConfig::default(),
            }
            .with_env_overrides();
            if let Some(provider) = provider {
                runtime_config.provider.provider_type = provider;
            }
            if model.is_some() {
                runtime_config.provider.model = model;
            }
            if registry.is_some() {
                runtime_config.registry_path = registry;
            }

            let orchestrator = PipelineOrchestrator::from_config(&runtime_config)
                .context("setting up the pipeline")?;

            let request = RunRequest {
                document_content: read_document(&file)?,
                document_type_hint: type_hint,
                human_review_required: require_review,
                error_count,
                document_id: None,
                document_name: document_name(&file),
            };

            let outcome = orchestrator.run_to_end(request).await;
            let usage = orchestrator.usage();
            tracing::info!(
                llm_calls = usage.llm_calls,
                cache_hits = usage.cache_hits,
                tokens = usage.total_tokens,
                estimated_cost = usage.estimated_cost,
                "Completion usage"
            );

            println!("{}", render_state(&outcome.state, format)?);
            Ok(exit_code(outcome.terminal))
        }

        Commands::Registry { registry, format } => {
            let registry = load_registry(registry.as_deref())?;
            println!("{}", render_registry(&registry, format)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::CheckRegistry { file } => {
            let registry = DocumentTypeRegistry::from_file(&file)
                .with_context(|| format!("invalid registry {}", file.display()))?;
            let types: Vec<String> = registry
                .known_types()
                .iter()
                .map(|t| t.to_string())
                .collect();
            println!("{}: ok ({})", file.display(), types.join(", "));
            Ok(ExitCode::SUCCESS)
        }

        Commands::Score {
            doc_type,
            json_file,
            registry,
            format,
        } => {
            let doc_type: DocumentType = doc_type.parse()?;
            let registry = load_registry(registry.as_deref())?;
            let raw = std::fs::read_to_string(&json_file)
                .with_context(|| format!("reading {}", json_file.display()))?;
            if serde_json::from_str::<serde_json::Value>(&raw)
                .map(|v| !v.is_object())
                .unwrap_or(true)
            {
                bail!("{} must contain a JSON object", json_file.display());
            }

            let mut state = DocumentState::new("").with_name(json_file.display().to_string());
            state.document_type = Some(doc_type);
            state.extracted_data = Some(parse_extraction_response(&raw, registry.fields(doc_type)));
            state.advance_stage(ProcessingStage::Extracted);

            let terminal = validate_and_route(&mut state, &registry);
            println!("{}", render_state(&state, format)?);
            Ok(exit_code(terminal))
        }
    }
}

fn exit_code(terminal: Terminal) -> ExitCode {
    match terminal {
        Terminal::Done => ExitCode::SUCCESS,
        Terminal::HumanReview => ExitCode::from(2),
        Terminal::Halted => ExitCode::FAILURE,
    }
}

fn read_document(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("reading document from stdin")?;
        Ok(content)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}

fn document_name(path: &Path) -> Option<String> {
    if path.as_os_str() == "-" {
        return None;
    }
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn load_registry(path: Option<&Path>) -> Result<Arc<DocumentTypeRegistry>> {
    match path {
        Some(path) => DocumentTypeRegistry::from_file(path)
            .map(Arc::new)
            .with_context(|| format!("loading registry {}", path.display())),
        None => Ok(DocumentTypeRegistry::builtin()),
    }
}
