use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;

use policy_extract::config::{
    self, ConfigError, GeminiSettings, InferenceSettings, RerankSettings, DEFAULT_DOCX_MODEL,
    DEFAULT_PDF_MODEL, DEFAULT_RERANK_URL, PROCESSED_JSON_DIR, PROVIDER_TIMEOUT_SECS,
    RAW_DOCX_DIR, RAW_PDF_DIR,
};
use policy_extract::pipeline::batch::{
    BatchConfig, BatchError, BatchRunner, DocumentProcessor, DocxPolicyProcessor,
    PdfPolicyProcessor,
};
use policy_extract::pipeline::chunking::PolicyChunker;
use policy_extract::pipeline::extraction::{build_document_reader, SourceKind};
use policy_extract::pipeline::processor::PolicyParser;
use policy_extract::pipeline::structuring::{
    filter_models, ChatCompletionsClient, GeminiClient, MetadataExtractor, ParsedDocument,
    PolicyStructurer, StructuringError,
};
use policy_extract::rerank::{self, RerankClient, RerankError};

#[derive(Parser)]
#[command(name = "policy-extract", version, about = "Insurance policy PDF/DOCX to structured JSON")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send every PDF in a directory to the model and write one JSON record each
    PdfBatch {
        #[arg(long, default_value = RAW_PDF_DIR)]
        input: PathBuf,
        #[arg(long, default_value = PROCESSED_JSON_DIR)]
        output: PathBuf,
    },
    /// Read every DOCX in a directory and write one JSON record each
    DocxBatch {
        #[arg(long, default_value = RAW_DOCX_DIR)]
        input: PathBuf,
        #[arg(long, default_value = PROCESSED_JSON_DIR)]
        output: PathBuf,
    },
    /// Parse one document and print `{metadata, full_text}` as JSON
    Parse {
        file: PathBuf,
    },
    /// Split a `parse` result into metadata-prefixed retrieval chunks
    Chunk {
        /// JSON written by `parse`
        parsed: PathBuf,
        /// Source file name stamped on each chunk (defaults to the JSON's name)
        #[arg(long)]
        source: Option<String>,
    },
    /// List provider models whose name contains a substring
    ListModels {
        #[arg(long, default_value = "flash")]
        filter: String,
    },
    /// Run the re-rank HTTP service
    ServeRerank {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Query a running re-rank service
    Rerank {
        query: String,
        #[arg(required = true)]
        documents: Vec<String>,
        #[arg(long, env = "RERANK_URL", default_value = DEFAULT_RERANK_URL)]
        url: String,
    },
}

#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Structuring(#[from] StructuringError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Rerank(#[from] RerankError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    policy_extract::init_tracing();

    let cli = Cli::parse();
    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), AppError> {
    match command {
        Command::PdfBatch { input, output } => run_batch(SourceKind::Pdf, input, output),
        Command::DocxBatch { input, output } => run_batch(SourceKind::Docx, input, output),
        Command::Parse { file } => parse(file),
        Command::Chunk { parsed, source } => chunk(parsed, source),
        Command::ListModels { filter } => list_models(&filter),
        Command::ServeRerank { port, model_dir } => serve_rerank(port, model_dir),
        Command::Rerank {
            query,
            documents,
            url,
        } => query_rerank(&url, &query, &documents),
    }
}

fn run_batch(kind: SourceKind, input: PathBuf, output: PathBuf) -> Result<(), AppError> {
    // Credentials are checked before any file is touched.
    let settings = GeminiSettings::from_env()?;
    let client = Arc::new(GeminiClient::new(&settings.api_key, PROVIDER_TIMEOUT_SECS)?);

    let model = match kind {
        SourceKind::Pdf => settings.model_or(DEFAULT_PDF_MODEL),
        SourceKind::Docx => settings.model_or(DEFAULT_DOCX_MODEL),
    };
    let structurer = PolicyStructurer::new(Box::new(Arc::clone(&client)), model);
    let reader = build_document_reader();

    let processor: Box<dyn DocumentProcessor + Send + Sync> = match kind {
        SourceKind::Pdf => Box::new(PdfPolicyProcessor::new(structurer, reader)),
        SourceKind::Docx => Box::new(DocxPolicyProcessor::new(structurer, reader)),
    };

    tracing::info!(kind = %kind, model, "Batch configured");
    let config = BatchConfig::for_kind(kind, input, output);
    BatchRunner::new(processor, config).run()?;
    Ok(())
}

fn parse(file: PathBuf) -> Result<(), AppError> {
    let settings = InferenceSettings::from_env()?;

    let metadata = if settings.is_configured() {
        let client = ChatCompletionsClient::new(
            &settings.endpoint,
            settings.bearer_token.as_deref(),
            PROVIDER_TIMEOUT_SECS,
        )?;
        Some(MetadataExtractor::new(Box::new(client), &settings.model_name))
    } else {
        tracing::warn!("VLLM_ENDPOINT still holds the placeholder, metadata extraction skipped");
        None
    };

    let parser = PolicyParser::new(build_document_reader(), metadata);
    let report = parser.parse(&file);

    println!("{}", serde_json::to_string(&report.document)?);
    Ok(())
}

fn chunk(parsed: PathBuf, source: Option<String>) -> Result<(), AppError> {
    let document: ParsedDocument = serde_json::from_str(&std::fs::read_to_string(&parsed)?)?;
    let source = source.unwrap_or_else(|| {
        parsed
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let chunks = PolicyChunker.chunk(&document, &source);
    tracing::info!(source = %source, chunks = chunks.len(), "Chunking complete");
    println!("{}", serde_json::to_string(&chunks)?);
    Ok(())
}

fn list_models(filter: &str) -> Result<(), AppError> {
    let settings = GeminiSettings::from_env()?;
    let client = GeminiClient::new(&settings.api_key, PROVIDER_TIMEOUT_SECS)?;

    let models = client.list_models()?;
    let matching = filter_models(&models, filter);
    tracing::info!(total = models.len(), matching = matching.len(), "Models listed");

    for model in matching {
        println!("{}", model.short_name());
    }
    Ok(())
}

fn serve_rerank(port: Option<u16>, model_dir: Option<PathBuf>) -> Result<(), AppError> {
    let mut settings = RerankSettings::from_env()?;
    if let Some(port) = port {
        settings.port = port;
    }
    if let Some(dir) = model_dir {
        settings.model_dir = dir;
    }

    let scorer = rerank::load_scorer(&settings.model_dir)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(rerank::serve(scorer, settings.port))?;
    Ok(())
}

fn query_rerank(url: &str, query: &str, documents: &[String]) -> Result<(), AppError> {
    let client = RerankClient::new(url, PROVIDER_TIMEOUT_SECS)?;
    let ranked = client.rerank(query, documents)?;
    println!("{}", serde_json::to_string(&ranked)?);
    Ok(())
}
