use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "policy-extract";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default input directory for PDF batches.
pub const RAW_PDF_DIR: &str = "./data/raw_pdfs";

/// Default input directory for DOCX batches.
pub const RAW_DOCX_DIR: &str = "./data/raw_docx";

/// Shared output directory for both batch kinds.
pub const PROCESSED_JSON_DIR: &str = "./data/processed_json";

/// Pause after every PDF attempt (provider rate limit).
pub const PDF_REQUEST_DELAY: Duration = Duration::from_secs(5);

/// Pause after every DOCX attempt.
pub const DOCX_REQUEST_DELAY: Duration = Duration::from_secs(1);

/// Extended pause after a severe, unexpected failure.
pub const SEVERE_ERROR_COOLDOWN: Duration = Duration::from_secs(5);

/// Timeout applied to every provider HTTP call.
pub const PROVIDER_TIMEOUT_SECS: u64 = 60;

/// Model used for schema-constrained extraction of PDF files.
pub const DEFAULT_PDF_MODEL: &str = "gemini-2.5-flash-lite";

/// Model used for schema-constrained extraction of DOCX text.
pub const DEFAULT_DOCX_MODEL: &str = "gemini-3-flash-preview";

/// Freeform endpoint defaults.
pub const DEFAULT_INFERENCE_MODEL: &str = "qwen2.5:7b";

/// Placeholder left in sample `.env` files; an endpoint containing it is treated as unset.
pub const ENDPOINT_PLACEHOLDER: &str = "YOUR_VLLM_IP";

/// Default port of the re-rank service.
pub const DEFAULT_RERANK_PORT: u16 = 8009;

/// Default cross-encoder model directory (`model.onnx` + `tokenizer.json`).
pub const DEFAULT_RERANK_MODEL_DIR: &str = "./models/bge-reranker-v2-m3";

/// Default base URL used by the re-rank client.
pub const DEFAULT_RERANK_URL: &str = "http://localhost:8009";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "policy_extract=info,warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Credentials for the schema-constrained provider.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    /// Overrides the per-kind default model when set.
    pub model_override: Option<String>,
}

impl GeminiSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = read_var("GOOGLE_API_KEY").ok_or(ConfigError::MissingVar("GOOGLE_API_KEY"))?;
        Ok(Self {
            api_key,
            model_override: read_var("GEMINI_MODEL"),
        })
    }

    /// Model to use, honouring the override.
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model_override.as_deref().unwrap_or(default)
    }
}

/// OpenAI-compatible inference endpoint used in freeform mode.
#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub endpoint: String,
    pub bearer_token: Option<String>,
    pub model_name: String,
}

impl InferenceSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = read_var("VLLM_ENDPOINT").ok_or(ConfigError::MissingVar("VLLM_ENDPOINT"))?;
        Ok(Self {
            endpoint,
            bearer_token: read_var("BEARER_TOKEN"),
            model_name: read_var("MODEL_NAME").unwrap_or_else(|| DEFAULT_INFERENCE_MODEL.to_string()),
        })
    }

    /// False when the endpoint still carries the sample placeholder.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.contains(ENDPOINT_PLACEHOLDER)
    }
}

/// Re-rank service settings.
#[derive(Debug, Clone)]
pub struct RerankSettings {
    pub port: u16,
    pub model_dir: PathBuf,
}

impl RerankSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match read_var("RERANK_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                name: "RERANK_PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_RERANK_PORT,
        };
        let model_dir = read_var("RERANK_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RERANK_MODEL_DIR));
        Ok(Self { port, model_dir })
    }
}

/// Read an environment variable, treating empty values as unset.
fn read_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
