pub mod types;
pub mod schema;
pub mod prompt;
pub mod parser;
pub mod gemini;
pub mod chat;
pub mod orchestrator;

pub use types::*;
pub use parser::*;
pub use gemini::*;
pub use chat::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Model provider unreachable at {0}")]
    ProviderConnection(String),

    #[error("Model provider returned error (status {status}): {body}")]
    ProviderError { status: u16, body: String },

    #[error("Model provider rejected credentials (401) for {0}")]
    Unauthorized(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Input text is empty")]
    EmptyInput,

    #[error("File of {size} bytes exceeds the inline upload limit of {limit} bytes")]
    InputTooLarge { size: usize, limit: usize },
}
