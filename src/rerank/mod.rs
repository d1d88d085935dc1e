//! Re-rank service: scores `(query, document)` pairs with a cross-encoder and
//! returns documents ordered by relevance.
//!
//! ```text
//! POST /rerank {query, documents} → scorer (blocking pool) → rank → {scores, indices}
//! ```

pub mod types;
pub mod scorer;
pub mod router;
pub mod client;

pub use types::*;
pub use scorer::*;
pub use router::{rerank_router, serve};
pub use client::RerankClient;

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Model initialization failed: {0}")]
    ModelInit(String),

    #[error("Re-rank model support not compiled in (enable the `onnx-rerank` feature)")]
    ModelUnavailable,

    #[error("Tokenization error: {0}")]
    Tokenization(String),

    #[error("Scoring failed: {0}")]
    Scoring(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Re-rank request failed: {0}")]
    Client(String),

    #[error("Re-rank service returned status {status}: {detail}")]
    Remote { status: u16, detail: String },
}

/// FastAPI-style error body: `{"detail": "<message>"}`.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for RerankError {
    fn into_response(self) -> Response {
        // Scorer messages go out verbatim; other errors keep their context.
        let detail = match self {
            RerankError::Scoring(message) => message,
            other => other.to_string(),
        };
        tracing::error!(detail = %detail, "Re-rank request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { detail })).into_response()
    }
}
