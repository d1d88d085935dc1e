use std::net::{Ipv4Addr, SocketAddr};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use super::scorer::SharedScorer;
use super::types::{rank, RerankRequest, RerankResponse};
use super::RerankError;

/// Build the re-rank router: `POST /rerank`.
pub fn rerank_router(scorer: SharedScorer) -> Router {
    Router::new()
        .route("/rerank", post(rerank))
        .layer(TraceLayer::new_for_http())
        .with_state(scorer)
}

async fn rerank(
    State(scorer): State<SharedScorer>,
    Json(request): Json<RerankRequest>,
) -> Result<Json<RerankResponse>, RerankError> {
    if request.documents.is_empty() {
        return Ok(Json(RerankResponse::default()));
    }

    let count = request.documents.len();
    // Model inference is CPU-bound.
    let scores = tokio::task::spawn_blocking(move || scorer.score(&request.query, &request.documents))
        .await
        .map_err(|e| RerankError::Scoring(format!("scoring task failed: {e}")))??;

    if scores.len() != count {
        return Err(RerankError::Scoring(format!(
            "scorer returned {} scores for {count} documents",
            scores.len()
        )));
    }

    tracing::debug!(documents = count, "Re-rank complete");
    Ok(Json(rank(&scores)))
}

/// Serve the router on `0.0.0.0:<port>` until Ctrl-C.
pub async fn serve(scorer: SharedScorer, port: u16) -> Result<(), RerankError> {
    let addr = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RerankError::Server(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!(%addr, "Re-rank service listening");

    axum::serve(listener, rerank_router(scorer))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Re-rank service shutting down");
        })
        .await
        .map_err(|e| RerankError::Server(e.to_string()))
}
