use std::time::Duration;

use super::types::{RerankRequest, RerankResponse};
use super::{ErrorBody, RerankError};

/// Blocking client for a running re-rank service.
pub struct RerankClient {
    url: String,
    client: reqwest::blocking::Client,
}

impl RerankClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, RerankError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RerankError::Client(e.to_string()))?;
        Ok(Self {
            url: format!("{}/rerank", base_url.trim().trim_end_matches('/')),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn rerank(&self, query: &str, documents: &[String]) -> Result<RerankResponse, RerankError> {
        let body = RerankRequest {
            query: query.to_string(),
            documents: documents.to_vec(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|e| RerankError::Client(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.detail)
                .unwrap_or(text);
            return Err(RerankError::Remote {
                status: status.as_u16(),
                detail,
            });
        }

        response
            .json()
            .map_err(|e| RerankError::Client(format!("invalid response body: {e}")))
    }
}
