use std::sync::Mutex;
use std::time::Duration;

use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::{ContentPart, GenerationRequest, GenerativeModel};
use super::StructuringError;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Blocking client for the Gemini `generateContent` API.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, StructuringError> {
        Self::with_base_url(GEMINI_BASE_URL, api_key, timeout_secs)
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        timeout_secs: u64,
    ) -> Result<Self, StructuringError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> StructuringError {
        if e.is_connect() {
            StructuringError::ProviderConnection(self.base_url.clone())
        } else if e.is_timeout() {
            StructuringError::HttpClient(format!("request timed out after {}s", self.timeout_secs))
        } else {
            StructuringError::HttpClient(e.to_string())
        }
    }

    fn check_status(
        &self,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, StructuringError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(StructuringError::Unauthorized(self.base_url.clone()));
        }
        let body = response.text().unwrap_or_default();
        Err(StructuringError::ProviderError {
            status: status.as_u16(),
            body,
        })
    }

    /// Every model visible to the key, following pagination.
    pub fn list_models(&self) -> Result<Vec<ModelInfo>, StructuringError> {
        let url = format!("{}/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header("x-goog-api-key", &self.api_key)
                .query(&[("pageSize", "1000")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().map_err(|e| self.map_send_error(e))?;
            let page: ModelListPage = self
                .check_status(response)?
                .json()
                .map_err(|e| StructuringError::MalformedResponse(e.to_string()))?;

            models.extend(page.models);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }
}

/// One entry of the model listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Resource name, e.g. `models/gemini-2.5-flash`.
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    /// Name without the `models/` prefix.
    pub fn short_name(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelListPage {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

/// Models whose name contains `needle`, in listing order.
pub fn filter_models<'a>(models: &'a [ModelInfo], needle: &str) -> Vec<&'a ModelInfo> {
    models.iter().filter(|m| m.name.contains(needle)).collect()
}

/// `generateContent` request body for a provider-neutral request.
pub fn build_generate_body(request: &GenerationRequest) -> Value {
    let parts: Vec<Value> = request
        .parts
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => json!({ "text": text }),
            ContentPart::InlineFile { mime_type, data } => json!({
                "inlineData": {
                    "mimeType": mime_type,
                    "data": base64::engine::general_purpose::STANDARD.encode(data),
                }
            }),
        })
        .collect();

    let mut generation_config = json!({ "temperature": request.temperature });
    if let Some(schema) = &request.response_schema {
        generation_config["responseMimeType"] = json!("application/json");
        generation_config["responseSchema"] = schema.clone();
    }
    if let Some(max_tokens) = request.max_tokens {
        generation_config["maxOutputTokens"] = json!(max_tokens);
    }

    let mut body = json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": generation_config,
    });
    if let Some(system) = &request.system {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

/// Concatenated text of the first candidate.
pub fn candidate_text(response: &Value) -> Result<String, StructuringError> {
    let Some(candidate) = response["candidates"].get(0) else {
        let reason = response["promptFeedback"]["blockReason"]
            .as_str()
            .unwrap_or("no candidates returned");
        return Err(StructuringError::MalformedResponse(reason.to_string()));
    };

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let finish = candidate["finishReason"].as_str().unwrap_or("UNKNOWN");
        return Err(StructuringError::MalformedResponse(format!(
            "empty candidate (finishReason {finish})"
        )));
    }
    Ok(text)
}

impl GenerativeModel for GeminiClient {
    fn generate(&self, model: &str, request: &GenerationRequest) -> Result<String, StructuringError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = build_generate_body(request);

        tracing::debug!(model, parts = request.parts.len(), "Calling generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let payload: Value = self
            .check_status(response)?
            .json()
            .map_err(|e| StructuringError::MalformedResponse(e.to_string()))?;

        candidate_text(&payload)
    }
}

/// Scripted model for tests: returns queued responses in order (the last one
/// repeats) and records every request it receives.
pub struct MockModel {
    responses: Vec<Result<String, String>>,
    calls: Mutex<Vec<(String, GenerationRequest)>>,
}

impl MockModel {
    pub fn new(response: &str) -> Self {
        Self {
            responses: vec![Ok(response.to_string())],
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with a connection error.
    pub fn failing(reason: &str) -> Self {
        Self {
            responses: vec![Err(reason.to_string())],
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn then(mut self, response: &str) -> Self {
        self.responses.push(Ok(response.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Model name and request of every call so far.
    pub fn calls(&self) -> Vec<(String, GenerationRequest)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl GenerativeModel for MockModel {
    fn generate(&self, model: &str, request: &GenerationRequest) -> Result<String, StructuringError> {
        let index = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| StructuringError::HttpClient("mock lock poisoned".into()))?;
            calls.push((model.to_string(), request.clone()));
            calls.len() - 1
        };
        let scripted = self
            .responses
            .get(index)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_else(|| Err("no scripted response".into()));
        scripted.map_err(StructuringError::ProviderConnection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_schema_and_temperature() {
        let request = GenerationRequest::new(0.1)
            .with_text("提取資料")
            .with_schema(json!({"type": "OBJECT"}));
        let body = build_generate_body(&request);

        let config = &body["generationConfig"];
        assert!((config["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "OBJECT");
        assert!(config.get("maxOutputTokens").is_none());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "提取資料");
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn inline_file_is_base64_encoded() {
        let request = GenerationRequest::new(0.1)
            .with_file("application/pdf", b"%PDF-1.7".to_vec())
            .with_text("instruction");
        let body = build_generate_body(&request);

        let inline = &body["contents"][0]["parts"][0]["inlineData"];
        assert_eq!(inline["mimeType"], "application/pdf");
        assert_eq!(inline["data"], "JVBERi0xLjc=");
        assert_eq!(body["contents"][0]["parts"][1]["text"], "instruction");
    }

    #[test]
    fn freeform_body_has_no_schema() {
        let request = GenerationRequest::new(0.1)
            .with_system("system prompt")
            .with_text("user")
            .with_max_tokens(1024);
        let body = build_generate_body(&request);
        assert!(body["generationConfig"].get("responseSchema").is_none());
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "system prompt");
    }

    #[test]
    fn candidate_text_joins_parts() {
        let response = json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]},
                "finishReason": "STOP"
            }]
        });
        assert_eq!(candidate_text(&response).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn blocked_prompt_is_malformed_response() {
        let response = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = candidate_text(&response).unwrap_err();
        assert!(matches!(err, StructuringError::MalformedResponse(ref m) if m == "SAFETY"));
    }

    #[test]
    fn empty_candidate_reports_finish_reason() {
        let response = json!({"candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]});
        let err = candidate_text(&response).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn model_listing_parses_and_filters() {
        let page: ModelListPage = serde_json::from_value(json!({
            "models": [
                {"name": "models/gemini-2.5-flash", "displayName": "Gemini 2.5 Flash",
                 "supportedGenerationMethods": ["generateContent"]},
                {"name": "models/gemini-2.5-pro"},
                {"name": "models/gemini-2.5-flash-lite"}
            ],
            "nextPageToken": ""
        }))
        .unwrap();

        let flash = filter_models(&page.models, "flash");
        let names: Vec<&str> = flash.iter().map(|m| m.short_name()).collect();
        assert_eq!(names, vec!["gemini-2.5-flash", "gemini-2.5-flash-lite"]);
        assert_eq!(page.models[1].display_name, "");
    }

    #[test]
    fn mock_replays_script_and_records_calls() {
        let mock = MockModel::new("first").then("second");
        let request = GenerationRequest::new(0.1).with_text("x");
        assert_eq!(mock.generate("m1", &request).unwrap(), "first");
        assert_eq!(mock.generate("m2", &request).unwrap(), "second");
        assert_eq!(mock.generate("m3", &request).unwrap(), "second");
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.calls()[1].0, "m2");

        let failing = MockModel::failing("offline");
        assert!(matches!(
            failing.generate("m", &request),
            Err(StructuringError::ProviderConnection(_))
        ));
    }

    #[test]
    fn client_builds_with_trimmed_base_url() {
        let client = GeminiClient::with_base_url("http://localhost:9/v1beta/", "key", 5).unwrap();
        assert_eq!(client.base_url, "http://localhost:9/v1beta");
    }
}
