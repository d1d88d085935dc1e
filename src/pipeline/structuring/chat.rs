//! OpenAI-compatible `chat/completions` client used for freeform extraction
//! against self-hosted inference servers (vLLM, Ollama's OpenAI shim).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{GenerationRequest, GenerativeModel};
use super::StructuringError;

const USER_AGENT: &str = concat!("policy-extract/", env!("CARGO_PKG_VERSION"));

/// `<base>/chat/completions` when the base already names an API version,
/// otherwise `<base>/v1/chat/completions`.
pub fn chat_completions_url(endpoint: &str) -> String {
    let base = endpoint.trim().trim_end_matches('/');
    if base.contains("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

/// The token to send, if any. Unset, empty, `none` and `null` all mean "no auth".
pub fn effective_bearer_token(token: Option<&str>) -> Option<&str> {
    let token = token?.trim();
    match token.to_ascii_lowercase().as_str() {
        "" | "none" | "null" => None,
        _ => Some(token),
    }
}

pub struct ChatCompletionsClient {
    url: String,
    bearer_token: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl ChatCompletionsClient {
    pub fn new(
        endpoint: &str,
        bearer_token: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, StructuringError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Self {
            url: chat_completions_url(endpoint),
            bearer_token: effective_bearer_token(bearer_token).map(str::to_string),
            client,
            timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_credentials(&self) -> bool {
        self.bearer_token.is_some()
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_choice_content(response: ChatResponse) -> Result<String, StructuringError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| StructuringError::MalformedResponse("response has no choices".into()))
}

impl GenerativeModel for ChatCompletionsClient {
    /// Inline files are not supported by this API and are ignored; schemas
    /// are not forwarded.
    fn generate(&self, model: &str, request: &GenerationRequest) -> Result<String, StructuringError> {
        let user_text = request.text();
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &user_text,
        });

        let body = ChatRequest {
            model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        tracing::info!(url = %self.url, model, "Calling chat completions endpoint");

        let mut call = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.bearer_token {
            call = call.bearer_auth(token);
        }

        let response = call.send().map_err(|e| {
            if e.is_connect() {
                StructuringError::ProviderConnection(self.url.clone())
            } else if e.is_timeout() {
                StructuringError::HttpClient(format!("request timed out after {}s", self.timeout_secs))
            } else {
                StructuringError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::error!(
                url = %self.url,
                token_sent = self.bearer_token.is_some(),
                "Endpoint rejected credentials (401), check BEARER_TOKEN"
            );
            return Err(StructuringError::Unauthorized(self.url.clone()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StructuringError::ProviderError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| StructuringError::MalformedResponse(e.to_string()))?;
        first_choice_content(parsed)
    }
}
