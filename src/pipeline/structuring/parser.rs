use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::types::{InsuranceMetadata, UNKNOWN};
use super::StructuringError;

static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*(?:\r?\n)?").unwrap());

static CLOSING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\r?\n)?[ \t]*```$").unwrap());

/// Remove a leading ```` ```json ```` (or bare ```` ``` ````) marker and a
/// trailing ```` ``` ```` marker, then trim.
pub fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let start = OPENING_FENCE.find(trimmed).map_or(0, |m| m.end());
    let body = &trimmed[start..];
    let end = CLOSING_FENCE.find(body).map_or(body.len(), |m| m.start());
    body[..end].trim()
}

/// Outermost `{ ... }` span, for responses with chatter around the object.
pub fn find_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a model response into `T`, tolerating fences and surrounding prose.
pub fn parse_json_payload<T: DeserializeOwned>(raw: &str) -> Result<T, StructuringError> {
    let cleaned = strip_markdown_fences(raw);
    match serde_json::from_str(cleaned) {
        Ok(value) => Ok(value),
        Err(first_error) => match find_json_object(cleaned) {
            Some(object) if object.len() < cleaned.len() => serde_json::from_str(object)
                .map_err(|e| StructuringError::JsonParsing(e.to_string())),
            _ => Err(StructuringError::JsonParsing(first_error.to_string())),
        },
    }
}

/// Result of freeform metadata parsing: either the model's answer or the
/// sentinel record, with the reason it was substituted.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(InsuranceMetadata),
    Fallback {
        metadata: InsuranceMetadata,
        reason: String,
    },
}

impl ParseOutcome {
    pub fn fallback(reason: impl Into<String>) -> Self {
        ParseOutcome::Fallback {
            metadata: InsuranceMetadata::fallback(),
            reason: reason.into(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ParseOutcome::Fallback { .. })
    }

    pub fn metadata(&self) -> &InsuranceMetadata {
        match self {
            ParseOutcome::Parsed(metadata) | ParseOutcome::Fallback { metadata, .. } => metadata,
        }
    }

    pub fn into_metadata(self) -> InsuranceMetadata {
        match self {
            ParseOutcome::Parsed(metadata) | ParseOutcome::Fallback { metadata, .. } => metadata,
        }
    }
}

/// Parse freeform model output into metadata, substituting the sentinel
/// record when no JSON object can be recovered.
pub fn parse_with_fallback(raw: &str) -> ParseOutcome {
    match parse_json_payload::<Value>(raw) {
        Ok(Value::Object(map)) => ParseOutcome::Parsed(metadata_from_map(&map)),
        Ok(other) => ParseOutcome::fallback(format!("expected a JSON object, got {}", kind_of(&other))),
        Err(e) => ParseOutcome::fallback(e.to_string()),
    }
}

/// Lenient field mapping: strings, numbers and string arrays are accepted
/// wherever a text or list field is expected.
fn metadata_from_map(map: &Map<String, Value>) -> InsuranceMetadata {
    InsuranceMetadata {
        product_name: text_field(map.get("product_name")).unwrap_or_else(|| UNKNOWN.to_string()),
        product_code: text_field(map.get("product_code")),
        insurance_type: list_field(map.get("insurance_type")),
        benefits: list_field(map.get("benefits")),
        currency: text_field(map.get("currency")).unwrap_or_else(|| UNKNOWN.to_string()),
        target_audience: text_field(map.get("target_audience")),
    }
}

fn text_field(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn list_field(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => vec![],
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
