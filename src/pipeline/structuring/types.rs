use serde::{Deserialize, Deserializer, Serialize};

use super::StructuringError;

/// Full structured record for one policy document.
///
/// Every group and field is always serialized. Fields the model leaves out
/// or sets to null deserialize to the type's empty value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyRecord {
    #[serde(deserialize_with = "nullable")]
    pub basic_info: BasicInfo,
    #[serde(deserialize_with = "nullable")]
    pub conditions: Conditions,
    #[serde(deserialize_with = "nullable")]
    pub coverage: Coverage,
    #[serde(deserialize_with = "nullable")]
    pub investment: Investment,
    #[serde(deserialize_with = "nullable")]
    pub rag_data: RagData,
    /// Name of the originating file, set before persistence.
    #[serde(deserialize_with = "nullable")]
    pub source_filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicInfo {
    #[serde(deserialize_with = "nullable")]
    pub product_name: String,
    /// Filing or approval reference number.
    #[serde(deserialize_with = "nullable")]
    pub product_code: String,
    #[serde(deserialize_with = "nullable")]
    pub company: String,
    #[serde(deserialize_with = "nullable")]
    pub currency: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub product_type: String,
    #[serde(deserialize_with = "nullable")]
    pub payment_period: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conditions {
    #[serde(deserialize_with = "nullable")]
    pub age_range: String,
    #[serde(deserialize_with = "nullable")]
    pub premium_limit: String,
    #[serde(deserialize_with = "nullable")]
    pub fees_and_discounts: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Coverage {
    #[serde(deserialize_with = "nullable")]
    pub death_benefit: String,
    #[serde(deserialize_with = "nullable")]
    pub maturity_benefit: String,
    #[serde(deserialize_with = "nullable")]
    pub other_benefits: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Investment {
    #[serde(deserialize_with = "nullable")]
    pub is_investment_linked: bool,
    #[serde(deserialize_with = "nullable")]
    pub features: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagData {
    #[serde(deserialize_with = "nullable")]
    pub keywords: Vec<String>,
    /// Colloquial phrasing mapped to the policy's formal terms.
    #[serde(deserialize_with = "nullable")]
    pub synonym_mapping: Vec<SynonymEntry>,
    #[serde(deserialize_with = "nullable")]
    pub target_audience: String,
    #[serde(deserialize_with = "nullable")]
    pub faq: Vec<FaqItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynonymEntry {
    #[serde(deserialize_with = "nullable")]
    pub slang: String,
    #[serde(deserialize_with = "nullable")]
    pub formal: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaqItem {
    #[serde(deserialize_with = "nullable")]
    pub q: String,
    #[serde(deserialize_with = "nullable")]
    pub a: String,
}

/// `null` becomes `T::default()`.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Six-field summary produced by freeform extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceMetadata {
    pub product_name: String,
    pub product_code: Option<String>,
    pub insurance_type: Vec<String>,
    pub benefits: Vec<String>,
    pub currency: String,
    pub target_audience: Option<String>,
}

/// Marker value for fields that could not be extracted.
pub const UNKNOWN: &str = "Unknown";

impl InsuranceMetadata {
    /// Sentinel record substituted when extraction fails.
    pub fn fallback() -> Self {
        Self {
            product_name: UNKNOWN.to_string(),
            product_code: None,
            insurance_type: vec![],
            benefits: vec![],
            currency: UNKNOWN.to_string(),
            target_audience: None,
        }
    }
}

impl Default for InsuranceMetadata {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Output of the single-file entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub metadata: InsuranceMetadata,
    pub full_text: String,
}

/// One piece of request content.
#[derive(Debug, Clone)]
pub enum ContentPart {
    Text(String),
    InlineFile { mime_type: String, data: Vec<u8> },
}

/// Provider-neutral generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub parts: Vec<ContentPart>,
    /// When set, the provider is asked for JSON conforming to this schema.
    pub response_schema: Option<serde_json::Value>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(temperature: f32) -> Self {
        Self {
            system: None,
            parts: Vec::new(),
            response_schema: None,
            temperature,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(ContentPart::Text(text.into()));
        self
    }

    pub fn with_file(mut self, mime_type: &str, data: Vec<u8>) -> Self {
        self.parts.push(ContentPart::InlineFile {
            mime_type: mime_type.to_string(),
            data,
        });
        self
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Text parts only, joined by blank lines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::InlineFile { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Generative-model provider abstraction (allows mocking)
pub trait GenerativeModel {
    /// Send one request to `model` and return the response text.
    fn generate(&self, model: &str, request: &GenerationRequest) -> Result<String, StructuringError>;
}

impl<T: GenerativeModel + ?Sized> GenerativeModel for std::sync::Arc<T> {
    fn generate(&self, model: &str, request: &GenerationRequest) -> Result<String, StructuringError> {
        (**self).generate(model, request)
    }
}
