use super::parser::{parse_json_payload, parse_with_fallback, ParseOutcome};
use super::prompt::{
    metadata_user_prompt, text_extraction_instruction, METADATA_SYSTEM_PROMPT,
    PDF_EXTRACTION_INSTRUCTION,
};
use super::schema::policy_record_schema;
use super::types::{GenerationRequest, GenerativeModel, PolicyRecord};
use super::StructuringError;

/// Character budget for schema-constrained text extraction.
pub const TEXT_CHAR_BUDGET: usize = 30_000;

/// Character budget for freeform metadata extraction.
pub const METADATA_CHAR_BUDGET: usize = 3_000;

pub const EXTRACTION_TEMPERATURE: f32 = 0.1;

pub const METADATA_MAX_TOKENS: u32 = 1024;

/// Largest file sent inline; bigger PDFs go through text extraction instead.
pub const INLINE_FILE_LIMIT: usize = 20 * 1024 * 1024;

/// First `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Schema-constrained extraction of a full [`PolicyRecord`].
pub struct PolicyStructurer {
    model: Box<dyn GenerativeModel + Send + Sync>,
    model_name: String,
}

impl PolicyStructurer {
    pub fn new(model: Box<dyn GenerativeModel + Send + Sync>, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Send the PDF itself to the model. Fails with `InputTooLarge` above
    /// [`INLINE_FILE_LIMIT`] so the caller can fall back to text.
    pub fn extract_from_pdf(
        &self,
        file_name: &str,
        pdf_bytes: &[u8],
    ) -> Result<PolicyRecord, StructuringError> {
        if pdf_bytes.len() > INLINE_FILE_LIMIT {
            return Err(StructuringError::InputTooLarge {
                size: pdf_bytes.len(),
                limit: INLINE_FILE_LIMIT,
            });
        }
        let request = GenerationRequest::new(EXTRACTION_TEMPERATURE)
            .with_file("application/pdf", pdf_bytes.to_vec())
            .with_text(PDF_EXTRACTION_INSTRUCTION)
            .with_schema(policy_record_schema());
        self.run(file_name, &request)
    }

    /// Extract from document text, truncated to [`TEXT_CHAR_BUDGET`].
    pub fn extract_from_text(
        &self,
        file_name: &str,
        text: &str,
    ) -> Result<PolicyRecord, StructuringError> {
        if text.trim().is_empty() {
            return Err(StructuringError::EmptyInput);
        }
        let request = GenerationRequest::new(EXTRACTION_TEMPERATURE)
            .with_text(text_extraction_instruction(file_name))
            .with_text(truncate_chars(text, TEXT_CHAR_BUDGET))
            .with_schema(policy_record_schema());
        self.run(file_name, &request)
    }

    fn run(
        &self,
        file_name: &str,
        request: &GenerationRequest,
    ) -> Result<PolicyRecord, StructuringError> {
        tracing::info!(file = %file_name, model = %self.model_name, "Requesting structured extraction");

        let raw = self.model.generate(&self.model_name, request)?;
        let mut record: PolicyRecord = parse_json_payload(&raw)?;
        record.source_filename = file_name.to_string();

        tracing::info!(
            file = %file_name,
            product = %record.basic_info.product_name,
            faq = record.rag_data.faq.len(),
            "Structured extraction complete"
        );
        Ok(record)
    }
}

/// One freeform metadata call: what was sent, what came back, what it parsed to.
#[derive(Debug, Clone)]
pub struct MetadataAttempt {
    pub outcome: ParseOutcome,
    pub user_prompt: String,
    pub raw_response: Option<String>,
}

/// Freeform extraction of [`InsuranceMetadata`](super::types::InsuranceMetadata).
pub struct MetadataExtractor {
    model: Box<dyn GenerativeModel + Send + Sync>,
    model_name: String,
}

impl MetadataExtractor {
    pub fn new(model: Box<dyn GenerativeModel + Send + Sync>, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }

    /// Never fails: provider errors and unparsable output both yield the
    /// sentinel record, tagged as a fallback.
    pub fn extract(&self, document_text: &str) -> MetadataAttempt {
        let user_prompt = metadata_user_prompt(truncate_chars(document_text, METADATA_CHAR_BUDGET));
        let request = GenerationRequest::new(EXTRACTION_TEMPERATURE)
            .with_system(METADATA_SYSTEM_PROMPT.trim())
            .with_text(user_prompt.clone())
            .with_max_tokens(METADATA_MAX_TOKENS);

        match self.model.generate(&self.model_name, &request) {
            Ok(raw) => {
                let outcome = parse_with_fallback(&raw);
                if let ParseOutcome::Fallback { reason, .. } = &outcome {
                    tracing::warn!(reason = %reason, "Model output was not valid metadata JSON");
                }
                MetadataAttempt {
                    outcome,
                    user_prompt,
                    raw_response: Some(raw),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, model = %self.model_name, "Metadata extraction call failed");
                MetadataAttempt {
                    outcome: ParseOutcome::fallback(e.to_string()),
                    user_prompt,
                    raw_response: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::structuring::gemini::MockModel;
    use crate::pipeline::structuring::types::{ContentPart, InsuranceMetadata};

    const RECORD_JSON: &str = r#"{
        "basic_info": {"product_name": "富貴年年養老保險", "product_code": "113臺壽字第88號",
                       "company": "台灣人壽", "currency": ["TWD"], "product_type": "養老險",
                       "payment_period": "6年期"},
        "conditions": {"age_range": "15-70歲", "premium_limit": "無", "fees_and_discounts": "無"},
        "coverage": {"death_benefit": "保險金額", "maturity_benefit": "滿期保險金", "other_benefits": []},
        "investment": {"is_investment_linked": false, "features": [], "risks": []},
        "rag_data": {"keywords": ["養老險"], "synonym_mapping": [], "target_audience": "退休規劃族",
                     "faq": [{"q": "繳幾年？", "a": "6年"}]}
    }"#;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("保險商品", 2), "保險");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
        assert_eq!(truncate_chars("a保b", 0), "");
    }

    #[test]
    fn text_extraction_sets_source_filename() {
        let mock = Arc::new(MockModel::new(RECORD_JSON));
        let structurer = PolicyStructurer::new(Box::new(Arc::clone(&mock)), "gemini-3-flash-preview");

        let record = structurer.extract_from_text("富貴年年.docx", "條款全文").unwrap();

        assert_eq!(record.source_filename, "富貴年年.docx");
        assert_eq!(record.basic_info.company, "台灣人壽");
        let (model, request) = &mock.calls()[0];
        assert_eq!(model, "gemini-3-flash-preview");
        assert!(request.response_schema.is_some());
        assert!((request.temperature - 0.1).abs() < f32::EPSILON);
        assert!(request.text().contains("(檔名: 富貴年年.docx)"));
    }

    #[test]
    fn text_is_cut_to_budget() {
        let mock = Arc::new(MockModel::new(RECORD_JSON));
        let structurer = PolicyStructurer::new(Box::new(Arc::clone(&mock)), "m");
        let long_text = "字".repeat(TEXT_CHAR_BUDGET + 500);

        structurer.extract_from_text("long.docx", &long_text).unwrap();

        let (_, request) = &mock.calls()[0];
        match &request.parts[1] {
            ContentPart::Text(body) => assert_eq!(body.chars().count(), TEXT_CHAR_BUDGET),
            ContentPart::InlineFile { .. } => panic!("expected text part"),
        }
    }

    #[test]
    fn pdf_extraction_sends_file_inline() {
        let mock = Arc::new(MockModel::new(&format!("```json\n{RECORD_JSON}\n```")));
        let structurer = PolicyStructurer::new(Box::new(Arc::clone(&mock)), "gemini-2.5-flash-lite");

        let record = structurer.extract_from_pdf("plan.pdf", b"%PDF-1.4").unwrap();

        assert_eq!(record.source_filename, "plan.pdf");
        let (_, request) = &mock.calls()[0];
        assert!(matches!(
            &request.parts[0],
            ContentPart::InlineFile { mime_type, .. } if mime_type == "application/pdf"
        ));
        assert!(request.text().contains("product_code"));
    }

    #[test]
    fn oversized_pdf_is_rejected_before_calling() {
        let mock = Arc::new(MockModel::new(RECORD_JSON));
        let structurer = PolicyStructurer::new(Box::new(Arc::clone(&mock)), "m");
        let big = vec![0u8; INLINE_FILE_LIMIT + 1];

        let err = structurer.extract_from_pdf("big.pdf", &big).unwrap_err();

        assert!(matches!(err, StructuringError::InputTooLarge { .. }));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn empty_text_is_rejected() {
        let mock = Arc::new(MockModel::new(RECORD_JSON));
        let structurer = PolicyStructurer::new(Box::new(Arc::clone(&mock)), "m");
        assert!(matches!(
            structurer.extract_from_text("a.docx", "  \n"),
            Err(StructuringError::EmptyInput)
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn provider_failure_propagates_for_schema_mode() {
        let structurer = PolicyStructurer::new(Box::new(MockModel::failing("quota exceeded")), "m");
        let err = structurer.extract_from_text("a.docx", "text").unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn unparsable_schema_response_is_an_error() {
        let structurer = PolicyStructurer::new(Box::new(MockModel::new("not json")), "m");
        assert!(matches!(
            structurer.extract_from_text("a.docx", "text"),
            Err(StructuringError::JsonParsing(_))
        ));
    }

    #[test]
    fn metadata_request_shape() {
        let mock = Arc::new(MockModel::new(r#"{"product_name": "安心"}"#));
        let extractor = MetadataExtractor::new(Box::new(Arc::clone(&mock)), "qwen2.5:7b");
        let text = "頁".repeat(METADATA_CHAR_BUDGET * 2);

        let attempt = extractor.extract(&text);

        assert!(!attempt.outcome.is_fallback());
        assert_eq!(attempt.outcome.metadata().product_name, "安心");
        let (model, request) = &mock.calls()[0];
        assert_eq!(model, "qwen2.5:7b");
        assert_eq!(request.max_tokens, Some(METADATA_MAX_TOKENS));
        assert!(request.response_schema.is_none());
        assert!(request.system.as_deref().unwrap().contains("product_name"));
        assert_eq!(
            attempt.user_prompt.chars().filter(|c| *c == '頁').count(),
            METADATA_CHAR_BUDGET
        );
    }

    #[test]
    fn provider_failure_yields_fallback_shape() {
        let extractor = MetadataExtractor::new(Box::new(MockModel::failing("connection refused")), "m");

        let attempt = extractor.extract("保單內容");

        assert!(attempt.outcome.is_fallback());
        assert!(attempt.raw_response.is_none());
        assert_eq!(attempt.outcome.into_metadata(), InsuranceMetadata::fallback());
    }

    #[test]
    fn garbage_output_yields_fallback_with_raw_kept() {
        let extractor = MetadataExtractor::new(Box::new(MockModel::new("I cannot help")), "m");
        let attempt = extractor.extract("保單內容");
        assert!(attempt.outcome.is_fallback());
        assert_eq!(attempt.raw_response.as_deref(), Some("I cannot help"));
    }
}
