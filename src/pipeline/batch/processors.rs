use super::types::DocumentProcessor;
use super::BatchError;
use crate::pipeline::extraction::{DocumentReader, SourceDocument, SourceKind};
use crate::pipeline::structuring::{PolicyRecord, PolicyStructurer, StructuringError};

/// PDF flow: the file goes to the model inline. Files above the inline limit
/// are read locally (text layer plus OCR) and sent as text instead.
pub struct PdfPolicyProcessor {
    structurer: PolicyStructurer,
    reader: DocumentReader,
}

impl PdfPolicyProcessor {
    pub fn new(structurer: PolicyStructurer, reader: DocumentReader) -> Self {
        Self { structurer, reader }
    }
}

impl DocumentProcessor for PdfPolicyProcessor {
    fn kind(&self) -> SourceKind {
        SourceKind::Pdf
    }

    fn process(&self, doc: &SourceDocument) -> Result<PolicyRecord, BatchError> {
        let bytes = std::fs::read(&doc.path).map_err(|e| BatchError::Unreadable {
            file: doc.file_name.clone(),
            reason: e.to_string(),
        })?;

        match self.structurer.extract_from_pdf(&doc.file_name, &bytes) {
            Err(StructuringError::InputTooLarge { size, limit }) => {
                tracing::warn!(
                    file = %doc.file_name,
                    size,
                    limit,
                    "PDF too large to send inline, falling back to local text extraction"
                );
                let extraction =
                    self.reader
                        .extract_pdf_bytes(&bytes)
                        .map_err(|e| BatchError::Unreadable {
                            file: doc.file_name.clone(),
                            reason: e.to_string(),
                        })?;
                let text = extraction.full_text();
                if text.trim().is_empty() {
                    return Err(BatchError::Unreadable {
                        file: doc.file_name.clone(),
                        reason: "no text could be extracted".into(),
                    });
                }
                Ok(self.structurer.extract_from_text(&doc.file_name, &text)?)
            }
            other => Ok(other?),
        }
    }
}

/// DOCX flow: paragraphs are read locally and sent as text.
pub struct DocxPolicyProcessor {
    structurer: PolicyStructurer,
    reader: DocumentReader,
}

impl DocxPolicyProcessor {
    pub fn new(structurer: PolicyStructurer, reader: DocumentReader) -> Self {
        Self { structurer, reader }
    }
}

impl DocumentProcessor for DocxPolicyProcessor {
    fn kind(&self) -> SourceKind {
        SourceKind::Docx
    }

    fn process(&self, doc: &SourceDocument) -> Result<PolicyRecord, BatchError> {
        let text = self
            .reader
            .read_docx(&doc.path)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BatchError::Unreadable {
                file: doc.file_name.clone(),
                reason: "document is unreadable or has no text".into(),
            })?;

        tracing::debug!(file = %doc.file_name, chars = text.chars().count(), "DOCX text read");
        Ok(self.structurer.extract_from_text(&doc.file_name, &text)?)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::pipeline::batch::{BatchConfig, BatchRunner, Pacer};
    use crate::pipeline::extraction::docx::tests::{make_test_docx, para};
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::{ExtractionError, PdfExtractor};
    use crate::pipeline::structuring::{ContentPart, MockModel, INLINE_FILE_LIMIT};

    const RECORD_JSON: &str = r#"{
        "basic_info": {"product_name": "安心終身壽險", "product_code": "A1", "company": "新光人壽",
                       "currency": ["TWD"], "product_type": "終身壽險", "payment_period": "20年期"},
        "conditions": {"age_range": "0-65歲", "premium_limit": "無", "fees_and_discounts": "無"},
        "coverage": {"death_benefit": "保險金額", "maturity_benefit": "無", "other_benefits": []},
        "investment": {"is_investment_linked": false, "features": [], "risks": []},
        "rag_data": {"keywords": [], "synonym_mapping": [], "target_audience": "", "faq": []}
    }"#;

    struct FixedTextLayer(&'static str);

    impl PdfExtractor for FixedTextLayer {
        fn extract_text(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
            Ok(vec![self.0.to_string()])
        }
    }

    struct NoPause;

    impl Pacer for NoPause {
        fn pause(&self, _duration: Duration) {}
    }

    fn reader(layer: &'static str) -> DocumentReader {
        DocumentReader::new(
            Box::new(FixedTextLayer(layer)),
            Box::new(MockOcrEngine::new("")),
        )
    }

    fn structurer(mock: &Arc<MockModel>) -> PolicyStructurer {
        PolicyStructurer::new(Box::new(Arc::clone(mock)), "test-model")
    }

    fn doc_at(path: &Path) -> SourceDocument {
        SourceDocument::from_path(path).unwrap()
    }

    #[test]
    fn small_pdf_is_sent_inline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.pdf");
        std::fs::write(&path, b"%PDF-1.4 tiny").unwrap();
        let mock = Arc::new(MockModel::new(RECORD_JSON));
        let processor = PdfPolicyProcessor::new(structurer(&mock), reader("unused"));

        let record = processor.process(&doc_at(&path)).unwrap();

        assert_eq!(record.source_filename, "plan.pdf");
        assert_eq!(record.basic_info.company, "新光人壽");
        let (_, request) = &mock.calls()[0];
        assert!(matches!(&request.parts[0], ContentPart::InlineFile { data, .. } if data == b"%PDF-1.4 tiny"));
    }

    #[test]
    fn oversized_pdf_falls_back_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.pdf");
        std::fs::write(&path, vec![0u8; INLINE_FILE_LIMIT + 1]).unwrap();
        let mock = Arc::new(MockModel::new(RECORD_JSON));
        let processor =
            PdfPolicyProcessor::new(structurer(&mock), reader("第一條 保險範圍與給付項目說明"));

        let record = processor.process(&doc_at(&path)).unwrap();

        assert_eq!(record.source_filename, "huge.pdf");
        assert_eq!(mock.call_count(), 1);
        let (_, request) = &mock.calls()[0];
        assert!(request
            .parts
            .iter()
            .all(|p| matches!(p, ContentPart::Text(_))));
        assert!(request.text().contains("第一條 保險範圍"));
    }

    #[test]
    fn provider_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let mock = Arc::new(MockModel::failing("503 overloaded"));
        let processor = PdfPolicyProcessor::new(structurer(&mock), reader(""));

        let err = processor.process(&doc_at(&path)).unwrap_err();

        assert!(matches!(err, BatchError::Structuring(_)));
        assert!(!err.is_severe());
    }

    #[test]
    fn docx_text_is_structured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("條款.docx");
        let body = format!("{}{}", para("安心終身壽險條款"), para("第二條 名詞定義"));
        std::fs::write(&path, make_test_docx(&body)).unwrap();
        let mock = Arc::new(MockModel::new(RECORD_JSON));
        let processor = DocxPolicyProcessor::new(structurer(&mock), reader(""));

        let record = processor.process(&doc_at(&path)).unwrap();

        assert_eq!(record.source_filename, "條款.docx");
        let (_, request) = &mock.calls()[0];
        assert!(request.text().contains("安心終身壽險條款\n第二條 名詞定義"));
    }

    #[test]
    fn empty_docx_never_reaches_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.docx");
        std::fs::write(&path, make_test_docx("")).unwrap();
        let mock = Arc::new(MockModel::new(RECORD_JSON));
        let processor = DocxPolicyProcessor::new(structurer(&mock), reader(""));

        let err = processor.process(&doc_at(&path)).unwrap_err();

        assert!(matches!(err, BatchError::Unreadable { .. }));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn gated_docx_makes_no_model_call() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw_docx");
        let output = dir.path().join("processed_json");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        std::fs::write(input.join("a.docx"), make_test_docx(&para("內容"))).unwrap();
        std::fs::write(output.join("a.json"), b"{}").unwrap();

        let mock = Arc::new(MockModel::new(RECORD_JSON));
        let processor = DocxPolicyProcessor::new(structurer(&mock), reader(""));
        let config = BatchConfig::for_kind(SourceKind::Docx, input, output);
        let summary = BatchRunner::new(Box::new(processor), config)
            .with_pacer(Box::new(NoPause))
            .run()
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(mock.call_count(), 0);
    }
}
