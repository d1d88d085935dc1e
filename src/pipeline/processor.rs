//! Single-document parse: read text locally, then summarize it through the
//! freeform inference endpoint.
//!
//! The result always has the `{metadata, full_text}` shape; read failures
//! and provider failures degrade to empty text and the sentinel metadata.

use std::path::Path;

use serde::Serialize;

use crate::pipeline::diagnostic;
use crate::pipeline::extraction::{DocumentReader, ExtractedPage, SourceKind};
use crate::pipeline::structuring::{InsuranceMetadata, MetadataExtractor, ParsedDocument};

pub const SKIPPED_LLM_NOTE: &str = "Skipped LLM call: VLLM_ENDPOINT not configured.";

/// Where the metadata in a [`ParseReport`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    Model,
    /// Model was called but failed or returned unusable output.
    Fallback,
    /// No text, or no endpoint configured.
    NotRequested,
}

/// Everything one parse produced. Only `document` goes to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct ParseReport {
    pub document: ParsedDocument,
    pub pages: Vec<ExtractedPage>,
    pub debug_info: Vec<String>,
    pub metadata_source: MetadataSource,
}

#[derive(Serialize)]
struct SourceInfo<'a> {
    path: String,
    kind: Option<&'a str>,
    size_bytes: Option<u64>,
    parsed_at: String,
}

pub struct PolicyParser {
    reader: DocumentReader,
    /// `None` when the endpoint is not configured.
    metadata: Option<MetadataExtractor>,
}

impl PolicyParser {
    pub fn new(reader: DocumentReader, metadata: Option<MetadataExtractor>) -> Self {
        Self { reader, metadata }
    }

    pub fn parse(&self, path: &Path) -> ParseReport {
        let dump_dir = diagnostic::dump_dir_for(path);
        let kind = SourceKind::from_path(path);

        if let Some(dir) = &dump_dir {
            let info = SourceInfo {
                path: path.display().to_string(),
                kind: kind.map(|k| k.as_str()),
                size_bytes: std::fs::metadata(path).ok().map(|m| m.len()),
                parsed_at: chrono::Utc::now().to_rfc3339(),
            };
            diagnostic::dump_json(dir, "00-source-info.json", &info);
        }

        let mut pages = Vec::new();
        let mut debug_info = Vec::new();

        let full_text = match kind {
            Some(SourceKind::Pdf) => match self.reader.read_pdf(path) {
                Some(extraction) => {
                    let text = extraction.full_text();
                    pages = extraction.pages;
                    debug_info = extraction.debug_info;
                    text
                }
                None => {
                    debug_info.push(format!("Failed to read PDF: {}", path.display()));
                    String::new()
                }
            },
            Some(SourceKind::Docx) => self.reader.read_docx(path).unwrap_or_else(|| {
                debug_info.push(format!("Failed to read DOCX: {}", path.display()));
                String::new()
            }),
            None => {
                tracing::warn!(file = %path.display(), "Unsupported file type");
                debug_info.push(format!("Unsupported file type: {}", path.display()));
                String::new()
            }
        };

        if let Some(dir) = &dump_dir {
            diagnostic::dump_json(dir, "01-pages.json", &pages);
        }

        let (metadata, metadata_source) = if full_text.is_empty() {
            (InsuranceMetadata::fallback(), MetadataSource::NotRequested)
        } else if let Some(extractor) = &self.metadata {
            let attempt = extractor.extract(&full_text);
            if let Some(dir) = &dump_dir {
                diagnostic::dump_text(dir, "03-metadata-prompt.txt", &attempt.user_prompt);
                if let Some(raw) = &attempt.raw_response {
                    diagnostic::dump_text(dir, "04-metadata-response.txt", raw);
                }
            }
            let source = if attempt.outcome.is_fallback() {
                MetadataSource::Fallback
            } else {
                MetadataSource::Model
            };
            (attempt.outcome.into_metadata(), source)
        } else {
            debug_info.push(SKIPPED_LLM_NOTE.to_string());
            (InsuranceMetadata::fallback(), MetadataSource::NotRequested)
        };

        for note in &debug_info {
            tracing::debug!(file = %path.display(), note = %note, "Parse diagnostic");
        }

        let report = ParseReport {
            document: ParsedDocument {
                metadata,
                full_text,
            },
            pages,
            debug_info,
            metadata_source,
        };

        if let Some(dir) = &dump_dir {
            diagnostic::dump_json(dir, "02-debug-info.json", &report.debug_info);
            diagnostic::dump_json(dir, "05-final-result.json", &report.document);
        }

        tracing::info!(
            file = %path.display(),
            pages = report.pages.len(),
            chars = report.document.full_text.chars().count(),
            metadata_source = ?report.metadata_source,
            "Parse complete"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::extraction::docx::tests::{make_test_docx, para};
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::pdf::tests::make_test_pdf;
    use crate::pipeline::extraction::pdfium::MockPdfPageRenderer;
    use crate::pipeline::extraction::{ExtractionError, PdfExtractor, PdfTextExtractor};
    use crate::pipeline::structuring::MockModel;

    struct PagesLayer(Vec<String>);

    impl PdfExtractor for PagesLayer {
        fn extract_text(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
            Ok(self.0.clone())
        }
    }

    const PAGE: &str = "富貴年年養老保險 保單條款 第一條 契約的構成";

    fn metadata_extractor(mock: &Arc<MockModel>) -> MetadataExtractor {
        MetadataExtractor::new(Box::new(Arc::clone(mock)), "qwen2.5:7b")
    }

    #[test]
    fn pdf_with_endpoint_gets_model_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.pdf");
        std::fs::write(
            &path,
            make_test_pdf(&["Endowment Plan policy terms", "Article 1 Scope of cover"]),
        )
        .unwrap();
        let mock = Arc::new(MockModel::new(
            "```json\n{\"product_name\": \"富貴年年\", \"currency\": \"TWD\"}\n```",
        ));
        let reader = DocumentReader::new(Box::new(PdfTextExtractor), Box::new(MockOcrEngine::new("")));
        let parser = PolicyParser::new(reader, Some(metadata_extractor(&mock)));

        let report = parser.parse(&path);

        assert_eq!(report.metadata_source, MetadataSource::Model);
        assert_eq!(report.document.metadata.product_name, "富貴年年");
        assert_eq!(report.pages.len(), 2);
        assert!(report.document.full_text.contains("Scope"));
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn unconfigured_endpoint_is_noted_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let reader = DocumentReader::new(
            Box::new(PagesLayer(vec![PAGE.into()])),
            Box::new(MockOcrEngine::new("")),
        );
        let parser = PolicyParser::new(reader, None);

        let report = parser.parse(&path);

        assert_eq!(report.document.metadata, InsuranceMetadata::fallback());
        assert_eq!(report.debug_info, vec![SKIPPED_LLM_NOTE.to_string()]);
        assert_eq!(report.document.full_text, format!("{PAGE}\n"));
    }

    #[test]
    fn page_diagnostics_are_carried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let reader = DocumentReader::new(
            Box::new(PagesLayer(vec![PAGE.into(), "".into()])),
            Box::new(MockOcrEngine::failing("tessdata missing")),
        )
        .with_pdf_renderer(Box::new(MockPdfPageRenderer::new(2)));
        let mock = Arc::new(MockModel::new("{}"));
        let parser = PolicyParser::new(reader, Some(metadata_extractor(&mock)));

        let report = parser.parse(&path);

        assert_eq!(report.pages.len(), 1);
        assert_eq!(report.debug_info.len(), 1);
        assert!(report.debug_info[0].starts_with("Page 2 OCR failed:"));
    }

    #[test]
    fn unreadable_file_keeps_shape_without_calling_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.pdf");
        let mock = Arc::new(MockModel::new("{}"));
        let reader = DocumentReader::new(Box::new(PdfTextExtractor), Box::new(MockOcrEngine::new("")));
        let parser = PolicyParser::new(reader, Some(metadata_extractor(&mock)));

        let report = parser.parse(&path);

        assert_eq!(mock.call_count(), 0);
        assert_eq!(report.metadata_source, MetadataSource::NotRequested);
        let value = serde_json::to_value(&report.document).unwrap();
        assert_eq!(value["full_text"], "");
        assert_eq!(value["metadata"]["product_name"], "Unknown");
        assert!(value["metadata"]["product_code"].is_null());
    }

    #[test]
    fn provider_failure_yields_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("條款.docx");
        std::fs::write(&path, make_test_docx(&para("安心終身壽險條款"))).unwrap();
        let reader = DocumentReader::new(Box::new(PdfTextExtractor), Box::new(MockOcrEngine::new("")));
        let parser = PolicyParser::new(
            reader,
            Some(MetadataExtractor::new(Box::new(MockModel::failing("connection refused")), "m")),
        );

        let report = parser.parse(&path);

        assert_eq!(report.metadata_source, MetadataSource::Fallback);
        assert_eq!(report.document.metadata, InsuranceMetadata::fallback());
        assert_eq!(report.document.full_text, "安心終身壽險條款");
    }
}
