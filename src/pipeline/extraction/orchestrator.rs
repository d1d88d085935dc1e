use std::path::Path;

use super::docx::DocxReader;
use super::ocr::build_ocr_engine;
use super::pdf::PdfTextExtractor;
use super::pdfium::PdfiumRenderer;
use super::types::{
    ExtractedPage, ExtractionMethod, OcrEngine, PdfExtraction, PdfExtractor, PdfPageRenderer,
    SourceDocument, SourceKind,
};
use super::ExtractionError;

/// Pages whose trimmed text layer is shorter than this are OCR'd.
pub const OCR_MIN_TEXT_CHARS: usize = 10;

/// Rasterization resolution for OCR.
pub const OCR_RENDER_DPI: u32 = 300;

/// Tesseract language hint: Traditional Chinese plus English.
pub const OCR_LANGUAGES: &str = "chi_tra+eng";

/// Reads PDF and DOCX sources into plain text.
/// Uses trait objects for text-layer extraction, rendering and OCR so each can be mocked.
pub struct DocumentReader {
    pdf_extractor: Box<dyn PdfExtractor + Send + Sync>,
    pdf_renderer: Option<Box<dyn PdfPageRenderer + Send + Sync>>,
    ocr_engine: Box<dyn OcrEngine + Send + Sync>,
    docx_reader: DocxReader,
}

impl DocumentReader {
    pub fn new(
        pdf_extractor: Box<dyn PdfExtractor + Send + Sync>,
        ocr_engine: Box<dyn OcrEngine + Send + Sync>,
    ) -> Self {
        Self {
            pdf_extractor,
            pdf_renderer: None,
            ocr_engine,
            docx_reader: DocxReader,
        }
    }

    /// Add a page renderer; without one, near-empty pages are recorded as OCR failures.
    pub fn with_pdf_renderer(mut self, renderer: Box<dyn PdfPageRenderer + Send + Sync>) -> Self {
        self.pdf_renderer = Some(renderer);
        self
    }

    /// Per-page text of a PDF, or `None` when the file cannot be read at all.
    pub fn read_pdf(&self, path: &Path) -> Option<PdfExtraction> {
        let result = std::fs::read(path)
            .map_err(ExtractionError::from)
            .and_then(|bytes| self.extract_pdf_bytes(&bytes));
        match result {
            Ok(extraction) => Some(extraction),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "PDF could not be read");
                None
            }
        }
    }

    /// Text layer per page, with OCR fallback for near-empty pages.
    ///
    /// Pages that end up with no text (including OCR failures) are left out
    /// and noted in `debug_info`. Zero-page documents are an error.
    pub fn extract_pdf_bytes(&self, pdf_bytes: &[u8]) -> Result<PdfExtraction, ExtractionError> {
        let layer_pages = self.pdf_extractor.extract_text(pdf_bytes)?;
        if layer_pages.is_empty() {
            return Err(ExtractionError::PdfParsing("PDF has 0 pages".into()));
        }

        let mut extraction = PdfExtraction::default();

        for (page_idx, layer_text) in layer_pages.iter().enumerate() {
            let page_number = page_idx + 1;

            let (text, method) = if layer_text.trim().chars().count() < OCR_MIN_TEXT_CHARS {
                match self.ocr_page(pdf_bytes, page_idx) {
                    Ok(text) => (text, ExtractionMethod::OcrFallback),
                    Err(e) => {
                        tracing::warn!(page = page_number, error = %e, "OCR fallback failed");
                        extraction
                            .debug_info
                            .push(format!("Page {page_number} OCR failed: {e}"));
                        continue;
                    }
                }
            } else {
                (layer_text.clone(), ExtractionMethod::TextLayer)
            };

            let content = text.trim();
            if content.is_empty() {
                extraction.debug_info.push(format!(
                    "Page {page_number}: No text layer found. (Likely scanned image or encrypted)"
                ));
                continue;
            }

            extraction.pages.push(ExtractedPage {
                page_number,
                content: content.to_string(),
                extraction_method: method,
            });
        }

        tracing::info!(
            pages = layer_pages.len(),
            kept = extraction.pages.len(),
            ocr_pages = extraction.ocr_page_count(),
            diagnostics = extraction.debug_info.len(),
            "PDF text extraction complete"
        );

        Ok(extraction)
    }

    fn ocr_page(&self, pdf_bytes: &[u8], page_idx: usize) -> Result<String, ExtractionError> {
        let renderer = self
            .pdf_renderer
            .as_ref()
            .ok_or_else(|| ExtractionError::PdfRendering {
                page: page_idx + 1,
                reason: "no page renderer available".into(),
            })?;
        let image = renderer.render_page(pdf_bytes, page_idx, OCR_RENDER_DPI)?;
        self.ocr_engine.ocr_image(&image, OCR_LANGUAGES)
    }

    /// Non-empty paragraphs joined by newlines, or `None` for unreadable packages.
    pub fn read_docx(&self, path: &Path) -> Option<String> {
        match self.docx_reader.read_text(path) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "DOCX could not be read");
                None
            }
        }
    }

    /// Plain text of any supported source.
    pub fn read(&self, doc: &SourceDocument) -> Option<String> {
        match doc.kind {
            SourceKind::Pdf => self.read_pdf(&doc.path).map(|e| e.full_text()),
            SourceKind::Docx => self.read_docx(&doc.path),
        }
    }
}

/// Reader with production implementations.
///
/// - Text layer: `PdfTextExtractor`
/// - Rendering: `PdfiumRenderer` when the PDFium library can be bound
/// - OCR: `TesseractOcr` (feature-gated) or `UnavailableOcrEngine`
pub fn build_document_reader() -> DocumentReader {
    let reader = DocumentReader::new(Box::new(PdfTextExtractor), build_ocr_engine());
    match PdfiumRenderer::new() {
        Ok(renderer) => reader.with_pdf_renderer(Box::new(renderer)),
        Err(e) => {
            tracing::warn!(error = %e, "PDFium unavailable, scanned pages cannot be OCR'd");
            reader
        }
    }
}
