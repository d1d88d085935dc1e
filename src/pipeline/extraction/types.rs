use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Container formats accepted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Docx,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Pdf => "pdf",
            SourceKind::Docx => "docx",
        }
    }

    /// Detect the kind from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(SourceKind::Pdf),
            "docx" => Some(SourceKind::Docx),
            _ => None,
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        Self::from_path(path) == Some(*self)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source file for one processing attempt.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub file_name: String,
    pub kind: SourceKind,
}

impl SourceDocument {
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let kind = SourceKind::from_path(path)
            .ok_or_else(|| ExtractionError::UnsupportedFormat(path.display().to_string()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ExtractionError::UnsupportedFormat(path.display().to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            kind,
        })
    }
}

/// How a page's text was obtained
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    TextLayer,
    OcrFallback,
}

/// Text recovered from a single PDF page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedPage {
    /// 1-indexed
    pub page_number: usize,
    pub content: String,
    pub extraction_method: ExtractionMethod,
}

/// Per-page result of reading one PDF, with the diagnostic list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfExtraction {
    pub pages: Vec<ExtractedPage>,
    pub debug_info: Vec<String>,
}

impl PdfExtraction {
    /// Page contents in order, each followed by a newline.
    pub fn full_text(&self) -> String {
        let mut text = String::new();
        for page in &self.pages {
            text.push_str(&page.content);
            text.push('\n');
        }
        text
    }

    pub fn ocr_page_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.extraction_method == ExtractionMethod::OcrFallback)
            .count()
    }
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine {
    /// Recognize text in an encoded image using a Tesseract-style language hint
    /// (e.g. `chi_tra+eng`).
    fn ocr_image(&self, image_bytes: &[u8], lang: &str) -> Result<String, ExtractionError>;
}

/// PDF text-layer extraction abstraction
pub trait PdfExtractor {
    /// Raw embedded text for each page, in page order.
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Rasterizes PDF pages for OCR.
pub trait PdfPageRenderer {
    /// Render a 0-indexed page to PNG bytes.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}
