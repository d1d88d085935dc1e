pub mod types;
pub mod pdf;
pub mod pdfium;
pub mod ocr;
pub mod docx;
pub mod orchestrator;

pub use types::*;
pub use pdf::*;
pub use docx::*;
pub use orchestrator::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("OCR engine not available in this build")]
    OcrUnavailable,

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF is password protected")]
    PdfEncrypted,

    #[error("PDF page {page} rendering failed: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("DOCX parsing failed: {0}")]
    DocxParsing(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),
}
