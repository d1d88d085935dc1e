use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::types::OcrEngine;
use super::ExtractionError;

/// Tesseract-backed OCR.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    tessdata_dir: PathBuf,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    /// Requires `eng.traineddata` in `tessdata_dir`. A missing `chi_tra`
    /// model is only warned about; Tesseract reports it per call.
    pub fn new(tessdata_dir: &std::path::Path) -> Result<Self, ExtractionError> {
        if !tessdata_dir.join("eng.traineddata").exists() {
            return Err(ExtractionError::TessdataNotFound(tessdata_dir.to_path_buf()));
        }
        if !tessdata_dir.join("chi_tra.traineddata").exists() {
            tracing::warn!(
                tessdata = %tessdata_dir.display(),
                "chi_tra.traineddata missing, Traditional Chinese pages will fail OCR"
            );
        }
        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
        })
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn ocr_image(&self, image_bytes: &[u8], lang: &str) -> Result<String, ExtractionError> {
        let tessdata = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| ExtractionError::OcrInit("tessdata path is not UTF-8".into()))?;

        let mut tess = tesseract::Tesseract::new(Some(tessdata), Some(lang))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        tess.get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))
    }
}

/// Stand-in used when OCR cannot run; every call fails, so scanned pages are
/// reported as OCR failures rather than silently blank.
pub struct UnavailableOcrEngine;

impl OcrEngine for UnavailableOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8], _lang: &str) -> Result<String, ExtractionError> {
        Err(ExtractionError::OcrUnavailable)
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    result: Result<String, String>,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8], _lang: &str) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map_err(ExtractionError::OcrProcessing)
    }
}

impl<T: OcrEngine + ?Sized> OcrEngine for std::sync::Arc<T> {
    fn ocr_image(&self, image_bytes: &[u8], lang: &str) -> Result<String, ExtractionError> {
        (**self).ocr_image(image_bytes, lang)
    }
}

/// Pick the OCR engine for this build and machine.
pub fn build_ocr_engine() -> Box<dyn OcrEngine + Send + Sync> {
    #[cfg(feature = "ocr")]
    {
        match find_tessdata_dir().and_then(|dir| TesseractOcr::new(&dir).map(|e| (dir, e))) {
            Ok((dir, engine)) => {
                tracing::info!(tessdata = %dir.display(), "Tesseract OCR initialized");
                return Box::new(engine);
            }
            Err(e) => tracing::warn!(error = %e, "Tesseract unavailable, scanned pages will be skipped"),
        }
    }

    #[cfg(not(feature = "ocr"))]
    tracing::info!("Built without the `ocr` feature, scanned pages will be skipped");

    Box::new(UnavailableOcrEngine)
}

/// Locate a tessdata directory: `TESSDATA_PREFIX` first, then common system paths.
pub fn find_tessdata_dir() -> Result<PathBuf, ExtractionError> {
    if let Ok(path) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&path);
        if p.join("eng.traineddata").exists() {
            return Ok(p);
        }
        // Some installs point the prefix at the parent of tessdata/.
        let nested = p.join("tessdata");
        if nested.join("eng.traineddata").exists() {
            return Ok(nested);
        }
    }

    let candidates = [
        "/usr/share/tesseract-ocr/5/tessdata",
        "/usr/share/tesseract-ocr/4.00/tessdata",
        "/usr/share/tessdata",
        "/usr/local/share/tessdata",
        "/opt/homebrew/share/tessdata",
    ];
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.join("eng.traineddata").exists())
        .ok_or_else(|| ExtractionError::TessdataNotFound(PathBuf::from("TESSDATA_PREFIX")))
}
