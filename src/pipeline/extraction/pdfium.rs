//! Page rasterization via PDFium, feeding the OCR fallback.
//!
//! `PdfiumRenderer` holds no library handle: the upstream `Pdfium` type is
//! `!Send`, so each call binds the dynamic library again. The OS caches the
//! `dlopen`, so repeat binds are cheap.

use std::io::Cursor;

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::PdfPageRenderer;
use super::ExtractionError;

/// Upper bound on either side of a rendered page.
const MAX_DIMENSION_PX: u32 = 4096;

const POINTS_PER_INCH: f32 = 72.0;

/// Renders PDF pages to PNG using the PDFium dynamic library.
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Fails when no PDFium library can be bound.
    ///
    /// Lookup: `PDFIUM_DYNAMIC_LIB_PATH`, then the executable's directory,
    /// then the system library path.
    pub fn new() -> Result<Self, ExtractionError> {
        let _ = bind_pdfium()?;
        Ok(Self)
    }
}

fn bind_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Binding PDFium from PDFIUM_DYNAMIC_LIB_PATH");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| ExtractionError::PdfRendering {
            page: 0,
            reason: format!("cannot load PDFium from {path}: {e}"),
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
    {
        let lib_path =
            Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            debug!(dir = %exe_dir.display(), "Bound PDFium next to executable");
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| ExtractionError::PdfRendering {
        page: 0,
        reason: format!("PDFium not found; set PDFIUM_DYNAMIC_LIB_PATH: {e}"),
    })?;
    Ok(Pdfium::new(bindings))
}

fn map_load_error(e: PdfiumError) -> ExtractionError {
    let msg = e.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PdfEncrypted
    } else {
        ExtractionError::PdfRendering {
            page: 0,
            reason: format!("cannot open PDF: {msg}"),
        }
    }
}

/// Pixel size for a page at `dpi`, scaled down to fit `MAX_DIMENSION_PX`
/// with aspect ratio kept. Both sides are at least 1.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let longest = raw_w.max(raw_h);
    if longest <= MAX_DIMENSION_PX as f32 {
        return (raw_w as u32, raw_h as u32);
    }
    let ratio = MAX_DIMENSION_PX as f32 / longest;
    (
        ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX),
        ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX),
    )
}

impl PdfPageRenderer for PdfiumRenderer {
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let pdfium = bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;
        let pages = document.pages();

        let index = u16::try_from(page_index).map_err(|_| ExtractionError::PdfRendering {
            page: page_index + 1,
            reason: "page index exceeds u16".into(),
        })?;
        let page = pages.get(index).map_err(|_| ExtractionError::PdfRendering {
            page: page_index + 1,
            reason: format!("out of range (document has {} pages)", pages.len()),
        })?;

        let (width_pt, height_pt) = (page.width().value, page.height().value);
        let (target_w, target_h) = compute_render_dimensions(width_pt, height_pt, dpi);
        let uncapped_w = (width_pt * dpi as f32 / POINTS_PER_INCH) as u32;
        if target_w < uncapped_w {
            warn!(
                page = page_index + 1,
                uncapped_w,
                target_w,
                target_h,
                "Page raster capped to {MAX_DIMENSION_PX}px"
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::PdfRendering {
                page: page_index + 1,
                reason: e.to_string(),
            })?;

        let mut cursor = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
        let png = cursor.into_inner();

        debug!(page = page_index + 1, target_w, target_h, bytes = png.len(), "Rendered page");
        Ok(png)
    }
}

/// Renderer for tests: returns a 1x1 PNG for every page in range and can be
/// told to fail on one page.
pub struct MockPdfPageRenderer {
    pages: usize,
    failing_page: Option<usize>,
}

impl MockPdfPageRenderer {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            failing_page: None,
        }
    }

    /// Make rendering of the given 0-indexed page fail.
    pub fn failing_on(mut self, page_index: usize) -> Self {
        self.failing_page = Some(page_index);
        self
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_index: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        if page_index >= self.pages || self.failing_page == Some(page_index) {
            return Err(ExtractionError::PdfRendering {
                page: page_index + 1,
                reason: "mock render failure".into(),
            });
        }
        Ok(minimal_png())
    }
}

/// 1x1 white RGB PNG.
fn minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // signature
        0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01,
        0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53,
        0xDE,
        0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, // IDAT
        0x08, 0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00,
        0x00, 0x02, 0x00, 0x01, 0xE2, 0x21, 0xBC, 0x33,
        0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, // IEND
        0xAE, 0x42, 0x60, 0x82,
    ]
}
