use super::types::PdfExtractor;
use super::ExtractionError;

/// PDF text-layer extractor using the pdf-extract crate.
/// Pages with no embedded text come back as empty strings.
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        // pdf-extract panics on some malformed font tables; keep that inside the file's attempt.
        let result = std::panic::catch_unwind(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        })
        .map_err(|_| ExtractionError::PdfParsing("text layer decoder panicked".into()))?;

        result.map_err(|e| {
            let message = e.to_string();
            if message.to_ascii_lowercase().contains("encrypt") {
                ExtractionError::PdfEncrypted
            } else {
                ExtractionError::PdfParsing(message)
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Generate a valid PDF with one text page per entry using lopdf.
    /// An empty entry yields a page with no text operators.
    pub(crate) fn make_test_pdf(page_texts: &[&str]) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Document, Object, Stream};

        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();

        for text in page_texts {
            let content = if text.is_empty() {
                String::new()
            } else {
                format!("BT /F1 12 Tf 72 700 Td ({text}) Tj ET")
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn extract_text_from_digital_pdf() {
        let extractor = PdfTextExtractor;
        let pdf_bytes = make_test_pdf(&["Whole Life Protection Plan premium schedule"]);
        let pages = extractor.extract_text(&pdf_bytes).unwrap();

        assert_eq!(pages.len(), 1);
        assert!(
            pages[0].contains("Whole") || pages[0].contains("Protection"),
            "unexpected text: {}",
            pages[0]
        );
    }

    #[test]
    fn one_entry_per_page() {
        let extractor = PdfTextExtractor;
        let pdf_bytes = make_test_pdf(&["Page one body text", "", "Page three body text"]);
        let pages = extractor.extract_text(&pdf_bytes).unwrap();

        assert_eq!(pages.len(), 3);
        assert!(pages[1].trim().is_empty());
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let extractor = PdfTextExtractor;
        let result = extractor.extract_text(b"not a pdf");
        assert!(result.is_err());
    }
}
