//! DOCX text extraction.
//!
//! A `.docx` is a ZIP archive; the body lives in `word/document.xml`.
//! Paragraph text is the concatenation of its `w:t` runs, with a run-level
//! `w:tab` mapped to a tab and `w:br`/`w:cr` to a newline. Tab stops under
//! `w:pPr/w:tabs` are layout and produce nothing. Paragraphs inside
//! tables are included in document order. Empty paragraphs are dropped.

use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use super::ExtractionError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Reads the paragraph text of a DOCX package.
pub struct DocxReader;

impl DocxReader {
    /// Paragraph texts joined by `\n`.
    pub fn read_text(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = std::fs::read(path)?;
        self.read_text_from_bytes(&bytes)
    }

    pub fn read_text_from_bytes(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        Ok(self.paragraphs(Cursor::new(bytes))?.join("\n"))
    }

    /// Non-empty paragraphs in document order.
    pub fn paragraphs<R: Read + Seek>(&self, source: R) -> Result<Vec<String>, ExtractionError> {
        let mut archive = ZipArchive::new(source)
            .map_err(|e| ExtractionError::DocxParsing(format!("not a ZIP package: {e}")))?;
        let part = archive
            .by_name(DOCUMENT_PART)
            .map_err(|_| ExtractionError::DocxParsing(format!("missing {DOCUMENT_PART}")))?;
        parse_document_xml(BufReader::new(part))
    }
}

fn parse_document_xml<R: std::io::BufRead>(source: R) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();

    let mut paragraphs = Vec::new();
    // Text boxes can nest a w:p inside another; each gets its own buffer.
    let mut open: Vec<String> = Vec::new();
    let mut in_text_run = false;
    // Depth of open w:r elements; tab and break marks only count inside a run.
    let mut run_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => open.push(String::new()),
                b"r" => run_depth += 1,
                b"t" => in_text_run = true,
                b"tab" if run_depth > 0 => push_char(&mut open, '\t'),
                b"br" | b"cr" if run_depth > 0 => push_char(&mut open, '\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" if run_depth > 0 => push_char(&mut open, '\t'),
                b"br" | b"cr" if run_depth > 0 => push_char(&mut open, '\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_run => {
                let text = e
                    .unescape()
                    .map_err(|err| ExtractionError::DocxParsing(err.to_string()))?;
                if let Some(current) = open.last_mut() {
                    current.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"r" => run_depth = run_depth.saturating_sub(1),
                b"p" => {
                    if let Some(done) = open.pop() {
                        if !done.trim().is_empty() {
                            paragraphs.push(done);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionError::DocxParsing(format!(
                    "malformed document.xml at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

fn push_char(open: &mut [String], c: char) {
    if let Some(current) = open.last_mut() {
        current.push(c);
    }
}
