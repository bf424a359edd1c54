//! Word (.docx) text extraction.
//!
//! A .docx file is a zip container; the body lives in `word/document.xml`.
//! Each `<w:p>` paragraph becomes one line of output, including paragraphs
//! nested inside tables. Text is taken only from `<w:t>` runs. A paragraph
//! nested inside another (text-box content) is emitted inline in its
//! enclosing paragraph.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::DecodeError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Paragraph texts joined with `\n`, in document order.
pub fn extract_text(bytes: &[u8]) -> Result<String, DecodeError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DecodeError::Docx(format!("not a zip container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| DecodeError::Docx(format!("{DOCUMENT_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| DecodeError::Docx(format!("{DOCUMENT_PART}: {e}")))?;

    Ok(paragraphs(&xml)?.join("\n"))
}

fn paragraphs(xml: &str) -> Result<Vec<String>, DecodeError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut out = Vec::new();
    // Open paragraphs, innermost last. Text boxes nest paragraphs.
    let mut open: Vec<String> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:p" => open.push(String::new()),
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:p" if open.is_empty() => out.push(String::new()),
                b"w:tab" => push_str(&mut open, "\t"),
                b"w:br" | b"w:cr" => push_str(&mut open, "\n"),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_text && let Ok(text) = e.unescape() {
                    push_str(&mut open, &text);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    if let Some(paragraph) = open.pop() {
                        match open.last_mut() {
                            Some(enclosing) => enclosing.push_str(&paragraph),
                            None => out.push(paragraph),
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DecodeError::Docx(format!(
                    "malformed XML at byte {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

fn push_str(open: &mut [String], s: &str) {
    if let Some(current) = open.last_mut() {
        current.push_str(s);
    }
}
