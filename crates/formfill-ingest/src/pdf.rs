use std::panic::{AssertUnwindSafe, catch_unwind};

use lopdf::Document;

use crate::DecodeError;

/// Concatenate the text of every page, in page order, with no separator.
///
/// A page whose text cannot be extracted contributes an empty string; only a
/// document that cannot be loaded at all is an error.
pub fn extract_text(bytes: &[u8]) -> Result<String, DecodeError> {
    // lopdf can panic on malformed object streams rather than returning Err.
    let document = catch_unwind(|| Document::load_mem(bytes))
        .map_err(|_| DecodeError::Pdf("decoder panicked while loading document".into()))?
        .map_err(|e| DecodeError::Pdf(e.to_string()))?;

    let pages = document.get_pages();
    let mut text = String::new();
    let mut unreadable = 0usize;

    for &page_number in pages.keys() {
        match catch_unwind(AssertUnwindSafe(|| document.extract_text(&[page_number]))) {
            Ok(Ok(page_text)) => text.push_str(&page_text),
            Ok(Err(e)) => {
                unreadable += 1;
                tracing::debug!(page = page_number, error = %e, "page text unreadable");
            }
            Err(_) => {
                unreadable += 1;
                tracing::debug!(page = page_number, "page text extraction panicked");
            }
        }
    }

    if unreadable > 0 {
        tracing::info!(pages = pages.len(), unreadable, "some PDF pages had no extractable text");
    }

    Ok(text)
}
