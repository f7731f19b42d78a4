// PDF text extraction
// Parses uploaded documents in memory and yields per-page text


use lopdf::Document;
use tracing::{debug, warn};

use crate::{RagError, Result};

/// Extract text from a PDF, one entry per page in document order.
///
/// Parsing and text extraction are synchronous and CPU-bound; async callers
/// should run this via `spawn_blocking`.
#[inline]
pub fn extract_pages(data: &[u8]) -> Result<Vec<String>> {
    let document = Document::load_mem(data)
        .map_err(|e| RagError::Extraction(format!("Failed to parse PDF: {e}")))?;

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    debug!("Extracting text from {} pages", page_numbers.len());

    let mut pages = Vec::with_capacity(page_numbers.len());
    for number in page_numbers {
        let text = document.extract_text(&[number]).map_err(|e| {
            RagError::Extraction(format!("Failed to extract text from page {number}: {e}"))
        })?;
        if text.trim().is_empty() {
            warn!("Page {} produced no text", number);
        }
        pages.push(text);
    }

    Ok(pages)
}

/// Extract the full document text, pages joined with blank lines.
#[inline]
pub fn extract_text(data: &[u8]) -> Result<String> {
    Ok(extract_pages(data)?.join("\n\n"))
}
