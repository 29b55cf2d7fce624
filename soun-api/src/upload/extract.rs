//! Text extraction from uploaded documents
//!
//! Plain text is decoded directly and PDFs are read page by page. Office and
//! image formats store no text.

use lopdf::Document;

use super::DetectedKind;

/// Upper bound on stored text per document, in characters
pub const MAX_EXTRACTED_CHARS: usize = 200_000;

/// Extract searchable text, if the kind carries any
///
/// PDF parsing is CPU bound; call from `spawn_blocking`.
pub fn extract_text(kind: DetectedKind, bytes: &[u8]) -> Option<String> {
    let text = match kind {
        DetectedKind::Text => Some(String::from_utf8_lossy(bytes).into_owned()),
        DetectedKind::Pdf => extract_pdf_text(bytes),
        _ => None,
    }?;

    let text = truncate_chars(strip_nul(&text).trim(), MAX_EXTRACTED_CHARS);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn extract_pdf_text(bytes: &[u8]) -> Option<String> {
    let doc = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse PDF, storing without text");
            return None;
        }
    };

    let mut text = String::new();
    let mut failed_pages = 0usize;

    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(_) => failed_pages += 1,
        }

        if text.len() >= MAX_EXTRACTED_CHARS * 4 {
            break;
        }
    }

    if failed_pages > 0 {
        tracing::debug!(failed_pages, "Some PDF pages had no extractable text");
    }

    Some(text)
}

/// Postgres TEXT cannot hold U+0000
fn strip_nul(text: &str) -> std::borrow::Cow<'_, str> {
    if text.contains('\0') {
        text.replace('\0', "").into()
    } else {
        text.into()
    }
}

/// Truncate on a character boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
