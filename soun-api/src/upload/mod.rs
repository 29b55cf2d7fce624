//! Upload validation
//!
//! Content is classified by magic number against an allow-list before
//! anything touches disk. The client's filename is only used for logging and
//! for choosing between `.txt` and `.md` on plain text.

pub mod cfb;
pub mod extract;
pub mod storage;

use serde::Serialize;
use thiserror::Error;

/// Upload validation errors
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Uploaded file is empty")]
    Empty,

    #[error("File is {size} bytes, maximum is {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Malformed file: {0}")]
    Malformed(String),
}

/// Content types accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectedKind {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Doc,
    Ppt,
    Xls,
    Text,
    Png,
    Jpeg,
}

impl DetectedKind {
    /// Value stored in `documents.kind`
    pub fn as_str(self) -> &'static str {
        match self {
            DetectedKind::Pdf => "pdf",
            DetectedKind::Docx => "docx",
            DetectedKind::Pptx => "pptx",
            DetectedKind::Xlsx => "xlsx",
            DetectedKind::Doc => "doc",
            DetectedKind::Ppt => "ppt",
            DetectedKind::Xls => "xls",
            DetectedKind::Text => "text",
            DetectedKind::Png => "png",
            DetectedKind::Jpeg => "jpeg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            DetectedKind::Pdf => "application/pdf",
            DetectedKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DetectedKind::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            DetectedKind::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            DetectedKind::Doc => "application/msword",
            DetectedKind::Ppt => "application/vnd.ms-powerpoint",
            DetectedKind::Xls => "application/vnd.ms-excel",
            DetectedKind::Text => "text/plain",
            DetectedKind::Png => "image/png",
            DetectedKind::Jpeg => "image/jpeg",
        }
    }

    /// Extensions a client may reasonably declare for this kind
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            DetectedKind::Pdf => &["pdf"],
            DetectedKind::Docx => &["docx"],
            DetectedKind::Pptx => &["pptx"],
            DetectedKind::Xlsx => &["xlsx"],
            DetectedKind::Doc => &["doc"],
            DetectedKind::Ppt => &["ppt"],
            DetectedKind::Xls => &["xls"],
            DetectedKind::Text => &["txt", "md", "markdown", "text"],
            DetectedKind::Png => &["png"],
            DetectedKind::Jpeg => &["jpg", "jpeg"],
        }
    }

    /// Extension used for the stored file
    pub fn stored_extension(self, declared_name: &str) -> &'static str {
        match self {
            DetectedKind::Text if is_markdown_name(declared_name) => "md",
            DetectedKind::Text => "txt",
            DetectedKind::Jpeg => "jpg",
            other => other.extensions()[0],
        }
    }
}

fn declared_extension(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_markdown_name(name: &str) -> bool {
    matches!(declared_extension(name).as_deref(), Some("md") | Some("markdown"))
}

/// True when the declared filename's extension disagrees with the content
///
/// The sniffed kind always wins; a mismatch is only logged.
pub fn extension_mismatch(declared_name: &str, kind: DetectedKind) -> bool {
    match declared_extension(declared_name) {
        Some(ext) => !kind.extensions().contains(&ext.as_str()),
        None => false,
    }
}

const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Classify upload content against the allow-list
pub fn sniff(bytes: &[u8], max_bytes: usize) -> Result<DetectedKind, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }

    if bytes.len() > max_bytes {
        return Err(UploadError::TooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }

    match bytes {
        [b'%', b'P', b'D', b'F', b'-', ..] => return Ok(DetectedKind::Pdf),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => return Ok(DetectedKind::Png),
        [0xFF, 0xD8, 0xFF, ..] => return Ok(DetectedKind::Jpeg),
        [b'P', b'K', 0x03, 0x04, ..] => return sniff_ooxml(bytes),
        _ if bytes.starts_with(&CFB_SIGNATURE) => return cfb::classify(bytes),
        _ => {}
    }

    if is_plain_text(bytes) {
        return Ok(DetectedKind::Text);
    }

    let detected = infer::get(bytes)
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Err(UploadError::UnsupportedType(detected))
}

/// ZIP containers are accepted only when they are Word, Excel or PowerPoint
fn sniff_ooxml(bytes: &[u8]) -> Result<DetectedKind, UploadError> {
    if infer::doc::is_docx(bytes) {
        Ok(DetectedKind::Docx)
    } else if infer::doc::is_xlsx(bytes) {
        Ok(DetectedKind::Xlsx)
    } else if infer::doc::is_pptx(bytes) {
        Ok(DetectedKind::Pptx)
    } else {
        Err(UploadError::UnsupportedType("application/zip".to_string()))
    }
}

/// Valid UTF-8 with no NUL bytes
pub fn is_plain_text(bytes: &[u8]) -> bool {
    !bytes.contains(&0) && std::str::from_utf8(bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024 * 1024;

    /// Minimal local file header whose first entry name decides the OOXML flavour
    fn zip_with_first_entry(name: &str) -> Vec<u8> {
        let mut bytes = vec![b'P', b'K', 0x03, 0x04];
        bytes.extend_from_slice(&[0u8; 22]);
        bytes.extend_from_slice(&(name.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(&[0u8; 64]);
        bytes
    }

    #[test]
    fn test_empty_and_too_large() {
        assert!(matches!(sniff(&[], MAX), Err(UploadError::Empty)));
        assert!(matches!(
            sniff(b"hello world", 5),
            Err(UploadError::TooLarge { size: 11, max: 5 })
        ));
    }

    #[test]
    fn test_simple_signatures() {
        assert_eq!(sniff(b"%PDF-1.7\n...", MAX).unwrap(), DetectedKind::Pdf);
        assert_eq!(
            sniff(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0], MAX).unwrap(),
            DetectedKind::Png
        );
        assert_eq!(
            sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10], MAX).unwrap(),
            DetectedKind::Jpeg
        );
    }

    #[test]
    fn test_ooxml_flavours() {
        assert_eq!(
            sniff(&zip_with_first_entry("word/document.xml"), MAX).unwrap(),
            DetectedKind::Docx
        );
        assert_eq!(
            sniff(&zip_with_first_entry("xl/workbook.xml"), MAX).unwrap(),
            DetectedKind::Xlsx
        );
        assert_eq!(
            sniff(&zip_with_first_entry("ppt/presentation.xml"), MAX).unwrap(),
            DetectedKind::Pptx
        );
    }

    #[test]
    fn test_plain_zip_rejected() {
        let result = sniff(&zip_with_first_entry("notes/readme.txt"), MAX);
        assert!(matches!(result, Err(UploadError::UnsupportedType(ref m)) if m == "application/zip"));
    }

    #[test]
    fn test_legacy_office_via_cfb() {
        assert_eq!(
            sniff(&cfb::tests::synthetic_cfb("WordDocument"), MAX).unwrap(),
            DetectedKind::Doc
        );
        assert_eq!(
            sniff(&cfb::tests::synthetic_cfb("Workbook"), MAX).unwrap(),
            DetectedKind::Xls
        );
        assert_eq!(
            sniff(&cfb::tests::synthetic_cfb("PowerPoint Document"), MAX).unwrap(),
            DetectedKind::Ppt
        );
    }

    #[test]
    fn test_text_detection() {
        assert_eq!(
            sniff("# Notes\n\nZellbiologie: ünïcode".as_bytes(), MAX).unwrap(),
            DetectedKind::Text
        );
        assert!(!is_plain_text(b"abc\0def"));
        assert!(!is_plain_text(&[0xC3, 0x28]));
    }

    #[test]
    fn test_binary_rejected() {
        // GIF header followed by binary noise
        let gif = [b'G', b'I', b'F', b'8', b'9', b'a', 0x01, 0x00, 0x01, 0x00, 0x80, 0x00];
        assert!(matches!(sniff(&gif, MAX), Err(UploadError::UnsupportedType(_))));

        let exe = [b'M', b'Z', 0x90, 0x00, 0x03, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00];
        assert!(matches!(sniff(&exe, MAX), Err(UploadError::UnsupportedType(_))));
    }

    #[test]
    fn test_extension_handling() {
        assert!(extension_mismatch("essay.docx", DetectedKind::Pdf));
        assert!(!extension_mismatch("essay.PDF", DetectedKind::Pdf));
        assert!(!extension_mismatch("no_extension", DetectedKind::Pdf));
        assert_eq!(DetectedKind::Text.stored_extension("notes.md"), "md");
        assert_eq!(DetectedKind::Text.stored_extension("notes.docx"), "txt");
        assert_eq!(DetectedKind::Jpeg.stored_extension("photo.jpeg"), "jpg");
    }
}
