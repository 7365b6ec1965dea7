//! Downloaded-file inspection.
//!
//! After a download the agent needs to know whether the bytes are really
//! the document they claim to be: a PDF that parses (with a text preview
//! the model can read to verify the document's identity), an XLSX that is
//! a valid archive, an XLS with the OLE2 signature.

use serde::Serialize;
use std::io::Cursor;

/// Text preview budget: first pages, capped per page and overall.
const PREVIEW_PAGES: usize = 2;
const PREVIEW_PAGE_CHARS: usize = 600;
pub const PREVIEW_TOTAL_CHARS: usize = 800;

/// What we learned about a downloaded file.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub valid: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_pages_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Inspection {
    fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            pages: None,
            entries: None,
            first_pages_text: None,
            error: Some(error.into()),
        }
    }
}

/// Inspect PDF bytes: extract text from the first pages so the model can
/// check the document title against what it meant to download. Falls back
/// to a magic-byte check when text extraction fails on an otherwise
/// plausible PDF.
pub fn inspect_pdf(bytes: &[u8]) -> Inspection {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => {
            // pdf-extract separates pages with form feeds
            let pages: Vec<&str> = text.split('\x0c').collect();
            let preview: Vec<String> = pages
                .iter()
                .take(PREVIEW_PAGES)
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(|p| truncate_chars(p, PREVIEW_PAGE_CHARS))
                .collect();

            Inspection {
                valid: true,
                pages: Some(pages.len()),
                entries: None,
                first_pages_text: Some(if preview.is_empty() {
                    "(no extractable text)".to_string()
                } else {
                    preview.join("\n---\n")
                }),
                error: None,
            }
        }
        Err(e) => {
            if bytes.starts_with(b"%PDF-") {
                Inspection {
                    valid: true,
                    pages: None,
                    entries: None,
                    first_pages_text: Some("(text extraction failed)".to_string()),
                    error: Some(e.to_string()),
                }
            } else {
                Inspection::invalid(format!("invalid header: {e}"))
            }
        }
    }
}

/// Inspect XLSX bytes: a valid file is a readable ZIP archive.
pub fn inspect_xlsx(bytes: &[u8]) -> Inspection {
    match zip::ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => Inspection {
            valid: true,
            pages: None,
            entries: Some(archive.len()),
            first_pages_text: None,
            error: None,
        },
        Err(e) => Inspection::invalid(e.to_string()),
    }
}

/// Inspect legacy XLS bytes: check the OLE2 compound-document signature.
pub fn inspect_xls(bytes: &[u8]) -> Inspection {
    let is_ole = bytes.starts_with(&[0xd0, 0xcf, 0x11, 0xe0]);
    if is_ole {
        Inspection {
            valid: true,
            pages: None,
            entries: None,
            first_pages_text: None,
            error: None,
        }
    } else {
        Inspection::invalid("missing OLE2 signature")
    }
}

/// Truncate at a char boundary without panicking on multibyte text.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
