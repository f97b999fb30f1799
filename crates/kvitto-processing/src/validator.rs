//! Receipt file validator.
//!
//! Decides whether stored bytes are a processable receipt document. The
//! policy is a sequence of checks where the first failure wins:
//!
//! 1. the bytes parse as a PDF,
//! 2. the document has at least one page,
//! 3. the document is not encrypted,
//! 4. at least one page carries content (a non-empty content stream or an
//!    image XObject).
//!
//! Validation always produces a verdict. Internal failures of the PDF stack,
//! including panics, are folded into an invalid verdict with a
//! `validation error:` reason - the orchestrator persists whatever comes
//! back, so this function must not throw.

use std::panic::{catch_unwind, AssertUnwindSafe};

use lopdf::{Dictionary, Document, Object};

/// Validation verdict: a pass/fail flag plus a diagnostic reason on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub is_valid: bool,
    pub reason: Option<String>,
}

impl Verdict {
    pub fn pass() -> Self {
        Verdict {
            is_valid: true,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Verdict {
            is_valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// PDF receipt validator.
#[derive(Clone, Default)]
pub struct ReceiptValidator;

impl ReceiptValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run the validation policy over raw file bytes.
    ///
    /// CPU-bound; the pipeline runs this under `spawn_blocking`.
    pub fn validate(&self, data: &[u8]) -> Verdict {
        match catch_unwind(AssertUnwindSafe(|| check_document(data))) {
            Ok(verdict) => verdict,
            Err(panic) => {
                let cause = panic_message(&panic);
                tracing::warn!(cause = %cause, "PDF inspection panicked during validation");
                Verdict::fail(format!("validation error: {}", cause))
            }
        }
    }
}

fn check_document(data: &[u8]) -> Verdict {
    let doc = match Document::load_mem(data) {
        Ok(doc) => doc,
        Err(e) => {
            // Some parsers refuse encrypted files outright; classify those
            // as encrypted rather than corrupt.
            if contains_subslice(data, b"/Encrypt") {
                return Verdict::fail("encrypted document");
            }
            tracing::debug!(error = %e, "PDF failed to parse");
            return Verdict::fail("not a valid PDF");
        }
    };

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Verdict::fail("empty document");
    }

    if doc.trailer.get(b"Encrypt").is_ok() {
        return Verdict::fail("encrypted document");
    }

    let has_content = pages
        .values()
        .any(|&page_id| page_has_content(&doc, page_id));
    if !has_content {
        return Verdict::fail("no extractable content");
    }

    Verdict::pass()
}

/// A page counts as content-bearing when its content stream is non-empty
/// (after whitespace trimming) or it references an image XObject.
fn page_has_content(doc: &Document, page_id: (u32, u16)) -> bool {
    if let Ok(content) = doc.get_page_content(page_id) {
        if content.iter().any(|b| !b.is_ascii_whitespace()) {
            return true;
        }
    }
    page_has_image_xobject(doc, page_id)
}

fn page_has_image_xobject(doc: &Document, page_id: (u32, u16)) -> bool {
    let Some(resources) = page_resources(doc, page_id) else {
        return false;
    };
    let Some(xobjects) = resolve_dict(doc, resources.get(b"XObject").ok()) else {
        return false;
    };

    xobjects.iter().any(|(_, value)| {
        let stream = match value {
            Object::Reference(id) => doc
                .get_object(*id)
                .ok()
                .and_then(|obj| obj.as_stream().ok()),
            Object::Stream(stream) => Some(stream),
            _ => None,
        };
        stream
            .and_then(|s| s.dict.get(b"Subtype").ok())
            .and_then(|subtype| subtype.as_name().ok())
            .map(|name| name == b"Image")
            .unwrap_or(false)
    })
}

/// Resources looked up directly on the page dictionary. Inherited resources
/// from the page tree are not chased; receipts carry them on the page.
fn page_resources(doc: &Document, page_id: (u32, u16)) -> Option<&Dictionary> {
    let page = doc.get_object(page_id).ok()?.as_dict().ok()?;
    resolve_dict(doc, page.get(b"Resources").ok())
}

fn resolve_dict<'a>(doc: &'a Document, obj: Option<&'a Object>) -> Option<&'a Dictionary> {
    match obj? {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        _ => None,
    }
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic during PDF inspection".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_constructors() {
        let pass = Verdict::pass();
        assert!(pass.is_valid);
        assert!(pass.reason.is_none());

        let fail = Verdict::fail("empty document");
        assert!(!fail.is_valid);
        assert_eq!(fail.reason.as_deref(), Some("empty document"));
    }

    #[test]
    fn test_garbage_bytes_are_not_a_valid_pdf() {
        let verdict = ReceiptValidator::new().validate(b"definitely not a pdf");
        assert!(!verdict.is_valid);
        assert_eq!(verdict.reason.as_deref(), Some("not a valid PDF"));
    }

    #[test]
    fn test_empty_bytes_are_not_a_valid_pdf() {
        let verdict = ReceiptValidator::new().validate(b"");
        assert!(!verdict.is_valid);
        assert_eq!(verdict.reason.as_deref(), Some("not a valid PDF"));
    }

    #[test]
    fn test_contains_subslice() {
        assert!(contains_subslice(b"trailer << /Encrypt 5 0 R >>", b"/Encrypt"));
        assert!(!contains_subslice(b"trailer << /Root 1 0 R >>", b"/Encrypt"));
    }
}
