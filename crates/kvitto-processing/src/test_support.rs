//! Test support: programmatic PDF fixtures and a programmable extraction
//! backend. Used by this crate's integration tests and by the API test
//! suite, so no binary fixtures need to be checked in.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use kvitto_core::models::ExtractedReceipt;
use rust_decimal::Decimal;

use crate::extract::{ExtractError, ReceiptExtractor};

/// Programmatic PDF fixtures built with lopdf.
pub mod pdf {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    fn save(mut doc: Document) -> Vec<u8> {
        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("save fixture PDF");
        buf
    }

    fn single_page_doc(lines: &[&str]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = Vec::new();
        let mut y = 750;
        for line in lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new("Td", vec![50.into(), y.into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
            y -= 20;
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    /// One page with the given text lines.
    pub fn with_text(lines: &[&str]) -> Vec<u8> {
        save(single_page_doc(lines))
    }

    /// Structurally valid document with zero pages.
    pub fn zero_pages() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        save(doc)
    }

    /// One page carrying neither a content stream nor resources.
    pub fn blank_page() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        save(doc)
    }

    /// One-page document whose trailer declares standard encryption.
    pub fn encrypted() -> Vec<u8> {
        let mut doc = single_page_doc(&["SECRET STORE"]);
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "O" => Object::string_literal("0123456789abcdef0123456789abcdef"),
            "U" => Object::string_literal("0123456789abcdef0123456789abcdef"),
            "P" => -44,
        });
        doc.trailer.set("Encrypt", encrypt_id);
        save(doc)
    }
}

/// Programmable extraction backend.
///
/// Returns queued results first, then falls back to a fixed sample receipt.
pub struct FakeExtractor {
    queue: Mutex<VecDeque<Result<ExtractedReceipt, String>>>,
    calls: AtomicUsize,
}

impl Default for FakeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeExtractor {
    pub fn new() -> Self {
        FakeExtractor {
            queue: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// The receipt this extractor produces when nothing is queued.
    pub fn sample() -> ExtractedReceipt {
        ExtractedReceipt {
            merchant_name: "GREEN GROCER".to_string(),
            total_amount: Decimal::from_str("42.50").expect("sample amount"),
            purchased_at: Utc.with_ymd_and_hms(2024, 5, 12, 0, 0, 0).unwrap(),
        }
    }

    /// Queue one failing extraction.
    pub fn push_failure(&self, message: &str) {
        self.queue
            .lock()
            .expect("fake extractor lock poisoned")
            .push_back(Err(message.to_string()));
    }

    /// Queue one specific successful extraction.
    pub fn push_success(&self, extracted: ExtractedReceipt) {
        self.queue
            .lock()
            .expect("fake extractor lock poisoned")
            .push_back(Ok(extracted));
    }

    /// Number of extraction attempts so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReceiptExtractor for FakeExtractor {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn extract(&self, _data: &[u8]) -> Result<ExtractedReceipt, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let queued = self
            .queue
            .lock()
            .expect("fake extractor lock poisoned")
            .pop_front();
        match queued {
            Some(Ok(extracted)) => Ok(extracted),
            Some(Err(message)) => Err(ExtractError::Backend(message)),
            None => Ok(Self::sample()),
        }
    }
}
