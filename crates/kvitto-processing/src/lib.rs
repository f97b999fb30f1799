//! Receipt validation, extraction, and the pipeline orchestrator.
//!
//! The pipeline composes the blob store, the file registry, the receipt
//! store, the PDF validator, and an extraction backend into the four
//! operations of the receipt lifecycle: upload, validate, process, query.

pub mod extract;
pub mod pipeline;
pub mod test_support;
pub mod validator;

pub use extract::{create_extractor, ExtractError, ReceiptExtractor, TextExtractor};
#[cfg(feature = "extractor-vision")]
pub use extract::{VisionConfig, VisionExtractor};
pub use pipeline::{ReceiptPipeline, UploadPolicy};
pub use validator::{ReceiptValidator, Verdict};
