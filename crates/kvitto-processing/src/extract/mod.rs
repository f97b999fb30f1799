//! Extraction backends.
//!
//! An extractor turns the raw bytes of a validated receipt file into
//! structured purchase fields, or fails. The pipeline treats the backend as
//! a black box: no retry policy lives here, and a failure leaves the file
//! unprocessed and retryable.

use async_trait::async_trait;
use kvitto_core::config::ExtractorBackend;
use kvitto_core::models::ExtractedReceipt;
use kvitto_core::Config;
use std::sync::Arc;

pub mod text;
#[cfg(feature = "extractor-vision")]
pub mod vision;

pub use text::TextExtractor;
#[cfg(feature = "extractor-vision")]
pub use vision::{VisionConfig, VisionExtractor};

/// Extraction errors. All of them mean "no confident result"; the pipeline
/// maps every variant to a retryable `ExtractionFailed`.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no text content in document")]
    NoTextContent,

    #[error("could not read document text: {0}")]
    TextExtraction(String),

    #[error("extraction backend error: {0}")]
    Backend(String),

    #[error("malformed extraction result: {0}")]
    MalformedResult(String),
}

/// Trait all extraction backends implement.
#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    /// Get the backend name/identifier
    fn name(&self) -> &'static str;

    /// Extract structured purchase fields from raw file bytes.
    async fn extract(&self, data: &[u8]) -> Result<ExtractedReceipt, ExtractError>;
}

/// Create an extraction backend based on configuration.
pub fn create_extractor(config: &Config) -> Result<Arc<dyn ReceiptExtractor>, anyhow::Error> {
    match config.extractor_backend {
        ExtractorBackend::Text => Ok(Arc::new(TextExtractor::new())),

        #[cfg(feature = "extractor-vision")]
        ExtractorBackend::Vision => {
            let api_key = config
                .anthropic_api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("ANTHROPIC_API_KEY required for vision extraction"))?;
            let vision = VisionExtractor::new(VisionConfig {
                api_key,
                model: config.anthropic_vision_model.clone(),
                max_tokens: 1024,
            })?;
            Ok(Arc::new(vision))
        }

        #[cfg(not(feature = "extractor-vision"))]
        ExtractorBackend::Vision => Err(anyhow::anyhow!(
            "vision extraction not available (extractor-vision feature not enabled)"
        )),
    }
}
