//! Vision extraction backend using Anthropic's Claude API.
//!
//! Sends the receipt PDF as a document block together with a prompt asking
//! for the purchase fields as JSON, then parses the response. Used for
//! scanned receipts without a text layer.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use kvitto_core::models::ExtractedReceipt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ExtractError, ReceiptExtractor};

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

const PROMPT: &str = "This is a purchase receipt. Respond with a JSON object \
containing exactly these fields: merchant_name (string), total_amount \
(number, the grand total), purchased_at (string, the purchase date as \
YYYY-MM-DD). Respond with valid JSON only.";

/// Vision extraction configuration.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Anthropic API key
    pub api_key: String,
    /// Model to use
    pub model: String,
    /// Maximum tokens for the response
    pub max_tokens: u32,
}

/// Vision extraction backend.
pub struct VisionExtractor {
    http_client: reqwest::Client,
    config: VisionConfig,
}

impl Debug for VisionExtractor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VisionExtractor")
            .field("model", &self.config.model)
            .finish()
    }
}

// Messages API request/response structures
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<MessageParam>,
}

#[derive(Debug, Serialize)]
struct MessageParam {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Document { source: DocumentSource },
}

#[derive(Debug, Serialize)]
struct DocumentSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlockResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlockResponse {
    Text { text: String },
}

#[derive(Debug, Deserialize)]
struct ExtractionPayload {
    merchant_name: String,
    total_amount: serde_json::Number,
    purchased_at: String,
}

impl VisionExtractor {
    pub fn new(config: VisionConfig) -> Result<Self, anyhow::Error> {
        if config.api_key.is_empty() {
            anyhow::bail!("Anthropic API key is required but not provided");
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    async fn call_model(&self, data: &[u8]) -> Result<String, ExtractError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);

        let body = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: vec![MessageParam {
                role: "user".to_string(),
                content: vec![
                    ContentBlock::Document {
                        source: DocumentSource {
                            source_type: "base64".to_string(),
                            media_type: "application/pdf".to_string(),
                            data: encoded,
                        },
                    },
                    ContentBlock::Text {
                        text: PROMPT.to_string(),
                    },
                ],
            }],
        };

        let response = self
            .http_client
            .post(format!("{}/messages", API_BASE))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractError::Backend(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExtractError::Backend(format!(
                "API request failed: {} - {}",
                status, error_text
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Backend(format!("unreadable API response: {}", e)))?;

        parsed
            .content
            .into_iter()
            .map(|block| match block {
                ContentBlockResponse::Text { text } => text,
            })
            .next()
            .ok_or_else(|| ExtractError::Backend("empty API response".to_string()))
    }
}

/// Parse the model's JSON response into the extraction contract.
/// Tolerates markdown code fences around the JSON.
fn parse_model_response(text: &str) -> Result<ExtractedReceipt, ExtractError> {
    let json_text = if text.contains("```json") {
        text.split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(text)
            .trim()
    } else if text.contains("```") {
        text.split("```")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(text)
            .trim()
    } else {
        text.trim()
    };

    let payload: ExtractionPayload = serde_json::from_str(json_text)
        .map_err(|e| ExtractError::MalformedResult(format!("not valid JSON: {}", e)))?;

    let total_amount = Decimal::from_str(&payload.total_amount.to_string())
        .map_err(|e| ExtractError::MalformedResult(format!("bad total_amount: {}", e)))?;

    let purchased_at = parse_purchase_date(&payload.purchased_at).ok_or_else(|| {
        ExtractError::MalformedResult(format!("bad purchased_at: {}", payload.purchased_at))
    })?;

    Ok(ExtractedReceipt {
        merchant_name: payload.merchant_name,
        total_amount,
        purchased_at,
    })
}

fn parse_purchase_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[async_trait]
impl ReceiptExtractor for VisionExtractor {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn extract(&self, data: &[u8]) -> Result<ExtractedReceipt, ExtractError> {
        tracing::info!(
            model = %self.config.model,
            size_bytes = data.len(),
            "Sending receipt to vision extraction"
        );

        let text = self.call_model(data).await?;
        let extracted = parse_model_response(&text)?;

        tracing::info!(merchant = %extracted.merchant_name, "Vision extraction completed");

        Ok(extracted)
    }
}
