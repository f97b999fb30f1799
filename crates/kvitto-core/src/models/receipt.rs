use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Structured fields produced by an extraction backend.
///
/// This is the full output contract of the extractor boundary: every field
/// must be present, and the pipeline re-checks well-formedness before
/// committing a receipt built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedReceipt {
    pub merchant_name: String,
    pub total_amount: Decimal,
    pub purchased_at: DateTime<Utc>,
}

impl ExtractedReceipt {
    /// Check the contract: non-empty merchant name, non-negative total.
    pub fn well_formed(&self) -> Result<(), String> {
        if self.merchant_name.trim().is_empty() {
            return Err("merchant name is empty".to_string());
        }
        if self.total_amount.is_sign_negative() {
            return Err(format!("total amount {} is negative", self.total_amount));
        }
        Ok(())
    }
}

/// One extracted receipt, 1:1 with a processed `ReceiptFile`. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Uuid,
    /// Back-reference to the originating file (lookup only, no ownership).
    pub file_id: Uuid,
    pub merchant_name: String,
    pub total_amount: Decimal,
    pub purchased_at: DateTime<Utc>,
    /// Storage key of the source file, denormalized for display.
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

/// Raw `receipts` row; converted to the domain model via `into_model`.
#[cfg(feature = "sqlx")]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReceiptRow {
    pub id: Uuid,
    pub file_id: Uuid,
    pub merchant_name: String,
    pub total_amount: Decimal,
    pub purchased_at: DateTime<Utc>,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl ReceiptRow {
    pub fn into_model(self) -> Receipt {
        Receipt {
            id: self.id,
            file_id: self.file_id,
            merchant_name: self.merchant_name,
            total_amount: self.total_amount,
            purchased_at: self.purchased_at,
            file_path: self.file_path,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReceiptResponse {
    pub id: Uuid,
    pub file_id: Uuid,
    pub merchant_name: String,
    pub total_amount: Decimal,
    pub purchased_at: DateTime<Utc>,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

impl From<Receipt> for ReceiptResponse {
    fn from(receipt: Receipt) -> Self {
        ReceiptResponse {
            id: receipt.id,
            file_id: receipt.file_id,
            merchant_name: receipt.merchant_name,
            total_amount: receipt.total_amount,
            purchased_at: receipt.purchased_at,
            file_path: receipt.file_path,
            created_at: receipt.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn extracted(merchant: &str, total: &str) -> ExtractedReceipt {
        ExtractedReceipt {
            merchant_name: merchant.to_string(),
            total_amount: Decimal::from_str(total).unwrap(),
            purchased_at: Utc::now(),
        }
    }

    #[test]
    fn test_well_formed_accepts_zero_total() {
        assert!(extracted("COFFEE HOUSE", "0").well_formed().is_ok());
    }

    #[test]
    fn test_well_formed_rejects_blank_merchant() {
        assert!(extracted("   ", "12.50").well_formed().is_err());
    }

    #[test]
    fn test_well_formed_rejects_negative_total() {
        assert!(extracted("COFFEE HOUSE", "-1.00").well_formed().is_err());
    }

    #[test]
    fn test_receipt_response_from_receipt() {
        let receipt = Receipt {
            id: Uuid::new_v4(),
            file_id: Uuid::new_v4(),
            merchant_name: "GREEN GROCER".to_string(),
            total_amount: Decimal::from_str("42.50").unwrap(),
            purchased_at: Utc::now(),
            file_path: "receipts/abc_groceries.pdf".to_string(),
            created_at: Utc::now(),
        };

        let response = ReceiptResponse::from(receipt.clone());
        assert_eq!(response.id, receipt.id);
        assert_eq!(response.file_id, receipt.file_id);
        assert_eq!(response.merchant_name, "GREEN GROCER");
        assert_eq!(response.total_amount, Decimal::from_str("42.50").unwrap());
        assert_eq!(response.file_path, "receipts/abc_groceries.pdf");
    }
}
