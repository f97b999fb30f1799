use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Tri-state validation verdict on an uploaded file.
///
/// The invalid reason exists exactly when the verdict is invalid, so the two
/// are modeled as one variant rather than as independent fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Validity {
    Unvalidated,
    Valid,
    Invalid { reason: String },
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }

    pub fn invalid_reason(&self) -> Option<&str> {
        match self {
            Validity::Invalid { reason } => Some(reason),
            _ => None,
        }
    }

    /// Split into the nullable `(is_valid, invalid_reason)` column pair used
    /// by the `receipt_files` table. `is_valid` is NULL while unvalidated.
    pub fn to_columns(&self) -> (Option<bool>, Option<String>) {
        match self {
            Validity::Unvalidated => (None, None),
            Validity::Valid => (Some(true), None),
            Validity::Invalid { reason } => (Some(false), Some(reason.clone())),
        }
    }

    /// Rebuild from the nullable column pair. A false verdict without a
    /// stored reason gets a generic one rather than losing the invalid state.
    pub fn from_columns(is_valid: Option<bool>, reason: Option<String>) -> Self {
        match is_valid {
            None => Validity::Unvalidated,
            Some(true) => Validity::Valid,
            Some(false) => Validity::Invalid {
                reason: reason.unwrap_or_else(|| "invalid document".to_string()),
            },
        }
    }
}

/// One uploaded receipt document and its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptFile {
    pub id: Uuid,
    pub file_name: String,
    pub storage_key: String,
    pub validity: Validity,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReceiptFile {
    pub fn is_valid(&self) -> bool {
        self.validity.is_valid()
    }
}

/// Raw `receipt_files` row; converted to the domain model via `into_model`.
#[cfg(feature = "sqlx")]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReceiptFileRow {
    pub id: Uuid,
    pub file_name: String,
    pub storage_key: String,
    pub is_valid: Option<bool>,
    pub invalid_reason: Option<String>,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl ReceiptFileRow {
    pub fn into_model(self) -> ReceiptFile {
        ReceiptFile {
            id: self.id,
            file_name: self.file_name,
            storage_key: self.storage_key,
            validity: Validity::from_columns(self.is_valid, self.invalid_reason),
            processed: self.is_processed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReceiptFileResponse {
    pub id: Uuid,
    pub file_name: String,
    pub file_path: String,
    /// NULL until the file has been validated at least once.
    pub is_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ReceiptFile> for ReceiptFileResponse {
    fn from(file: ReceiptFile) -> Self {
        let (is_valid, invalid_reason) = file.validity.to_columns();
        ReceiptFileResponse {
            id: file.id,
            file_name: file.file_name,
            file_path: file.storage_key,
            is_valid,
            invalid_reason,
            is_processed: file.processed,
            created_at: file.created_at,
        }
    }
}
