//! Repository traits for the file registry and the receipt store.

use async_trait::async_trait;
use kvitto_core::models::{ExtractedReceipt, Receipt, ReceiptFile, Validity};
use kvitto_core::AppError;
use uuid::Uuid;

/// Authoritative record of every uploaded file and its lifecycle state.
#[async_trait]
pub trait ReceiptFileRepository: Send + Sync {
    /// Register a new file. Assigns a fresh id; the initial state is
    /// unvalidated and unprocessed.
    async fn create(&self, file_name: String, storage_key: String) -> Result<ReceiptFile, AppError>;

    /// Fetch a file by id; `NotFound` when absent.
    async fn get(&self, id: Uuid) -> Result<ReceiptFile, AppError>;

    /// Overwrite the validity verdict. Re-validating an already-validated
    /// file is permitted; the prior verdict is replaced.
    async fn set_validity(&self, id: Uuid, validity: Validity) -> Result<ReceiptFile, AppError>;

    /// Flip the processed flag, exactly once. `Conflict` when the file is
    /// already processed or its verdict is not valid.
    ///
    /// The Process operation commits through
    /// [`ReceiptRepository::create_for_file`], which performs this transition
    /// and the receipt insert together; this method exists for administrative
    /// use and direct state-machine tests.
    async fn mark_processed(&self, id: Uuid) -> Result<ReceiptFile, AppError>;

    /// All files in insertion order.
    async fn list(&self) -> Result<Vec<ReceiptFile>, AppError>;
}

/// Store of extracted receipts, one per successfully processed file.
#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    /// Commit a processed file: mark it processed and create its receipt as
    /// one atomic step. Fails with `Conflict` when the file is not currently
    /// valid-and-unprocessed, or when a receipt already exists for it; with
    /// `NotFound` when the file id is unknown. A failed commit leaves both
    /// tables untouched, so retrying is safe.
    async fn create_for_file(
        &self,
        file_id: Uuid,
        extracted: &ExtractedReceipt,
        file_path: &str,
    ) -> Result<Receipt, AppError>;

    /// Fetch a receipt by id; `NotFound` when absent.
    async fn get(&self, id: Uuid) -> Result<Receipt, AppError>;

    /// All receipts in insertion order.
    async fn list(&self) -> Result<Vec<Receipt>, AppError>;
}

/// The `Conflict` for attempting to process a file in its current state.
/// Shared by both repository implementations and the pipeline gate so the
/// caller sees one consistent message per state.
pub fn processing_conflict(file: &ReceiptFile) -> AppError {
    if file.processed {
        return AppError::Conflict("file already processed".to_string());
    }
    match &file.validity {
        Validity::Unvalidated => AppError::Conflict("file has not been validated".to_string()),
        Validity::Invalid { reason } => {
            AppError::Conflict(format!("file failed validation: {}", reason))
        }
        Validity::Valid => AppError::Conflict("file is not processable".to_string()),
    }
}
