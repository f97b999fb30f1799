//! In-memory registry and receipt store.
//!
//! One mutex guards both tables, so the processed-flag flip and the receipt
//! insert in `create_for_file` are a single atomic step, mirroring the
//! Postgres transaction. Insertion order is the vector order.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use kvitto_core::models::{ExtractedReceipt, Receipt, ReceiptFile, Validity};
use kvitto_core::AppError;
use uuid::Uuid;

use crate::repository::{processing_conflict, ReceiptFileRepository, ReceiptRepository};

#[derive(Default)]
struct Inner {
    files: Vec<ReceiptFile>,
    receipts: Vec<Receipt>,
}

/// In-memory implementation of both repository traits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("store lock poisoned")
    }
}

#[async_trait]
impl ReceiptFileRepository for MemoryStore {
    async fn create(&self, file_name: String, storage_key: String) -> Result<ReceiptFile, AppError> {
        let now = Utc::now();
        let file = ReceiptFile {
            id: Uuid::new_v4(),
            file_name,
            storage_key,
            validity: Validity::Unvalidated,
            processed: false,
            created_at: now,
            updated_at: now,
        };
        self.lock().files.push(file.clone());
        Ok(file)
    }

    async fn get(&self, id: Uuid) -> Result<ReceiptFile, AppError> {
        self.lock()
            .files
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("receipt file {} not found", id)))
    }

    async fn set_validity(&self, id: Uuid, validity: Validity) -> Result<ReceiptFile, AppError> {
        let mut inner = self.lock();
        let file = inner
            .files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| AppError::NotFound(format!("receipt file {} not found", id)))?;
        file.validity = validity;
        file.updated_at = Utc::now();
        Ok(file.clone())
    }

    async fn mark_processed(&self, id: Uuid) -> Result<ReceiptFile, AppError> {
        let mut inner = self.lock();
        let file = inner
            .files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| AppError::NotFound(format!("receipt file {} not found", id)))?;
        if file.processed || !file.validity.is_valid() {
            return Err(processing_conflict(file));
        }
        file.processed = true;
        file.updated_at = Utc::now();
        Ok(file.clone())
    }

    async fn list(&self) -> Result<Vec<ReceiptFile>, AppError> {
        Ok(self.lock().files.clone())
    }
}

#[async_trait]
impl ReceiptRepository for MemoryStore {
    async fn create_for_file(
        &self,
        file_id: Uuid,
        extracted: &ExtractedReceipt,
        file_path: &str,
    ) -> Result<Receipt, AppError> {
        let mut inner = self.lock();

        if inner.receipts.iter().any(|r| r.file_id == file_id) {
            return Err(AppError::Conflict("file already processed".to_string()));
        }

        let file = inner
            .files
            .iter_mut()
            .find(|f| f.id == file_id)
            .ok_or_else(|| AppError::NotFound(format!("receipt file {} not found", file_id)))?;
        if file.processed || !file.validity.is_valid() {
            return Err(processing_conflict(file));
        }

        file.processed = true;
        file.updated_at = Utc::now();

        let receipt = Receipt {
            id: Uuid::new_v4(),
            file_id,
            merchant_name: extracted.merchant_name.clone(),
            total_amount: extracted.total_amount,
            purchased_at: extracted.purchased_at,
            file_path: file_path.to_string(),
            created_at: Utc::now(),
        };
        inner.receipts.push(receipt.clone());
        Ok(receipt)
    }

    async fn get(&self, id: Uuid) -> Result<Receipt, AppError> {
        self.lock()
            .receipts
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("receipt {} not found", id)))
    }

    async fn list(&self) -> Result<Vec<Receipt>, AppError> {
        Ok(self.lock().receipts.clone())
    }
}
