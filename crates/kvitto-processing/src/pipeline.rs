//! The receipt pipeline: upload → validate → process → query.
//!
//! The pipeline owns the injected collaborators (blob store, file registry,
//! receipt store, validator, extractor) and enforces the lifecycle state
//! machine: a file may only be processed once, and only while its stored
//! verdict is valid. Concurrent Process calls for one file are serialized
//! through a per-id lock; the repository's compare-and-set commit remains
//! the authoritative at-most-once guard underneath it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kvitto_core::models::{Receipt, ReceiptFile, Validity};
use kvitto_core::AppError;
use kvitto_db::{processing_conflict, ReceiptFileRepository, ReceiptRepository};
use kvitto_storage::{Storage, StorageError};
use uuid::Uuid;

use crate::extract::ReceiptExtractor;
use crate::validator::{ReceiptValidator, Verdict};

/// Upload acceptance policy: size limit and allowlists.
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    pub max_file_size: usize,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
}

impl UploadPolicy {
    /// Receipt defaults: PDF only, 20 MiB cap.
    pub fn pdf_default() -> Self {
        UploadPolicy {
            max_file_size: 20 * 1024 * 1024,
            allowed_extensions: vec!["pdf".to_string()],
            allowed_content_types: vec!["application/pdf".to_string()],
        }
    }
}

/// The pipeline orchestrator.
pub struct ReceiptPipeline {
    storage: Arc<dyn Storage>,
    files: Arc<dyn ReceiptFileRepository>,
    receipts: Arc<dyn ReceiptRepository>,
    validator: ReceiptValidator,
    extractor: Arc<dyn ReceiptExtractor>,
    policy: UploadPolicy,
    process_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl ReceiptPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        files: Arc<dyn ReceiptFileRepository>,
        receipts: Arc<dyn ReceiptRepository>,
        extractor: Arc<dyn ReceiptExtractor>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            storage,
            files,
            receipts,
            validator: ReceiptValidator::new(),
            extractor,
            policy,
            process_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Store the uploaded bytes and register the file.
    ///
    /// The blob write happens first; a registry row is only created for
    /// bytes the store has accepted. No validation runs here - the file
    /// starts unvalidated.
    pub async fn upload(
        &self,
        data: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<ReceiptFile, AppError> {
        if file_name.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "file name must not be empty".to_string(),
            ));
        }
        if data.is_empty() {
            return Err(AppError::InvalidInput("file is empty".to_string()));
        }
        if data.len() > self.policy.max_file_size {
            return Err(AppError::PayloadTooLarge(format!(
                "{} bytes exceeds max {} bytes",
                data.len(),
                self.policy.max_file_size
            )));
        }

        let extension = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
        if extension.is_empty() || !self.policy.allowed_extensions.contains(&extension) {
            return Err(AppError::InvalidInput(format!(
                "invalid file extension '{}', allowed: {:?}",
                extension, self.policy.allowed_extensions
            )));
        }

        let normalized_content_type = content_type.to_lowercase();
        if !self
            .policy
            .allowed_content_types
            .contains(&normalized_content_type)
        {
            return Err(AppError::InvalidInput(format!(
                "invalid content type '{}', allowed: {:?}",
                content_type, self.policy.allowed_content_types
            )));
        }

        let safe_name = sanitize_filename(file_name);
        let size = data.len();

        let (storage_key, _url) = self
            .storage
            .upload(Uuid::new_v4(), &safe_name, content_type, data)
            .await
            .map_err(storage_error)?;

        let file = self
            .files
            .create(safe_name.clone(), storage_key.clone())
            .await?;

        tracing::info!(
            file_id = %file.id,
            file_name = %safe_name,
            storage_key = %storage_key,
            size_bytes = size,
            "Receipt file uploaded"
        );

        Ok(file)
    }

    /// Re-evaluate the stored bytes and persist the verdict.
    ///
    /// Safe to call repeatedly; each call overwrites the prior verdict.
    /// Bytes missing despite a registry row are an inconsistency reported as
    /// a storage error, not silently repaired.
    pub async fn validate(&self, id: Uuid) -> Result<Verdict, AppError> {
        let file = self.files.get(id).await?;

        let data = self
            .storage
            .download(&file.storage_key)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(key) => AppError::Storage(format!(
                    "stored bytes missing for file {} (key {})",
                    id, key
                )),
                other => storage_error(other),
            })?;

        let validator = self.validator.clone();
        let verdict = tokio::task::spawn_blocking(move || validator.validate(&data))
            .await
            // A verdict is owed even when the inspection task dies.
            .unwrap_or_else(|e| {
                Verdict::fail(format!("validation error: inspection task failed: {}", e))
            });

        let validity = match &verdict {
            Verdict { is_valid: true, .. } => Validity::Valid,
            Verdict { reason, .. } => Validity::Invalid {
                reason: reason
                    .clone()
                    .unwrap_or_else(|| "invalid document".to_string()),
            },
        };
        self.files.set_validity(id, validity).await?;

        tracing::info!(
            file_id = %id,
            is_valid = verdict.is_valid,
            reason = verdict.reason.as_deref().unwrap_or(""),
            "Receipt file validated"
        );

        Ok(verdict)
    }

    /// Extract the receipt and commit it, at most once per file.
    ///
    /// Calls for the same id are serialized; calls for distinct ids run in
    /// parallel. Extraction failures leave the file unprocessed and are
    /// retryable; a successful commit flips the processed flag and creates
    /// the receipt atomically.
    pub async fn process(&self, id: Uuid) -> Result<Receipt, AppError> {
        let lock = self.id_lock(id);
        let result = {
            let _guard = lock.lock().await;
            self.process_locked(id).await
        };
        drop(lock);
        self.reap_id_lock(id);
        result
    }

    async fn process_locked(&self, id: Uuid) -> Result<Receipt, AppError> {
        let file = self.files.get(id).await?;
        if file.processed || !file.validity.is_valid() {
            return Err(processing_conflict(&file));
        }

        let data = self
            .storage
            .download(&file.storage_key)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(key) => AppError::Storage(format!(
                    "stored bytes missing for file {} (key {})",
                    id, key
                )),
                other => storage_error(other),
            })?;

        let extracted = self.extractor.extract(&data).await.map_err(|e| {
            tracing::warn!(file_id = %id, error = %e, "Extraction failed");
            AppError::ExtractionFailed(e.to_string())
        })?;

        // The extractor contract promises well-formed fields; hold it to that
        // before anything is committed.
        extracted
            .well_formed()
            .map_err(|msg| AppError::ExtractionFailed(format!("malformed extraction result: {}", msg)))?;

        let receipt = self
            .receipts
            .create_for_file(file.id, &extracted, &file.storage_key)
            .await?;

        tracing::info!(
            file_id = %id,
            receipt_id = %receipt.id,
            merchant = %receipt.merchant_name,
            "Receipt file processed"
        );

        Ok(receipt)
    }

    /// All registered files, insertion order.
    pub async fn list_files(&self) -> Result<Vec<ReceiptFile>, AppError> {
        self.files.list().await
    }

    /// All extracted receipts, insertion order.
    pub async fn list_receipts(&self) -> Result<Vec<Receipt>, AppError> {
        self.receipts.list().await
    }

    /// One receipt by id.
    pub async fn get_receipt(&self, id: Uuid) -> Result<Receipt, AppError> {
        self.receipts.get(id).await
    }

    fn id_lock(&self, id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.process_locks
            .lock()
            .expect("process lock map poisoned")
            .entry(id)
            .or_default()
            .clone()
    }

    /// Drop the lock map entry once no other Process call holds it.
    fn reap_id_lock(&self, id: Uuid) {
        let mut locks = self.process_locks.lock().expect("process lock map poisoned");
        if let Some(entry) = locks.get(&id) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(&id);
            }
        }
    }
}

fn storage_error(e: StorageError) -> AppError {
    AppError::Storage(e.to_string())
}

fn sanitize_filename(filename: &str) -> String {
    const MAX: usize = 255;
    let path = std::path::Path::new(filename);
    let base = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    if base.contains("..") {
        return "invalid_filename".to_string();
    }
    let s: String = base
        .chars()
        .take(MAX)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.trim().is_empty() || s.len() < 3 {
        "file".to_string()
    } else {
        s
    }
}
